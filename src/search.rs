//! Full-text filter over the current notes snapshot.

use regex::RegexBuilder;
use std::sync::Arc;

use crate::core::note::Note;
use crate::core::todo::Todo;

#[derive(Debug, Clone, Default)]
pub struct SearchIndex {
    query: String,
    notes: Arc<Vec<Note>>,
    filtered: Arc<Vec<Note>>,
}

impl SearchIndex {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set_notes(&mut self, notes: Arc<Vec<Note>>) {
        self.notes = notes;
        self.refilter();
    }

    pub fn set_query(&mut self, query: &str) {
        self.query = query.to_string();
        self.refilter();
    }

    pub fn query(&self) -> &str {
        &self.query
    }

    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }

    pub fn notes(&self) -> &Arc<Vec<Note>> {
        &self.notes
    }

    pub fn filtered(&self) -> &Arc<Vec<Note>> {
        &self.filtered
    }

    /// Not incremental: every change re-runs the filter over the whole snapshot.
    fn refilter(&mut self) {
        self.filtered = filter_notes(&self.notes, &self.query);
    }
}

/// A blank query hands back the very same snapshot.
pub fn filter_notes(notes: &Arc<Vec<Note>>, query: &str) -> Arc<Vec<Note>> {
    if query.trim().is_empty() {
        return Arc::clone(notes);
    }
    let needle = query.to_lowercase();
    Arc::new(
        notes
            .iter()
            .filter(|note| note_matches(note, &needle))
            .cloned()
            .collect(),
    )
}

/// `needle` must already be lowercased.
fn note_matches(note: &Note, needle: &str) -> bool {
    let contains = |haystack: &str| haystack.to_lowercase().contains(needle);
    contains(&note.title)
        || contains(&note.general_notes)
        || contains(&note.discussion_points)
        || (!note.history.is_empty() && contains(&note.history.encode()))
}

pub fn filter_todos<'a>(todos: &'a [Todo], query: &str) -> Vec<&'a Todo> {
    let needle = query.trim().to_lowercase();
    todos
        .iter()
        .filter(|todo| todo.text.to_lowercase().contains(&needle))
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Segment<'a> {
    pub text: &'a str,
    pub matched: bool,
}

/// Split `text` around case-insensitive occurrences of `query`.
pub fn highlight<'a>(text: &'a str, query: &str) -> Vec<Segment<'a>> {
    let whole = vec![Segment {
        text,
        matched: false,
    }];
    if query.is_empty() || text.is_empty() {
        return whole;
    }
    let Ok(re) = RegexBuilder::new(&regex::escape(query))
        .case_insensitive(true)
        .build()
    else {
        return whole;
    };

    let mut segments = Vec::new();
    let mut last = 0;
    for m in re.find_iter(text) {
        if m.start() > last {
            segments.push(Segment {
                text: &text[last..m.start()],
                matched: false,
            });
        }
        segments.push(Segment {
            text: m.as_str(),
            matched: true,
        });
        last = m.end();
    }
    if last < text.len() {
        segments.push(Segment {
            text: &text[last..],
            matched: false,
        });
    }
    segments
}
