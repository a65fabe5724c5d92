//! Read-side queries the front end renders from: the folder sidebar, the
//! notes list filter and the todo board.

use chrono::{DateTime, Duration, Utc};
use std::collections::{BTreeSet, HashMap, HashSet};

use crate::core::folder::Folder;
use crate::core::id::EntityId;
use crate::core::note::Note;
use crate::core::todo::{Todo, TodoSection};
use crate::search;
use crate::state::NotesView;

/// Folder tree grouping. Built from [`NotesView::visible`], so every group
/// honors an active search.
pub struct Sidebar<'a> {
    folders: &'a [Folder],
    notes: &'a [Note],
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SidebarCounts {
    pub per_folder: Vec<(EntityId, usize)>,
    pub unorganized: usize,
    pub archived: usize,
}

impl<'a> Sidebar<'a> {
    pub fn new(folders: &'a [Folder], view: &'a NotesView) -> Self {
        Self {
            folders,
            notes: view.visible(),
        }
    }

    /// User folders; the system folder is rendered separately.
    pub fn visible_folders(&self) -> Vec<&'a Folder> {
        self.folders.iter().filter(|f| !f.is_system()).collect()
    }

    pub fn folder_notes(&self, folder_id: EntityId) -> Vec<&'a Note> {
        self.notes
            .iter()
            .filter(|n| n.folder_id == Some(folder_id) && !n.is_archived())
            .collect()
    }

    pub fn unorganized_notes(&self) -> Vec<&'a Note> {
        self.notes
            .iter()
            .filter(|n| n.is_unorganized(self.folders))
            .collect()
    }

    pub fn archived_notes(&self) -> Vec<&'a Note> {
        self.notes.iter().filter(|n| n.is_archived()).collect()
    }

    pub fn counts(&self) -> SidebarCounts {
        SidebarCounts {
            per_folder: self
                .visible_folders()
                .iter()
                .map(|f| (f.id, self.folder_notes(f.id).len()))
                .collect(),
            unorganized: self.unorganized_notes().len(),
            archived: self.archived_notes().len(),
        }
    }
}

/// Which notes the main list shows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NoteFilter {
    /// Everything not archived.
    #[default]
    All,
    Folder(EntityId),
    Unorganized,
    Archived,
}

impl NoteFilter {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim() {
            "all" => Some(Self::All),
            "unorganized" => Some(Self::Unorganized),
            "archived" => Some(Self::Archived),
            other => other.parse().ok().map(Self::Folder),
        }
    }

    pub fn apply<'a>(&self, notes: &'a [Note], folders: &[Folder]) -> Vec<&'a Note> {
        notes
            .iter()
            .filter(|n| match self {
                Self::All => !n.is_archived(),
                Self::Folder(id) => n.folder_id == Some(*id) && !n.is_archived(),
                Self::Unorganized => n.is_unorganized(folders),
                Self::Archived => n.is_archived(),
            })
            .collect()
    }
}

#[derive(Debug, Clone, Copy)]
pub struct BoardTiming {
    pub fade_after: Duration,
    pub hide_after: Duration,
}

impl Default for BoardTiming {
    fn default() -> Self {
        Self {
            fade_after: Duration::seconds(3),
            hide_after: Duration::seconds(5),
        }
    }
}

/// Completion state of the todo board. A checked todo fades, then drops out
/// of the default view; it stays in the collection until deleted.
#[derive(Debug, Clone, Default)]
pub struct TodoBoard {
    completed: BTreeSet<EntityId>,
    completed_at: HashMap<EntityId, DateTime<Utc>>,
    hidden: HashSet<EntityId>,
    timing: BoardTiming,
}

impl TodoBoard {
    /// Todos already completed when the board opens are hidden straight away.
    pub fn new(completed: BTreeSet<EntityId>, timing: BoardTiming) -> Self {
        let hidden = completed.iter().copied().collect();
        Self {
            completed,
            completed_at: HashMap::new(),
            hidden,
            timing,
        }
    }

    pub fn set_completed(&mut self, id: EntityId, completed: bool, now: DateTime<Utc>) {
        if completed {
            if self.completed.insert(id) {
                self.completed_at.insert(id, now);
            }
        } else {
            self.forget(id);
        }
    }

    pub fn forget(&mut self, id: EntityId) {
        self.completed.remove(&id);
        self.completed_at.remove(&id);
        self.hidden.remove(&id);
    }

    pub fn is_completed(&self, id: EntityId) -> bool {
        self.completed.contains(&id)
    }

    pub fn is_hidden(&self, id: EntityId, now: DateTime<Utc>) -> bool {
        self.hidden.contains(&id)
            || self
                .completed_at
                .get(&id)
                .is_some_and(|at| now - *at >= self.timing.hide_after)
    }

    pub fn is_fading(&self, id: EntityId, now: DateTime<Utc>) -> bool {
        !self.is_hidden(id, now)
            && self
                .completed_at
                .get(&id)
                .is_some_and(|at| now - *at >= self.timing.fade_after)
    }

    pub fn visible<'a>(
        &self,
        todos: &'a [Todo],
        now: DateTime<Utc>,
        show_completed: bool,
        query: &str,
    ) -> Vec<&'a Todo> {
        search::filter_todos(todos, query)
            .into_iter()
            .filter(|t| show_completed || !self.is_hidden(t.id, now))
            .collect()
    }

    pub fn by_section<'a>(
        &self,
        todos: &'a [Todo],
        now: DateTime<Utc>,
        show_completed: bool,
        query: &str,
    ) -> Vec<(TodoSection, Vec<&'a Todo>)> {
        let visible = self.visible(todos, now, show_completed, query);
        TodoSection::ALL
            .iter()
            .map(|section| {
                let items = visible
                    .iter()
                    .copied()
                    .filter(|t| t.section == *section)
                    .collect();
                (*section, items)
            })
            .collect()
    }
}
