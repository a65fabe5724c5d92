//! The note "history" blob: two named sections of timestamped entries, most
//! recent first, stored as plain text.
//!
//! ```text
//! ## General Notes
//! Call the vendor back — Mar 3, 02:15 PM
//! Budget approved — Mar 1, 09:00 AM
//!
//! ## Discussion Points
//! Hiring plan — Feb 27, 11:30 AM
//! ```
//!
//! Persisted notes already use this layout, so the header tokens and the
//! separator must not change.

use chrono::{DateTime, TimeZone};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

pub const GENERAL_NOTES_HEADER: &str = "## General Notes";
pub const DISCUSSION_POINTS_HEADER: &str = "## Discussion Points";
pub const ENTRY_SEPARATOR: &str = " — ";

/// `en-US` short form, e.g. `Mar 3, 02:15 PM`.
const ENTRY_TIMESTAMP_FORMAT: &str = "%b %-d, %I:%M %p";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Section {
    GeneralNotes,
    DiscussionPoints,
}

impl Section {
    pub const ALL: [Section; 2] = [Section::GeneralNotes, Section::DiscussionPoints];

    pub fn label(&self) -> &'static str {
        match self {
            Self::GeneralNotes => "General Notes",
            Self::DiscussionPoints => "Discussion Points",
        }
    }

    pub fn from_label(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "general" | "general notes" | "general-notes" => Some(Self::GeneralNotes),
            "discussion" | "discussion points" | "discussion-points" => {
                Some(Self::DiscussionPoints)
            }
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub text: String,
    /// Display timestamp as written; empty for entries that never had one.
    pub timestamp: String,
}

impl HistoryEntry {
    pub fn stamped<Tz: TimeZone>(text: &str, at: &DateTime<Tz>) -> Self
    where
        Tz::Offset: fmt::Display,
    {
        Self {
            text: text.trim().to_string(),
            timestamp: at.format(ENTRY_TIMESTAMP_FORMAT).to_string(),
        }
    }

    fn parse(line: &str) -> Self {
        let unstamped = line
            .trim_end()
            .strip_suffix(ENTRY_SEPARATOR.trim_end())
            .filter(|text| text.contains(ENTRY_SEPARATOR));
        if let Some(text) = unstamped {
            return Self {
                text: text.to_string(),
                timestamp: String::new(),
            };
        }
        match line.rsplit_once(ENTRY_SEPARATOR) {
            Some((text, timestamp)) => Self {
                text: text.to_string(),
                timestamp: timestamp.to_string(),
            },
            None => Self {
                text: line.to_string(),
                timestamp: String::new(),
            },
        }
    }
}

impl fmt::Display for HistoryEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.timestamp.is_empty() {
            // A dangling separator keeps a separator inside the text from
            // being read back as the timestamp.
            if self.text.contains(ENTRY_SEPARATOR) {
                write!(f, "{}{}", self.text, ENTRY_SEPARATOR.trim_end())
            } else {
                write!(f, "{}", self.text)
            }
        } else {
            write!(f, "{}{}{}", self.text, ENTRY_SEPARATOR, self.timestamp)
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct History {
    pub general_notes: Vec<HistoryEntry>,
    pub discussion_points: Vec<HistoryEntry>,
}

impl History {
    pub fn decode(blob: &str) -> Self {
        let mut history = Self::default();
        if blob.trim().is_empty() {
            return history;
        }

        let mut parts = blob.split(DISCUSSION_POINTS_HEADER);
        let general = parts.next().unwrap_or_default();
        let discussion = parts.next().unwrap_or_default();

        history.general_notes = parse_lines(general.replacen(GENERAL_NOTES_HEADER, "", 1).trim());
        history.discussion_points = parse_lines(discussion.trim());
        history
    }

    pub fn encode(&self) -> String {
        let mut out = String::new();
        for (header, entries) in [
            (GENERAL_NOTES_HEADER, &self.general_notes),
            (DISCUSSION_POINTS_HEADER, &self.discussion_points),
        ] {
            if entries.is_empty() {
                continue;
            }
            out.push_str(header);
            out.push('\n');
            let lines: Vec<String> = entries.iter().map(|e| e.to_string()).collect();
            out.push_str(&lines.join("\n"));
            out.push_str("\n\n");
        }
        out.trim().to_string()
    }

    pub fn is_empty(&self) -> bool {
        self.general_notes.is_empty() && self.discussion_points.is_empty()
    }

    pub fn entries(&self, section: Section) -> &[HistoryEntry] {
        match section {
            Section::GeneralNotes => &self.general_notes,
            Section::DiscussionPoints => &self.discussion_points,
        }
    }

    fn entries_mut(&mut self, section: Section) -> &mut Vec<HistoryEntry> {
        match section {
            Section::GeneralNotes => &mut self.general_notes,
            Section::DiscussionPoints => &mut self.discussion_points,
        }
    }

    /// Most recent first: the entry always lands at index 0.
    pub fn push(&mut self, section: Section, entry: HistoryEntry) {
        self.entries_mut(section).insert(0, entry);
    }

    pub fn remove(&mut self, section: Section, index: usize) -> Option<HistoryEntry> {
        let entries = self.entries_mut(section);
        if index < entries.len() {
            Some(entries.remove(index))
        } else {
            None
        }
    }
}

fn parse_lines(section: &str) -> Vec<HistoryEntry> {
    section
        .split('\n')
        .filter(|line| !line.trim().is_empty())
        .map(HistoryEntry::parse)
        .collect()
}

impl Serialize for History {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.encode())
    }
}

impl<'de> Deserialize<'de> for History {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let blob = Option::<String>::deserialize(deserializer)?;
        Ok(blob.map(|b| Self::decode(&b)).unwrap_or_default())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn entry(text: &str, ts: &str) -> HistoryEntry {
        HistoryEntry {
            text: text.to_string(),
            timestamp: ts.to_string(),
        }
    }

    #[test]
    fn empty_blob_has_two_empty_sections() {
        let h = History::decode("");
        assert!(h.general_notes.is_empty());
        assert!(h.discussion_points.is_empty());
        assert_eq!(History::decode("   \n "), History::default());
    }

    #[test]
    fn empty_history_encodes_to_empty_string() {
        assert_eq!(History::default().encode(), "");
    }

    #[test]
    fn encodes_both_sections_with_blank_line_between() {
        let h = History {
            general_notes: vec![entry("Budget approved", "Mar 1, 09:00 AM")],
            discussion_points: vec![
                entry("Hiring plan", "Feb 27, 11:30 AM"),
                entry("Offsite", "Feb 20, 04:00 PM"),
            ],
        };
        assert_eq!(
            h.encode(),
            "## General Notes\nBudget approved — Mar 1, 09:00 AM\n\n\
             ## Discussion Points\nHiring plan — Feb 27, 11:30 AM\nOffsite — Feb 20, 04:00 PM"
        );
    }

    #[test]
    fn round_trips_well_formed_histories() {
        let only_discussion = History {
            general_notes: Vec::new(),
            discussion_points: vec![entry("Roadmap", "Jan 5, 02:30 PM")],
        };
        let both = History {
            general_notes: vec![entry("a — b", "Jan 5, 02:30 PM"), entry("no stamp", "")],
            discussion_points: vec![entry("Roadmap", "Jan 4, 10:00 AM")],
        };
        for h in [History::default(), only_discussion, both] {
            assert_eq!(History::decode(&h.encode()), h);
        }
    }

    #[test]
    fn unstamped_entry_with_separator_in_text_round_trips() {
        let h = History {
            general_notes: vec![entry("pros — cons", ""), entry("plain", "Jan 2, 03:00 PM")],
            discussion_points: vec![entry("vendor — pricing — terms", "")],
        };
        assert_eq!(h.general_notes[0].to_string(), "pros — cons —");
        assert_eq!(History::decode(&h.encode()), h);
    }

    #[test]
    fn decodes_blank_lines_away() {
        let h = History::decode("## General Notes\n\nfirst — Jan 1, 01:00 AM\n\n\nsecond\n");
        assert_eq!(
            h.general_notes,
            vec![entry("first", "Jan 1, 01:00 AM"), entry("second", "")]
        );
    }

    #[test]
    fn push_inserts_at_head() {
        let mut h = History::default();
        h.push(Section::GeneralNotes, entry("older", "Jan 1, 01:00 AM"));
        h.push(Section::GeneralNotes, entry("newer", "Jan 2, 01:00 AM"));
        assert_eq!(h.general_notes[0].text, "newer");
        assert_eq!(h.general_notes[1].text, "older");
        assert!(h.discussion_points.is_empty());
    }

    #[test]
    fn remove_by_index_within_section() {
        let mut h = History::default();
        h.push(Section::DiscussionPoints, entry("one", ""));
        h.push(Section::DiscussionPoints, entry("two", ""));
        assert_eq!(h.remove(Section::DiscussionPoints, 1).map(|e| e.text), Some("one".into()));
        assert_eq!(h.remove(Section::DiscussionPoints, 5), None);
        assert_eq!(h.entries(Section::DiscussionPoints).len(), 1);
    }

    #[test]
    fn stamps_entries_in_short_us_format() {
        let at = Utc.with_ymd_and_hms(2026, 3, 3, 14, 15, 0).unwrap();
        let e = HistoryEntry::stamped("  Call the vendor back ", &at);
        assert_eq!(e.to_string(), "Call the vendor back — Mar 3, 02:15 PM");
    }

    #[test]
    fn null_blob_deserializes_to_empty_history() {
        let h: History = serde_json::from_str("null").unwrap();
        assert!(h.is_empty());
    }
}
