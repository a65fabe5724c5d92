use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use super::folder::Folder;
use super::history::{History, HistoryEntry, Section};
use super::id::EntityId;
use crate::error::{Error, Result};

/// Legacy folder reference that meant "archived" before notes had a flag.
pub const ARCHIVED_SENTINEL: &str = "archived";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NoteStatus {
    #[default]
    Active,
    Archived,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(from = "NoteRecord", into = "NoteRecord")]
pub struct Note {
    pub id: EntityId,
    pub title: String,
    pub folder_id: Option<EntityId>,
    pub status: NoteStatus,
    pub general_notes: String,
    pub discussion_points: String,
    pub history: History,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl Note {
    pub fn from_draft(id: EntityId, draft: &NoteDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            title: draft.title.clone(),
            folder_id: draft.folder_id,
            status: NoteStatus::Active,
            general_notes: draft.general_notes.clone(),
            discussion_points: draft.discussion_points.clone(),
            history: History::decode(&draft.todo_items),
            created_at: now,
            updated_at: Some(now),
        }
    }

    pub fn is_archived(&self) -> bool {
        self.status == NoteStatus::Archived
    }

    /// Not archived, and either no folder or a folder that no longer exists.
    pub fn is_unorganized(&self, folders: &[Folder]) -> bool {
        if self.is_archived() {
            return false;
        }
        match self.folder_id {
            None => true,
            Some(id) => !folders.iter().any(|f| f.id == id),
        }
    }

    pub fn section_text(&self, section: Section) -> &str {
        match section {
            Section::GeneralNotes => &self.general_notes,
            Section::DiscussionPoints => &self.discussion_points,
        }
    }

    /// Patch that pushes the live text of `section` onto the history and
    /// clears the field. `None` when there is nothing to move.
    pub fn move_to_history<Tz: TimeZone>(&self, section: Section, at: &DateTime<Tz>) -> Option<NotePatch>
    where
        Tz::Offset: fmt::Display,
    {
        let content = self.section_text(section).trim();
        if content.is_empty() {
            return None;
        }

        let mut history = self.history.clone();
        history.push(section, HistoryEntry::stamped(content, at));

        let mut patch = NotePatch {
            history: Some(history),
            ..NotePatch::default()
        };
        match section {
            Section::GeneralNotes => patch.general_notes = Some(String::new()),
            Section::DiscussionPoints => patch.discussion_points = Some(String::new()),
        }
        Some(patch)
    }

    pub fn delete_history_entry(&self, section: Section, index: usize) -> Option<NotePatch> {
        let mut history = self.history.clone();
        history.remove(section, index)?;
        Some(NotePatch {
            history: Some(history),
            ..NotePatch::default()
        })
    }
}

/// Note as it travels over the wire and sits in the local cache.
///
/// Migration shim: besides the `archived` flag, older data marks archived
/// notes with `folder_id: "archived"`. Both shapes are accepted here and
/// folded into [`NoteStatus`]; nothing outside this type looks at the
/// sentinel.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NoteRecord {
    #[serde(deserialize_with = "crate::core::id::lenient_id::deserialize")]
    pub id: EntityId,
    pub title: String,
    #[serde(default)]
    pub folder_id: Option<FolderRef>,
    #[serde(default)]
    pub archived: bool,
    #[serde(default)]
    pub general_notes: Option<String>,
    #[serde(default)]
    pub discussion_points: Option<String>,
    #[serde(default, alias = "previous_notes")]
    pub todo_items: Option<String>,
    #[serde(with = "crate::core::id::timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::core::id::timestamp_opt")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FolderRef {
    Id(#[serde(deserialize_with = "crate::core::id::lenient_id::deserialize")] EntityId),
    Legacy(String),
}

impl NoteRecord {
    pub fn is_archived(&self) -> bool {
        self.archived || matches!(&self.folder_id, Some(FolderRef::Legacy(s)) if s == ARCHIVED_SENTINEL)
    }
}

impl From<NoteRecord> for Note {
    fn from(record: NoteRecord) -> Self {
        let status = if record.is_archived() {
            NoteStatus::Archived
        } else {
            NoteStatus::Active
        };
        let folder_id = match record.folder_id {
            Some(FolderRef::Id(id)) => Some(id),
            Some(FolderRef::Legacy(s)) => s.parse().ok(),
            None => None,
        };
        Self {
            id: record.id,
            title: record.title,
            folder_id,
            status,
            general_notes: record.general_notes.unwrap_or_default(),
            discussion_points: record.discussion_points.unwrap_or_default(),
            history: History::decode(record.todo_items.as_deref().unwrap_or_default()),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<Note> for NoteRecord {
    fn from(note: Note) -> Self {
        let archived = note.is_archived();
        Self {
            id: note.id,
            title: note.title,
            folder_id: note.folder_id.map(FolderRef::Id),
            archived,
            general_notes: Some(note.general_notes),
            discussion_points: Some(note.discussion_points),
            todo_items: Some(note.history.encode()),
            created_at: note.created_at,
            updated_at: note.updated_at,
        }
    }
}

/// Payload for `POST /notes/`.
#[derive(Debug, Clone, Default, Serialize)]
pub struct NoteDraft {
    pub title: String,
    pub folder_id: Option<EntityId>,
    pub general_notes: String,
    pub discussion_points: String,
    pub todo_items: String,
}

impl NoteDraft {
    /// New notes start unorganized and empty.
    pub fn titled(title: &str) -> Self {
        Self {
            title: title.trim().to_string(),
            ..Self::default()
        }
    }
}

/// The fields a note edit may touch. `folder: Some(None)` clears the folder.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NotePatch {
    pub title: Option<String>,
    pub folder: Option<Option<EntityId>>,
    pub status: Option<NoteStatus>,
    pub general_notes: Option<String>,
    pub discussion_points: Option<String>,
    pub history: Option<History>,
}

impl NotePatch {
    pub fn move_to(folder: Option<EntityId>) -> Self {
        Self {
            folder: Some(folder),
            ..Self::default()
        }
    }

    pub fn archive() -> Self {
        Self {
            status: Some(NoteStatus::Archived),
            ..Self::default()
        }
    }

    /// Restored notes always land in Unorganized, never back in their old folder.
    pub fn restore() -> Self {
        Self {
            status: Some(NoteStatus::Active),
            folder: Some(None),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    pub fn validate(&self) -> Result<()> {
        match &self.title {
            Some(title) if title.trim().is_empty() => Err(Error::BlankField("note title")),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, note: &mut Note, now: DateTime<Utc>) {
        if let Some(title) = &self.title {
            note.title = title.trim().to_string();
        }
        if let Some(folder) = self.folder {
            note.folder_id = folder;
        }
        if let Some(status) = self.status {
            note.status = status;
        }
        if let Some(text) = &self.general_notes {
            note.general_notes = text.clone();
        }
        if let Some(text) = &self.discussion_points {
            note.discussion_points = text.clone();
        }
        if let Some(history) = &self.history {
            note.history = history.clone();
        }
        note.updated_at = Some(now);
    }

    /// Body for `PUT /notes/{id}`: only the fields this patch sets.
    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(title) = &self.title {
            body.insert("title".into(), Value::from(title.trim()));
        }
        if let Some(folder) = self.folder {
            body.insert("folder_id".into(), folder.map(Value::from).unwrap_or(Value::Null));
        }
        if let Some(status) = self.status {
            body.insert("archived".into(), Value::Bool(status == NoteStatus::Archived));
        }
        if let Some(text) = &self.general_notes {
            body.insert("general_notes".into(), Value::from(text.as_str()));
        }
        if let Some(text) = &self.discussion_points {
            body.insert("discussion_points".into(), Value::from(text.as_str()));
        }
        if let Some(history) = &self.history {
            body.insert("todo_items".into(), Value::from(history.encode()));
        }
        Value::Object(body)
    }
}
