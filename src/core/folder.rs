use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::id::EntityId;

/// Name of the built-in folder that collects archived notes.
pub const ARCHIVED_FOLDER_NAME: &str = "Archived Notes";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Folder {
    #[serde(deserialize_with = "crate::core::id::lenient_id::deserialize")]
    pub id: EntityId,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub is_system: bool,
    #[serde(with = "crate::core::id::timestamp", default = "Utc::now")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "crate::core::id::timestamp_opt", skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Folder {
    pub fn new(id: EntityId, name: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            id,
            name: name.into(),
            description: None,
            parent_id: None,
            is_system: false,
            created_at: now,
            updated_at: None,
        }
    }

    /// System folders can be neither renamed nor deleted. Older data only
    /// marks them by name.
    pub fn is_system(&self) -> bool {
        self.is_system || self.name == ARCHIVED_FOLDER_NAME
    }
}

/// Payload for `POST /folders/`.
#[derive(Debug, Clone, Serialize)]
pub struct FolderDraft {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<EntityId>,
}

impl FolderDraft {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.trim().to_string(),
            description: None,
            parent_id: None,
        }
    }
}

/// The only folder edit the client performs.
#[derive(Debug, Clone, Serialize)]
pub struct FolderRename {
    pub name: String,
}
