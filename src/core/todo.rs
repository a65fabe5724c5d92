use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::id::EntityId;
use crate::error::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum TodoSection {
    QuickWins,
    Delegate,
    #[default]
    General,
    HighPriority,
}

impl TodoSection {
    /// Display order on the board.
    pub const ALL: [TodoSection; 4] = [
        TodoSection::QuickWins,
        TodoSection::Delegate,
        TodoSection::General,
        TodoSection::HighPriority,
    ];

    pub fn as_key(&self) -> &'static str {
        match self {
            Self::QuickWins => "quick-wins",
            Self::Delegate => "delegate",
            Self::General => "general",
            Self::HighPriority => "high-priority",
        }
    }

    pub fn from_key(s: &str) -> Option<Self> {
        match s {
            "quick-wins" => Some(Self::QuickWins),
            "delegate" => Some(Self::Delegate),
            "general" => Some(Self::General),
            "high-priority" => Some(Self::HighPriority),
            _ => None,
        }
    }

    pub fn title(&self) -> &'static str {
        match self {
            Self::QuickWins => "Quick Wins",
            Self::Delegate => "Delegate",
            Self::General => "General",
            Self::HighPriority => "High Priority",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Todo {
    #[serde(deserialize_with = "crate::core::id::lenient_id::deserialize")]
    pub id: EntityId,
    #[serde(alias = "title")]
    pub text: String,
    #[serde(default)]
    pub section: TodoSection,
    #[serde(default)]
    pub completed: bool,
    #[serde(
        rename = "createdAt",
        alias = "created_at",
        with = "crate::core::id::timestamp",
        default = "Utc::now"
    )]
    pub created_at: DateTime<Utc>,
    #[serde(default, alias = "description", skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stakeholders: Option<String>,
    #[serde(
        default,
        rename = "targetDate",
        alias = "target_date",
        skip_serializing_if = "Option::is_none"
    )]
    pub target_date: Option<String>,
}

impl Todo {
    pub fn from_draft(id: EntityId, draft: &TodoDraft, now: DateTime<Utc>) -> Self {
        Self {
            id,
            text: draft.text.clone(),
            section: draft.section,
            completed: false,
            created_at: now,
            details: None,
            stakeholders: None,
            target_date: None,
        }
    }
}

/// Payload for `POST /todos/`.
#[derive(Debug, Clone, Serialize)]
pub struct TodoDraft {
    pub text: String,
    pub section: TodoSection,
    pub completed: bool,
}

impl TodoDraft {
    pub fn new(text: &str, section: TodoSection) -> Self {
        Self {
            text: text.trim().to_string(),
            section,
            completed: false,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TodoPatch {
    pub text: Option<String>,
    pub section: Option<TodoSection>,
    pub completed: Option<bool>,
    pub details: Option<String>,
    pub stakeholders: Option<String>,
    pub target_date: Option<String>,
}

impl TodoPatch {
    pub fn validate(&self) -> Result<()> {
        match &self.text {
            Some(text) if text.trim().is_empty() => Err(Error::BlankField("todo text")),
            _ => Ok(()),
        }
    }

    pub fn apply(&self, todo: &mut Todo) {
        if let Some(text) = &self.text {
            todo.text = text.trim().to_string();
        }
        if let Some(section) = self.section {
            todo.section = section;
        }
        if let Some(completed) = self.completed {
            todo.completed = completed;
        }
        if let Some(details) = &self.details {
            todo.details = Some(details.clone());
        }
        if let Some(stakeholders) = &self.stakeholders {
            todo.stakeholders = Some(stakeholders.clone());
        }
        if let Some(target) = &self.target_date {
            todo.target_date = Some(target.clone());
        }
    }

    pub fn to_json(&self) -> Value {
        let mut body = Map::new();
        if let Some(text) = &self.text {
            body.insert("text".into(), Value::from(text.trim()));
        }
        if let Some(section) = self.section {
            body.insert("section".into(), Value::from(section.as_key()));
        }
        if let Some(completed) = self.completed {
            body.insert("completed".into(), Value::Bool(completed));
        }
        if let Some(details) = &self.details {
            body.insert("details".into(), Value::from(details.as_str()));
        }
        if let Some(stakeholders) = &self.stakeholders {
            body.insert("stakeholders".into(), Value::from(stakeholders.as_str()));
        }
        if let Some(target) = &self.target_date {
            body.insert("targetDate".into(), Value::from(target.as_str()));
        }
        Value::Object(body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reads_cached_todo_shape() {
        let json = r#"{"id":1,"text":"Review quarterly reports","section":"high-priority",
            "completed":false,"createdAt":"2026-01-05T09:00:00.000Z","targetDate":"2026-02-01"}"#;
        let todo: Todo = serde_json::from_str(json).unwrap();
        assert_eq!(todo.section, TodoSection::HighPriority);
        assert_eq!(todo.target_date.as_deref(), Some("2026-02-01"));

        let back = serde_json::to_value(&todo).unwrap();
        assert_eq!(back["section"], "high-priority");
        assert!(back.get("createdAt").is_some());
        assert!(back.get("details").is_none());
    }

    #[test]
    fn unknown_section_is_rejected() {
        let json = r#"{"id":1,"text":"x","section":"someday"}"#;
        assert!(serde_json::from_str::<Todo>(json).is_err());
        assert_eq!(TodoSection::from_key("someday"), None);
    }

    #[test]
    fn section_keys_match_serde_names() {
        for section in TodoSection::ALL {
            let json = serde_json::to_value(section).unwrap();
            assert_eq!(json, section.as_key());
            assert_eq!(TodoSection::from_key(section.as_key()), Some(section));
        }
    }

    #[test]
    fn patch_applies_detail_fields() {
        let mut todo = Todo::from_draft(1, &TodoDraft::new(" Order supplies ", TodoSection::QuickWins), Utc::now());
        assert_eq!(todo.text, "Order supplies");
        let patch = TodoPatch {
            details: Some("paper, toner".into()),
            stakeholders: Some("office".into()),
            ..TodoPatch::default()
        };
        patch.apply(&mut todo);
        assert_eq!(todo.details.as_deref(), Some("paper, toner"));
        assert_eq!(todo.stakeholders.as_deref(), Some("office"));
        assert_eq!(
            patch.to_json(),
            serde_json::json!({"details": "paper, toner", "stakeholders": "office"})
        );
    }
}
