//! Local fallback store: whole collections persisted as JSON blobs, read and
//! written in one piece per operation.

pub mod backend;

pub use backend::{Backend, FileBackend, MemoryBackend};

use serde::Serialize;
use serde::de::DeserializeOwned;
use std::collections::{BTreeSet, HashSet};
use thiserror::Error;

use crate::core::folder::Folder;
use crate::core::id::{EntityId, LenientId};
use crate::core::note::Note;
use crate::core::todo::Todo;

// Key names predate this client; existing caches must keep loading.
pub const FOLDERS_KEY: &str = "todoTool_folders";
pub const NOTES_KEY: &str = "todoTool_notes";
pub const TODOS_KEY: &str = "todoTool_todos";
pub const COMPLETED_TODOS_KEY: &str = "todoTool_completedTodos";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("local storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("failed to encode collection: {0}")]
    Encode(#[from] serde_json::Error),
    #[error("local storage lock poisoned")]
    Poisoned,
}

pub struct LocalStore {
    backend: Box<dyn Backend>,
}

impl LocalStore {
    pub fn new(backend: impl Backend + 'static) -> Self {
        Self {
            backend: Box::new(backend),
        }
    }

    pub fn in_memory() -> Self {
        Self::new(MemoryBackend::new())
    }

    pub fn load_folders(&self) -> Vec<Folder> {
        self.load(FOLDERS_KEY)
    }

    pub fn save_folders(&self, folders: &[Folder]) -> Result<(), StoreError> {
        self.save(FOLDERS_KEY, folders)
    }

    pub fn load_notes(&self) -> Vec<Note> {
        self.load(NOTES_KEY)
    }

    pub fn save_notes(&self, notes: &[Note]) -> Result<(), StoreError> {
        self.save(NOTES_KEY, notes)
    }

    /// Todos with an id seen earlier in the collection are dropped.
    pub fn load_todos(&self) -> Vec<Todo> {
        let todos: Vec<Todo> = self.load(TODOS_KEY);
        let mut seen = HashSet::new();
        todos
            .into_iter()
            .filter(|todo| {
                let fresh = seen.insert(todo.id);
                if !fresh {
                    log::warn!("Dropping duplicate cached todo id {}", todo.id);
                }
                fresh
            })
            .collect()
    }

    pub fn save_todos(&self, todos: &[Todo]) -> Result<(), StoreError> {
        self.save(TODOS_KEY, todos)
    }

    pub fn load_completed(&self) -> BTreeSet<EntityId> {
        self.load::<Vec<LenientId>>(COMPLETED_TODOS_KEY)
            .into_iter()
            .map(|id| id.0)
            .collect()
    }

    pub fn save_completed(&self, ids: &BTreeSet<EntityId>) -> Result<(), StoreError> {
        let ids: Vec<EntityId> = ids.iter().copied().collect();
        self.save(COMPLETED_TODOS_KEY, &ids)
    }

    /// Absent or unreadable data loads as an empty collection; the next save
    /// replaces whatever was there.
    fn load<T: DeserializeOwned + Default>(&self, key: &str) -> T {
        let raw = match self.backend.read(key) {
            Ok(Some(raw)) => raw,
            Ok(None) => return T::default(),
            Err(e) => {
                log::error!("Failed to read local {}: {}", key, e);
                return T::default();
            }
        };
        serde_json::from_str(&raw).unwrap_or_else(|e| {
            log::warn!("Discarding malformed local {}: {}", key, e);
            T::default()
        })
    }

    fn save<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<(), StoreError> {
        let json = serde_json::to_string(value)?;
        self.backend.write(key, &json)
    }
}
