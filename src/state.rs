//! Shared application state: the latest folder, note and todo snapshots,
//! plus the search index derived from the notes.
//!
//! Snapshots are immutable `Arc`s. Publishing replaces a whole collection at
//! once, so every subscriber sees either the old or the new one.

use std::sync::{Arc, Mutex, MutexGuard};
use tokio::sync::watch;

use crate::core::folder::Folder;
use crate::core::note::Note;
use crate::core::todo::Todo;
use crate::search::SearchIndex;

pub type Snapshot<T> = Arc<Vec<T>>;

/// Notes as one consistent view: the full snapshot and the filtered one
/// derived from it.
#[derive(Debug, Clone)]
pub struct NotesView {
    pub all: Snapshot<Note>,
    pub filtered: Snapshot<Note>,
    pub query: String,
}

impl NotesView {
    pub fn has_query(&self) -> bool {
        !self.query.trim().is_empty()
    }

    /// What note lists should render: the filtered view while a query is active.
    pub fn visible(&self) -> &[Note] {
        if self.has_query() {
            &self.filtered
        } else {
            &self.all
        }
    }
}

pub struct AppStore {
    folders: watch::Sender<Snapshot<Folder>>,
    notes: watch::Sender<Snapshot<Note>>,
    todos: watch::Sender<Snapshot<Todo>>,
    search: Mutex<SearchIndex>,
}

impl Default for AppStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AppStore {
    pub fn new() -> Self {
        let (folders, _) = watch::channel(Snapshot::default());
        let (notes, _) = watch::channel(Snapshot::default());
        let (todos, _) = watch::channel(Snapshot::default());
        Self {
            folders,
            notes,
            todos,
            search: Mutex::new(SearchIndex::new()),
        }
    }

    pub fn folders(&self) -> Snapshot<Folder> {
        self.folders.borrow().clone()
    }

    pub fn notes(&self) -> Snapshot<Note> {
        self.notes.borrow().clone()
    }

    pub fn todos(&self) -> Snapshot<Todo> {
        self.todos.borrow().clone()
    }

    pub fn subscribe_folders(&self) -> watch::Receiver<Snapshot<Folder>> {
        self.folders.subscribe()
    }

    pub fn subscribe_notes(&self) -> watch::Receiver<Snapshot<Note>> {
        self.notes.subscribe()
    }

    pub fn subscribe_todos(&self) -> watch::Receiver<Snapshot<Todo>> {
        self.todos.subscribe()
    }

    pub fn publish_folders(&self, folders: Vec<Folder>) -> Snapshot<Folder> {
        let snapshot = Arc::new(folders);
        self.folders.send_replace(snapshot.clone());
        snapshot
    }

    /// The search index and the notes channel move together under the index
    /// lock, so `notes_view` never pairs a new list with a stale filter.
    pub fn publish_notes(&self, notes: Vec<Note>) -> Snapshot<Note> {
        let snapshot = Arc::new(notes);
        let mut search = self.lock_search();
        search.set_notes(snapshot.clone());
        self.notes.send_replace(snapshot.clone());
        snapshot
    }

    pub fn publish_todos(&self, todos: Vec<Todo>) -> Snapshot<Todo> {
        let snapshot = Arc::new(todos);
        self.todos.send_replace(snapshot.clone());
        snapshot
    }

    pub fn set_query(&self, query: &str) {
        self.lock_search().set_query(query);
    }

    pub fn notes_view(&self) -> NotesView {
        let search = self.lock_search();
        NotesView {
            all: search.notes().clone(),
            filtered: search.filtered().clone(),
            query: search.query().to_string(),
        }
    }

    fn lock_search(&self) -> MutexGuard<'_, SearchIndex> {
        // The index is rebuilt from scratch on every write; a poisoned guard
        // still holds a usable one.
        self.search.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
