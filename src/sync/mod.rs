//! Reconciliation: every mutation tries the remote service first and falls
//! back to the local store on any failure, then publishes the full updated
//! collection through [`AppStore`].
//!
//! Nothing here returns a remote error. The only errors are local guards
//! (blank names, system folders) checked before the remote is touched.
//!
//! Data written while offline stays local: once the service is back the
//! remote listing wins and local-only entries are not pushed upstream.

pub mod api;

use chrono::Utc;
use std::collections::{BTreeSet, HashSet};
use std::sync::{Arc, Mutex, MutexGuard};

use crate::core::folder::{Folder, FolderDraft, FolderRename};
use crate::core::id::{EntityId, IdGenerator};
use crate::core::note::{Note, NoteDraft, NotePatch};
use crate::core::todo::{Todo, TodoDraft, TodoPatch};
use crate::error::{Error, Result};
use crate::local::{LocalStore, StoreError};
use crate::state::{AppStore, Snapshot};
use api::{RemoteError, RemoteService};

/// Which side a mutation was applied on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Path {
    Remote,
    Local,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Applied<T> {
    pub value: T,
    pub path: Path,
}

impl<T> Applied<T> {
    fn remote(value: T) -> Self {
        Self {
            value,
            path: Path::Remote,
        }
    }

    fn local(value: T) -> Self {
        Self {
            value,
            path: Path::Local,
        }
    }

    pub fn is_local(&self) -> bool {
        self.path == Path::Local
    }
}

/// A collection kept in both the shared store and the local fallback store.
trait Cached: Clone {
    const KIND: &'static str;

    fn id(&self) -> EntityId;
    fn snapshot(store: &AppStore) -> Snapshot<Self>;
    fn load(local: &LocalStore) -> Vec<Self>;
    fn publish(store: &AppStore, items: Vec<Self>);
    fn persist(local: &LocalStore, items: &[Self]) -> std::result::Result<(), StoreError>;
}

impl Cached for Folder {
    const KIND: &'static str = "folders";

    fn id(&self) -> EntityId {
        self.id
    }
    fn snapshot(store: &AppStore) -> Snapshot<Self> {
        store.folders()
    }
    fn load(local: &LocalStore) -> Vec<Self> {
        local.load_folders()
    }
    fn publish(store: &AppStore, items: Vec<Self>) {
        store.publish_folders(items);
    }
    fn persist(local: &LocalStore, items: &[Self]) -> std::result::Result<(), StoreError> {
        local.save_folders(items)
    }
}

impl Cached for Note {
    const KIND: &'static str = "notes";

    fn id(&self) -> EntityId {
        self.id
    }
    fn snapshot(store: &AppStore) -> Snapshot<Self> {
        store.notes()
    }
    fn load(local: &LocalStore) -> Vec<Self> {
        local.load_notes()
    }
    fn publish(store: &AppStore, items: Vec<Self>) {
        store.publish_notes(items);
    }
    fn persist(local: &LocalStore, items: &[Self]) -> std::result::Result<(), StoreError> {
        local.save_notes(items)
    }
}

impl Cached for Todo {
    const KIND: &'static str = "todos";

    fn id(&self) -> EntityId {
        self.id
    }
    fn snapshot(store: &AppStore) -> Snapshot<Self> {
        store.todos()
    }
    fn load(local: &LocalStore) -> Vec<Self> {
        local.load_todos()
    }
    fn publish(store: &AppStore, items: Vec<Self>) {
        store.publish_todos(items);
    }
    fn persist(local: &LocalStore, items: &[Self]) -> std::result::Result<(), StoreError> {
        local.save_todos(items)
    }
}

fn report(action: &str, err: &RemoteError) {
    if err.is_unavailable() {
        log::debug!("{}: remote unavailable, using local store", action);
    } else {
        log::warn!("{} failed remotely, using local store: {}", action, err);
    }
}

fn upsert<T: Cached>(items: &mut Vec<T>, item: T) {
    match items.iter_mut().find(|existing| existing.id() == item.id()) {
        Some(existing) => *existing = item,
        None => items.insert(0, item),
    }
}

pub struct Reconciler<R> {
    remote: R,
    local: LocalStore,
    store: Arc<AppStore>,
    ids: IdGenerator,
    write_lock: Mutex<()>,
}

impl<R: RemoteService> Reconciler<R> {
    pub fn new(remote: R, local: LocalStore, store: Arc<AppStore>) -> Self {
        Self {
            remote,
            local,
            store,
            ids: IdGenerator::new(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn store(&self) -> &Arc<AppStore> {
        &self.store
    }

    pub fn local(&self) -> &LocalStore {
        &self.local
    }

    pub fn remote(&self) -> &R {
        &self.remote
    }

    // ---- folders ----------------------------------------------------------

    pub async fn load_folders(&self) -> Applied<Snapshot<Folder>> {
        match self.remote.list_folders().await {
            Ok(folders) => Applied::remote(self.store.publish_folders(folders)),
            Err(e) => {
                report("load folders", &e);
                Applied::local(self.store.publish_folders(self.local.load_folders()))
            }
        }
    }

    pub async fn create_folder(&self, name: &str) -> Result<Applied<Folder>> {
        let draft = FolderDraft::named(name);
        if draft.name.is_empty() {
            return Err(Error::BlankField("folder name"));
        }
        match self.remote.create_folder(&draft).await {
            Ok(folder) => {
                let merged = folder.clone();
                self.refresh_folders(move |folders| upsert(folders, merged)).await;
                Ok(Applied::remote(folder))
            }
            Err(e) => {
                report("create folder", &e);
                let now = Utc::now();
                let folder = Folder::new(self.ids.next_id(now), draft.name, now);
                let created = folder.clone();
                self.write_local::<Folder, _>(move |folders| folders.insert(0, created));
                Ok(Applied::local(folder))
            }
        }
    }

    pub async fn rename_folder(&self, id: EntityId, name: &str) -> Result<Applied<Option<Folder>>> {
        let name = name.trim();
        if name.is_empty() {
            return Err(Error::BlankField("folder name"));
        }
        self.guard_system_folder(id)?;

        let rename = FolderRename {
            name: name.to_string(),
        };
        match self.remote.update_folder(id, &rename).await {
            Ok(folder) => {
                let merged = folder.clone();
                self.refresh_folders(move |folders| upsert(folders, merged)).await;
                Ok(Applied::remote(Some(folder)))
            }
            Err(e) => {
                report("rename folder", &e);
                let now = Utc::now();
                let renamed = self.write_local::<Folder, _>(|folders| {
                    let folder = folders.iter_mut().find(|f| f.id == id)?;
                    folder.name = rename.name.clone();
                    folder.updated_at = Some(now);
                    Some(folder.clone())
                });
                Ok(Applied::local(renamed))
            }
        }
    }

    /// Notes inside the folder are left as they are; with their folder gone
    /// they show up as unorganized.
    pub async fn delete_folder(&self, id: EntityId) -> Result<Applied<()>> {
        self.guard_system_folder(id)?;
        match self.remote.delete_folder(id).await {
            Ok(()) => {
                self.refresh_folders(|folders| folders.retain(|f| f.id != id)).await;
                self.refresh_notes(|_| {}).await;
                Ok(Applied::remote(()))
            }
            Err(e) => {
                report("delete folder", &e);
                self.write_local::<Folder, _>(|folders| folders.retain(|f| f.id != id));
                Ok(Applied::local(()))
            }
        }
    }

    fn guard_system_folder(&self, id: EntityId) -> Result<()> {
        let folders = self.store.folders();
        match folders.iter().find(|f| f.id == id) {
            Some(folder) if folder.is_system() => Err(Error::SystemFolder(id)),
            _ => Ok(()),
        }
    }

    // ---- notes ------------------------------------------------------------

    pub async fn load_notes(&self) -> Applied<Snapshot<Note>> {
        match self.remote.list_notes(None).await {
            Ok(notes) => Applied::remote(self.store.publish_notes(notes)),
            Err(e) => {
                report("load notes", &e);
                Applied::local(self.store.publish_notes(self.local.load_notes()))
            }
        }
    }

    pub async fn create_note(&self, draft: NoteDraft) -> Result<Applied<Note>> {
        if draft.title.trim().is_empty() {
            return Err(Error::BlankField("note title"));
        }
        match self.remote.create_note(&draft).await {
            Ok(note) => {
                let merged = note.clone();
                self.refresh_notes(move |notes| upsert(notes, merged)).await;
                Ok(Applied::remote(note))
            }
            Err(e) => {
                report("create note", &e);
                let now = Utc::now();
                let note = Note::from_draft(self.ids.next_id(now), &draft, now);
                let created = note.clone();
                self.write_local::<Note, _>(move |notes| notes.insert(0, created));
                Ok(Applied::local(note))
            }
        }
    }

    /// Resolves to `None` when the fallback path cannot find the note.
    pub async fn update_note(&self, id: EntityId, patch: NotePatch) -> Result<Applied<Option<Note>>> {
        patch.validate()?;
        match self.remote.update_note(id, &patch).await {
            Ok(note) => {
                let merged = note.clone();
                self.refresh_notes(move |notes| upsert(notes, merged)).await;
                Ok(Applied::remote(Some(note)))
            }
            Err(e) => {
                report("update note", &e);
                let now = Utc::now();
                let updated = self.write_local::<Note, _>(|notes| {
                    let note = notes.iter_mut().find(|n| n.id == id)?;
                    patch.apply(note, now);
                    Some(note.clone())
                });
                Ok(Applied::local(updated))
            }
        }
    }

    pub async fn move_note(&self, id: EntityId, folder: Option<EntityId>) -> Result<Applied<Option<Note>>> {
        self.update_note(id, NotePatch::move_to(folder)).await
    }

    pub async fn archive_note(&self, id: EntityId) -> Result<Applied<Option<Note>>> {
        self.update_note(id, NotePatch::archive()).await
    }

    /// Back to Unorganized, whatever folder the note was in before.
    pub async fn restore_note(&self, id: EntityId) -> Result<Applied<Option<Note>>> {
        self.update_note(id, NotePatch::restore()).await
    }

    pub async fn delete_note(&self, id: EntityId) -> Applied<()> {
        match self.remote.delete_note(id).await {
            Ok(()) => {
                self.refresh_notes(|notes| notes.retain(|n| n.id != id)).await;
                Applied::remote(())
            }
            Err(e) => {
                report("delete note", &e);
                self.write_local::<Note, _>(|notes| notes.retain(|n| n.id != id));
                Applied::local(())
            }
        }
    }

    // ---- todos ------------------------------------------------------------

    pub async fn load_todos(&self) -> Applied<Snapshot<Todo>> {
        match self.remote.list_todos(None).await {
            Ok(todos) => Applied::remote(self.store.publish_todos(todos)),
            Err(e) => {
                report("load todos", &e);
                let completed = self.local.load_completed();
                let mut todos = self.local.load_todos();
                for todo in &mut todos {
                    todo.completed |= completed.contains(&todo.id);
                }
                Applied::local(self.store.publish_todos(todos))
            }
        }
    }

    pub fn completed_ids(&self) -> BTreeSet<EntityId> {
        self.local.load_completed()
    }

    pub async fn create_todo(&self, draft: TodoDraft) -> Result<Applied<Todo>> {
        if draft.text.trim().is_empty() {
            return Err(Error::BlankField("todo text"));
        }
        match self.remote.create_todo(&draft).await {
            Ok(todo) => {
                let merged = todo.clone();
                self.refresh_todos(move |todos| upsert(todos, merged)).await;
                Ok(Applied::remote(todo))
            }
            Err(e) => {
                report("create todo", &e);
                let now = Utc::now();
                let todo = Todo::from_draft(self.ids.next_id(now), &draft, now);
                let created = todo.clone();
                self.write_local::<Todo, _>(move |todos| todos.insert(0, created));
                Ok(Applied::local(todo))
            }
        }
    }

    pub async fn update_todo(&self, id: EntityId, patch: TodoPatch) -> Result<Applied<Option<Todo>>> {
        patch.validate()?;
        match self.remote.update_todo(id, &patch).await {
            Ok(todo) => {
                self.record_completion(todo.id, todo.completed);
                let merged = todo.clone();
                self.refresh_todos(move |todos| upsert(todos, merged)).await;
                Ok(Applied::remote(Some(todo)))
            }
            Err(e) => {
                report("update todo", &e);
                let updated = self.write_local::<Todo, _>(|todos| {
                    let todo = todos.iter_mut().find(|t| t.id == id)?;
                    patch.apply(todo);
                    Some(todo.clone())
                });
                if let Some(todo) = &updated {
                    self.record_completion(todo.id, todo.completed);
                }
                Ok(Applied::local(updated))
            }
        }
    }

    pub async fn toggle_todo(&self, id: EntityId) -> Applied<Option<Todo>> {
        match self.remote.toggle_todo(id).await {
            Ok(todo) => {
                self.record_completion(todo.id, todo.completed);
                let merged = todo.clone();
                self.refresh_todos(move |todos| upsert(todos, merged)).await;
                Applied::remote(Some(todo))
            }
            Err(e) => {
                report("toggle todo", &e);
                let toggled = self.write_local::<Todo, _>(|todos| {
                    let todo = todos.iter_mut().find(|t| t.id == id)?;
                    todo.completed = !todo.completed;
                    Some(todo.clone())
                });
                if let Some(todo) = &toggled {
                    self.record_completion(todo.id, todo.completed);
                }
                Applied::local(toggled)
            }
        }
    }

    pub async fn delete_todo(&self, id: EntityId) -> Applied<()> {
        let applied = match self.remote.delete_todo(id).await {
            Ok(()) => {
                self.refresh_todos(|todos| todos.retain(|t| t.id != id)).await;
                Applied::remote(())
            }
            Err(e) => {
                report("delete todo", &e);
                self.write_local::<Todo, _>(|todos| todos.retain(|t| t.id != id));
                Applied::local(())
            }
        };
        self.record_completion(id, false);
        applied
    }

    fn record_completion(&self, id: EntityId, completed: bool) {
        let _guard = self.lock();
        let mut ids = self.local.load_completed();
        let changed = if completed { ids.insert(id) } else { ids.remove(&id) };
        if changed {
            if let Err(e) = self.local.save_completed(&ids) {
                log::error!("Failed to save completed todos: {}", e);
            }
        }
    }

    // ---- propagation ------------------------------------------------------

    async fn refresh_folders(&self, on_stale: impl FnOnce(&mut Vec<Folder>)) {
        match self.remote.list_folders().await {
            Ok(folders) => {
                self.store.publish_folders(folders);
            }
            Err(e) => {
                report("reload folders", &e);
                self.write_memory::<Folder, _>(on_stale);
            }
        }
    }

    async fn refresh_notes(&self, on_stale: impl FnOnce(&mut Vec<Note>)) {
        match self.remote.list_notes(None).await {
            Ok(notes) => {
                self.store.publish_notes(notes);
            }
            Err(e) => {
                report("reload notes", &e);
                self.write_memory::<Note, _>(on_stale);
            }
        }
    }

    async fn refresh_todos(&self, on_stale: impl FnOnce(&mut Vec<Todo>)) {
        match self.remote.list_todos(None).await {
            Ok(todos) => {
                self.store.publish_todos(todos);
            }
            Err(e) => {
                report("reload todos", &e);
                self.write_memory::<Todo, _>(on_stale);
            }
        }
    }

    /// Fallback path: edit the cached collection, persist all of it, publish.
    ///
    /// The edit starts from the published snapshot plus every entry the local
    /// store holds that the snapshot lacks. A snapshot loaded from the remote
    /// does not contain offline-only entries, and they must not be dropped.
    fn write_local<T: Cached, O>(&self, edit: impl FnOnce(&mut Vec<T>) -> O) -> O {
        let _guard = self.lock();
        let mut items = T::snapshot(&self.store).as_ref().clone();
        let known: HashSet<EntityId> = items.iter().map(Cached::id).collect();
        let offline_only: Vec<T> = T::load(&self.local)
            .into_iter()
            .filter(|cached| !known.contains(&cached.id()))
            .collect();
        if !offline_only.is_empty() {
            log::debug!("Keeping {} local-only {}", offline_only.len(), T::KIND);
            items.extend(offline_only);
        }
        let out = edit(&mut items);
        if let Err(e) = T::persist(&self.local, &items) {
            log::error!("Failed to save local {}: {}", T::KIND, e);
        }
        T::publish(&self.store, items);
        out
    }

    /// The remote took the change but could not be re-listed: patch the
    /// in-memory snapshot only.
    fn write_memory<T: Cached, O>(&self, edit: impl FnOnce(&mut Vec<T>) -> O) -> O {
        let _guard = self.lock();
        let mut items = T::snapshot(&self.store).as_ref().clone();
        let out = edit(&mut items);
        T::publish(&self.store, items);
        out
    }

    fn lock(&self) -> MutexGuard<'_, ()> {
        self.write_lock.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::note::NoteStatus;
    use crate::core::todo::TodoSection;
    use crate::views::Sidebar;
    use reqwest::Method;
    use std::sync::atomic::{AtomicBool, AtomicI64, AtomicUsize, Ordering};

    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    enum Mode {
        Online,
        Unreachable,
        /// Reachable, but every mutation comes back 422.
        Rejecting,
    }

    #[derive(Default)]
    struct Server {
        folders: Vec<Folder>,
        notes: Vec<Note>,
        todos: Vec<Todo>,
    }

    struct FakeRemote {
        mode: Mutex<Mode>,
        lists_fail: AtomicBool,
        server: Mutex<Server>,
        next_id: AtomicI64,
        calls: AtomicUsize,
    }

    impl FakeRemote {
        fn new(mode: Mode) -> Self {
            Self {
                mode: Mutex::new(mode),
                lists_fail: AtomicBool::new(false),
                server: Mutex::new(Server::default()),
                next_id: AtomicI64::new(1),
                calls: AtomicUsize::new(0),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }

        fn gate(&self, method: Method, path: &str) -> std::result::Result<(), RemoteError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            match *self.mode.lock().unwrap() {
                Mode::Online => Ok(()),
                Mode::Unreachable => Err(RemoteError::Unavailable),
                Mode::Rejecting if method == Method::GET => Ok(()),
                Mode::Rejecting => Err(RemoteError::Status {
                    method,
                    path: path.to_string(),
                    status: 422,
                    body: "validation failed".into(),
                }),
            }
        }

        fn gate_list(&self, path: &str) -> std::result::Result<(), RemoteError> {
            self.gate(Method::GET, path)?;
            if self.lists_fail.load(Ordering::SeqCst) {
                return Err(RemoteError::Request("listing timed out".into()));
            }
            Ok(())
        }

        fn not_found(path: String) -> RemoteError {
            RemoteError::Status {
                method: Method::PUT,
                path,
                status: 404,
                body: "not found".into(),
            }
        }

        fn assign_id(&self) -> EntityId {
            self.next_id.fetch_add(1, Ordering::SeqCst)
        }
    }

    type RemoteResult<T> = std::result::Result<T, RemoteError>;

    impl RemoteService for FakeRemote {
        async fn list_folders(&self) -> RemoteResult<Vec<Folder>> {
            self.gate_list("/folders/")?;
            Ok(self.server.lock().unwrap().folders.clone())
        }

        async fn create_folder(&self, draft: &FolderDraft) -> RemoteResult<Folder> {
            self.gate(Method::POST, "/folders/")?;
            let folder = Folder::new(self.assign_id(), draft.name.clone(), Utc::now());
            self.server.lock().unwrap().folders.push(folder.clone());
            Ok(folder)
        }

        async fn update_folder(&self, id: EntityId, rename: &FolderRename) -> RemoteResult<Folder> {
            let path = format!("/folders/{}", id);
            self.gate(Method::PUT, &path)?;
            let mut server = self.server.lock().unwrap();
            let folder = server
                .folders
                .iter_mut()
                .find(|f| f.id == id)
                .ok_or_else(|| Self::not_found(path))?;
            folder.name = rename.name.clone();
            Ok(folder.clone())
        }

        async fn delete_folder(&self, id: EntityId) -> RemoteResult<()> {
            self.gate(Method::DELETE, &format!("/folders/{}", id))?;
            self.server.lock().unwrap().folders.retain(|f| f.id != id);
            Ok(())
        }

        async fn list_notes(&self, folder_id: Option<EntityId>) -> RemoteResult<Vec<Note>> {
            self.gate_list("/notes/")?;
            let server = self.server.lock().unwrap();
            Ok(server
                .notes
                .iter()
                .filter(|n| folder_id.is_none() || n.folder_id == folder_id)
                .cloned()
                .collect())
        }

        async fn create_note(&self, draft: &NoteDraft) -> RemoteResult<Note> {
            self.gate(Method::POST, "/notes/")?;
            let note = Note::from_draft(self.assign_id(), draft, Utc::now());
            self.server.lock().unwrap().notes.push(note.clone());
            Ok(note)
        }

        async fn update_note(&self, id: EntityId, patch: &NotePatch) -> RemoteResult<Note> {
            let path = format!("/notes/{}", id);
            self.gate(Method::PUT, &path)?;
            let mut server = self.server.lock().unwrap();
            let note = server
                .notes
                .iter_mut()
                .find(|n| n.id == id)
                .ok_or_else(|| Self::not_found(path))?;
            patch.apply(note, Utc::now());
            Ok(note.clone())
        }

        async fn delete_note(&self, id: EntityId) -> RemoteResult<()> {
            self.gate(Method::DELETE, &format!("/notes/{}", id))?;
            self.server.lock().unwrap().notes.retain(|n| n.id != id);
            Ok(())
        }

        async fn list_todos(&self, _completed: Option<bool>) -> RemoteResult<Vec<Todo>> {
            self.gate_list("/todos/")?;
            Ok(self.server.lock().unwrap().todos.clone())
        }

        async fn create_todo(&self, draft: &TodoDraft) -> RemoteResult<Todo> {
            self.gate(Method::POST, "/todos/")?;
            let todo = Todo::from_draft(self.assign_id(), draft, Utc::now());
            self.server.lock().unwrap().todos.push(todo.clone());
            Ok(todo)
        }

        async fn update_todo(&self, id: EntityId, patch: &TodoPatch) -> RemoteResult<Todo> {
            let path = format!("/todos/{}", id);
            self.gate(Method::PUT, &path)?;
            let mut server = self.server.lock().unwrap();
            let todo = server
                .todos
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Self::not_found(path))?;
            patch.apply(todo);
            Ok(todo.clone())
        }

        async fn delete_todo(&self, id: EntityId) -> RemoteResult<()> {
            self.gate(Method::DELETE, &format!("/todos/{}", id))?;
            self.server.lock().unwrap().todos.retain(|t| t.id != id);
            Ok(())
        }

        async fn toggle_todo(&self, id: EntityId) -> RemoteResult<Todo> {
            let path = format!("/todos/{}/toggle", id);
            self.gate(Method::PATCH, &path)?;
            let mut server = self.server.lock().unwrap();
            let todo = server
                .todos
                .iter_mut()
                .find(|t| t.id == id)
                .ok_or_else(|| Self::not_found(path))?;
            todo.completed = !todo.completed;
            Ok(todo.clone())
        }
    }

    fn reconciler(mode: Mode) -> Reconciler<FakeRemote> {
        Reconciler::new(FakeRemote::new(mode), LocalStore::in_memory(), Arc::new(AppStore::new()))
    }

    fn note_in(id: EntityId, title: &str, folder: Option<EntityId>) -> Note {
        let draft = NoteDraft {
            folder_id: folder,
            ..NoteDraft::titled(title)
        };
        Note::from_draft(id, &draft, Utc::now())
    }

    /// Seed the local cache and load it through the offline path.
    async fn seed_offline(rec: &Reconciler<FakeRemote>, folders: Vec<Folder>, notes: Vec<Note>) {
        rec.local().save_folders(&folders).unwrap();
        rec.local().save_notes(&notes).unwrap();
        assert!(rec.load_folders().await.is_local());
        assert!(rec.load_notes().await.is_local());
    }

    #[tokio::test]
    async fn offline_create_synthesizes_prepends_and_persists() {
        let rec = reconciler(Mode::Unreachable);
        seed_offline(&rec, Vec::new(), vec![note_in(5, "Existing", None)]).await;

        let applied = rec.create_note(NoteDraft::titled("  Standup  ")).await.unwrap();
        assert_eq!(applied.path, Path::Local);
        let note = applied.value;
        assert_eq!(note.title, "Standup");
        assert!(note.id > 5);
        assert_eq!(note.updated_at, Some(note.created_at));

        let published = rec.store().notes();
        assert_eq!(published[0], note);
        assert_eq!(published.len(), 2);

        let persisted = rec.local().load_notes();
        assert_eq!(persisted[0], note);
        assert_eq!(persisted[1].id, 5);
    }

    #[tokio::test]
    async fn online_create_reloads_from_remote_and_skips_local_store() {
        let rec = reconciler(Mode::Online);
        let applied = rec.create_note(NoteDraft::titled("Plan")).await.unwrap();
        assert_eq!(applied.path, Path::Remote);
        assert_eq!(applied.value.id, 1);
        assert_eq!(rec.store().notes().len(), 1);
        assert!(rec.local().load_notes().is_empty());
    }

    #[tokio::test]
    async fn failed_reload_merges_the_returned_entity() {
        let rec = reconciler(Mode::Online);
        rec.remote().lists_fail.store(true, Ordering::SeqCst);
        rec.store().publish_notes(vec![note_in(40, "Older", None)]);

        let applied = rec.create_note(NoteDraft::titled("Fresh")).await.unwrap();
        assert_eq!(applied.path, Path::Remote);
        let ids: Vec<EntityId> = rec.store().notes().iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![applied.value.id, 40]);
    }

    #[tokio::test]
    async fn archive_then_restore_lands_in_unorganized() {
        let rec = reconciler(Mode::Unreachable);
        let folders = vec![Folder::new(3, "Projects", Utc::now())];
        seed_offline(&rec, folders, vec![note_in(7, "Vendor call", Some(3))]).await;

        let archived = rec.archive_note(7).await.unwrap().value.unwrap();
        assert!(archived.is_archived());
        assert_eq!(archived.folder_id, Some(3));

        let restored = rec.restore_note(7).await.unwrap().value.unwrap();
        assert_eq!(restored.status, NoteStatus::Active);
        assert_eq!(restored.folder_id, None);

        let persisted = rec.local().load_notes();
        assert!(!persisted[0].is_archived());
        assert_eq!(persisted[0].folder_id, None);
    }

    #[tokio::test]
    async fn restore_online_clears_folder_on_the_server() {
        let rec = reconciler(Mode::Online);
        let mut note = note_in(1, "Old", Some(9));
        note.status = NoteStatus::Archived;
        rec.remote().server.lock().unwrap().notes.push(note);

        let restored = rec.restore_note(1).await.unwrap();
        assert_eq!(restored.path, Path::Remote);
        let server_note = rec.remote().server.lock().unwrap().notes[0].clone();
        assert_eq!(server_note.folder_id, None);
        assert!(!server_note.is_archived());
        assert_eq!(rec.store().notes()[0], server_note);
    }

    #[tokio::test]
    async fn deleting_a_folder_leaves_its_notes_unorganized() {
        let rec = reconciler(Mode::Unreachable);
        let now = Utc::now();
        let folders = vec![Folder::new(1, "Work", now), Folder::new(2, "Home", now)];
        let notes = vec![
            note_in(10, "a", Some(1)),
            note_in(11, "b", Some(1)),
            note_in(12, "c", Some(1)),
            note_in(13, "d", Some(2)),
        ];
        seed_offline(&rec, folders, notes).await;

        let applied = rec.delete_folder(1).await.unwrap();
        assert!(applied.is_local());

        let folders = rec.store().folders();
        assert!(folders.iter().all(|f| f.id != 1));
        assert_eq!(rec.local().load_folders().len(), 1);

        let view = rec.store().notes_view();
        let sidebar = Sidebar::new(&folders, &view);
        let unorganized: Vec<EntityId> = sidebar.unorganized_notes().iter().map(|n| n.id).collect();
        assert_eq!(unorganized, vec![10, 11, 12]);
        assert_eq!(sidebar.folder_notes(2).len(), 1);
    }

    #[tokio::test]
    async fn rejected_mutation_still_falls_back_to_local() {
        let rec = reconciler(Mode::Rejecting);
        let applied = rec.create_folder("Receipts").await.unwrap();
        assert!(applied.is_local());
        assert_eq!(rec.local().load_folders()[0].name, "Receipts");
        assert_eq!(rec.store().folders()[0], applied.value);
    }

    #[tokio::test]
    async fn system_folder_is_guarded_before_any_remote_call() {
        let rec = reconciler(Mode::Online);
        let archive = Folder::new(99, "Archived Notes", Utc::now());
        rec.store().publish_folders(vec![archive]);

        assert_eq!(rec.delete_folder(99).await, Err(Error::SystemFolder(99)));
        assert_eq!(rec.rename_folder(99, "Old").await, Err(Error::SystemFolder(99)));
        assert_eq!(rec.remote().calls(), 0);
        assert_eq!(rec.store().folders().len(), 1);
    }

    #[tokio::test]
    async fn blank_names_are_rejected_locally() {
        let rec = reconciler(Mode::Online);
        assert_eq!(
            rec.create_folder("   ").await,
            Err(Error::BlankField("folder name"))
        );
        assert_eq!(
            rec.create_note(NoteDraft::titled("")).await,
            Err(Error::BlankField("note title"))
        );
        assert_eq!(
            rec.create_todo(TodoDraft::new(" ", TodoSection::General)).await,
            Err(Error::BlankField("todo text"))
        );
        assert_eq!(rec.remote().calls(), 0);
    }

    #[tokio::test]
    async fn offline_update_of_unknown_note_changes_nothing() {
        let rec = reconciler(Mode::Unreachable);
        seed_offline(&rec, Vec::new(), vec![note_in(1, "Only", None)]).await;
        let before = rec.store().notes();

        let applied = rec.move_note(404, Some(1)).await.unwrap();
        assert!(applied.is_local());
        assert_eq!(applied.value, None);
        assert_eq!(*rec.store().notes(), *before);
    }

    #[tokio::test]
    async fn every_view_sees_the_same_snapshot_after_a_move() {
        let rec = reconciler(Mode::Unreachable);
        let folders = vec![Folder::new(1, "Work", Utc::now())];
        seed_offline(&rec, folders, vec![note_in(1, "Roadmap", None)]).await;
        let mut rx = rec.store().subscribe_notes();
        rec.store().set_query("road");

        rec.move_note(1, Some(1)).await.unwrap();

        let pushed = rx.borrow_and_update().clone();
        let view = rec.store().notes_view();
        assert!(Arc::ptr_eq(&pushed, &rec.store().notes()));
        assert!(Arc::ptr_eq(&view.all, &pushed));
        assert_eq!(view.filtered[0].folder_id, Some(1));
        assert_eq!(rec.local().load_notes()[0].folder_id, Some(1));
    }

    #[tokio::test]
    async fn offline_toggle_flips_and_records_completion() {
        let rec = reconciler(Mode::Unreachable);
        let todo = rec
            .create_todo(TodoDraft::new("Send follow-up emails", TodoSection::QuickWins))
            .await
            .unwrap()
            .value;

        let toggled = rec.toggle_todo(todo.id).await.value.unwrap();
        assert!(toggled.completed);
        assert!(rec.completed_ids().contains(&todo.id));
        assert!(rec.local().load_todos()[0].completed);

        rec.toggle_todo(todo.id).await;
        assert!(rec.completed_ids().is_empty());
    }

    #[tokio::test]
    async fn deleting_a_todo_forgets_its_completion() {
        let rec = reconciler(Mode::Unreachable);
        let todo = rec
            .create_todo(TodoDraft::new("Order supplies", TodoSection::General))
            .await
            .unwrap()
            .value;
        rec.toggle_todo(todo.id).await;

        assert!(rec.delete_todo(todo.id).await.is_local());
        assert!(rec.store().todos().is_empty());
        assert!(rec.local().load_todos().is_empty());
        assert!(rec.completed_ids().is_empty());
    }

    #[tokio::test]
    async fn offline_load_applies_the_completed_set() {
        let rec = reconciler(Mode::Unreachable);
        let now = Utc::now();
        let todos = vec![
            Todo::from_draft(1, &TodoDraft::new("a", TodoSection::General), now),
            Todo::from_draft(2, &TodoDraft::new("b", TodoSection::Delegate), now),
        ];
        rec.local().save_todos(&todos).unwrap();
        rec.local().save_completed(&[2].into_iter().collect()).unwrap();

        let loaded = rec.load_todos().await;
        assert!(loaded.is_local());
        assert!(!loaded.value[0].completed);
        assert!(loaded.value[1].completed);
    }

    #[tokio::test]
    async fn online_folder_delete_reloads_notes_too() {
        let rec = reconciler(Mode::Online);
        let folder = rec.create_folder("Work").await.unwrap().value;
        rec.create_note(NoteDraft {
            folder_id: Some(folder.id),
            ..NoteDraft::titled("Inside")
        })
        .await
        .unwrap();

        rec.delete_folder(folder.id).await.unwrap();
        assert!(rec.store().folders().is_empty());
        assert_eq!(rec.store().notes().len(), 1);
        assert!(rec.store().notes()[0].is_unorganized(&rec.store().folders()));
    }

    #[tokio::test]
    async fn fallback_after_remote_load_keeps_offline_only_notes() {
        let rec = reconciler(Mode::Rejecting);
        rec.local().save_notes(&[note_in(500, "Written offline", None)]).unwrap();
        rec.remote().server.lock().unwrap().notes.push(note_in(1, "From server", None));

        assert!(!rec.load_notes().await.is_local());
        let created = rec.create_note(NoteDraft::titled("New")).await.unwrap();
        assert!(created.is_local());

        let cached: Vec<EntityId> = rec.local().load_notes().iter().map(|n| n.id).collect();
        assert_eq!(cached, vec![created.value.id, 1, 500]);
        let published: Vec<EntityId> = rec.store().notes().iter().map(|n| n.id).collect();
        assert_eq!(published, cached);
    }

    #[tokio::test]
    async fn fallback_can_update_a_note_only_the_cache_knows() {
        let rec = reconciler(Mode::Rejecting);
        rec.local().save_notes(&[note_in(500, "Written offline", None)]).unwrap();
        rec.load_notes().await;
        assert!(rec.store().notes().is_empty());

        let archived = rec.archive_note(500).await.unwrap();
        assert!(archived.is_local());
        assert!(archived.value.is_some_and(|n| n.is_archived()));
        assert!(rec.local().load_notes()[0].is_archived());
    }

    #[tokio::test]
    async fn concurrent_offline_writes_all_land() {
        let rec = reconciler(Mode::Unreachable);
        seed_offline(&rec, Vec::new(), vec![note_in(1, "Roadmap", None)]).await;

        let (a, b, archived) = tokio::join!(
            rec.create_note(NoteDraft::titled("Standup")),
            rec.create_note(NoteDraft::titled("Retro")),
            rec.archive_note(1),
        );
        let (a, b) = (a.unwrap().value, b.unwrap().value);
        assert_ne!(a.id, b.id);
        assert!(archived.unwrap().value.is_some());

        for notes in [rec.store().notes().as_ref().clone(), rec.local().load_notes()] {
            assert_eq!(notes.len(), 3);
            assert!(notes.iter().any(|n| n.id == a.id));
            assert!(notes.iter().any(|n| n.id == b.id));
            assert!(notes.iter().any(|n| n.id == 1 && n.is_archived()));
        }
    }
}
