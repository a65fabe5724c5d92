use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use thiserror::Error;

use crate::core::folder::{Folder, FolderDraft, FolderRename};
use crate::core::id::EntityId;
use crate::core::note::{Note, NoteDraft, NotePatch};
use crate::core::todo::{Todo, TodoDraft, TodoPatch};

pub const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

#[derive(Debug, Error)]
pub enum RemoteError {
    /// The service could not be reached at all. Expected while offline.
    #[error("remote service unavailable")]
    Unavailable,
    #[error("{method} {path} returned {status}: {body}")]
    Status {
        method: Method,
        path: String,
        status: u16,
        body: String,
    },
    #[error("unreadable response from {path}: {message}")]
    Decode { path: String, message: String },
    #[error("request failed: {0}")]
    Request(String),
}

impl RemoteError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, Self::Unavailable)
    }
}

impl From<reqwest::Error> for RemoteError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_connect() || e.is_timeout() {
            Self::Unavailable
        } else {
            Self::Request(e.to_string())
        }
    }
}

/// CRUD contract of the notes/todos backend.
#[allow(async_fn_in_trait)]
pub trait RemoteService {
    async fn list_folders(&self) -> Result<Vec<Folder>, RemoteError>;
    async fn create_folder(&self, draft: &FolderDraft) -> Result<Folder, RemoteError>;
    async fn update_folder(&self, id: EntityId, rename: &FolderRename) -> Result<Folder, RemoteError>;
    async fn delete_folder(&self, id: EntityId) -> Result<(), RemoteError>;

    async fn list_notes(&self, folder_id: Option<EntityId>) -> Result<Vec<Note>, RemoteError>;
    async fn create_note(&self, draft: &NoteDraft) -> Result<Note, RemoteError>;
    async fn update_note(&self, id: EntityId, patch: &NotePatch) -> Result<Note, RemoteError>;
    async fn delete_note(&self, id: EntityId) -> Result<(), RemoteError>;

    async fn list_todos(&self, completed: Option<bool>) -> Result<Vec<Todo>, RemoteError>;
    async fn create_todo(&self, draft: &TodoDraft) -> Result<Todo, RemoteError>;
    async fn update_todo(&self, id: EntityId, patch: &TodoPatch) -> Result<Todo, RemoteError>;
    async fn delete_todo(&self, id: EntityId) -> Result<(), RemoteError>;
    async fn toggle_todo(&self, id: EntityId) -> Result<Todo, RemoteError>;
}

/// JSON-over-HTTP client for the backend.
#[derive(Clone)]
pub struct HttpRemote {
    base_url: String,
    http: Client,
}

impl HttpRemote {
    pub fn new(base_url: &str) -> Result<Self, RemoteError> {
        let http = Client::builder()
            .build()
            .map_err(|e| RemoteError::Request(format!("Failed to build HTTP client: {}", e)))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http.request(method, format!("{}{}", self.base_url, path))
    }

    async fn fetch<T: DeserializeOwned>(&self, method: Method, path: &str, req: RequestBuilder) -> Result<T, RemoteError> {
        let resp = self.checked(method, path, req).await?;
        let text = resp.text().await?;
        serde_json::from_str(&text).map_err(|e| RemoteError::Decode {
            path: path.to_string(),
            message: e.to_string(),
        })
    }

    async fn checked(&self, method: Method, path: &str, req: RequestBuilder) -> Result<Response, RemoteError> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(RemoteError::Status {
            method,
            path: path.to_string(),
            status: status.as_u16(),
            body,
        })
    }

    async fn get<T: DeserializeOwned>(&self, path: &str, query: &[(&str, String)]) -> Result<T, RemoteError> {
        let req = self.request(Method::GET, path).query(query);
        self.fetch(Method::GET, path, req).await
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        method: Method,
        path: &str,
        body: &impl serde::Serialize,
    ) -> Result<T, RemoteError> {
        let req = self.request(method.clone(), path).json(body);
        self.fetch(method, path, req).await
    }

    async fn delete(&self, path: &str) -> Result<(), RemoteError> {
        let req = self.request(Method::DELETE, path);
        self.checked(Method::DELETE, path, req).await.map(|_| ())
    }
}

impl RemoteService for HttpRemote {
    async fn list_folders(&self) -> Result<Vec<Folder>, RemoteError> {
        self.get("/folders/", &[]).await
    }

    async fn create_folder(&self, draft: &FolderDraft) -> Result<Folder, RemoteError> {
        self.send_json(Method::POST, "/folders/", draft).await
    }

    async fn update_folder(&self, id: EntityId, rename: &FolderRename) -> Result<Folder, RemoteError> {
        self.send_json(Method::PUT, &format!("/folders/{}", id), rename).await
    }

    async fn delete_folder(&self, id: EntityId) -> Result<(), RemoteError> {
        self.delete(&format!("/folders/{}", id)).await
    }

    async fn list_notes(&self, folder_id: Option<EntityId>) -> Result<Vec<Note>, RemoteError> {
        let query: Vec<(&str, String)> = folder_id
            .map(|id| vec![("folder_id", id.to_string())])
            .unwrap_or_default();
        self.get("/notes/", &query).await
    }

    async fn create_note(&self, draft: &NoteDraft) -> Result<Note, RemoteError> {
        self.send_json(Method::POST, "/notes/", draft).await
    }

    async fn update_note(&self, id: EntityId, patch: &NotePatch) -> Result<Note, RemoteError> {
        self.send_json(Method::PUT, &format!("/notes/{}", id), &patch.to_json()).await
    }

    async fn delete_note(&self, id: EntityId) -> Result<(), RemoteError> {
        self.delete(&format!("/notes/{}", id)).await
    }

    async fn list_todos(&self, completed: Option<bool>) -> Result<Vec<Todo>, RemoteError> {
        let query: Vec<(&str, String)> = completed
            .map(|c| vec![("completed", c.to_string())])
            .unwrap_or_default();
        self.get("/todos/", &query).await
    }

    async fn create_todo(&self, draft: &TodoDraft) -> Result<Todo, RemoteError> {
        self.send_json(Method::POST, "/todos/", draft).await
    }

    async fn update_todo(&self, id: EntityId, patch: &TodoPatch) -> Result<Todo, RemoteError> {
        self.send_json(Method::PUT, &format!("/todos/{}", id), &patch.to_json()).await
    }

    async fn delete_todo(&self, id: EntityId) -> Result<(), RemoteError> {
        self.delete(&format!("/todos/{}", id)).await
    }

    async fn toggle_todo(&self, id: EntityId) -> Result<Todo, RemoteError> {
        let path = format!("/todos/{}/toggle", id);
        let req = self.request(Method::PATCH, &path);
        self.fetch(Method::PATCH, &path, req).await
    }
}

/// A remote that is never there. Every call takes the fallback path.
#[derive(Debug, Clone, Copy, Default)]
pub struct OfflineRemote;

impl RemoteService for OfflineRemote {
    async fn list_folders(&self) -> Result<Vec<Folder>, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn create_folder(&self, _: &FolderDraft) -> Result<Folder, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn update_folder(&self, _: EntityId, _: &FolderRename) -> Result<Folder, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn delete_folder(&self, _: EntityId) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn list_notes(&self, _: Option<EntityId>) -> Result<Vec<Note>, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn create_note(&self, _: &NoteDraft) -> Result<Note, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn update_note(&self, _: EntityId, _: &NotePatch) -> Result<Note, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn delete_note(&self, _: EntityId) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn list_todos(&self, _: Option<bool>) -> Result<Vec<Todo>, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn create_todo(&self, _: &TodoDraft) -> Result<Todo, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn update_todo(&self, _: EntityId, _: &TodoPatch) -> Result<Todo, RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn delete_todo(&self, _: EntityId) -> Result<(), RemoteError> {
        Err(RemoteError::Unavailable)
    }
    async fn toggle_todo(&self, _: EntityId) -> Result<Todo, RemoteError> {
        Err(RemoteError::Unavailable)
    }
}
