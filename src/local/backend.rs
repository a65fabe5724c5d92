use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use super::StoreError;

/// String-keyed blob storage underneath the local fallback store.
pub trait Backend: Send + Sync {
    /// `None` when nothing has been written under `key` yet.
    fn read(&self, key: &str) -> Result<Option<String>, StoreError>;

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError>;
}

/// One JSON file per key inside a data directory.
#[derive(Debug, Clone)]
pub struct FileBackend {
    dir: PathBuf,
}

impl FileBackend {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

impl Backend for FileBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        match std::fs::read_to_string(self.path_for(key)) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        std::fs::create_dir_all(&self.dir)?;
        let path = self.path_for(key);
        // Write to a sibling and rename so readers never see half a collection.
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, value)?;
        std::fs::rename(&tmp, &path)?;
        Ok(())
    }
}

/// In-process storage for tests and `--offline` throwaway sessions.
#[derive(Debug, Default)]
pub struct MemoryBackend {
    entries: Mutex<HashMap<String, String>>,
}

impl MemoryBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl Backend for MemoryBackend {
    fn read(&self, key: &str) -> Result<Option<String>, StoreError> {
        let entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        Ok(entries.get(key).cloned())
    }

    fn write(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().map_err(|_| StoreError::Poisoned)?;
        entries.insert(key.to_string(), value.to_string());
        Ok(())
    }
}
