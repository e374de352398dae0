//! Persistence seam for the dashboard collections.
//!
//! The stores never touch ambient state; whatever owns them injects a
//! backend. The JSON file backend mirrors the snapshot-per-commit model
//! of the original storage layer; the in-memory backend backs tests and
//! ephemeral sessions.

use serde::de::DeserializeOwned;
use serde::Serialize;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::errors::{MeliError, MeliResult, StorageError};

/// Snapshot persistence for a serializable state type.
pub trait PersistenceBackend<T>: Send + Sync {
    /// Load the last saved snapshot, `None` when nothing was saved yet.
    fn load(&self) -> MeliResult<Option<T>>;

    /// Replace the saved snapshot.
    fn save(&self, value: &T) -> MeliResult<()>;
}

/// Backend that keeps the snapshot in memory. State dies with the
/// process.
pub struct InMemoryBackend<T> {
    cell: Mutex<Option<T>>,
}

impl<T> InMemoryBackend<T> {
    /// Create an empty backend.
    pub fn new() -> Self {
        Self {
            cell: Mutex::new(None),
        }
    }
}

impl<T> Default for InMemoryBackend<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Clone + Send + Sync> PersistenceBackend<T> for InMemoryBackend<T> {
    fn load(&self) -> MeliResult<Option<T>> {
        Ok(self.cell.lock().expect("backend lock poisoned").clone())
    }

    fn save(&self, value: &T) -> MeliResult<()> {
        *self.cell.lock().expect("backend lock poisoned") = Some(value.clone());
        Ok(())
    }
}

/// Backend that serializes the snapshot to a JSON file on every save.
pub struct JsonFileBackend<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> JsonFileBackend<T> {
    /// Create a backend writing to `path`. The file is created on the
    /// first save; a missing file loads as `None`.
    pub fn new(path: impl AsRef<Path>) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            _marker: PhantomData,
        }
    }

    /// The backing file path.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl<T> PersistenceBackend<T> for JsonFileBackend<T>
where
    T: Serialize + DeserializeOwned + Send + Sync,
{
    fn load(&self) -> MeliResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let raw = std::fs::read_to_string(&self.path).map_err(|e| {
            MeliError::Storage(StorageError::ReadFailed {
                message: e.to_string(),
            })
        })?;
        let value = serde_json::from_str(&raw).map_err(|e| {
            MeliError::Storage(StorageError::Corrupted {
                message: e.to_string(),
            })
        })?;
        Ok(Some(value))
    }

    fn save(&self, value: &T) -> MeliResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                MeliError::Storage(StorageError::WriteFailed {
                    message: e.to_string(),
                })
            })?;
        }
        let raw = serde_json::to_string_pretty(value).map_err(|e| {
            MeliError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })?;
        std::fs::write(&self.path, raw).map_err(|e| {
            MeliError::Storage(StorageError::WriteFailed {
                message: e.to_string(),
            })
        })
    }
}
