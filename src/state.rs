//! Scoped persistent key-value state.
//!
//! Remote identifiers (threads, assistants, vector stores) are remembered
//! across invocations in one JSON document per scope:
//! `<state_dir>/<kind>/<uuid>.json`, where the UUID is a v5 hash of the
//! scope name so arbitrary change and project names map to safe file names.
//!
//! Every write rewrites the whole document through a temp file and a rename.
//! Concurrent tasks may race on read-check-write sequences, which can cause
//! redundant remote creation but never a torn file.

use serde_json::{Map, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, PoisonError};
use tracing::debug;
use uuid::Uuid;

use crate::error::{ReviewError, ReviewResult};

pub const THREAD_ID_KEY: &str = "threadId";
pub const ASSISTANT_ID_LOG_KEY: &str = "assistantIdLog";
pub const VECTOR_STORE_ID_KEY: &str = "vectorStoreId";
pub const VECTOR_STORE_FILE_BATCH_ID_KEY: &str = "vectorStoreFileBatchId";
pub const VECTOR_STORE_FILE_BATCH_STATUS_KEY: &str = "vectorStoreFileBatchStatus";

/// Namespace UUID for scope file names
const STATE_NAMESPACE: Uuid = Uuid::from_bytes([
    0x3f, 0x1c, 0x52, 0x8e, 0x7a, 0x44, 0x4b, 0x0d, 0x9e, 0x61, 0x2c, 0xd8, 0x05, 0xb7, 0x93, 0x6a,
]);

/// Lifetime of a persisted entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum StateScope {
    /// One review change (thread id, assistant creation log).
    Change(String),
    /// One project (vector store id and file-batch state).
    Project(String),
    /// Shared across changes of a project (assistant ids keyed by parameter hash).
    Workspace(String),
}

impl StateScope {
    fn kind(&self) -> &'static str {
        match self {
            StateScope::Change(_) => "changes",
            StateScope::Project(_) => "projects",
            StateScope::Workspace(_) => "workspaces",
        }
    }

    fn name(&self) -> &str {
        match self {
            StateScope::Change(name) | StateScope::Project(name) | StateScope::Workspace(name) => {
                name
            }
        }
    }
}

impl std::fmt::Display for StateScope {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}/{}", self.kind(), self.name())
    }
}

pub trait StateStore: Send + Sync {
    fn get(&self, scope: &StateScope, key: &str) -> ReviewResult<Option<String>>;

    fn set(&self, scope: &StateScope, key: &str, value: &str) -> ReviewResult<()>;

    fn remove(&self, scope: &StateScope, key: &str) -> ReviewResult<()>;

    /// Entries of an append-only list; empty when the key is absent.
    fn get_list(&self, scope: &StateScope, key: &str) -> ReviewResult<Vec<String>>;

    fn append(&self, scope: &StateScope, key: &str, value: &str) -> ReviewResult<()>;

    /// Drop every entry of the scope.
    fn destroy(&self, scope: &StateScope) -> ReviewResult<()>;
}

/// [`StateStore`] backed by JSON files under a state directory.
#[derive(Debug)]
pub struct FileStateStore {
    root: PathBuf,
    // Serializes read-modify-write within this process.
    write_lock: Mutex<()>,
}

impl FileStateStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn scope_path(&self, scope: &StateScope) -> PathBuf {
        let id = Uuid::new_v5(&STATE_NAMESPACE, scope.name().as_bytes());
        self.root.join(scope.kind()).join(format!("{}.json", id))
    }

    fn load(&self, scope: &StateScope) -> ReviewResult<Map<String, Value>> {
        let path = self.scope_path(scope);
        if !path.exists() {
            return Ok(Map::new());
        }

        let content = fs::read_to_string(&path).map_err(|source| ReviewError::Storage {
            path: path.clone(),
            source,
        })?;
        if content.trim().is_empty() {
            return Ok(Map::new());
        }
        serde_json::from_str(&content).map_err(|source| ReviewError::StorageFormat { path, source })
    }

    fn save(&self, scope: &StateScope, entries: &Map<String, Value>) -> ReviewResult<()> {
        let path = self.scope_path(scope);
        let storage_err = |path: &Path| {
            let path = path.to_path_buf();
            move |source| ReviewError::Storage { path, source }
        };

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).map_err(storage_err(parent))?;
        }

        let content = serde_json::to_string_pretty(entries).map_err(|source| {
            ReviewError::StorageFormat {
                path: path.clone(),
                source,
            }
        })?;

        let tmp_path = path.with_extension(format!("json.{}.tmp", Uuid::new_v4()));
        fs::write(&tmp_path, content).map_err(storage_err(&tmp_path))?;
        fs::rename(&tmp_path, &path).map_err(storage_err(&path))?;

        debug!("Saved state scope {} to {}", scope, path.display());
        Ok(())
    }

    fn update<F>(&self, scope: &StateScope, apply: F) -> ReviewResult<()>
    where
        F: FnOnce(&mut Map<String, Value>),
    {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let mut entries = self.load(scope)?;
        apply(&mut entries);
        self.save(scope, &entries)
    }
}

impl StateStore for FileStateStore {
    fn get(&self, scope: &StateScope, key: &str) -> ReviewResult<Option<String>> {
        let entries = self.load(scope)?;
        Ok(match entries.get(key) {
            Some(Value::String(value)) => Some(value.clone()),
            Some(Value::Null) | None => None,
            Some(other) => Some(other.to_string()),
        })
    }

    fn set(&self, scope: &StateScope, key: &str, value: &str) -> ReviewResult<()> {
        self.update(scope, |entries| {
            entries.insert(key.to_string(), Value::String(value.to_string()));
        })
    }

    fn remove(&self, scope: &StateScope, key: &str) -> ReviewResult<()> {
        if !self.scope_path(scope).exists() {
            return Ok(());
        }
        self.update(scope, |entries| {
            entries.remove(key);
        })
    }

    fn get_list(&self, scope: &StateScope, key: &str) -> ReviewResult<Vec<String>> {
        let entries = self.load(scope)?;
        Ok(match entries.get(key) {
            Some(Value::Array(items)) => items
                .iter()
                .filter_map(|item| item.as_str().map(str::to_string))
                .collect(),
            Some(Value::String(single)) => vec![single.clone()],
            _ => Vec::new(),
        })
    }

    fn append(&self, scope: &StateScope, key: &str, value: &str) -> ReviewResult<()> {
        self.update(scope, |entries| {
            let slot = entries
                .entry(key.to_string())
                .or_insert_with(|| Value::Array(Vec::new()));
            match slot {
                Value::Array(items) => items.push(Value::String(value.to_string())),
                other => {
                    let previous = std::mem::take(other);
                    *other = Value::Array(vec![previous, Value::String(value.to_string())]);
                }
            }
        })
    }

    fn destroy(&self, scope: &StateScope) -> ReviewResult<()> {
        let _guard = self.write_lock.lock().unwrap_or_else(PoisonError::into_inner);
        let path = self.scope_path(scope);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Destroyed state scope {}", scope);
                Ok(())
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(source) => Err(ReviewError::Storage { path, source }),
        }
    }
}
