//! Persisted UI state database.
//!
//! # Responsibility
//! - Store restoration entries keyed by `namespace:name`.
//! - Hide backend details (in-memory map or SQLite) behind one service type.
//!
//! # Invariants
//! - Keys are non-empty; the namespace is the text before the first `:`.
//! - `list(namespace)` returns entries sorted by key.
//! - `scan(namespace)` reports an unreadable value per entry, not per call.
//! - The backend lock is never held across caller code.

use crate::db::DbError;
use crate::shared::lock;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Mutex;

mod memory;
mod sqlite;

pub use memory::MemoryStateBackend;
pub use sqlite::SqliteStateBackend;

pub type StateDbResult<T> = Result<T, StateDbError>;

/// One persisted entry.
#[derive(Debug, Clone, PartialEq)]
pub struct StateEntry {
    pub key: String,
    pub value: Value,
}

/// Listed entry whose stored value may fail to decode.
#[derive(Debug)]
pub struct StoredEntry {
    pub key: String,
    pub value: StateDbResult<Value>,
}

/// Storage contract for state entries.
pub trait StateBackend: Send {
    fn fetch(&self, key: &str) -> StateDbResult<Option<Value>>;
    fn save(&mut self, key: &str, value: &Value) -> StateDbResult<()>;
    /// Returns whether an entry existed.
    fn remove(&mut self, key: &str) -> StateDbResult<bool>;
    /// Entries under `namespace:`, sorted by key; one bad row never hides the rest.
    fn list(&self, namespace: &str) -> StateDbResult<Vec<StoredEntry>>;
    fn clear(&mut self) -> StateDbResult<()>;
    /// Short backend label for diagnostics.
    fn kind(&self) -> &'static str;
}

/// Shared state database service.
pub struct StateDb {
    backend: Mutex<Box<dyn StateBackend>>,
}

impl StateDb {
    pub fn new(backend: impl StateBackend + 'static) -> Self {
        Self {
            backend: Mutex::new(Box::new(backend)),
        }
    }

    /// Creates a database backed by an in-process map.
    pub fn in_memory() -> Self {
        Self::new(MemoryStateBackend::new())
    }

    pub fn kind(&self) -> &'static str {
        lock(&self.backend).kind()
    }

    pub fn fetch(&self, key: &str) -> StateDbResult<Option<Value>> {
        validate_key(key)?;
        lock(&self.backend).fetch(key)
    }

    pub fn save(&self, key: &str, value: &Value) -> StateDbResult<()> {
        validate_key(key)?;
        lock(&self.backend).save(key, value)
    }

    pub fn remove(&self, key: &str) -> StateDbResult<bool> {
        validate_key(key)?;
        lock(&self.backend).remove(key)
    }

    /// Lists every entry stored under `namespace:`.
    ///
    /// # Errors
    /// - `InvalidData` for the first entry whose value cannot be decoded.
    pub fn list(&self, namespace: &str) -> StateDbResult<Vec<StateEntry>> {
        self.scan(namespace)?
            .into_iter()
            .map(|entry| {
                entry.value.map(|value| StateEntry {
                    key: entry.key,
                    value,
                })
            })
            .collect()
    }

    /// Lists entries under `namespace:` with a decode result per entry.
    pub fn scan(&self, namespace: &str) -> StateDbResult<Vec<StoredEntry>> {
        if namespace.trim().is_empty() || namespace.contains(':') {
            return Err(StateDbError::InvalidNamespace(namespace.to_string()));
        }
        lock(&self.backend).list(namespace)
    }

    pub fn clear(&self) -> StateDbResult<()> {
        lock(&self.backend).clear()
    }
}

/// Builds the canonical `namespace:name` key.
pub fn state_key(namespace: &str, name: &str) -> String {
    format!("{namespace}:{name}")
}

pub(crate) fn namespace_of(key: &str) -> &str {
    key.split_once(':').map_or("", |(namespace, _)| namespace)
}

fn validate_key(key: &str) -> StateDbResult<()> {
    if key.trim().is_empty() {
        return Err(StateDbError::InvalidKey(key.to_string()));
    }
    Ok(())
}

/// State database errors.
#[derive(Debug)]
pub enum StateDbError {
    InvalidKey(String),
    InvalidNamespace(String),
    Db(DbError),
    InvalidData { key: String, message: String },
}

impl Display for StateDbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidKey(key) => write!(f, "state key is invalid: `{key}`"),
            Self::InvalidNamespace(value) => write!(f, "state namespace is invalid: `{value}`"),
            Self::Db(err) => write!(f, "{err}"),
            Self::InvalidData { key, message } => {
                write!(f, "invalid persisted state for `{key}`: {message}")
            }
        }
    }
}

impl Error for StateDbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<DbError> for StateDbError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for StateDbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

#[cfg(test)]
mod tests {
    use super::{namespace_of, state_key, StateDb, StateDbError};
    use serde_json::json;

    #[test]
    fn builds_and_splits_keys() {
        let key = state_key("editor", "notes/a.md");
        assert_eq!(key, "editor:notes/a.md");
        assert_eq!(namespace_of(&key), "editor");
        assert_eq!(namespace_of("plain"), "");
    }

    #[test]
    fn rejects_blank_keys_and_bad_namespaces() {
        let db = StateDb::in_memory();
        let err = db.save(" ", &json!({})).expect_err("blank key must fail");
        assert!(matches!(err, StateDbError::InvalidKey(_)));

        let err = db.list("a:b").expect_err("namespace with separator must fail");
        assert!(matches!(err, StateDbError::InvalidNamespace(_)));
        let err = db.list("").expect_err("empty namespace must fail");
        assert!(matches!(err, StateDbError::InvalidNamespace(_)));
    }

    #[test]
    fn lists_only_requested_namespace() {
        let db = StateDb::in_memory();
        db.save("editor:b", &json!({"data": {"path": "b"}}))
            .expect("save b");
        db.save("editor:a", &json!({"data": {"path": "a"}}))
            .expect("save a");
        db.save("editors:c", &json!({"data": {"path": "c"}}))
            .expect("save c");

        let keys: Vec<String> = db
            .list("editor")
            .expect("list editor")
            .into_iter()
            .map(|entry| entry.key)
            .collect();
        assert_eq!(keys, vec!["editor:a".to_string(), "editor:b".to_string()]);
        assert_eq!(db.kind(), "memory");
    }
}
