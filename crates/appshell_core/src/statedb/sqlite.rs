//! SQLite-backed state backend.
//!
//! # Invariants
//! - The owned connection has all migrations applied.
//! - Values are stored as JSON text and must parse back on read.

use super::{namespace_of, StateBackend, StateDbError, StateDbResult, StoredEntry};
use crate::db::{open_db, open_db_in_memory};
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use std::path::Path;

pub struct SqliteStateBackend {
    conn: Connection,
}

impl SqliteStateBackend {
    /// Opens (and migrates) a state database file.
    pub fn open(path: impl AsRef<Path>) -> StateDbResult<Self> {
        Ok(Self {
            conn: open_db(path)?,
        })
    }

    pub fn open_in_memory() -> StateDbResult<Self> {
        Ok(Self {
            conn: open_db_in_memory()?,
        })
    }
}

impl StateBackend for SqliteStateBackend {
    fn fetch(&self, key: &str) -> StateDbResult<Option<Value>> {
        let raw: Option<String> = self
            .conn
            .query_row(
                "SELECT value FROM state_entries WHERE key = ?1;",
                [key],
                |row| row.get(0),
            )
            .optional()?;
        raw.map(|text| parse_value(key, &text)).transpose()
    }

    fn save(&mut self, key: &str, value: &Value) -> StateDbResult<()> {
        self.conn.execute(
            "INSERT INTO state_entries (key, namespace, value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                updated_at = (strftime('%s', 'now') * 1000);",
            params![key, namespace_of(key), value.to_string()],
        )?;
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StateDbResult<bool> {
        let changed = self
            .conn
            .execute("DELETE FROM state_entries WHERE key = ?1;", [key])?;
        Ok(changed > 0)
    }

    fn list(&self, namespace: &str) -> StateDbResult<Vec<StoredEntry>> {
        let mut stmt = self.conn.prepare(
            "SELECT key, value FROM state_entries
             WHERE namespace = ?1
             ORDER BY key ASC;",
        )?;
        let mut rows = stmt.query([namespace])?;
        let mut entries = Vec::new();
        while let Some(row) = rows.next()? {
            let key: String = row.get(0)?;
            let text: String = row.get(1)?;
            let value = parse_value(&key, &text);
            entries.push(StoredEntry { key, value });
        }
        Ok(entries)
    }

    fn clear(&mut self) -> StateDbResult<()> {
        self.conn.execute("DELETE FROM state_entries;", [])?;
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "sqlite"
    }
}

fn parse_value(key: &str, text: &str) -> StateDbResult<Value> {
    serde_json::from_str(text).map_err(|err| StateDbError::InvalidData {
        key: key.to_string(),
        message: err.to_string(),
    })
}
