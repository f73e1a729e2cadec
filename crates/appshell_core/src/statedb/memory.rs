//! In-process state backend.

use super::{StateBackend, StateDbResult, StoredEntry};
use serde_json::Value;
use std::collections::BTreeMap;

/// Ordered map backend; contents vanish with the process.
#[derive(Debug, Default)]
pub struct MemoryStateBackend {
    entries: BTreeMap<String, Value>,
}

impl MemoryStateBackend {
    pub fn new() -> Self {
        Self::default()
    }
}

impl StateBackend for MemoryStateBackend {
    fn fetch(&self, key: &str) -> StateDbResult<Option<Value>> {
        Ok(self.entries.get(key).cloned())
    }

    fn save(&mut self, key: &str, value: &Value) -> StateDbResult<()> {
        self.entries.insert(key.to_string(), value.clone());
        Ok(())
    }

    fn remove(&mut self, key: &str) -> StateDbResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    fn list(&self, namespace: &str) -> StateDbResult<Vec<StoredEntry>> {
        let prefix = format!("{namespace}:");
        Ok(self
            .entries
            .range(prefix.clone()..)
            .take_while(|(key, _)| key.starts_with(prefix.as_str()))
            .map(|(key, value)| StoredEntry {
                key: key.clone(),
                value: Ok(value.clone()),
            })
            .collect())
    }

    fn clear(&mut self) -> StateDbResult<()> {
        self.entries.clear();
        Ok(())
    }

    fn kind(&self) -> &'static str {
        "memory"
    }
}
