//! Session restoration by replaying persisted commands.
//!
//! # Responsibility
//! - Attach persistence options to trackers so open widgets are recorded.
//! - Re-execute the recording command for every persisted entry at startup.
//!
//! # Invariants
//! - Each namespace is restored at most once per restorer.
//! - A failing entry is logged and skipped; it never aborts the others.
//! - A restore that returns an error leaves the namespace unrestored.

use crate::command::CommandRegistry;
use crate::shared::lock;
use crate::statedb::{StateDb, StateDbError};
use crate::tracker::InstanceTracker;
use crate::widget::Widget;
use log::{info, warn};
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::{Arc, Mutex};

/// How a tracker's widgets are recorded and recreated.
#[derive(Clone)]
pub struct RestoreOptions {
    /// Command that recreates one widget from its args.
    pub command: String,
    /// Args persisted for a widget and later passed to `command`.
    pub args: Arc<dyn Fn(&Widget) -> Value + Send + Sync>,
    /// Stable per-widget name; the state key is `namespace:name`.
    pub name: Arc<dyn Fn(&Widget) -> String + Send + Sync>,
}

impl RestoreOptions {
    pub fn new(
        command: impl Into<String>,
        args: impl Fn(&Widget) -> Value + Send + Sync + 'static,
        name: impl Fn(&Widget) -> String + Send + Sync + 'static,
    ) -> Self {
        Self {
            command: command.into(),
            args: Arc::new(args),
            name: Arc::new(name),
        }
    }
}

/// Outcome of one restore pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: usize,
    /// Keys whose replay failed.
    pub failed: Vec<String>,
}

pub struct LayoutRestorer {
    state_db: Arc<StateDb>,
    restored: Mutex<BTreeSet<String>>,
}

impl LayoutRestorer {
    pub fn new(state_db: Arc<StateDb>) -> Self {
        Self {
            state_db,
            restored: Mutex::new(BTreeSet::new()),
        }
    }

    pub fn state_db(&self) -> &Arc<StateDb> {
        &self.state_db
    }

    /// Restores `tracker` from persisted state, then keeps it recorded.
    ///
    /// # Errors
    /// - `AlreadyRestoring` when the namespace was restored before.
    /// - `State` when the namespace entries cannot be listed.
    /// - `PersistenceAttached` when the tracker already records elsewhere.
    ///
    /// On error the namespace stays unrestored, so a later call may retry.
    pub fn restore(
        &self,
        commands: &CommandRegistry,
        tracker: &InstanceTracker,
        options: RestoreOptions,
    ) -> Result<RestoreReport, RestoreError> {
        let namespace = tracker.namespace().to_string();
        if !lock(&self.restored).insert(namespace.clone()) {
            return Err(RestoreError::AlreadyRestoring(namespace));
        }

        let entries = match self.state_db.scan(&namespace) {
            Ok(entries) => entries,
            Err(err) => {
                lock(&self.restored).remove(&namespace);
                return Err(err.into());
            }
        };
        let command = options.command.clone();
        if !tracker.attach_persistence(options, Arc::clone(&self.state_db)) {
            lock(&self.restored).remove(&namespace);
            warn!(
                "event=restore module=restorer status=error namespace={} error_code=persistence_attached",
                namespace
            );
            return Err(RestoreError::PersistenceAttached(namespace));
        }

        let mut report = RestoreReport::default();
        for entry in entries {
            let outcome = entry
                .value
                .map_err(|err| err.to_string())
                .and_then(|value| entry_args(&value))
                .and_then(|args| {
                    commands
                        .execute(&command, &args)
                        .map_err(|err| err.to_string())
                });
            match outcome {
                Ok(_) => report.restored += 1,
                Err(message) => {
                    warn!(
                        "event=restore_entry module=restorer status=error key={} command={} error={}",
                        entry.key, command, message
                    );
                    report.failed.push(entry.key);
                }
            }
        }

        info!(
            "event=restore module=restorer status=ok namespace={} restored={} failed={}",
            namespace,
            report.restored,
            report.failed.len()
        );
        Ok(report)
    }
}

/// Extracts command args from a `{"data": {...}}` entry.
fn entry_args(value: &Value) -> Result<Value, String> {
    match value.get("data") {
        Some(data @ Value::Object(_)) => Ok(data.clone()),
        Some(Value::Null) | None if value.is_object() => Ok(Value::Object(Map::new())),
        _ => Err(format!("malformed state entry: {value}")),
    }
}

/// Restoration errors.
#[derive(Debug)]
pub enum RestoreError {
    AlreadyRestoring(String),
    /// The tracker already persists through another restorer's options.
    PersistenceAttached(String),
    State(StateDbError),
}

impl Display for RestoreError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::AlreadyRestoring(namespace) => {
                write!(f, "namespace `{namespace}` is already being restored")
            }
            Self::PersistenceAttached(namespace) => write!(
                f,
                "tracker `{namespace}` already persists through another restorer"
            ),
            Self::State(err) => write!(f, "{err}"),
        }
    }
}

impl Error for RestoreError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::State(err) => Some(err),
            Self::AlreadyRestoring(_) | Self::PersistenceAttached(_) => None,
        }
    }
}

impl From<StateDbError> for RestoreError {
    fn from(value: StateDbError) -> Self {
        Self::State(value)
    }
}

#[cfg(test)]
mod tests {
    use super::{entry_args, LayoutRestorer, RestoreError, RestoreOptions};
    use crate::command::{CommandOptions, CommandRegistry};
    use crate::db::DbError;
    use crate::statedb::{StateBackend, StateDb, StateDbError, StateDbResult, StoredEntry};
    use crate::tracker::InstanceTracker;
    use crate::widget::Widget;
    use serde_json::{json, Value};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::Arc;

    /// Backend whose `list` fails while `offline` is set.
    struct OfflineBackend {
        offline: Arc<AtomicBool>,
    }

    impl StateBackend for OfflineBackend {
        fn fetch(&self, _key: &str) -> StateDbResult<Option<Value>> {
            Ok(None)
        }

        fn save(&mut self, _key: &str, _value: &Value) -> StateDbResult<()> {
            Ok(())
        }

        fn remove(&mut self, _key: &str) -> StateDbResult<bool> {
            Ok(false)
        }

        fn list(&self, namespace: &str) -> StateDbResult<Vec<StoredEntry>> {
            if self.offline.load(Ordering::SeqCst) {
                return Err(StateDbError::Db(DbError::Sqlite(
                    rusqlite::Error::InvalidQuery,
                )));
            }
            Ok(vec![StoredEntry {
                key: format!("{namespace}:a"),
                value: Ok(json!({"data": {"path": "a"}})),
            }])
        }

        fn clear(&mut self) -> StateDbResult<()> {
            Ok(())
        }

        fn kind(&self) -> &'static str {
            "offline"
        }
    }

    fn options() -> RestoreOptions {
        RestoreOptions::new(
            "open",
            |widget: &Widget| json!({"path": widget.id()}),
            |widget: &Widget| widget.id().to_string(),
        )
    }

    fn open_command() -> CommandRegistry {
        let mut commands = CommandRegistry::new();
        commands
            .add_command(
                "open",
                CommandOptions::new("Open", |_args: &Value| Ok(Value::Null)),
            )
            .expect("register open");
        commands
    }

    #[test]
    fn extracts_object_data() {
        assert_eq!(
            entry_args(&json!({"data": {"path": "x"}})).expect("object data"),
            json!({"path": "x"})
        );
    }

    #[test]
    fn missing_data_means_empty_args() {
        assert_eq!(entry_args(&json!({})).expect("empty entry"), json!({}));
        assert_eq!(
            entry_args(&json!({"data": null})).expect("null data"),
            json!({})
        );
    }

    #[test]
    fn rejects_malformed_entries() {
        assert!(entry_args(&json!("text")).is_err());
        assert!(entry_args(&json!({"data": [1, 2]})).is_err());
    }

    #[test]
    fn failed_listing_can_be_retried() {
        let offline = Arc::new(AtomicBool::new(true));
        let state_db = Arc::new(StateDb::new(OfflineBackend {
            offline: Arc::clone(&offline),
        }));
        let restorer = LayoutRestorer::new(state_db);
        let commands = open_command();
        let tracker = InstanceTracker::new("editor").expect("tracker");

        let err = restorer
            .restore(&commands, &tracker, options())
            .expect_err("offline listing must fail");
        assert!(matches!(err, RestoreError::State(_)));

        offline.store(false, Ordering::SeqCst);
        let report = restorer
            .restore(&commands, &tracker, options())
            .expect("retry after listing recovers");
        assert_eq!(report.restored, 1);
        assert!(report.failed.is_empty());
    }

    #[test]
    fn second_restorer_cannot_take_over_tracker() {
        let state_db = Arc::new(StateDb::in_memory());
        let commands = open_command();
        let tracker = InstanceTracker::new("editor").expect("tracker");

        LayoutRestorer::new(Arc::clone(&state_db))
            .restore(&commands, &tracker, options())
            .expect("first restorer attaches");

        let other = LayoutRestorer::new(state_db);
        for _ in 0..2 {
            let err = other
                .restore(&commands, &tracker, options())
                .expect_err("tracker already persists elsewhere");
            assert!(matches!(
                err,
                RestoreError::PersistenceAttached(namespace) if namespace == "editor"
            ));
        }
    }
}
