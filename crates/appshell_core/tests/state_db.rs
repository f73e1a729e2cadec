use appshell_core::statedb::{state_key, SqliteStateBackend};
use appshell_core::{
    builtin_plugins, Application, StateDb, StateDbError, StateDbLocation, CLEAR_STATE_COMMAND,
    STATE_DB,
};
use serde_json::json;

#[test]
fn sqlite_entries_survive_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");

    {
        let state_db = StateDb::new(SqliteStateBackend::open(&path).unwrap());
        state_db
            .save(&state_key("editor", "a"), &json!({ "data": { "path": "a" } }))
            .unwrap();
        state_db
            .save(&state_key("editor", "b"), &json!({ "data": { "path": "b" } }))
            .unwrap();
        state_db
            .save(&state_key("terminal", "1"), &json!({ "data": {} }))
            .unwrap();
    }

    let state_db = StateDbLocation::File(path).open().unwrap();
    assert_eq!(state_db.kind(), "sqlite");
    let keys: Vec<String> = state_db
        .list("editor")
        .unwrap()
        .into_iter()
        .map(|entry| entry.key)
        .collect();
    assert_eq!(keys, vec!["editor:a", "editor:b"]);
    assert_eq!(
        state_db.fetch("editor:b").unwrap(),
        Some(json!({ "data": { "path": "b" } }))
    );
}

#[test]
fn save_overwrites_and_remove_reports_presence() {
    let state_db = StateDb::new(SqliteStateBackend::open_in_memory().unwrap());
    state_db.save("editor:a", &json!({ "data": 1 })).unwrap();
    state_db.save("editor:a", &json!({ "data": 2 })).unwrap();
    assert_eq!(
        state_db.fetch("editor:a").unwrap(),
        Some(json!({ "data": 2 }))
    );

    assert!(state_db.remove("editor:a").unwrap());
    assert!(!state_db.remove("editor:a").unwrap());
    assert_eq!(state_db.fetch("editor:a").unwrap(), None);
}

#[test]
fn list_rejects_invalid_namespace() {
    let state_db = StateDb::in_memory();
    for namespace in ["", "a:b"] {
        let err = state_db.list(namespace).unwrap_err();
        assert!(matches!(err, StateDbError::InvalidNamespace(_)));
    }
}

#[test]
fn clear_command_wipes_sqlite_state() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("state.db");
    let state_db = StateDb::new(SqliteStateBackend::open(&path).unwrap());
    state_db
        .save("editor:a", &json!({ "data": { "path": "a" } }))
        .unwrap();

    let mut app = Application::new();
    app.register_all(builtin_plugins(state_db)).unwrap();
    app.start().unwrap();
    app.context()
        .commands()
        .execute(CLEAR_STATE_COMMAND, &json!({}))
        .unwrap();

    let shared = app.resolve(&STATE_DB).unwrap();
    assert!(shared.list("editor").unwrap().is_empty());
    app.shutdown();

    let reopened = StateDb::new(SqliteStateBackend::open(&path).unwrap());
    assert_eq!(reopened.fetch("editor:a").unwrap(), None);
}
