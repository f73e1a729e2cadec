//! CLI smoke entry point.
//!
//! # Responsibility
//! - Verify `appshell_core` linkage and print deterministic probe lines.
//! - Boot the built-in plugins plus a demo tracker plugin against the
//!   configured state database, so restoration can be observed across runs.

use appshell_core::rest::{parse_record_list, RecordTable};
use appshell_core::{
    builtin_plugins, init_logging, Application, CommandOptions, InstanceTracker,
    PluginDescriptor, RestoreOptions, ShellConfig, TypedToken, Widget, LAYOUT_RESTORER,
};
use log::info;
use serde_json::{json, Value};
use std::error::Error;
use std::process::ExitCode;

const DEMO_NAMESPACE: &str = "records";
const DEMO_OPEN_COMMAND: &str = "records:open";
const DEMO_RECORDS: &str = r#"[
    {"pk": 1, "model": "demo.device", "fields": {"name": "printer"}},
    {"pk": 2, "model": "demo.device", "fields": {"name": "router"}}
]"#;

fn main() -> ExitCode {
    println!("appshell_core ping={}", appshell_core::ping());
    println!("appshell_core version={}", appshell_core::core_version());

    match run() {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("appshell error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run() -> Result<(), Box<dyn Error>> {
    let config = ShellConfig::from_env()?;
    if let Some(log_dir) = &config.log_dir {
        init_logging(&config.log_level, log_dir)?;
    }

    let tracker_token = TypedToken::<InstanceTracker>::new("demo:records-tracker");
    let mut app = Application::new();
    app.register_all(builtin_plugins(config.state_db.open()?))?;
    app.register(records_plugin(&tracker_token))?;

    let activated = app.start()?;
    println!("activated={}", activated.join(","));

    let tracker = app.resolve(&tracker_token)?;
    println!("restored={}", tracker.size());
    if tracker.is_empty() {
        app.context()
            .commands()
            .execute(DEMO_OPEN_COMMAND, &json!({ "name": "devices" }))?;
    }
    if let Some(current) = tracker.current_widget() {
        println!("current={}", current.id());
        println!("{}", current.render());
    }

    app.shutdown();
    info!("event=cli_exit module=cli status=ok");
    Ok(())
}

/// Tracks record tables opened through `records:open` and restores them.
fn records_plugin(tracker_token: &TypedToken<InstanceTracker>) -> PluginDescriptor {
    PluginDescriptor::builder("demo:records")
        .description("Demo record tables restored across runs")
        .requires(&LAYOUT_RESTORER)
        .provides(tracker_token, |ctx, deps| {
            let tracker = InstanceTracker::new(DEMO_NAMESPACE)?;
            let opened = tracker.clone();
            ctx.commands_mut().add_command(
                DEMO_OPEN_COMMAND,
                CommandOptions::new("Open Records", move |args: &Value| {
                    let name = args
                        .get("name")
                        .and_then(Value::as_str)
                        .ok_or_else(|| "name is required".to_string())?;
                    let table = RecordTable {
                        columns: vec!["name".to_string()],
                        records: parse_record_list(DEMO_RECORDS).map_err(|err| err.to_string())?,
                    };
                    let widget = Widget::new(name, table);
                    widget.set_title(format!("Records: {name}"));
                    opened.add(&widget).map_err(|err| err.to_string())?;
                    Ok(json!({ "id": name }))
                }),
            )?;

            let restorer = deps.get(&LAYOUT_RESTORER)?;
            restorer.restore(
                ctx.commands(),
                &tracker,
                RestoreOptions::new(
                    DEMO_OPEN_COMMAND,
                    |widget: &Widget| json!({ "name": widget.id() }),
                    |widget: &Widget| widget.id().to_string(),
                ),
            )?;
            Ok(tracker)
        })
}
