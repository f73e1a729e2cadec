//! Built-in plugins every shell registers.
//!
//! - `@appshell/statedb:plugin` provides [`STATE_DB`] and the `statedb:clear`
//!   command.
//! - `@appshell/restorer:plugin` provides [`LAYOUT_RESTORER`] on top of it.

use crate::command::{CommandOptions, PaletteItem};
use crate::plugin::PluginDescriptor;
use crate::restorer::LayoutRestorer;
use crate::statedb::StateDb;
use crate::token::TypedToken;
use log::info;
use once_cell::sync::Lazy;
use serde_json::{json, Value};
use std::sync::Arc;

pub const STATE_DB_PLUGIN_ID: &str = "@appshell/statedb:plugin";
pub const RESTORER_PLUGIN_ID: &str = "@appshell/restorer:plugin";
pub const CLEAR_STATE_COMMAND: &str = "statedb:clear";

const CLEAR_STATE_CATEGORY: &str = "Help";

/// Shared state database used for restoration.
pub static STATE_DB: Lazy<TypedToken<Arc<StateDb>>> =
    Lazy::new(|| TypedToken::new("@appshell/statedb:IStateDB"));

/// Restorer replaying tracker state at startup.
pub static LAYOUT_RESTORER: Lazy<TypedToken<LayoutRestorer>> =
    Lazy::new(|| TypedToken::new("@appshell/restorer:ILayoutRestorer"));

/// Plugin providing `state_db` under [`STATE_DB`].
///
/// Every activation hands out the same database, so entries survive an
/// application shutdown and restart.
pub fn state_db_plugin(state_db: StateDb) -> PluginDescriptor {
    let state_db = Arc::new(state_db);
    PluginDescriptor::builder(STATE_DB_PLUGIN_ID)
        .description("State database for session restoration")
        .provides(&STATE_DB, move |ctx, _deps| {
            let state_db = Arc::clone(&state_db);
            let command_db = Arc::clone(&state_db);
            ctx.commands_mut().add_command(
                CLEAR_STATE_COMMAND,
                CommandOptions::new("Clear Application State", move |_args: &Value| {
                    command_db.clear().map_err(|err| err.to_string())?;
                    info!("event=statedb_clear module=builtin status=ok");
                    Ok(Value::Null)
                })
                .with_caption("Remove every persisted restoration entry"),
            )?;
            ctx.commands_mut().add_palette_item(PaletteItem {
                command: CLEAR_STATE_COMMAND.to_string(),
                category: CLEAR_STATE_CATEGORY.to_string(),
                args: json!({}),
            })?;
            Ok(state_db)
        })
}

/// Plugin providing a [`LayoutRestorer`] bound to the shared state database.
pub fn restorer_plugin() -> PluginDescriptor {
    PluginDescriptor::builder(RESTORER_PLUGIN_ID)
        .description("Restores tracked widgets from persisted state")
        .requires(&STATE_DB)
        .provides(&LAYOUT_RESTORER, |_ctx, deps| {
            let state_db = deps.get(&STATE_DB)?;
            Ok(LayoutRestorer::new(Arc::clone(&*state_db)))
        })
}

/// The state database and restorer plugins, in registration order.
pub fn builtin_plugins(state_db: StateDb) -> Vec<PluginDescriptor> {
    vec![state_db_plugin(state_db), restorer_plugin()]
}
