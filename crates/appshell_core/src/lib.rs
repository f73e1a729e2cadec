//! Core of the application shell: plugin activation, widget tracking and
//! session restoration.
//! Front ends only compose plugins; every invariant lives in this crate.

pub mod builtin;
pub mod command;
pub mod config;
pub mod db;
pub mod logging;
pub mod plugin;
pub mod request;
pub mod rest;
pub mod restorer;
mod shared;
pub mod statedb;
pub mod token;
pub mod tracker;
pub mod widget;

pub use builtin::{builtin_plugins, CLEAR_STATE_COMMAND, LAYOUT_RESTORER, STATE_DB};
pub use command::{CommandError, CommandOptions, CommandRegistry, CommandResult, PaletteItem};
pub use config::{ConfigError, ShellConfig, StateDbLocation};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use plugin::{
    ActivationError, Application, ApplicationContext, Dependencies, PluginDescriptor,
    PluginError, PluginResult,
};
pub use restorer::{LayoutRestorer, RestoreError, RestoreOptions, RestoreReport};
pub use statedb::{StateDb, StateDbError, StateDbResult};
pub use token::{Token, TypedToken};
pub use tracker::{InstanceTracker, TrackerError, TrackerResult};
pub use widget::{Render, Widget};

/// Minimal health-check API for early integration.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
