//! Command registry and palette entries.
//!
//! # Responsibility
//! - Map stable command ids to labels and execute callbacks.
//! - Hold palette/menu entries that reference registered commands.
//!
//! # Invariants
//! - Command ids are unique within one registry.
//! - Palette entries only reference commands that exist at insertion time.

use log::{debug, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::sync::Arc;

/// Callback invoked with JSON args. Failures are reported as plain messages.
pub type CommandCallback = Arc<dyn Fn(&Value) -> Result<Value, String> + Send + Sync>;

pub type CommandResult<T> = Result<T, CommandError>;

/// Registration options for one command.
#[derive(Clone)]
pub struct CommandOptions {
    pub label: String,
    pub caption: Option<String>,
    pub execute: CommandCallback,
}

impl CommandOptions {
    pub fn new(
        label: impl Into<String>,
        execute: impl Fn(&Value) -> Result<Value, String> + Send + Sync + 'static,
    ) -> Self {
        Self {
            label: label.into(),
            caption: None,
            execute: Arc::new(execute),
        }
    }

    pub fn with_caption(mut self, caption: impl Into<String>) -> Self {
        self.caption = Some(caption.into());
        self
    }
}

/// Palette/menu entry pointing at a registered command.
#[derive(Debug, Clone, PartialEq)]
pub struct PaletteItem {
    pub command: String,
    pub category: String,
    pub args: Value,
}

/// In-process command registry.
#[derive(Default)]
pub struct CommandRegistry {
    commands: BTreeMap<String, CommandOptions>,
    palette: Vec<PaletteItem>,
}

impl CommandRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one command.
    pub fn add_command(
        &mut self,
        id: impl Into<String>,
        options: CommandOptions,
    ) -> CommandResult<()> {
        let id = id.into();
        if id.trim().is_empty() {
            return Err(CommandError::EmptyCommandId);
        }
        if self.commands.contains_key(id.as_str()) {
            return Err(CommandError::DuplicateCommand(id));
        }
        debug!("event=command_register module=command status=ok command={id}");
        self.commands.insert(id, options);
        Ok(())
    }

    pub fn has_command(&self, id: &str) -> bool {
        self.commands.contains_key(id)
    }

    pub fn label(&self, id: &str) -> Option<&str> {
        self.commands.get(id).map(|options| options.label.as_str())
    }

    pub fn caption(&self, id: &str) -> Option<&str> {
        self.commands
            .get(id)
            .and_then(|options| options.caption.as_deref())
    }

    /// Returns sorted command ids.
    pub fn list_commands(&self) -> Vec<String> {
        self.commands.keys().cloned().collect()
    }

    /// Executes one command with JSON args.
    ///
    /// # Errors
    /// - `UnknownCommand` when `id` is not registered.
    /// - `ExecutionFailed` when the callback reports a failure.
    pub fn execute(&self, id: &str, args: &Value) -> CommandResult<Value> {
        let Some(options) = self.commands.get(id) else {
            return Err(CommandError::UnknownCommand(id.to_string()));
        };
        let execute = Arc::clone(&options.execute);
        execute(args).map_err(|message| {
            warn!("event=command_execute module=command status=error command={id} error={message}");
            CommandError::ExecutionFailed {
                command_id: id.to_string(),
                message,
            }
        })
    }

    /// Adds one palette entry for an existing command.
    pub fn add_palette_item(&mut self, item: PaletteItem) -> CommandResult<()> {
        if !self.commands.contains_key(item.command.as_str()) {
            return Err(CommandError::UnknownCommand(item.command));
        }
        self.palette.push(item);
        Ok(())
    }

    /// Palette entries in insertion order.
    pub fn palette_items(&self) -> &[PaletteItem] {
        &self.palette
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    /// Drops every command and palette entry.
    pub fn clear(&mut self) {
        self.commands.clear();
        self.palette.clear();
    }
}

/// Command registration and execution errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommandError {
    EmptyCommandId,
    DuplicateCommand(String),
    UnknownCommand(String),
    ExecutionFailed { command_id: String, message: String },
}

impl Display for CommandError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyCommandId => write!(f, "command id must not be empty"),
            Self::DuplicateCommand(id) => write!(f, "command already registered: {id}"),
            Self::UnknownCommand(id) => write!(f, "command not found: {id}"),
            Self::ExecutionFailed {
                command_id,
                message,
            } => write!(f, "command `{command_id}` failed: {message}"),
        }
    }
}

impl Error for CommandError {}
