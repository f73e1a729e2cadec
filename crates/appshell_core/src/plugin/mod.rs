//! Plugin host: descriptors, dependency scheduling and activation.
//!
//! Plugins declare the tokens they require and provide; the [`Application`]
//! activates them in dependency order and keeps the provided services in an
//! explicit [`ApplicationContext`] for the lifetime of the application.

use crate::command::CommandError;
use crate::restorer::RestoreError;
use crate::statedb::StateDbError;
use crate::tracker::TrackerError;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod context;
pub mod descriptor;
mod graph;
pub mod host;

pub use context::{ApplicationContext, Dependencies};
pub use descriptor::{DescriptorError, PluginBuilder, PluginDescriptor, Service};
pub use host::Application;

pub type PluginResult<T> = Result<T, PluginError>;

/// Registration, scheduling and activation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PluginError {
    InvalidDescriptor {
        plugin_id: String,
        reason: DescriptorError,
    },
    DuplicatePluginId(String),
    DuplicateProvider {
        token: String,
        existing: String,
        plugin_id: String,
    },
    /// No registered plugin provides `token`.
    UnknownToken {
        token: String,
        required_by: Option<String>,
    },
    /// Plugin ids along the cycle; the first id is repeated at the end.
    CyclicDependency {
        cycle: Vec<String>,
    },
    ActivationFailed {
        plugin_id: String,
        message: String,
    },
    ServiceTypeMismatch(String),
}

impl Display for PluginError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::InvalidDescriptor { plugin_id, reason } => {
                write!(f, "invalid plugin descriptor `{plugin_id}`: {reason}")
            }
            Self::DuplicatePluginId(id) => write!(f, "plugin id already registered: {id}"),
            Self::DuplicateProvider {
                token,
                existing,
                plugin_id,
            } => write!(
                f,
                "token `{token}` is already provided by `{existing}`; `{plugin_id}` cannot provide it"
            ),
            Self::UnknownToken {
                token,
                required_by: Some(plugin_id),
            } => write!(f, "plugin `{plugin_id}` requires unknown token `{token}`"),
            Self::UnknownToken {
                token,
                required_by: None,
            } => write!(f, "no plugin provides token `{token}`"),
            Self::CyclicDependency { cycle } => {
                write!(f, "cyclic plugin dependency: {}", cycle.join(" -> "))
            }
            Self::ActivationFailed { plugin_id, message } => {
                write!(f, "plugin `{plugin_id}` failed to activate: {message}")
            }
            Self::ServiceTypeMismatch(token) => {
                write!(f, "service registered for `{token}` has an unexpected type")
            }
        }
    }
}

impl Error for PluginError {}

/// Failure reported by a plugin's `activate` or `deactivate` hook.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActivationError {
    message: String,
}

impl ActivationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }

    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for ActivationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.message)
    }
}

impl Error for ActivationError {}

impl From<String> for ActivationError {
    fn from(value: String) -> Self {
        Self::new(value)
    }
}

impl From<&str> for ActivationError {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

impl From<CommandError> for ActivationError {
    fn from(value: CommandError) -> Self {
        Self::new(value.to_string())
    }
}

impl From<TrackerError> for ActivationError {
    fn from(value: TrackerError) -> Self {
        Self::new(value.to_string())
    }
}

impl From<RestoreError> for ActivationError {
    fn from(value: RestoreError) -> Self {
        Self::new(value.to_string())
    }
}

impl From<StateDbError> for ActivationError {
    fn from(value: StateDbError) -> Self {
        Self::new(value.to_string())
    }
}
