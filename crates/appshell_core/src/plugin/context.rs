//! Application context handed to plugin hooks.
//!
//! # Responsibility
//! - Own the token→service registry for the application lifetime.
//! - Own the command registry plugins register into.
//!
//! # Invariants
//! - A token maps to at most one service.
//! - Lookups never activate plugins; only activated services are visible.

use super::descriptor::Service;
use super::ActivationError;
use crate::command::CommandRegistry;
use crate::token::{Token, TypedToken};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Explicit replacement for a process-wide service registry.
#[derive(Default)]
pub struct ApplicationContext {
    services: BTreeMap<Token, Service>,
    commands: CommandRegistry,
}

impl ApplicationContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns an already activated service.
    pub fn lookup<T: Send + Sync + 'static>(&self, token: &TypedToken<T>) -> Option<Arc<T>> {
        self.services
            .get(token.token())
            .and_then(|service| Arc::clone(service).downcast::<T>().ok())
    }

    pub fn has_service(&self, token: &Token) -> bool {
        self.services.contains_key(token)
    }

    pub fn service_count(&self) -> usize {
        self.services.len()
    }

    pub fn commands(&self) -> &CommandRegistry {
        &self.commands
    }

    pub fn commands_mut(&mut self) -> &mut CommandRegistry {
        &mut self.commands
    }

    pub(crate) fn service(&self, token: &Token) -> Option<Service> {
        self.services.get(token).cloned()
    }

    pub(crate) fn insert_service(&mut self, token: Token, service: Service) {
        self.services.insert(token, service);
    }

    /// Drops every service and command at shutdown.
    pub(crate) fn teardown(&mut self) {
        self.services.clear();
        self.commands.clear();
    }
}

/// Services resolved for one plugin activation.
pub struct Dependencies {
    plugin_id: String,
    services: BTreeMap<Token, Service>,
}

impl Dependencies {
    pub(crate) fn new(plugin_id: impl Into<String>, services: BTreeMap<Token, Service>) -> Self {
        Self {
            plugin_id: plugin_id.into(),
            services,
        }
    }

    /// Returns a required service.
    ///
    /// # Errors
    /// Fails when `token` was not resolved for this plugin, which happens
    /// when it was not declared or an optional provider is absent.
    pub fn get<T: Send + Sync + 'static>(
        &self,
        token: &TypedToken<T>,
    ) -> Result<Arc<T>, ActivationError> {
        let service = self.services.get(token.token()).ok_or_else(|| {
            ActivationError::new(format!(
                "plugin `{}` has no resolved service for `{}`",
                self.plugin_id,
                token.name()
            ))
        })?;
        Arc::clone(service).downcast::<T>().map_err(|_| {
            ActivationError::new(format!(
                "service for `{}` has an unexpected type",
                token.name()
            ))
        })
    }

    /// Returns an optional service when a provider was available.
    pub fn optional<T: Send + Sync + 'static>(&self, token: &TypedToken<T>) -> Option<Arc<T>> {
        self.services
            .get(token.token())
            .and_then(|service| Arc::clone(service).downcast::<T>().ok())
    }

    pub fn plugin_id(&self) -> &str {
        &self.plugin_id
    }

    pub fn len(&self) -> usize {
        self.services.len()
    }

    pub fn is_empty(&self) -> bool {
        self.services.is_empty()
    }
}
