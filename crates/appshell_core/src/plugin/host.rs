//! Application shell: plugin registration, activation and shutdown.
//!
//! # Responsibility
//! - Register plugin descriptors and index the tokens they provide.
//! - Activate plugins exactly once, dependencies first.
//! - Tear the context down at shutdown in reverse activation order.
//!
//! # Invariants
//! - Plugin ids are unique; a token has at most one provider.
//! - The whole graph is validated before any plugin activates, so a cyclic
//!   or unresolvable graph never activates a subset.
//! - An `activate` failure aborts the current pass (fail-fast) and the plugin
//!   is not retried.

use super::context::{ApplicationContext, Dependencies};
use super::descriptor::PluginDescriptor;
use super::graph::{activation_order, dependency_edges, find_cycle, Edges};
use super::{PluginError, PluginResult};
use crate::token::{Token, TypedToken};
use log::{error, info, warn};
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Instant;

#[derive(Debug, Clone, PartialEq, Eq)]
enum PluginState {
    Registered,
    Activated,
    Failed(String),
}

struct PluginEntry {
    descriptor: PluginDescriptor,
    state: PluginState,
}

/// Plugin host owning the application context.
#[derive(Default)]
pub struct Application {
    plugins: Vec<PluginEntry>,
    index: BTreeMap<String, usize>,
    providers: BTreeMap<Token, usize>,
    activated: Vec<usize>,
    context: ApplicationContext,
}

impl Application {
    /// Bootstraps an empty application with a fresh context.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers one plugin after declaration validation.
    pub fn register(&mut self, descriptor: PluginDescriptor) -> PluginResult<()> {
        descriptor
            .validate()
            .map_err(|reason| PluginError::InvalidDescriptor {
                plugin_id: descriptor.id.clone(),
                reason,
            })?;
        if self.index.contains_key(descriptor.id.as_str()) {
            return Err(PluginError::DuplicatePluginId(descriptor.id.clone()));
        }
        if let Some(token) = &descriptor.provides {
            if let Some(&existing) = self.providers.get(token) {
                return Err(PluginError::DuplicateProvider {
                    token: token.name().to_string(),
                    existing: self.plugins[existing].descriptor.id.clone(),
                    plugin_id: descriptor.id.clone(),
                });
            }
        }

        let position = self.plugins.len();
        if let Some(token) = &descriptor.provides {
            self.providers.insert(token.clone(), position);
        }
        self.index.insert(descriptor.id.clone(), position);
        info!(
            "event=plugin_register module=plugin status=ok plugin={} auto_start={}",
            descriptor.id, descriptor.auto_start
        );
        self.plugins.push(PluginEntry {
            descriptor,
            state: PluginState::Registered,
        });
        Ok(())
    }

    /// Registers several plugins, stopping at the first failure.
    pub fn register_all(
        &mut self,
        descriptors: impl IntoIterator<Item = PluginDescriptor>,
    ) -> PluginResult<()> {
        for descriptor in descriptors {
            self.register(descriptor)?;
        }
        Ok(())
    }

    /// Activates every auto-start plugin and its requirements.
    ///
    /// Returns the ids activated by this call, in activation order.
    ///
    /// # Errors
    /// - `UnknownToken` when a required token has no provider.
    /// - `CyclicDependency` when the graph has a cycle.
    /// - `ActivationFailed` when a plugin's `activate` fails.
    pub fn start(&mut self) -> PluginResult<Vec<String>> {
        let started_at = Instant::now();
        let edges = self.validated_edges()?;
        let roots: Vec<usize> = self
            .plugins
            .iter()
            .enumerate()
            .filter(|(_, entry)| {
                entry.descriptor.auto_start && entry.state != PluginState::Activated
            })
            .map(|(position, _)| position)
            .collect();
        let activated = self.activate_all(&edges, &roots)?;
        info!(
            "event=app_start module=plugin status=ok activated={} duration_ms={}",
            activated.len(),
            started_at.elapsed().as_millis()
        );
        Ok(activated)
    }

    /// Returns the service for `token`, activating its provider on demand.
    pub fn resolve<T: Send + Sync + 'static>(
        &mut self,
        token: &TypedToken<T>,
    ) -> PluginResult<Arc<T>> {
        if self.context.service(token.token()).is_none() {
            let Some(&provider) = self.providers.get(token.token()) else {
                return Err(PluginError::UnknownToken {
                    token: token.name().to_string(),
                    required_by: None,
                });
            };
            let edges = self.validated_edges()?;
            self.activate_all(&edges, &[provider])?;
        }
        self.context
            .lookup(token)
            .ok_or_else(|| PluginError::ServiceTypeMismatch(token.name().to_string()))
    }

    /// Runs deactivate hooks in reverse activation order and clears the context.
    ///
    /// Hook failures are logged and do not stop the teardown. Calling this
    /// twice is harmless.
    pub fn shutdown(&mut self) {
        let activated = std::mem::take(&mut self.activated);
        for &position in activated.iter().rev() {
            let entry = &self.plugins[position];
            let plugin_id = entry.descriptor.id.clone();
            if let Some(deactivate) = entry.descriptor.deactivate.clone() {
                if let Err(err) = deactivate(&mut self.context) {
                    warn!(
                        "event=plugin_deactivate module=plugin status=error plugin={plugin_id} error={err}"
                    );
                }
            }
        }
        for entry in &mut self.plugins {
            entry.state = PluginState::Registered;
        }
        self.context.teardown();
        info!(
            "event=app_shutdown module=plugin status=ok deactivated={}",
            activated.len()
        );
    }

    pub fn context(&self) -> &ApplicationContext {
        &self.context
    }

    pub fn context_mut(&mut self) -> &mut ApplicationContext {
        &mut self.context
    }

    /// Registered plugin ids in registration order.
    pub fn plugin_ids(&self) -> Vec<&str> {
        self.plugins
            .iter()
            .map(|entry| entry.descriptor.id.as_str())
            .collect()
    }

    pub fn has_plugin(&self, plugin_id: &str) -> bool {
        self.index.contains_key(plugin_id)
    }

    pub fn is_activated(&self, plugin_id: &str) -> bool {
        self.index
            .get(plugin_id)
            .is_some_and(|&position| self.plugins[position].state == PluginState::Activated)
    }

    /// Ids of activated plugins in the order they were activated.
    pub fn activation_order(&self) -> Vec<&str> {
        self.activated
            .iter()
            .map(|&position| self.plugins[position].descriptor.id.as_str())
            .collect()
    }

    fn validated_edges(&self) -> PluginResult<Edges> {
        let descriptors: Vec<&PluginDescriptor> =
            self.plugins.iter().map(|entry| &entry.descriptor).collect();
        let edges = dependency_edges(&descriptors, &self.providers)?;
        if let Some(cycle) = find_cycle(&edges) {
            let cycle: Vec<String> = cycle
                .into_iter()
                .map(|position| self.plugins[position].descriptor.id.clone())
                .collect();
            error!(
                "event=plugin_graph module=plugin status=error error_code=cyclic_dependency cycle={}",
                cycle.join("->")
            );
            return Err(PluginError::CyclicDependency { cycle });
        }
        Ok(edges)
    }

    fn activate_all(&mut self, edges: &Edges, roots: &[usize]) -> PluginResult<Vec<String>> {
        let mut activated = Vec::new();
        for position in activation_order(edges, roots) {
            match &self.plugins[position].state {
                PluginState::Activated => continue,
                PluginState::Failed(message) => {
                    return Err(PluginError::ActivationFailed {
                        plugin_id: self.plugins[position].descriptor.id.clone(),
                        message: message.clone(),
                    });
                }
                PluginState::Registered => {}
            }
            self.activate_one(position, &edges[position])?;
            activated.push(self.plugins[position].descriptor.id.clone());
        }
        Ok(activated)
    }

    fn activate_one(&mut self, position: usize, providers: &[usize]) -> PluginResult<()> {
        let started_at = Instant::now();
        let descriptor = &self.plugins[position].descriptor;
        let plugin_id = descriptor.id.clone();

        let mut services = BTreeMap::new();
        for provider in providers {
            let Some(token) = self.plugins[*provider].descriptor.provides.clone() else {
                continue;
            };
            if let Some(service) = self.context.service(&token) {
                services.insert(token, service);
            }
        }
        let dependencies = Dependencies::new(plugin_id.clone(), services);
        let activate = Arc::clone(&descriptor.activate);
        let provides = descriptor.provides.clone();

        match activate(&mut self.context, &dependencies) {
            Ok(service) => {
                if let (Some(token), Some(service)) = (provides, service) {
                    self.context.insert_service(token, service);
                }
                self.plugins[position].state = PluginState::Activated;
                self.activated.push(position);
                info!(
                    "event=plugin_activate module=plugin status=ok plugin={} duration_ms={}",
                    plugin_id,
                    started_at.elapsed().as_millis()
                );
                Ok(())
            }
            Err(err) => {
                error!(
                    "event=plugin_activate module=plugin status=error plugin={} error={}",
                    plugin_id, err
                );
                self.plugins[position].state = PluginState::Failed(err.to_string());
                Err(PluginError::ActivationFailed {
                    plugin_id,
                    message: err.to_string(),
                })
            }
        }
    }
}
