//! Plugin descriptor declaration and validation.
//!
//! Descriptors are built through [`PluginBuilder`]; the finishing call fixes
//! the activate signature, so a plugin that declares `provides` can only be
//! built with an activate hook returning that token's service type.

use super::context::{ApplicationContext, Dependencies};
use super::ActivationError;
use crate::token::{Token, TypedToken};
use once_cell::sync::Lazy;
use regex::Regex;
use std::any::Any;
use std::collections::BTreeSet;
use std::error::Error;
use std::fmt::{Debug, Display, Formatter};
use std::sync::Arc;

/// Type-erased service instance stored under a token.
pub type Service = Arc<dyn Any + Send + Sync>;

pub(crate) type ActivateFn = Arc<
    dyn Fn(&mut ApplicationContext, &Dependencies) -> Result<Option<Service>, ActivationError>
        + Send
        + Sync,
>;
pub(crate) type DeactivateFn =
    Arc<dyn Fn(&mut ApplicationContext) -> Result<(), ActivationError> + Send + Sync>;

// Segments of `[a-z0-9@]` joined by single separators, e.g. `@shell/editor:tracker`.
static PLUGIN_ID_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^[a-z0-9@]+(?:[._:/-][a-z0-9@]+)*$").expect("plugin id pattern is valid")
});

/// Static plugin metadata plus its activation hooks.
pub struct PluginDescriptor {
    pub(crate) id: String,
    pub(crate) description: Option<String>,
    pub(crate) requires: Vec<Token>,
    pub(crate) optional: Vec<Token>,
    pub(crate) provides: Option<Token>,
    pub(crate) auto_start: bool,
    pub(crate) activate: ActivateFn,
    pub(crate) deactivate: Option<DeactivateFn>,
}

impl PluginDescriptor {
    /// Starts a descriptor declaration; plugins auto-start by default.
    pub fn builder(id: impl Into<String>) -> PluginBuilder {
        PluginBuilder {
            id: id.into(),
            description: None,
            requires: Vec::new(),
            optional: Vec::new(),
            auto_start: true,
            deactivate: None,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    pub fn requires(&self) -> &[Token] {
        &self.requires
    }

    pub fn optional(&self) -> &[Token] {
        &self.optional
    }

    pub fn provides(&self) -> Option<&Token> {
        self.provides.as_ref()
    }

    pub fn auto_start(&self) -> bool {
        self.auto_start
    }

    /// Validates declaration-level invariants.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        if self.id.trim().is_empty() {
            return Err(DescriptorError::EmptyId);
        }
        if !PLUGIN_ID_PATTERN.is_match(&self.id) {
            return Err(DescriptorError::InvalidId(self.id.clone()));
        }

        let mut seen = BTreeSet::new();
        for token in self.requires.iter().chain(self.optional.iter()) {
            if !seen.insert(token.clone()) {
                return Err(DescriptorError::DuplicateDependency(
                    token.name().to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Every token this plugin may consume, required ones first.
    pub(crate) fn dependencies(&self) -> impl Iterator<Item = (&Token, bool)> {
        self.requires
            .iter()
            .map(|token| (token, true))
            .chain(self.optional.iter().map(|token| (token, false)))
    }
}

impl Debug for PluginDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginDescriptor")
            .field("id", &self.id)
            .field("requires", &self.requires)
            .field("optional", &self.optional)
            .field("provides", &self.provides)
            .field("auto_start", &self.auto_start)
            .finish()
    }
}

/// Builder finished by [`PluginBuilder::activate`] or [`PluginBuilder::provides`].
pub struct PluginBuilder {
    id: String,
    description: Option<String>,
    requires: Vec<Token>,
    optional: Vec<Token>,
    auto_start: bool,
    deactivate: Option<DeactivateFn>,
}

impl PluginBuilder {
    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Declares a required service; activation fails without a provider.
    pub fn requires<T>(mut self, token: &TypedToken<T>) -> Self {
        self.requires.push(token.token().clone());
        self
    }

    /// Declares a service used when some plugin provides it.
    pub fn optional<T>(mut self, token: &TypedToken<T>) -> Self {
        self.optional.push(token.token().clone());
        self
    }

    /// `false` defers activation until the provided token is first needed.
    pub fn auto_start(mut self, auto_start: bool) -> Self {
        self.auto_start = auto_start;
        self
    }

    /// Hook run at application shutdown, in reverse activation order.
    pub fn deactivate(
        mut self,
        deactivate: impl Fn(&mut ApplicationContext) -> Result<(), ActivationError>
            + Send
            + Sync
            + 'static,
    ) -> Self {
        self.deactivate = Some(Arc::new(deactivate));
        self
    }

    /// Finishes a plugin that provides no service.
    pub fn activate(
        self,
        activate: impl Fn(&mut ApplicationContext, &Dependencies) -> Result<(), ActivationError>
            + Send
            + Sync
            + 'static,
    ) -> PluginDescriptor {
        let erased: ActivateFn =
            Arc::new(move |ctx: &mut ApplicationContext, deps: &Dependencies| {
                activate(ctx, deps).map(|()| None::<Service>)
            });
        self.finish(None, erased)
    }

    /// Finishes a plugin whose activate hook produces the service for `token`.
    pub fn provides<T: Send + Sync + 'static>(
        self,
        token: &TypedToken<T>,
        activate: impl Fn(&mut ApplicationContext, &Dependencies) -> Result<T, ActivationError>
            + Send
            + Sync
            + 'static,
    ) -> PluginDescriptor {
        let erased: ActivateFn =
            Arc::new(move |ctx: &mut ApplicationContext, deps: &Dependencies| {
                activate(ctx, deps).map(|service| Some(Arc::new(service) as Service))
            });
        self.finish(Some(token.token().clone()), erased)
    }

    fn finish(self, provides: Option<Token>, activate: ActivateFn) -> PluginDescriptor {
        PluginDescriptor {
            id: self.id,
            description: self.description,
            requires: self.requires,
            optional: self.optional,
            provides,
            auto_start: self.auto_start,
            activate,
            deactivate: self.deactivate,
        }
    }
}

/// Declaration validation errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DescriptorError {
    EmptyId,
    InvalidId(String),
    DuplicateDependency(String),
}

impl Display for DescriptorError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyId => write!(f, "plugin id must not be empty"),
            Self::InvalidId(value) => write!(f, "plugin id is invalid: {value}"),
            Self::DuplicateDependency(token) => {
                write!(f, "token declared more than once: {token}")
            }
        }
    }
}

impl Error for DescriptorError {}

#[cfg(test)]
mod tests {
    use super::{DescriptorError, PluginDescriptor};
    use crate::token::TypedToken;

    #[test]
    fn accepts_namespaced_ids() {
        for id in ["shell", "@shell/editor:tracker", "app.devices-list", "statedb:core"] {
            let descriptor = PluginDescriptor::builder(id).activate(|_, _| Ok(()));
            assert!(descriptor.validate().is_ok(), "{id} should be valid");
        }
    }

    #[test]
    fn rejects_malformed_ids() {
        let descriptor = PluginDescriptor::builder("  ").activate(|_, _| Ok(()));
        assert_eq!(descriptor.validate(), Err(DescriptorError::EmptyId));

        for id in ["Shell", "a::b", "trailing:", "with space"] {
            let descriptor = PluginDescriptor::builder(id).activate(|_, _| Ok(()));
            assert!(
                matches!(descriptor.validate(), Err(DescriptorError::InvalidId(_))),
                "{id} should be rejected"
            );
        }
    }

    #[test]
    fn rejects_token_declared_twice() {
        let token = TypedToken::<u32>::new("app:counter");
        let descriptor = PluginDescriptor::builder("app:consumer")
            .requires(&token)
            .optional(&token)
            .activate(|_, _| Ok(()));
        assert_eq!(
            descriptor.validate(),
            Err(DescriptorError::DuplicateDependency("app:counter".to_string()))
        );
    }

    #[test]
    fn builder_records_declarations() {
        let input = TypedToken::<u32>::new("app:input");
        let output = TypedToken::<String>::new("app:output");
        let descriptor = PluginDescriptor::builder("app:formatter")
            .description("Formats numbers")
            .requires(&input)
            .auto_start(false)
            .provides(&output, |_, _| Ok("formatted".to_string()));

        assert_eq!(descriptor.id(), "app:formatter");
        assert_eq!(descriptor.description(), Some("Formats numbers"));
        assert_eq!(descriptor.requires(), &[input.token().clone()]);
        assert_eq!(descriptor.provides(), Some(output.token()));
        assert!(!descriptor.auto_start());
        assert_eq!(descriptor.dependencies().count(), 1);
    }
}
