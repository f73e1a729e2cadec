//! Capability tokens used as service keys between plugins.
//!
//! # Responsibility
//! - Provide opaque keys that identify one service slot in the application.
//! - Carry the service type at compile time via [`TypedToken`].
//!
//! # Invariants
//! - Token equality is identity: two tokens created with the same name are
//!   different tokens. Clones of one token compare equal.
//! - The display name is diagnostic only and never used for lookup.

use std::cmp::Ordering;
use std::fmt::{Debug, Display, Formatter};
use std::hash::{Hash, Hasher};
use std::marker::PhantomData;
use std::sync::Arc;
use uuid::Uuid;

/// Untyped capability key.
#[derive(Clone)]
pub struct Token {
    id: Uuid,
    name: Arc<str>,
}

impl Token {
    /// Creates a fresh token; never equal to any previously created token.
    pub fn new(name: impl Into<String>) -> Self {
        let name: String = name.into();
        Self {
            id: Uuid::new_v4(),
            name: Arc::from(name),
        }
    }

    /// Diagnostic name supplied at creation time.
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl PartialEq for Token {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Token {}

impl Hash for Token {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.id.hash(state);
    }
}

impl PartialOrd for Token {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Token {
    fn cmp(&self, other: &Self) -> Ordering {
        self.id.cmp(&other.id)
    }
}

impl Debug for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "Token({})", self.name)
    }
}

impl Display for Token {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.name)
    }
}

/// Token bound to the service type `T` it resolves to.
///
/// `fn() -> T` keeps the marker `Send + Sync` whatever `T` is.
pub struct TypedToken<T> {
    token: Token,
    _marker: PhantomData<fn() -> T>,
}

impl<T> TypedToken<T> {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            token: Token::new(name),
            _marker: PhantomData,
        }
    }

    /// Returns the untyped identity of this token.
    pub fn token(&self) -> &Token {
        &self.token
    }

    pub fn name(&self) -> &str {
        self.token.name()
    }
}

impl<T> Clone for TypedToken<T> {
    fn clone(&self) -> Self {
        Self {
            token: self.token.clone(),
            _marker: PhantomData,
        }
    }
}

impl<T> Debug for TypedToken<T> {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "TypedToken({})", self.token.name())
    }
}

impl<T> From<&TypedToken<T>> for Token {
    fn from(value: &TypedToken<T>) -> Self {
        value.token.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::{Token, TypedToken};
    use std::collections::BTreeSet;

    #[test]
    fn tokens_with_same_name_are_distinct() {
        let first = Token::new("app:service");
        let second = Token::new("app:service");
        assert_ne!(first, second);
        assert_eq!(first.name(), second.name());
    }

    #[test]
    fn clones_share_identity() {
        let token = Token::new("app:service");
        let clone = token.clone();
        assert_eq!(token, clone);

        let mut set = BTreeSet::new();
        set.insert(token);
        assert!(set.contains(&clone));
    }

    #[test]
    fn typed_token_erases_to_same_identity() {
        let typed = TypedToken::<String>::new("app:greeting");
        let erased: Token = (&typed).into();
        assert_eq!(&erased, typed.token());
        assert_eq!(typed.clone().token(), typed.token());
        assert_eq!(format!("{}", typed.token()), "app:greeting");
    }
}
