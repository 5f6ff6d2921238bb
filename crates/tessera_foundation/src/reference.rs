//! Entity references: the identity value naming an entity.
//!
//! A reference is independent of any loaded state. Two references with the
//! same identity string are interchangeable regardless of where they came from.

use std::fmt;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Immutable identity value naming one entity.
///
/// Equality, ordering and hashing are defined solely by the identity string.
/// Cloning is O(1).
#[derive(Clone, Eq, PartialEq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize), serde(transparent))]
pub struct EntityReference(Arc<str>);

impl EntityReference {
    /// Creates a reference from an identity string.
    ///
    /// No validation is performed; use [`EntityReference::parse`] for
    /// identities coming from outside the process.
    #[must_use]
    pub fn new(identity: impl Into<Arc<str>>) -> Self {
        Self(identity.into())
    }

    /// Parses an identity string into a reference.
    ///
    /// # Errors
    ///
    /// Returns `InvalidReference` if the identity is empty or contains
    /// whitespace.
    pub fn parse(identity: &str) -> Result<Self> {
        if identity.is_empty() || identity.chars().any(char::is_whitespace) {
            return Err(Error::invalid_reference(identity));
        }
        Ok(Self::new(identity))
    }

    /// Generates a fresh, random reference.
    #[must_use]
    pub fn generate() -> Self {
        Self::new(uuid::Uuid::new_v4().to_string())
    }

    /// Generates a fresh, random reference with the given prefix.
    #[must_use]
    pub fn generate_with_prefix(prefix: &str) -> Self {
        Self::new(format!("{prefix}{}", uuid::Uuid::new_v4()))
    }

    /// Returns the identity string.
    #[must_use]
    pub fn identity(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityReference({})", self.0)
    }
}

impl fmt::Display for EntityReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for EntityReference {
    fn from(identity: &str) -> Self {
        Self::new(identity)
    }
}

impl From<String> for EntityReference {
    fn from(identity: String) -> Self {
        Self::new(identity)
    }
}

impl AsRef<str> for EntityReference {
    fn as_ref(&self) -> &str {
        &self.0
    }
}
