//! Qualified state names and accessor kinds.
//!
//! Every property and association of an entity type is addressed in
//! storage by a [`QualifiedName`] of the form `TypeName:name`.

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// The four kinds of state an entity type can declare.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum AccessorKind {
    /// A single typed value.
    Property,
    /// A single, possibly absent, reference to another entity.
    Association,
    /// An ordered list of references.
    ManyAssociation,
    /// An insertion-ordered map of name to reference.
    NamedAssociation,
}

impl fmt::Display for AccessorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Property => "property",
            Self::Association => "association",
            Self::ManyAssociation => "many-association",
            Self::NamedAssociation => "named-association",
        };
        f.write_str(name)
    }
}

/// Fully qualified name of a piece of entity state.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct QualifiedName {
    type_name: Arc<str>,
    name: Arc<str>,
}

impl QualifiedName {
    /// Creates a qualified name from its declaring type and bare name.
    #[must_use]
    pub fn new(type_name: impl Into<Arc<str>>, name: impl Into<Arc<str>>) -> Self {
        Self {
            type_name: type_name.into(),
            name: name.into(),
        }
    }

    /// Returns the declaring type name.
    #[must_use]
    pub fn type_name(&self) -> &str {
        &self.type_name
    }

    /// Returns the bare name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl FromStr for QualifiedName {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.rsplit_once(':') {
            Some((type_name, name)) if !type_name.is_empty() && !name.is_empty() => {
                Ok(Self::new(type_name, name))
            }
            _ => Err(Error::invalid_schema(format!(
                "malformed qualified name: {s:?}"
            ))),
        }
    }
}

impl fmt::Debug for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "QualifiedName({}:{})", self.type_name, self.name)
    }
}

impl fmt::Display for QualifiedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.type_name, self.name)
    }
}
