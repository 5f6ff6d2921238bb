//! Type descriptors for property declarations.

use std::fmt;

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::value::Value;

/// Declared type of an entity property.
///
/// Used to validate property writes and to produce initial values for
/// properties declared with "use defaults".
#[derive(Clone, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Type {
    /// The nil type (only value: nil).
    Nil,
    /// Boolean type.
    Bool,
    /// 64-bit signed integer.
    Int,
    /// 64-bit floating point.
    Float,
    /// String type.
    String,
    /// Homogeneous list type.
    List(Box<Type>),
    /// String-keyed map with homogeneous values.
    Map(Box<Type>),
    /// Any type (accepts any value).
    Any,
}

impl Type {
    /// Creates a list type with the given element type.
    #[must_use]
    pub fn list(element: Type) -> Self {
        Self::List(Box::new(element))
    }

    /// Creates a map type with the given value type.
    #[must_use]
    pub fn map(value: Type) -> Self {
        Self::Map(Box::new(value))
    }

    /// Returns true if this type is `Any`.
    #[must_use]
    pub const fn is_any(&self) -> bool {
        matches!(self, Self::Any)
    }

    /// Checks whether a value may be stored under this type.
    ///
    /// - `Any` and `Nil` values are always accepted; nullability is a
    ///   property of the declaration, not of the type
    /// - `Float` accepts `Int` (numeric promotion)
    /// - Lists and maps check their elements recursively
    #[must_use]
    pub fn accepts(&self, value: &Value) -> bool {
        if self.is_any() || value.is_nil() {
            return true;
        }

        match (self, value) {
            (Self::Bool, Value::Bool(_))
            | (Self::Int | Self::Float, Value::Int(_))
            | (Self::Float, Value::Float(_))
            | (Self::String, Value::String(_)) => true,
            (Self::List(element), Value::List(items)) => {
                element.is_any() || items.iter().all(|item| element.accepts(item))
            }
            (Self::Map(element), Value::Map(entries)) => {
                element.is_any() || entries.values().all(|item| element.accepts(item))
            }
            _ => false,
        }
    }

    /// Returns the initial value used when a declaration asks for defaults.
    #[must_use]
    pub fn default_value(&self) -> Value {
        match self {
            Self::Nil | Self::Any => Value::Nil,
            Self::Bool => Value::Bool(false),
            Self::Int => Value::Int(0),
            Self::Float => Value::Float(0.0),
            Self::String => Value::from(""),
            Self::List(_) => Value::List(im::Vector::new()),
            Self::Map(_) => Value::Map(im::OrdMap::new()),
        }
    }
}

impl fmt::Debug for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Nil => write!(f, "nil"),
            Self::Bool => write!(f, "bool"),
            Self::Int => write!(f, "int"),
            Self::Float => write!(f, "float"),
            Self::String => write!(f, "string"),
            Self::List(t) => write!(f, "list<{t:?}>"),
            Self::Map(t) => write!(f, "map<{t:?}>"),
            Self::Any => write!(f, "any"),
        }
    }
}

impl fmt::Display for Type {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}
