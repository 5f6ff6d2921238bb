//! Core types for Tessera.
//!
//! This crate provides:
//! - [`EntityReference`] - Identity values naming entities
//! - [`QualifiedName`] and [`AccessorKind`] - Addressing of entity state
//! - [`Value`] and [`Type`] - Property values and their declared types
//! - [`Error`] - Error taxonomy with entity-graph context

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod name;
pub mod reference;
pub mod types;
pub mod value;

pub use error::{
    ConstraintViolations, Error, ErrorContext, ErrorKind, Result, SemanticLimit, Violation,
};
pub use name::{AccessorKind, QualifiedName};
pub use reference::EntityReference;
pub use types::Type;
pub use value::Value;
