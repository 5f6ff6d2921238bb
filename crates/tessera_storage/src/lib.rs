//! Entity state, schema, and storage backends for Tessera.
//!
//! This crate provides:
//! - [`EntityState`] - Raw per-entity values with a lifecycle status
//! - [`EntityStateModel`] - Bootstrap-built schema addressing that state
//! - [`EntityStore`] - The contract a storage backend satisfies
//! - [`MemoryEntityStore`] - Versioned in-memory backend with structural sharing

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod memory;
pub mod schema;
pub mod state;
pub mod store;

pub use memory::{MemoryEntityStore, MemoryUnitOfWork};
pub use schema::{
    Accessor, AssociationDescriptor, Constraint, EntityStateModel, EntityStateModelBuilder,
    IDENTITY, IDENTITY_SLOT, NOT_NULL, PropertyDescriptor, StateKey,
};
pub use state::{EntityState, EntityStatus, ManyReferences, NamedReferences};
pub use store::{EntityStore, EntityStoreUnitOfWork, Usecase};
