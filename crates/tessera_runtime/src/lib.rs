//! Entity models, instances, lazy associations and units of work for Tessera.
//!
//! This crate provides:
//! - [`EntityModule`] - Bootstrap-built registry of entity models bound to a store
//! - [`EntityModel`] - Per-type factory with method table and lifecycle hooks
//! - [`UnitOfWork`] - Transactional scope with an identity map
//! - [`Entity`] - Identity-bound handle with lazily built state wrappers
//! - [`AssociationResolver`] - Lazy reference resolution within a unit of work

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]

pub mod association;
pub mod builder;
pub mod config;
pub mod instance;
pub mod model;
pub mod module;
pub mod property;
pub mod resolver;
pub mod state_instance;
pub mod unit_of_work;

pub use association::{AssociationInstance, ManyAssociationInstance, NamedAssociationInstance};
pub use builder::EntityBuilder;
pub use config::UnitOfWorkConfig;
pub use instance::{Entity, EntityInstance, EntityView};
pub use model::{EntityModel, EntityModelBuilder, Lifecycle, Method, MethodFn};
pub use module::{EntityModule, ModuleBuilder};
pub use property::PropertyInstance;
pub use resolver::AssociationResolver;
pub use state_instance::EntityStateInstance;
pub use unit_of_work::{UnitOfWork, UnitOfWorkCallback, UnitOfWorkStatus};

#[cfg(test)]
mod test_support;
