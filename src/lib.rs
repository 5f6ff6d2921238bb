//! Tessera - Entity persistence core
//!
//! This crate re-exports all layers of the Tessera system for convenient access.
//! For detailed documentation, see the individual layer crates.
//!
//! # Architecture
//!
//! ```text
//! Layer 2: tessera_runtime    — Entity models, instances, associations, units of work
//! Layer 1: tessera_storage    — Entity state, schema model, store SPI, memory store
//! Layer 0: tessera_foundation — Core types (Value, EntityReference, Error)
//! ```

pub use tessera_foundation as foundation;
pub use tessera_runtime as runtime;
pub use tessera_storage as storage;
