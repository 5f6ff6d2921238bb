//! Integration tests for Layer 2: Runtime
//!
//! Tests for entity identity, lazy state, associations, aggregation,
//! constraints and units of work over the in-memory store.

mod aggregation;
mod constraints;
mod identity;
mod unit_of_work;
