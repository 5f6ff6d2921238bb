//! Integration tests for Layer 1: Storage
//!
//! Tests for entity state, the schema model and the in-memory store.
