//! Storage backend contract.
//!
//! A backend hands out one [`EntityStoreUnitOfWork`] per transactional scope.
//! States checked out through it are owned by that scope until the scope
//! applies its changes or discards them.

use std::fmt;
use std::sync::Arc;

use tessera_foundation::{EntityReference, Result};

use crate::schema::EntityStateModel;
use crate::state::EntityState;

/// Label describing why a unit of work was opened.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Usecase {
    name: Arc<str>,
}

impl Usecase {
    /// Creates a usecase with the given name.
    #[must_use]
    pub fn new(name: impl Into<Arc<str>>) -> Self {
        Self { name: name.into() }
    }

    /// Returns the usecase name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }
}

impl Default for Usecase {
    fn default() -> Self {
        Self::new("default")
    }
}

impl fmt::Display for Usecase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}

impl From<&str> for Usecase {
    fn from(name: &str) -> Self {
        Self::new(name)
    }
}

/// A storage backend shared by every unit of work of a module.
pub trait EntityStore: Send + Sync {
    /// Opens the backend side of a new unit of work.
    fn new_unit_of_work(&self, usecase: &Usecase) -> Box<dyn EntityStoreUnitOfWork>;
}

/// The backend side of one unit of work.
pub trait EntityStoreUnitOfWork {
    /// Creates empty `New` state for a fresh identity.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` if the identity is stored or already pending,
    /// or `Storage` for backend failures.
    fn new_entity_state(
        &mut self,
        reference: &EntityReference,
        model: &EntityStateModel,
    ) -> Result<EntityState>;

    /// Checks out stored state for a reference.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if nothing is stored under the reference, or
    /// `Storage` for backend failures.
    fn entity_state_of(&mut self, reference: &EntityReference) -> Result<EntityState>;

    /// Writes back every changed state atomically.
    ///
    /// States with status `Removed` are deleted; `New` and `Updated` states
    /// are stored. `Loaded` states are ignored.
    ///
    /// # Errors
    ///
    /// Returns `ConcurrentModification` if another unit of work changed any
    /// of the states since they were checked out. Nothing is written then.
    fn apply_changes(&mut self, changes: Vec<EntityState>) -> Result<()>;

    /// Releases everything checked out without writing.
    fn discard(&mut self);
}
