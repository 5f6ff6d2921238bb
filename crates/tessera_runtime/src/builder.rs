//! Builders for new entities.

use std::fmt;

use log::trace;
use tessera_foundation::{EntityReference, Result};

use crate::instance::Entity;

/// A new entity under construction.
///
/// The prototype can be written like any entity, immutable properties
/// included, but it is not visible through its unit of work until
/// [`EntityBuilder::new_instance`] succeeds.
pub struct EntityBuilder {
    prototype: Entity,
}

impl EntityBuilder {
    pub(crate) fn new(prototype: Entity) -> Self {
        Self { prototype }
    }

    /// Returns the identity the entity will have.
    #[must_use]
    pub fn reference(&self) -> &EntityReference {
        self.prototype.reference()
    }

    /// Returns the entity under construction.
    #[must_use]
    pub fn prototype(&self) -> &Entity {
        &self.prototype
    }

    /// Finishes construction: runs creation hooks, checks constraints and
    /// registers the entity with its unit of work.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open,
    /// `ConstraintViolation` if the prototype is invalid, `AlreadyExists` if
    /// the identity was taken meanwhile, and whatever a creation hook returns.
    pub fn new_instance(self) -> Result<Entity> {
        let scope = self.prototype.scope()?;
        self.prototype
            .model()
            .invoke_lifecycle(true, &self.prototype)?;
        self.prototype.check_constraints()?;
        scope.register(&self.prototype)?;
        trace!("built {}", self.prototype);
        Ok(self.prototype)
    }
}

impl fmt::Debug for EntityBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntityBuilder({})", self.prototype)
    }
}
