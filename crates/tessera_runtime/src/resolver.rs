//! Lazy association resolution.

use std::fmt;
use std::rc::Weak;

use tessera_foundation::{EntityReference, Error, Result};

use crate::instance::Entity;
use crate::unit_of_work::UnitOfWorkInner;

/// Turns references into entities within one unit of work.
///
/// Resolution goes through the unit of work's identity map, so two
/// associations pointing at the same reference yield the same instance.
#[derive(Clone)]
pub struct AssociationResolver {
    uow: Weak<UnitOfWorkInner>,
}

impl AssociationResolver {
    pub(crate) fn new(uow: Weak<UnitOfWorkInner>) -> Self {
        Self { uow }
    }

    /// Resolves a reference, requiring the entity to be of `expected_type`.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is gone or closed,
    /// `NotFound` if the entity does not exist or has been removed, and
    /// `NoSuchEntityType` if it is not of the expected type.
    pub fn resolve(&self, reference: &EntityReference, expected_type: &str) -> Result<Entity> {
        let uow = self.uow.upgrade().ok_or_else(Error::scope_closed)?;
        uow.get(reference, Some(expected_type))
    }
}

impl fmt::Debug for AssociationResolver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.uow.upgrade() {
            Some(uow) => write!(f, "AssociationResolver({})", uow.usecase()),
            None => write!(f, "AssociationResolver(closed)"),
        }
    }
}
