//! Per-instance cache of typed state wrappers.

use std::cell::RefCell;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use log::trace;
use once_cell::unsync::OnceCell;
use tessera_foundation::{
    AccessorKind, EntityReference, Error, ErrorContext, ErrorKind, Result,
};
use tessera_storage::{Accessor, EntityState, EntityStateModel, EntityStatus, StateKey};

use crate::association::{AssociationInstance, ManyAssociationInstance, NamedAssociationInstance};
use crate::model::EntityModel;
use crate::property::PropertyInstance;
use crate::resolver::AssociationResolver;
use crate::unit_of_work::UnitOfWorkInner;

/// Raw state of one entity together with what is needed to guard access.
///
/// Shared by the entity and every wrapper built over its state.
pub(crate) struct StateHandle {
    pub(crate) reference: EntityReference,
    pub(crate) model: Arc<EntityModel>,
    pub(crate) state: RefCell<EntityState>,
    pub(crate) uow: Weak<UnitOfWorkInner>,
}

impl StateHandle {
    pub(crate) fn new(
        model: Arc<EntityModel>,
        state: EntityState,
        uow: Weak<UnitOfWorkInner>,
    ) -> Self {
        Self {
            reference: state.reference().clone(),
            model,
            state: RefCell::new(state),
            uow,
        }
    }

    /// Returns the owning unit of work if it is still open.
    pub(crate) fn scope(&self) -> Result<Rc<UnitOfWorkInner>> {
        let uow = self.uow.upgrade().ok_or_else(Error::scope_closed)?;
        uow.check_open()?;
        Ok(uow)
    }

    /// Like [`StateHandle::scope`], but also fails with `NotFound` once the
    /// entity has been removed.
    pub(crate) fn guard(&self) -> Result<Rc<UnitOfWorkInner>> {
        let uow = self.scope()?;
        if self.status() == EntityStatus::Removed {
            return Err(Error::not_found(self.reference.clone()));
        }
        Ok(uow)
    }

    pub(crate) fn status(&self) -> EntityStatus {
        self.state.borrow().status()
    }

    pub(crate) fn context(&self, accessor: &str) -> ErrorContext {
        ErrorContext::new()
            .with_entity(self.model.entity_type(), self.reference.clone())
            .with_accessor(accessor)
    }

    pub(crate) fn resolver(&self) -> AssociationResolver {
        AssociationResolver::new(self.uow.clone())
    }

    /// Attributes a constraint violation to this entity.
    ///
    /// Other errors pass through unchanged.
    pub(crate) fn attribute(&self, mut err: Error) -> Error {
        let ErrorKind::ConstraintViolation(violations) = &mut err.kind else {
            return err;
        };
        violations
            .entity_type
            .get_or_insert_with(|| self.model.entity_type().to_string());
        violations
            .reference
            .get_or_insert_with(|| self.reference.clone());
        let accessor = violations
            .violations
            .first()
            .map(|v| v.accessor.clone())
            .unwrap_or_default();
        err.with_context(self.context(&accessor))
    }
}

/// Accessor-keyed cache of wrappers over one entity's state.
///
/// Each wrapper is built on first access and the same wrapper is returned
/// for every later access.
pub struct EntityStateInstance {
    handle: Rc<StateHandle>,
    properties: Vec<OnceCell<Rc<PropertyInstance>>>,
    associations: Vec<OnceCell<Rc<AssociationInstance>>>,
    many_associations: Vec<OnceCell<Rc<ManyAssociationInstance>>>,
    named_associations: Vec<OnceCell<Rc<NamedAssociationInstance>>>,
}

fn slots<T>(len: usize) -> Vec<OnceCell<T>> {
    std::iter::repeat_with(OnceCell::new).take(len).collect()
}

impl EntityStateInstance {
    pub(crate) fn new(handle: Rc<StateHandle>) -> Self {
        let model = handle.model.state_model();
        Self {
            properties: slots(model.properties().len()),
            associations: slots(model.associations().len()),
            many_associations: slots(model.many_associations().len()),
            named_associations: slots(model.named_associations().len()),
            handle,
        }
    }

    /// Returns the reference of the entity owning this state.
    #[must_use]
    pub fn reference(&self) -> &EntityReference {
        &self.handle.reference
    }

    /// Returns the state model describing every accessor.
    #[must_use]
    pub fn state_model(&self) -> &EntityStateModel {
        self.handle.model.state_model()
    }

    fn wrapper<T>(
        &self,
        cells: &[OnceCell<Rc<T>>],
        accessor: Accessor,
        build: impl FnOnce(Rc<StateHandle>, usize) -> T,
    ) -> Rc<T> {
        Rc::clone(cells[accessor.slot].get_or_init(|| {
            trace!("{}: materialising {accessor}", self.handle.reference);
            Rc::new(build(Rc::clone(&self.handle), accessor.slot))
        }))
    }

    /// Returns the property wrapper for a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccessor` or `AccessorKindMismatch` if the key does
    /// not name a property.
    pub fn property<K: StateKey + ?Sized>(&self, key: &K) -> Result<Rc<PropertyInstance>> {
        let accessor = self.state_model().accessor(key, AccessorKind::Property)?;
        Ok(self.wrapper(&self.properties, accessor, PropertyInstance::new))
    }

    /// Returns the association wrapper for a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccessor` or `AccessorKindMismatch` if the key does
    /// not name a single association.
    pub fn association<K: StateKey + ?Sized>(&self, key: &K) -> Result<Rc<AssociationInstance>> {
        let accessor = self.state_model().accessor(key, AccessorKind::Association)?;
        Ok(self.wrapper(&self.associations, accessor, AssociationInstance::new))
    }

    /// Returns the many-association wrapper for a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccessor` or `AccessorKindMismatch` if the key does
    /// not name a many-association.
    pub fn many_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Rc<ManyAssociationInstance>> {
        let accessor = self
            .state_model()
            .accessor(key, AccessorKind::ManyAssociation)?;
        Ok(self.wrapper(&self.many_associations, accessor, ManyAssociationInstance::new))
    }

    /// Returns the named-association wrapper for a key.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccessor` or `AccessorKindMismatch` if the key does
    /// not name a named association.
    pub fn named_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Rc<NamedAssociationInstance>> {
        let accessor = self
            .state_model()
            .accessor(key, AccessorKind::NamedAssociation)?;
        Ok(self.wrapper(&self.named_associations, accessor, NamedAssociationInstance::new))
    }

    /// Validates every property and single association against its
    /// declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` listing every violation, attributed to
    /// the owning entity. Returns `ScopeClosed` or `NotFound` if the state
    /// can no longer be read.
    pub fn check_constraints(&self) -> Result<()> {
        let mut violations = Vec::new();
        for slot in 0..self.properties.len() {
            let accessor = Accessor::new(AccessorKind::Property, slot);
            violations.extend(self.property(&accessor)?.violations()?);
        }
        for slot in 0..self.associations.len() {
            let accessor = Accessor::new(AccessorKind::Association, slot);
            violations.extend(self.association(&accessor)?.violations()?);
        }
        if violations.is_empty() {
            Ok(())
        } else {
            Err(self.handle.attribute(Error::constraint_violation(violations)))
        }
    }
}

impl fmt::Debug for EntityStateInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityStateInstance")
            .field("entity_type", &self.handle.model.entity_type())
            .field("reference", &self.handle.reference)
            .finish_non_exhaustive()
    }
}
