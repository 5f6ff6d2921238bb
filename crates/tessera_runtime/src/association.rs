//! Association wrappers.
//!
//! All three kinds store references in the entity's state and resolve them
//! to entities only when asked, through the owning unit of work.

use std::fmt;
use std::rc::Rc;

use tessera_foundation::{EntityReference, Error, Result, Violation};
use tessera_storage::AssociationDescriptor;

use crate::instance::Entity;
use crate::state_instance::StateHandle;

fn check_target(handle: &StateHandle, descriptor: &AssociationDescriptor, entity: &Entity) -> Result<()> {
    if entity.is_removed() {
        return Err(Error::not_found(entity.reference().clone()));
    }
    if !entity.model().is_type(descriptor.target_type()) {
        return Err(Error::no_such_entity_type(descriptor.target_type())
            .with_context(handle.context(descriptor.name())));
    }
    Ok(())
}

fn debug_wrapper(
    f: &mut fmt::Formatter<'_>,
    kind: &str,
    handle: &StateHandle,
    descriptor: &AssociationDescriptor,
) -> fmt::Result {
    write!(
        f,
        "{kind}({} {}.{} -> {})",
        handle.model.entity_type(),
        handle.reference,
        descriptor.name(),
        descriptor.target_type()
    )
}

/// Single-valued reference to another entity.
pub struct AssociationInstance {
    handle: Rc<StateHandle>,
    slot: usize,
}

impl AssociationInstance {
    pub(crate) fn new(handle: Rc<StateHandle>, slot: usize) -> Self {
        Self { handle, slot }
    }

    /// Returns the association's declaration.
    #[must_use]
    pub fn descriptor(&self) -> &AssociationDescriptor {
        &self.handle.model.state_model().associations()[self.slot]
    }

    /// Returns the reference currently stored, without resolving it.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open, or
    /// `NotFound` if the owning entity has been removed.
    pub fn reference(&self) -> Result<Option<EntityReference>> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .association_value_of(self.descriptor().qualified_name()))
    }

    /// Resolves the referenced entity through the owning unit of work.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the referenced entity does not exist or has been
    /// removed, and the errors of [`AssociationInstance::reference`].
    pub fn get(&self) -> Result<Option<Entity>> {
        match self.reference()? {
            Some(reference) => self
                .handle
                .resolver()
                .resolve(&reference, self.descriptor().target_type())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Points the association at an entity, or clears it.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEntityType` if the entity is not of the target type,
    /// `NotFound` if it has been removed, and the errors of
    /// [`AssociationInstance::reference`].
    pub fn set(&self, entity: Option<&Entity>) -> Result<()> {
        self.handle.guard()?;
        if let Some(entity) = entity {
            check_target(&self.handle, self.descriptor(), entity)?;
        }
        self.set_reference(entity.map(|e| e.reference().clone()))
    }

    /// Stores a raw reference without checking what it points at.
    ///
    /// # Errors
    ///
    /// See [`AssociationInstance::reference`].
    pub fn set_reference(&self, reference: Option<EntityReference>) -> Result<()> {
        self.handle.guard()?;
        self.handle
            .state
            .borrow_mut()
            .set_association_value(self.descriptor().qualified_name(), reference)
    }

    /// Returns every violation the current reference causes.
    ///
    /// # Errors
    ///
    /// See [`AssociationInstance::reference`].
    pub fn violations(&self) -> Result<Vec<Violation>> {
        Ok(self.descriptor().violations(self.reference()?.as_ref()))
    }

    /// Validates the current reference against the declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` if a required association is absent.
    pub fn check_constraints(&self) -> Result<()> {
        let violations = self.violations()?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::constraint_violation(violations))
        }
    }
}

impl fmt::Debug for AssociationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_wrapper(f, "AssociationInstance", &self.handle, self.descriptor())
    }
}

/// Ordered list of references without duplicates.
pub struct ManyAssociationInstance {
    handle: Rc<StateHandle>,
    slot: usize,
}

impl ManyAssociationInstance {
    pub(crate) fn new(handle: Rc<StateHandle>, slot: usize) -> Self {
        Self { handle, slot }
    }

    /// Returns the association's declaration.
    #[must_use]
    pub fn descriptor(&self) -> &AssociationDescriptor {
        &self.handle.model.state_model().many_associations()[self.slot]
    }

    /// Returns the stored references in order.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open, or
    /// `NotFound` if the owning entity has been removed.
    pub fn references(&self) -> Result<Vec<EntityReference>> {
        self.handle.guard()?;
        let state = self.handle.state.borrow();
        Ok(state
            .many_association_value_of(self.descriptor().qualified_name())
            .iter()
            .cloned()
            .collect())
    }

    /// Returns the number of references.
    ///
    /// # Errors
    ///
    /// See [`ManyAssociationInstance::references`].
    pub fn count(&self) -> Result<usize> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .many_association_value_of(self.descriptor().qualified_name())
            .len())
    }

    /// Returns true if the entity is in the list.
    ///
    /// # Errors
    ///
    /// See [`ManyAssociationInstance::references`].
    pub fn contains(&self, entity: &Entity) -> Result<bool> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .many_association_value_of(self.descriptor().qualified_name())
            .contains(entity.reference()))
    }

    /// Inserts an entity at `index`, clamped to the list length.
    ///
    /// Returns false if the entity is already in the list.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEntityType` if the entity is not of the target type,
    /// `NotFound` if it has been removed, and the errors of
    /// [`ManyAssociationInstance::references`].
    pub fn add(&self, index: usize, entity: &Entity) -> Result<bool> {
        self.handle.guard()?;
        check_target(&self.handle, self.descriptor(), entity)?;
        let reference = entity.reference().clone();
        self.handle
            .state
            .borrow_mut()
            .update_many_association_value(self.descriptor().qualified_name(), |list| {
                list.add(index, reference)
            })
    }

    /// Appends an entity. Returns false if it is already in the list.
    ///
    /// # Errors
    ///
    /// See [`ManyAssociationInstance::add`].
    pub fn push(&self, entity: &Entity) -> Result<bool> {
        self.add(usize::MAX, entity)
    }

    /// Removes an entity. Returns false if it was not in the list.
    ///
    /// # Errors
    ///
    /// See [`ManyAssociationInstance::references`].
    pub fn remove(&self, entity: &Entity) -> Result<bool> {
        self.handle.guard()?;
        self.handle
            .state
            .borrow_mut()
            .update_many_association_value(self.descriptor().qualified_name(), |list| {
                list.remove(entity.reference())
            })
    }

    /// Resolves the entity at `index`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the referenced entity does not exist, and the
    /// errors of [`ManyAssociationInstance::references`].
    pub fn get(&self, index: usize) -> Result<Option<Entity>> {
        self.handle.guard()?;
        let reference = self
            .handle
            .state
            .borrow()
            .many_association_value_of(self.descriptor().qualified_name())
            .get(index)
            .cloned();
        match reference {
            Some(reference) => self
                .handle
                .resolver()
                .resolve(&reference, self.descriptor().target_type())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Resolves every entity in order.
    ///
    /// # Errors
    ///
    /// See [`ManyAssociationInstance::get`].
    pub fn to_list(&self) -> Result<Vec<Entity>> {
        let resolver = self.handle.resolver();
        let target = self.descriptor().target_type();
        self.references()?
            .iter()
            .map(|reference| resolver.resolve(reference, target))
            .collect()
    }
}

impl fmt::Debug for ManyAssociationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_wrapper(f, "ManyAssociationInstance", &self.handle, self.descriptor())
    }
}

/// Insertion-ordered map of names to references.
pub struct NamedAssociationInstance {
    handle: Rc<StateHandle>,
    slot: usize,
}

impl NamedAssociationInstance {
    pub(crate) fn new(handle: Rc<StateHandle>, slot: usize) -> Self {
        Self { handle, slot }
    }

    /// Returns the association's declaration.
    #[must_use]
    pub fn descriptor(&self) -> &AssociationDescriptor {
        &self.handle.model.state_model().named_associations()[self.slot]
    }

    /// Returns the number of entries.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open, or
    /// `NotFound` if the owning entity has been removed.
    pub fn count(&self) -> Result<usize> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .named_association_value_of(self.descriptor().qualified_name())
            .len())
    }

    /// Returns true if an entry exists under `name`.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::count`].
    pub fn contains_name(&self, name: &str) -> Result<bool> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .named_association_value_of(self.descriptor().qualified_name())
            .contains_name(name))
    }

    /// Returns the names in insertion order.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::count`].
    pub fn names(&self) -> Result<Vec<String>> {
        self.handle.guard()?;
        let state = self.handle.state.borrow();
        Ok(state
            .named_association_value_of(self.descriptor().qualified_name())
            .names()
            .map(String::from)
            .collect())
    }

    /// Returns the reference stored under `name`, without resolving it.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::count`].
    pub fn reference(&self, name: &str) -> Result<Option<EntityReference>> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .named_association_value_of(self.descriptor().qualified_name())
            .get(name)
            .cloned())
    }

    /// Returns every `(name, reference)` entry in insertion order.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::count`].
    pub fn references(&self) -> Result<Vec<(String, EntityReference)>> {
        self.handle.guard()?;
        let state = self.handle.state.borrow();
        Ok(state
            .named_association_value_of(self.descriptor().qualified_name())
            .iter()
            .map(|(name, reference)| (name.to_string(), reference.clone()))
            .collect())
    }

    /// Stores an entity under `name`.
    ///
    /// An existing entry keeps its position and gets the new entity. Returns
    /// false if the entry already held this entity.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEntityType` if the entity is not of the target type,
    /// `NotFound` if it has been removed, and the errors of
    /// [`NamedAssociationInstance::count`].
    pub fn put(&self, name: &str, entity: &Entity) -> Result<bool> {
        self.handle.guard()?;
        check_target(&self.handle, self.descriptor(), entity)?;
        let reference = entity.reference().clone();
        self.handle
            .state
            .borrow_mut()
            .update_named_association_value(self.descriptor().qualified_name(), |map| {
                map.put(name, reference)
            })
    }

    /// Removes the entry under `name`. Returns false if there was none.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::count`].
    pub fn remove(&self, name: &str) -> Result<bool> {
        self.handle.guard()?;
        self.handle
            .state
            .borrow_mut()
            .update_named_association_value(self.descriptor().qualified_name(), |map| {
                map.remove(name)
            })
    }

    /// Resolves the entity stored under `name`.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the referenced entity does not exist, and the
    /// errors of [`NamedAssociationInstance::count`].
    pub fn get(&self, name: &str) -> Result<Option<Entity>> {
        match self.reference(name)? {
            Some(reference) => self
                .handle
                .resolver()
                .resolve(&reference, self.descriptor().target_type())
                .map(Some),
            None => Ok(None),
        }
    }

    /// Resolves every entry in insertion order.
    ///
    /// # Errors
    ///
    /// See [`NamedAssociationInstance::get`].
    pub fn to_map(&self) -> Result<Vec<(String, Entity)>> {
        let resolver = self.handle.resolver();
        let target = self.descriptor().target_type();
        self.references()?
            .into_iter()
            .map(|(name, reference)| Ok((name, resolver.resolve(&reference, target)?)))
            .collect()
    }
}

impl fmt::Debug for NamedAssociationInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        debug_wrapper(f, "NamedAssociationInstance", &self.handle, self.descriptor())
    }
}
