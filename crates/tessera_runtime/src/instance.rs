//! Entity instances: identity-bound handles to entity state.
//!
//! An [`Entity`] is what clients hold. It binds one [`EntityReference`] to
//! its state, its [`EntityModel`] and the unit of work that loaded it. The
//! typed state wrappers are built lazily on first access and dropped when
//! the entity is removed.
//!
//! Equality and hashing only look at the reference: two handles for the
//! same identity are equal even when they were allocated separately.

use std::cell::RefCell;
use std::collections::HashSet;
use std::fmt;
use std::hash::{Hash, Hasher};
use std::ops::Deref;
use std::rc::Rc;
use std::sync::Arc;

use log::trace;
use tessera_foundation::{EntityReference, Error, Result, Value};
use tessera_storage::{EntityState, EntityStatus, StateKey};

use crate::association::{AssociationInstance, ManyAssociationInstance, NamedAssociationInstance};
use crate::model::EntityModel;
use crate::property::PropertyInstance;
use crate::state_instance::{EntityStateInstance, StateHandle};
use crate::unit_of_work::UnitOfWorkInner;

/// A typed view of an entity.
///
/// Implement this for a wrapper struct to get a strongly typed facade over
/// an entity whose model declares [`EntityView::TYPE`].
pub trait EntityView: Sized {
    /// The type name the entity's model must declare.
    const TYPE: &'static str;

    /// Wraps an entity already known to be of [`EntityView::TYPE`].
    fn from_entity(entity: Entity) -> Self;

    /// Returns the wrapped entity.
    fn entity(&self) -> &Entity;
}

/// State shared by every handle to one entity within one unit of work.
pub struct EntityInstance {
    handle: Rc<StateHandle>,
    state_instance: RefCell<Option<Rc<EntityStateInstance>>>,
}

impl EntityInstance {
    pub(crate) fn new(handle: Rc<StateHandle>) -> Self {
        Self {
            handle,
            state_instance: RefCell::new(None),
        }
    }

    /// Returns the entity's reference.
    #[must_use]
    pub fn reference(&self) -> &EntityReference {
        &self.handle.reference
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.handle.model.entity_type()
    }

    /// Returns the entity's model.
    #[must_use]
    pub fn model(&self) -> &Arc<EntityModel> {
        &self.handle.model
    }

    /// Returns the lifecycle status of the underlying state.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.handle.status()
    }

    /// Returns true once the entity has been removed.
    #[must_use]
    pub fn is_removed(&self) -> bool {
        self.status() == EntityStatus::Removed
    }

    /// Returns true if the state wrappers have been built.
    #[must_use]
    pub fn is_materialized(&self) -> bool {
        self.state_instance.borrow().is_some()
    }

    /// Returns the entity's state wrappers, building them on first use.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open, or
    /// `NotFound` if the entity has been removed.
    pub fn state(&self) -> Result<Rc<EntityStateInstance>> {
        self.handle.guard()?;
        if let Some(state) = self.state_instance.borrow().as_ref() {
            return Ok(Rc::clone(state));
        }
        trace!("materialising {} {}", self.entity_type(), self.reference());
        let state = Rc::new(EntityStateInstance::new(Rc::clone(&self.handle)));
        *self.state_instance.borrow_mut() = Some(Rc::clone(&state));
        Ok(state)
    }

    /// Returns a property wrapper.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::state`] and [`EntityStateInstance::property`].
    pub fn property<K: StateKey + ?Sized>(&self, key: &K) -> Result<Rc<PropertyInstance>> {
        self.state()?.property(key)
    }

    /// Returns a single association wrapper.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::state`] and [`EntityStateInstance::association`].
    pub fn association<K: StateKey + ?Sized>(&self, key: &K) -> Result<Rc<AssociationInstance>> {
        self.state()?.association(key)
    }

    /// Returns a many-association wrapper.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::state`] and [`EntityStateInstance::many_association`].
    pub fn many_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Rc<ManyAssociationInstance>> {
        self.state()?.many_association(key)
    }

    /// Returns a named-association wrapper.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::state`] and [`EntityStateInstance::named_association`].
    pub fn named_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<Rc<NamedAssociationInstance>> {
        self.state()?.named_association(key)
    }

    /// Reads a property value by name.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::property`] and [`PropertyInstance::get`].
    pub fn get(&self, property: &str) -> Result<Value> {
        self.property(property)?.get()
    }

    /// Writes a property value by name.
    ///
    /// # Errors
    ///
    /// See [`EntityInstance::property`] and [`PropertyInstance::set`].
    pub fn set(&self, property: &str, value: impl Into<Value>) -> Result<()> {
        self.property(property)?.set(value)
    }

    /// Validates every property and single association.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` carrying this entity's type and
    /// reference together with every violation found.
    pub fn check_constraints(&self) -> Result<()> {
        self.state()?.check_constraints()
    }

    pub(crate) fn snapshot(&self) -> EntityState {
        self.handle.state.borrow().clone()
    }

    /// Marks the state removed and drops the wrapper cache.
    ///
    /// A state a removal hook already removed is left alone.
    pub(crate) fn mark_removed(&self) -> Result<()> {
        if self.is_removed() {
            return Ok(());
        }
        self.handle.state.borrow_mut().remove()?;
        self.state_instance.replace(None);
        trace!("removed {} {}", self.entity_type(), self.reference());
        Ok(())
    }

    pub(crate) fn scope(&self) -> Result<Rc<UnitOfWorkInner>> {
        self.handle.guard()
    }

    pub(crate) fn belongs_to(&self, uow: &UnitOfWorkInner) -> bool {
        std::ptr::eq(self.handle.uow.as_ptr(), uow)
    }

    /// References held through aggregated associations of every kind,
    /// deduplicated, paired with the declared target type.
    fn aggregated_references(&self) -> Vec<(String, EntityReference)> {
        let model = self.handle.model.state_model();
        let state = self.handle.state.borrow();
        let mut seen = HashSet::new();
        let mut closure = Vec::new();
        let mut visit = |target: &str, reference: &EntityReference| {
            if seen.insert(reference.clone()) {
                closure.push((target.to_string(), reference.clone()));
            }
        };

        for association in model.associations().iter().filter(|a| a.is_aggregated()) {
            if let Some(reference) = state.association_value_of(association.qualified_name()) {
                visit(association.target_type(), &reference);
            }
        }
        for association in model.many_associations().iter().filter(|a| a.is_aggregated()) {
            for reference in state
                .many_association_value_of(association.qualified_name())
                .iter()
            {
                visit(association.target_type(), reference);
            }
        }
        for association in model.named_associations().iter().filter(|a| a.is_aggregated()) {
            for (_, reference) in state
                .named_association_value_of(association.qualified_name())
                .iter()
            {
                visit(association.target_type(), reference);
            }
        }
        closure
    }
}

impl PartialEq for EntityInstance {
    fn eq(&self, other: &Self) -> bool {
        self.reference() == other.reference()
    }
}

impl Eq for EntityInstance {}

impl Hash for EntityInstance {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.reference().hash(state);
    }
}

/// Client handle to an entity. Cloning is cheap.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct Entity(Rc<EntityInstance>);

impl Entity {
    pub(crate) fn new(instance: EntityInstance) -> Self {
        Self(Rc::new(instance))
    }

    /// Returns true if both handles share the same in-memory instance.
    #[must_use]
    pub fn ptr_eq(this: &Self, other: &Self) -> bool {
        Rc::ptr_eq(&this.0, &other.0)
    }

    /// Invokes a method from the entity's method table.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` if no mixin provides the method, the errors of
    /// [`EntityInstance::state`], and whatever the method returns.
    pub fn invoke(&self, method: &str, args: &[Value]) -> Result<Value> {
        self.handle.guard()?;
        let method = self.model().method(method)?;
        trace!(
            "invoking {}::{} on {}",
            method.mixin(),
            method.name(),
            self.reference()
        );
        method.call(self, args)
    }

    /// Returns a typed view of this entity.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEntityType` if the model does not declare the view's
    /// type.
    pub fn view<V: EntityView>(&self) -> Result<V> {
        if self.model().is_type(V::TYPE) {
            Ok(V::from_entity(self.clone()))
        } else {
            Err(Error::no_such_entity_type(V::TYPE))
        }
    }

    /// Collects this entity and, depth first, every entity it aggregates.
    ///
    /// References already in `visited` are skipped, so shared children and
    /// aggregation cycles are collected once. Nothing is modified.
    pub(crate) fn collect_aggregate(
        &self,
        uow: &UnitOfWorkInner,
        depth: usize,
        visited: &mut HashSet<EntityReference>,
        closure: &mut Vec<Entity>,
    ) -> Result<()> {
        self.state()?;
        uow.check_cascade_depth(self, depth)?;
        visited.insert(self.reference().clone());
        closure.push(self.clone());

        for (target_type, reference) in self.aggregated_references() {
            if visited.contains(&reference) {
                continue;
            }
            trace!(
                "{}: cascading removal from {} to {reference}",
                uow.usecase(),
                self.reference()
            );
            let frame = || format!("removing {} {}", self.entity_type(), self.reference());
            let child = uow
                .get(&reference, Some(&target_type))
                .map_err(|err| err.with_frame(frame()))?;
            child
                .collect_aggregate(uow, depth + 1, visited, closure)
                .map_err(|err| err.with_frame(frame()))?;
        }
        Ok(())
    }
}

impl Deref for Entity {
    type Target = EntityInstance;

    fn deref(&self) -> &EntityInstance {
        &self.0
    }
}

impl fmt::Debug for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Entity({} {})", self.entity_type(), self.reference())
    }
}

impl fmt::Display for Entity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.entity_type(), self.reference())
    }
}
