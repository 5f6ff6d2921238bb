//! Entity models: per-type descriptor and factory.
//!
//! An [`EntityModel`] owns the [`EntityStateModel`] of one entity type, the
//! names of the views it can be seen through, the method table its mixins
//! provide and the lifecycle hooks run on creation and removal. Models are
//! built once at bootstrap and shared by every unit of work of a module.

use std::collections::HashMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::sync::Arc;

use tessera_foundation::{EntityReference, Error, ErrorKind, Result, Value};
use tessera_storage::{
    EntityState, EntityStateModel, EntityStoreUnitOfWork, ManyReferences, NamedReferences,
};

use crate::instance::{Entity, EntityInstance};
use crate::state_instance::StateHandle;
use crate::unit_of_work::UnitOfWorkInner;

/// Signature of a method implemented by a mixin.
pub type MethodFn = fn(&Entity, &[Value]) -> Result<Value>;

/// One entry of an entity type's method table.
#[derive(Clone, Copy)]
pub struct Method {
    name: &'static str,
    mixin: &'static str,
    func: MethodFn,
}

impl Method {
    /// Creates a method entry routed to the named mixin.
    #[must_use]
    pub const fn new(name: &'static str, mixin: &'static str, func: MethodFn) -> Self {
        Self { name, mixin, func }
    }

    /// Returns the method name.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        self.name
    }

    /// Returns the name of the mixin implementing the method.
    #[must_use]
    pub const fn mixin(&self) -> &'static str {
        self.mixin
    }

    /// Calls the method on an entity.
    ///
    /// # Errors
    ///
    /// Returns whatever the mixin returns.
    pub fn call(&self, entity: &Entity, args: &[Value]) -> Result<Value> {
        (self.func)(entity, args)
    }
}

impl fmt::Debug for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Method({}::{})", self.mixin, self.name)
    }
}

/// Hooks run when an entity is created or removed.
pub trait Lifecycle: Send + Sync {
    /// Called before a newly built entity is registered with its unit of work.
    ///
    /// # Errors
    ///
    /// An error aborts creation.
    fn create(&self, entity: &Entity) -> Result<()> {
        let _ = entity;
        Ok(())
    }

    /// Called before an entity and its aggregated entities are removed.
    ///
    /// # Errors
    ///
    /// An error aborts removal.
    fn remove(&self, entity: &Entity) -> Result<()> {
        let _ = entity;
        Ok(())
    }
}

/// Descriptor and factory for one entity type.
pub struct EntityModel {
    state: EntityStateModel,
    types: Vec<Arc<str>>,
    queryable: bool,
    methods: HashMap<Arc<str>, Method>,
    lifecycles: Vec<Arc<dyn Lifecycle>>,
}

impl EntityModel {
    /// Starts building a model over the given state model.
    #[must_use]
    pub fn builder(state: EntityStateModel) -> EntityModelBuilder {
        EntityModelBuilder::new(state)
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        self.state.entity_type()
    }

    /// Returns the state model.
    #[must_use]
    pub fn state_model(&self) -> &EntityStateModel {
        &self.state
    }

    /// Returns every type name entities of this model can be viewed as.
    ///
    /// The entity type itself comes first.
    #[must_use]
    pub fn types(&self) -> &[Arc<str>] {
        &self.types
    }

    /// Returns true if entities of this model can be viewed as `type_name`.
    #[must_use]
    pub fn is_type(&self, type_name: &str) -> bool {
        self.types.iter().any(|t| &**t == type_name)
    }

    /// Returns true if entities of this type may be found through queries.
    #[must_use]
    pub fn is_queryable(&self) -> bool {
        self.queryable
    }

    /// Looks up a method in the method table.
    ///
    /// # Errors
    ///
    /// Returns `UnknownMethod` if no mixin provides the method.
    pub fn method(&self, name: &str) -> Result<&Method> {
        self.methods
            .get(name)
            .ok_or_else(|| Error::unknown_method(self.entity_type(), name))
    }

    /// Iterates over the method table in no particular order.
    pub fn methods(&self) -> impl Iterator<Item = &Method> {
        self.methods.values()
    }

    /// Asks the storage backend for new raw state and seeds its identity.
    ///
    /// # Errors
    ///
    /// Returns `AlreadyExists` for a duplicate identity. Any other backend
    /// failure is wrapped in a `Construction` error keeping it as the cause.
    pub fn new_entity_state(
        &self,
        store: &mut dyn EntityStoreUnitOfWork,
        reference: &EntityReference,
    ) -> Result<EntityState> {
        let mut state = match store.new_entity_state(reference, &self.state) {
            Ok(state) => state,
            Err(err) if matches!(err.kind, ErrorKind::AlreadyExists(_)) => return Err(err),
            Err(err) => {
                return Err(Error::construction(
                    self.entity_type(),
                    reference.clone(),
                    err,
                ));
            }
        };
        state.set_property_value(
            self.state.identity().qualified_name(),
            Value::from(reference.identity()),
        )?;
        Ok(state)
    }

    /// Sets every property to its declared initial value, every association
    /// to absent and every collection to empty. The identity is kept.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state has already been removed.
    pub fn init_state(&self, state: &mut EntityState) -> Result<()> {
        let identity = self.state.identity().qualified_name();
        for property in self.state.properties() {
            if property.qualified_name() == identity {
                continue;
            }
            state.set_property_value(property.qualified_name(), property.initial_value())?;
        }
        for association in self.state.associations() {
            state.set_association_value(association.qualified_name(), None)?;
        }
        for association in self.state.many_associations() {
            state.update_many_association_value(association.qualified_name(), |list| {
                *list = ManyReferences::new();
                true
            })?;
        }
        for association in self.state.named_associations() {
            state.update_named_association_value(association.qualified_name(), |map| {
                *map = NamedReferences::new();
                true
            })?;
        }
        Ok(())
    }

    /// Binds raw state to a new entity handle owned by a unit of work.
    pub(crate) fn new_instance(
        self: &Arc<Self>,
        uow: Weak<UnitOfWorkInner>,
        state: EntityState,
    ) -> Entity {
        let handle = StateHandle::new(Arc::clone(self), state, uow);
        Entity::new(EntityInstance::new(Rc::new(handle)))
    }

    /// Runs the creation or removal hooks of every lifecycle-aware mixin.
    ///
    /// # Errors
    ///
    /// Stops at and returns the first hook failure.
    pub fn invoke_lifecycle(&self, create: bool, entity: &Entity) -> Result<()> {
        for lifecycle in &self.lifecycles {
            if create {
                lifecycle.create(entity)?;
            } else {
                lifecycle.remove(entity)?;
            }
        }
        Ok(())
    }
}

impl fmt::Debug for EntityModel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntityModel")
            .field("entity_type", &self.entity_type())
            .field("types", &self.types)
            .field("queryable", &self.queryable)
            .field("methods", &self.methods.len())
            .field("lifecycles", &self.lifecycles.len())
            .finish()
    }
}

/// Builder for [`EntityModel`].
pub struct EntityModelBuilder {
    state: EntityStateModel,
    types: Vec<Arc<str>>,
    queryable: bool,
    methods: Vec<Method>,
    lifecycles: Vec<Arc<dyn Lifecycle>>,
}

impl EntityModelBuilder {
    fn new(state: EntityStateModel) -> Self {
        Self {
            types: vec![state.entity_type().into()],
            state,
            queryable: true,
            methods: Vec::new(),
            lifecycles: Vec::new(),
        }
    }

    /// Adds a view type entities of this model can be seen as.
    #[must_use]
    pub fn with_type(mut self, type_name: &str) -> Self {
        if !self.types.iter().any(|t| &**t == type_name) {
            self.types.push(type_name.into());
        }
        self
    }

    /// Sets whether entities of this type may be found through queries.
    #[must_use]
    pub fn queryable(mut self, queryable: bool) -> Self {
        self.queryable = queryable;
        self
    }

    /// Adds a method to the method table.
    #[must_use]
    pub fn with_method(mut self, method: Method) -> Self {
        self.methods.push(method);
        self
    }

    /// Adds a lifecycle-aware mixin.
    #[must_use]
    pub fn with_lifecycle<L: Lifecycle + 'static>(mut self, lifecycle: L) -> Self {
        self.lifecycles.push(Arc::new(lifecycle));
        self
    }

    /// Finalises the model.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if two methods share a name.
    pub fn build(self) -> Result<EntityModel> {
        let mut methods = HashMap::with_capacity(self.methods.len());
        for method in self.methods {
            if let Some(previous) = methods.insert(Arc::from(method.name), method) {
                return Err(Error::invalid_schema(format!(
                    "{} declares method {} in both {} and {}",
                    self.state.entity_type(),
                    method.name,
                    previous.mixin,
                    method.mixin
                )));
            }
        }
        Ok(EntityModel {
            state: self.state,
            types: self.types,
            queryable: self.queryable,
            methods,
            lifecycles: self.lifecycles,
        })
    }
}
