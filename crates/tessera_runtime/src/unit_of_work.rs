//! Units of work: transactional scopes over a storage backend.
//!
//! A [`UnitOfWork`] owns an identity map with one [`Entity`] per reference,
//! checks out state from the module's store on demand and writes every
//! changed state back on [`UnitOfWork::complete`]. It is meant to be used
//! from the thread that opened it.

use std::cell::{Cell, RefCell};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::rc::{Rc, Weak};

use log::{debug, trace, warn};
use tessera_foundation::{EntityReference, Error, ErrorContext, Result, SemanticLimit};
use tessera_storage::{EntityState, EntityStatus, EntityStoreUnitOfWork, Usecase};

use crate::builder::EntityBuilder;
use crate::config::UnitOfWorkConfig;
use crate::instance::{Entity, EntityView};
use crate::module::EntityModule;
use crate::resolver::AssociationResolver;

/// How a unit of work ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum UnitOfWorkStatus {
    /// Changes were written to the store.
    Completed,
    /// Changes were thrown away.
    Discarded,
}

/// Hooks around the end of a unit of work.
pub trait UnitOfWorkCallback {
    /// Called by [`UnitOfWork::complete`] before anything is checked or written.
    ///
    /// # Errors
    ///
    /// An error aborts completion; the unit of work stays open.
    fn before_completion(&self, uow: &UnitOfWork) -> Result<()> {
        let _ = uow;
        Ok(())
    }

    /// Called once the unit of work has closed.
    ///
    /// # Errors
    ///
    /// Errors are logged and otherwise ignored.
    fn after_completion(&self, status: UnitOfWorkStatus) -> Result<()> {
        let _ = status;
        Ok(())
    }
}

/// Shared core of a unit of work. Entities point back here weakly.
pub(crate) struct UnitOfWorkInner {
    this: Weak<UnitOfWorkInner>,
    module: EntityModule,
    usecase: Usecase,
    config: UnitOfWorkConfig,
    open: Cell<bool>,
    store: RefCell<Box<dyn EntityStoreUnitOfWork>>,
    identity_map: RefCell<HashMap<EntityReference, Entity>>,
    callbacks: RefCell<Vec<Rc<dyn UnitOfWorkCallback>>>,
}

impl UnitOfWorkInner {
    pub(crate) fn usecase(&self) -> &Usecase {
        &self.usecase
    }

    pub(crate) fn check_open(&self) -> Result<()> {
        if self.open.get() {
            Ok(())
        } else {
            Err(Error::scope_closed()
                .with_context(ErrorContext::new().with_usecase(self.usecase.name())))
        }
    }

    /// Loads an entity through the identity map.
    pub(crate) fn get(&self, reference: &EntityReference, expected: Option<&str>) -> Result<Entity> {
        self.check_open()?;
        let cached = self.identity_map.borrow().get(reference).cloned();
        let entity = match cached {
            Some(entity) => entity,
            None => self.load(reference)?,
        };
        if entity.is_removed() {
            return Err(Error::not_found(reference.clone()));
        }
        if let Some(expected) = expected {
            if !entity.model().is_type(expected) {
                return Err(Error::no_such_entity_type(expected).with_context(
                    ErrorContext::new().with_entity(entity.entity_type(), reference.clone()),
                ));
            }
        }
        Ok(entity)
    }

    fn load(&self, reference: &EntityReference) -> Result<Entity> {
        let state = self.store.borrow_mut().entity_state_of(reference)?;
        let model = self.module.model(state.entity_type())?;
        let entity = model.new_instance(self.this.clone(), state);
        trace!("{}: loaded {entity}", self.usecase);
        self.identity_map
            .borrow_mut()
            .insert(reference.clone(), entity.clone());
        Ok(entity)
    }

    pub(crate) fn new_builder(
        &self,
        entity_type: &str,
        reference: Option<EntityReference>,
    ) -> Result<EntityBuilder> {
        self.check_open()?;
        let model = self.module.model(entity_type)?;
        let reference =
            reference.unwrap_or_else(|| self.module.generate_identity(&self.config));
        if self.identity_map.borrow().contains_key(&reference) {
            return Err(Error::already_exists(reference));
        }
        let mut state = model.new_entity_state(&mut **self.store.borrow_mut(), &reference)?;
        model.init_state(&mut state)?;
        trace!("{}: building {entity_type} {reference}", self.usecase);
        Ok(EntityBuilder::new(model.new_instance(self.this.clone(), state)))
    }

    pub(crate) fn register(&self, entity: &Entity) -> Result<()> {
        self.check_open()?;
        let mut identity_map = self.identity_map.borrow_mut();
        if identity_map.contains_key(entity.reference()) {
            return Err(Error::already_exists(entity.reference().clone()));
        }
        identity_map.insert(entity.reference().clone(), entity.clone());
        trace!("{}: registered {entity}", self.usecase);
        Ok(())
    }

    /// Removes an entity and everything it aggregates.
    ///
    /// The aggregated closure is loaded and every removal hook run before
    /// any state is marked removed. A failure leaves every state as it was.
    pub(crate) fn remove(&self, entity: &Entity) -> Result<()> {
        self.check_open()?;
        if !entity.belongs_to(self) {
            return Err(Error::not_found(entity.reference().clone())
                .with_context(ErrorContext::new().with_usecase(self.usecase.name())));
        }
        let mut visited = HashSet::new();
        let mut closure = Vec::new();
        entity.collect_aggregate(self, 0, &mut visited, &mut closure)?;
        for member in &closure {
            member.model().invoke_lifecycle(false, member)?;
        }
        for member in &closure {
            member.mark_removed()?;
        }
        trace!("{}: removed {} entities from {entity}", self.usecase, closure.len());
        Ok(())
    }

    pub(crate) fn check_cascade_depth(&self, entity: &Entity, depth: usize) -> Result<()> {
        if depth > self.config.max_cascade_depth {
            return Err(Error::limit_exceeded(SemanticLimit::MaxCascadeDepth {
                limit: self.config.max_cascade_depth,
                reference: Some(entity.reference().clone()),
            }));
        }
        Ok(())
    }

    /// Entities in the identity map, ordered by reference.
    fn entities(&self) -> Vec<Entity> {
        let mut entities: Vec<Entity> = self.identity_map.borrow().values().cloned().collect();
        entities.sort_by(|a, b| a.reference().cmp(b.reference()));
        entities
    }

    fn close(&self) -> Vec<Rc<dyn UnitOfWorkCallback>> {
        self.open.set(false);
        self.identity_map.borrow_mut().clear();
        self.callbacks.borrow_mut().drain(..).collect()
    }
}

/// A transactional scope over the module's store.
///
/// Dropping an open unit of work discards it.
pub struct UnitOfWork {
    inner: Rc<UnitOfWorkInner>,
}

impl UnitOfWork {
    pub(crate) fn open(
        module: EntityModule,
        usecase: Usecase,
        config: UnitOfWorkConfig,
        store: Box<dyn EntityStoreUnitOfWork>,
    ) -> Self {
        debug!("opening unit of work {usecase}");
        let inner = Rc::new_cyclic(|this| UnitOfWorkInner {
            this: this.clone(),
            module,
            usecase,
            config,
            open: Cell::new(true),
            store: RefCell::new(store),
            identity_map: RefCell::new(HashMap::new()),
            callbacks: RefCell::new(Vec::new()),
        });
        Self { inner }
    }

    /// Returns the usecase this unit of work was opened for.
    #[must_use]
    pub fn usecase(&self) -> &Usecase {
        &self.inner.usecase
    }

    /// Returns the configuration in effect.
    #[must_use]
    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.inner.config
    }

    /// Returns the module this unit of work belongs to.
    #[must_use]
    pub fn module(&self) -> &EntityModule {
        &self.inner.module
    }

    /// Returns true until the unit of work completes or is discarded.
    #[must_use]
    pub fn is_open(&self) -> bool {
        self.inner.open.get()
    }

    /// Returns a resolver bound to this unit of work.
    #[must_use]
    pub fn resolver(&self) -> AssociationResolver {
        AssociationResolver::new(Rc::downgrade(&self.inner))
    }

    /// Creates an entity with a generated identity and initial values.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::new_entity_builder`] and [`EntityBuilder::new_instance`].
    pub fn new_entity(&self, entity_type: &str) -> Result<Entity> {
        self.new_entity_builder(entity_type)?.new_instance()
    }

    /// Creates an entity with the given identity and initial values.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::new_entity_builder_with_identity`] and
    /// [`EntityBuilder::new_instance`].
    pub fn new_entity_with_identity(
        &self,
        entity_type: &str,
        reference: EntityReference,
    ) -> Result<Entity> {
        self.new_entity_builder_with_identity(entity_type, reference)?
            .new_instance()
    }

    /// Starts building an entity with a generated identity.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is closed,
    /// `NoSuchEntityType` if the module has no such entity type, and the
    /// errors of [`EntityModel::new_entity_state`](crate::EntityModel::new_entity_state).
    pub fn new_entity_builder(&self, entity_type: &str) -> Result<EntityBuilder> {
        self.inner.new_builder(entity_type, None)
    }

    /// Starts building an entity with the given identity.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::new_entity_builder`]. Returns `AlreadyExists` if the
    /// identity is taken.
    pub fn new_entity_builder_with_identity(
        &self,
        entity_type: &str,
        reference: EntityReference,
    ) -> Result<EntityBuilder> {
        self.inner.new_builder(entity_type, Some(reference))
    }

    /// Loads an entity of any type.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is closed, and `NotFound`
    /// if the entity does not exist or has been removed.
    pub fn get(&self, reference: &EntityReference) -> Result<Entity> {
        self.inner.get(reference, None)
    }

    /// Loads an entity that must be of `entity_type`.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::get`]. Returns `NoSuchEntityType` if the entity is
    /// of another type.
    pub fn get_typed(&self, reference: &EntityReference, entity_type: &str) -> Result<Entity> {
        self.inner.get(reference, Some(entity_type))
    }

    /// Loads an entity and wraps it in a typed view.
    ///
    /// # Errors
    ///
    /// See [`UnitOfWork::get_typed`].
    pub fn get_as<V: EntityView>(&self, reference: &EntityReference) -> Result<V> {
        self.get_typed(reference, V::TYPE)?.view()
    }

    /// Returns true if the entity is loaded in this unit of work and not
    /// removed.
    #[must_use]
    pub fn contains(&self, reference: &EntityReference) -> bool {
        self.inner
            .identity_map
            .borrow()
            .get(reference)
            .is_some_and(|entity| !entity.is_removed())
    }

    /// Removes an entity together with every entity it aggregates.
    ///
    /// Entities reached through non-aggregated associations are left alone.
    ///
    /// # Errors
    ///
    /// Returns `NotFound` if the entity or an aggregated entity is already
    /// removed or missing, `LimitExceeded` if the cascade is deeper than
    /// configured, and whatever a removal hook returns.
    pub fn remove(&self, entity: &Entity) -> Result<()> {
        debug!("{}: removing {entity}", self.inner.usecase);
        self.inner.remove(entity)
    }

    /// Registers a completion callback.
    pub fn add_callback(&self, callback: Rc<dyn UnitOfWorkCallback>) {
        self.inner.callbacks.borrow_mut().push(callback);
    }

    /// Checks and writes every change, then closes the unit of work.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if already closed, the first error of a
    /// before-completion callback, `ConstraintViolation` if a new or updated
    /// entity is invalid, and storage errors such as
    /// `ConcurrentModification`. On error the unit of work stays open.
    pub fn complete(&self) -> Result<()> {
        self.inner.check_open()?;

        let callbacks: Vec<_> = self.inner.callbacks.borrow().clone();
        for callback in &callbacks {
            callback.before_completion(self)?;
        }

        let entities = self.inner.entities();
        if self.inner.config.check_constraints_on_complete {
            for entity in &entities {
                if matches!(entity.status(), EntityStatus::New | EntityStatus::Updated) {
                    entity.check_constraints()?;
                }
            }
        }

        let changes: Vec<EntityState> = entities
            .iter()
            .map(|entity| entity.snapshot())
            .filter(EntityState::is_modified)
            .collect();
        let count = changes.len();
        self.inner
            .store
            .borrow_mut()
            .apply_changes(changes)
            .map_err(|err| {
                err.with_context(ErrorContext::new().with_usecase(self.inner.usecase.name()))
            })?;

        let callbacks = self.inner.close();
        debug!("{}: completed with {count} change(s)", self.inner.usecase);
        self.notify(&callbacks, UnitOfWorkStatus::Completed);
        Ok(())
    }

    /// Throws away every change and closes the unit of work.
    ///
    /// Does nothing if the unit of work is already closed.
    pub fn discard(&self) {
        if !self.is_open() {
            return;
        }
        self.inner.store.borrow_mut().discard();
        let callbacks = self.inner.close();
        debug!("{}: discarded", self.inner.usecase);
        self.notify(&callbacks, UnitOfWorkStatus::Discarded);
    }

    fn notify(&self, callbacks: &[Rc<dyn UnitOfWorkCallback>], status: UnitOfWorkStatus) {
        for callback in callbacks {
            if let Err(err) = callback.after_completion(status) {
                warn!("{}: after-completion callback failed: {err}", self.inner.usecase);
            }
        }
    }
}

impl Drop for UnitOfWork {
    fn drop(&mut self) {
        if self.is_open() {
            debug!("{}: dropped while open", self.inner.usecase);
            self.discard();
        }
    }
}

impl fmt::Debug for UnitOfWork {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UnitOfWork")
            .field("usecase", &self.inner.usecase)
            .field("open", &self.is_open())
            .field("entities", &self.inner.identity_map.borrow().len())
            .finish()
    }
}
