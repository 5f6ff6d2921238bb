//! Entity modules: the bootstrap-built registry of entity models.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use log::debug;
use tessera_foundation::{EntityReference, Error, Result};
use tessera_storage::{EntityStore, Usecase};

use crate::config::UnitOfWorkConfig;
use crate::model::EntityModel;
use crate::unit_of_work::UnitOfWork;

/// Registry of entity models bound to one storage backend.
///
/// Cloning is cheap; clones share the registry and the store.
#[derive(Clone)]
pub struct EntityModule {
    inner: Arc<ModuleInner>,
}

struct ModuleInner {
    name: String,
    models: HashMap<Arc<str>, Arc<EntityModel>>,
    store: Arc<dyn EntityStore>,
    config: UnitOfWorkConfig,
}

impl EntityModule {
    /// Starts building a module.
    #[must_use]
    pub fn builder(name: &str) -> ModuleBuilder {
        ModuleBuilder::new(name)
    }

    /// Returns the module name.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.inner.name
    }

    /// Returns the default configuration of new units of work.
    #[must_use]
    pub fn config(&self) -> &UnitOfWorkConfig {
        &self.inner.config
    }

    /// Looks up the model of an entity type.
    ///
    /// # Errors
    ///
    /// Returns `NoSuchEntityType` if no model is registered for the type.
    pub fn model(&self, entity_type: &str) -> Result<Arc<EntityModel>> {
        self.inner
            .models
            .get(entity_type)
            .cloned()
            .ok_or_else(|| Error::no_such_entity_type(entity_type))
    }

    /// Iterates over every registered model in no particular order.
    pub fn models(&self) -> impl Iterator<Item = &Arc<EntityModel>> {
        self.inner.models.values()
    }

    /// Generates a fresh identity, prefixed as configured.
    #[must_use]
    pub fn generate_identity(&self, config: &UnitOfWorkConfig) -> EntityReference {
        match &config.identity_prefix {
            Some(prefix) => EntityReference::generate_with_prefix(prefix),
            None => EntityReference::generate(),
        }
    }

    /// Opens a unit of work with the default usecase and configuration.
    #[must_use]
    pub fn new_unit_of_work(&self) -> UnitOfWork {
        self.new_unit_of_work_for(Usecase::default())
    }

    /// Opens a unit of work for a usecase with the default configuration.
    #[must_use]
    pub fn new_unit_of_work_for(&self, usecase: Usecase) -> UnitOfWork {
        self.new_unit_of_work_with(usecase, self.inner.config.clone())
    }

    /// Opens a unit of work with an explicit configuration.
    #[must_use]
    pub fn new_unit_of_work_with(&self, usecase: Usecase, config: UnitOfWorkConfig) -> UnitOfWork {
        let store = self.inner.store.new_unit_of_work(&usecase);
        UnitOfWork::open(self.clone(), usecase, config, store)
    }
}

impl fmt::Debug for EntityModule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut types: Vec<&str> = self.inner.models.keys().map(|k| &**k).collect();
        types.sort_unstable();
        f.debug_struct("EntityModule")
            .field("name", &self.inner.name)
            .field("types", &types)
            .field("config", &self.inner.config)
            .finish_non_exhaustive()
    }
}

/// Builder for [`EntityModule`].
pub struct ModuleBuilder {
    name: String,
    models: Vec<EntityModel>,
    config: UnitOfWorkConfig,
}

impl ModuleBuilder {
    fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            models: Vec::new(),
            config: UnitOfWorkConfig::default(),
        }
    }

    /// Registers an entity model.
    #[must_use]
    pub fn with_entity(mut self, model: EntityModel) -> Self {
        self.models.push(model);
        self
    }

    /// Sets the default configuration of units of work.
    #[must_use]
    pub fn with_config(mut self, config: UnitOfWorkConfig) -> Self {
        self.config = config;
        self
    }

    /// Binds the registered models to a store.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if two models share an entity type, or an
    /// association targets a type no registered model provides.
    pub fn build<S: EntityStore + 'static>(self, store: S) -> Result<EntityModule> {
        let mut models: HashMap<Arc<str>, Arc<EntityModel>> = HashMap::new();
        for model in self.models {
            let entity_type: Arc<str> = model.entity_type().into();
            if models.insert(entity_type.clone(), Arc::new(model)).is_some() {
                return Err(Error::invalid_schema(format!(
                    "module {} registers {entity_type} more than once",
                    self.name
                )));
            }
        }

        for model in models.values() {
            for association in model.state_model().all_associations() {
                let target = association.target_type();
                if !models.values().any(|m| m.is_type(target)) {
                    return Err(Error::invalid_schema(format!(
                        "{}.{} targets {target}, which no entity in module {} provides",
                        model.entity_type(),
                        association.name(),
                        self.name
                    )));
                }
            }
        }

        debug!("module {} built with {} entity type(s)", self.name, models.len());
        Ok(EntityModule {
            inner: Arc::new(ModuleInner {
                name: self.name,
                models,
                store: Arc::new(store),
                config: self.config,
            }),
        })
    }
}

impl fmt::Debug for ModuleBuilder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ModuleBuilder")
            .field("name", &self.name)
            .field("models", &self.models.len())
            .field("config", &self.config)
            .finish()
    }
}
