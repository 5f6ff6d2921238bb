//! In-memory storage backend.
//!
//! Committed states live in a persistent map behind a lock; checking a state
//! out clones it in O(1) through structural sharing. Conflicts are detected
//! with per-entity versions when changes are applied.

use std::collections::HashSet;
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace};
use tessera_foundation::{EntityReference, Error, Result};

use crate::schema::EntityStateModel;
use crate::state::{EntityState, EntityStatus};
use crate::store::{EntityStore, EntityStoreUnitOfWork, Usecase};

/// Shared in-memory store. Clones share the same data.
#[derive(Clone, Debug, Default)]
pub struct MemoryEntityStore {
    states: Arc<RwLock<im::HashMap<EntityReference, EntityState>>>,
}

impl MemoryEntityStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, im::HashMap<EntityReference, EntityState>>> {
        self.states
            .read()
            .map_err(|_| Error::storage("memory store lock poisoned"))
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, im::HashMap<EntityReference, EntityState>>> {
        self.states
            .write()
            .map_err(|_| Error::storage("memory store lock poisoned"))
    }

    /// Returns the number of committed entities.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().map_or(0, |states| states.len())
    }

    /// Returns true if nothing is committed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns true if state is committed under the reference.
    #[must_use]
    pub fn contains(&self, reference: &EntityReference) -> bool {
        self.read()
            .is_ok_and(|states| states.contains_key(reference))
    }

    /// Returns the committed version of an entity.
    #[must_use]
    pub fn version_of(&self, reference: &EntityReference) -> Option<u64> {
        self.read()
            .ok()
            .and_then(|states| states.get(reference).map(EntityState::version))
    }

    /// Returns a snapshot of every committed state.
    #[must_use]
    pub fn snapshot(&self) -> im::HashMap<EntityReference, EntityState> {
        self.read().map(|states| states.clone()).unwrap_or_default()
    }
}

impl EntityStore for MemoryEntityStore {
    fn new_unit_of_work(&self, usecase: &Usecase) -> Box<dyn EntityStoreUnitOfWork> {
        trace!("memory store: opening unit of work for {usecase}");
        Box::new(MemoryUnitOfWork {
            store: self.clone(),
            usecase: usecase.clone(),
            pending: HashSet::new(),
        })
    }
}

/// Backend side of one unit of work over a [`MemoryEntityStore`].
#[derive(Debug)]
pub struct MemoryUnitOfWork {
    store: MemoryEntityStore,
    usecase: Usecase,
    pending: HashSet<EntityReference>,
}

impl EntityStoreUnitOfWork for MemoryUnitOfWork {
    fn new_entity_state(
        &mut self,
        reference: &EntityReference,
        model: &EntityStateModel,
    ) -> Result<EntityState> {
        if self.pending.contains(reference) || self.store.read()?.contains_key(reference) {
            return Err(Error::already_exists(reference.clone()));
        }
        self.pending.insert(reference.clone());
        trace!("{}: new {} state {reference}", self.usecase, model.entity_type());
        Ok(EntityState::new(reference.clone(), model.entity_type()))
    }

    fn entity_state_of(&mut self, reference: &EntityReference) -> Result<EntityState> {
        let states = self.store.read()?;
        let state = states
            .get(reference)
            .cloned()
            .ok_or_else(|| Error::not_found(reference.clone()))?;
        trace!("{}: loaded {reference} at version {}", self.usecase, state.version());
        Ok(state)
    }

    fn apply_changes(&mut self, changes: Vec<EntityState>) -> Result<()> {
        let mut states = self.store.write()?;

        let conflicts: Vec<EntityReference> = changes
            .iter()
            .filter(|change| {
                let stored = states.get(change.reference()).map(EntityState::version);
                match change.status() {
                    EntityStatus::Loaded => false,
                    EntityStatus::New => stored.is_some(),
                    // Version 0 marks state created in this unit of work.
                    EntityStatus::Updated | EntityStatus::Removed => {
                        stored.is_some_and(|v| v != change.version())
                            || (stored.is_none() && change.version() > 0)
                    }
                }
            })
            .map(|change| change.reference().clone())
            .collect();
        if !conflicts.is_empty() {
            debug!("{}: {} conflicting change(s)", self.usecase, conflicts.len());
            return Err(Error::concurrent_modification(conflicts));
        }

        let mut written = 0usize;
        for mut change in changes {
            match change.status() {
                EntityStatus::Loaded => continue,
                EntityStatus::Removed => {
                    states.remove(change.reference());
                }
                EntityStatus::New | EntityStatus::Updated => {
                    let version = change.version() + 1;
                    change.mark_loaded(version);
                    states.insert(change.reference().clone(), change);
                }
            }
            written += 1;
        }
        self.pending.clear();
        debug!("{}: applied {written} change(s)", self.usecase);
        Ok(())
    }

    fn discard(&mut self) {
        trace!("{}: discarding {} pending identities", self.usecase, self.pending.len());
        self.pending.clear();
    }
}
