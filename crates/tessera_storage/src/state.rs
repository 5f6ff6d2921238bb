//! Raw, storage-backed entity state.
//!
//! An [`EntityState`] is the bag of values for one entity inside one unit of
//! work: properties, single association references, ordered reference lists
//! and insertion-ordered reference maps, plus a lifecycle status. All maps
//! are persistent, so checking a state out of a store is O(1).

use std::sync::Arc;

use tessera_foundation::{EntityReference, Error, QualifiedName, Result, Value};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Lifecycle status of an [`EntityState`].
///
/// Transitions are monotonic: `New | Loaded -> Updated -> Removed`.
/// A `New` state stays `New` when mutated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum EntityStatus {
    /// Created in the current unit of work, not yet stored.
    New,
    /// Loaded from the store, unchanged.
    Loaded,
    /// Loaded from the store and mutated.
    Updated,
    /// Removed; terminal.
    Removed,
}

/// Ordered list of references held by a many-association.
///
/// References are unique within the list.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ManyReferences(im::Vector<EntityReference>);

impl ManyReferences {
    /// Creates an empty list.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of references.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the list is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns true if the list holds the reference.
    #[must_use]
    pub fn contains(&self, reference: &EntityReference) -> bool {
        self.0.contains(reference)
    }

    /// Gets the reference at an index.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<&EntityReference> {
        self.0.get(index)
    }

    /// Inserts a reference at `index`, clamped to the list length.
    ///
    /// Returns false (and leaves the list unchanged) if the reference is
    /// already present.
    pub fn add(&mut self, index: usize, reference: EntityReference) -> bool {
        if self.contains(&reference) {
            return false;
        }
        let index = index.min(self.0.len());
        self.0.insert(index, reference);
        true
    }

    /// Appends a reference. Returns false if already present.
    pub fn push(&mut self, reference: EntityReference) -> bool {
        self.add(usize::MAX, reference)
    }

    /// Removes a reference. Returns false if it was not present.
    pub fn remove(&mut self, reference: &EntityReference) -> bool {
        match self.0.index_of(reference) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Removes every reference.
    pub fn clear(&mut self) {
        self.0.clear();
    }

    /// Iterates over references in order.
    pub fn iter(&self) -> impl Iterator<Item = &EntityReference> {
        self.0.iter()
    }
}

impl FromIterator<EntityReference> for ManyReferences {
    fn from_iter<I: IntoIterator<Item = EntityReference>>(iter: I) -> Self {
        let mut list = Self::new();
        for reference in iter {
            list.push(reference);
        }
        list
    }
}

/// Insertion-ordered map of name to reference held by a named association.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct NamedReferences(im::Vector<(Arc<str>, EntityReference)>);

impl NamedReferences {
    /// Creates an empty map.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Returns true if the map is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.0.iter().position(|(n, _)| &**n == name)
    }

    /// Returns true if an entry exists under `name`.
    #[must_use]
    pub fn contains_name(&self, name: &str) -> bool {
        self.position(name).is_some()
    }

    /// Gets the reference stored under `name`.
    #[must_use]
    pub fn get(&self, name: &str) -> Option<&EntityReference> {
        self.0.iter().find(|(n, _)| &**n == name).map(|(_, r)| r)
    }

    /// Stores a reference under `name`.
    ///
    /// An existing entry is overwritten in place and keeps its position.
    /// Returns false if the entry already held this exact reference.
    pub fn put(&mut self, name: &str, reference: EntityReference) -> bool {
        match self.position(name) {
            Some(index) => {
                if self.0[index].1 == reference {
                    return false;
                }
                self.0.set(index, (self.0[index].0.clone(), reference));
                true
            }
            None => {
                self.0.push_back((name.into(), reference));
                true
            }
        }
    }

    /// Removes the entry under `name`. Returns false if there was none.
    pub fn remove(&mut self, name: &str) -> bool {
        match self.position(name) {
            Some(index) => {
                self.0.remove(index);
                true
            }
            None => false,
        }
    }

    /// Iterates over names in insertion order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(|(n, _)| &**n)
    }

    /// Iterates over `(name, reference)` pairs in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &EntityReference)> {
        self.0.iter().map(|(n, r)| (&**n, r))
    }
}

/// Mutable, storage-backed record for one entity within one unit of work.
#[derive(Clone, Debug)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct EntityState {
    reference: EntityReference,
    entity_type: Arc<str>,
    version: u64,
    status: EntityStatus,
    properties: im::HashMap<QualifiedName, Value>,
    associations: im::HashMap<QualifiedName, Option<EntityReference>>,
    many_associations: im::HashMap<QualifiedName, ManyReferences>,
    named_associations: im::HashMap<QualifiedName, NamedReferences>,
}

impl EntityState {
    /// Creates empty `New` state for an entity of the given type.
    #[must_use]
    pub fn new(reference: EntityReference, entity_type: impl Into<Arc<str>>) -> Self {
        Self {
            reference,
            entity_type: entity_type.into(),
            version: 0,
            status: EntityStatus::New,
            properties: im::HashMap::new(),
            associations: im::HashMap::new(),
            many_associations: im::HashMap::new(),
            named_associations: im::HashMap::new(),
        }
    }

    /// Returns the entity's reference.
    #[must_use]
    pub fn reference(&self) -> &EntityReference {
        &self.reference
    }

    /// Returns the entity type name this state was created for.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the stored version this state was loaded at (0 if new).
    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    /// Returns the lifecycle status.
    #[must_use]
    pub fn status(&self) -> EntityStatus {
        self.status
    }

    /// Returns true if this state must be written back on completion.
    #[must_use]
    pub fn is_modified(&self) -> bool {
        !matches!(self.status, EntityStatus::Loaded)
    }

    /// Marks this state as freshly loaded at `version`.
    ///
    /// Intended for storage backends handing out stored state.
    pub fn mark_loaded(&mut self, version: u64) {
        self.version = version;
        self.status = EntityStatus::Loaded;
    }

    fn check_not_removed(&self) -> Result<()> {
        if self.status == EntityStatus::Removed {
            return Err(Error::entity_removed(self.reference.clone()));
        }
        Ok(())
    }

    fn mark_updated(&mut self) {
        if self.status == EntityStatus::Loaded {
            self.status = EntityStatus::Updated;
        }
    }

    /// Reads a property value. Undeclared or unset properties read as nil.
    #[must_use]
    pub fn property_value_of(&self, name: &QualifiedName) -> Value {
        self.properties.get(name).cloned().unwrap_or_default()
    }

    /// Writes a property value.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state has been removed.
    pub fn set_property_value(&mut self, name: &QualifiedName, value: Value) -> Result<()> {
        self.check_not_removed()?;
        self.properties.insert(name.clone(), value);
        self.mark_updated();
        Ok(())
    }

    /// Reads a single association reference.
    #[must_use]
    pub fn association_value_of(&self, name: &QualifiedName) -> Option<EntityReference> {
        self.associations.get(name).cloned().flatten()
    }

    /// Writes a single association reference; `None` clears it.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state has been removed.
    pub fn set_association_value(
        &mut self,
        name: &QualifiedName,
        reference: Option<EntityReference>,
    ) -> Result<()> {
        self.check_not_removed()?;
        self.associations.insert(name.clone(), reference);
        self.mark_updated();
        Ok(())
    }

    /// Reads a many-association's reference list.
    ///
    /// Returns an O(1) snapshot; an undeclared name reads as empty.
    #[must_use]
    pub fn many_association_value_of(&self, name: &QualifiedName) -> ManyReferences {
        self.many_associations.get(name).cloned().unwrap_or_default()
    }

    /// Applies `update` to a many-association's reference list.
    ///
    /// `update` returns whether it changed the list; the state is only
    /// marked updated when it did. Returns that flag.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state has been removed.
    pub fn update_many_association_value(
        &mut self,
        name: &QualifiedName,
        update: impl FnOnce(&mut ManyReferences) -> bool,
    ) -> Result<bool> {
        self.check_not_removed()?;
        let changed = update(self.many_associations.entry(name.clone()).or_default());
        if changed {
            self.mark_updated();
        }
        Ok(changed)
    }

    /// Reads a named association's reference map.
    ///
    /// Returns an O(1) snapshot; an undeclared name reads as empty.
    #[must_use]
    pub fn named_association_value_of(&self, name: &QualifiedName) -> NamedReferences {
        self.named_associations.get(name).cloned().unwrap_or_default()
    }

    /// Applies `update` to a named association's reference map.
    ///
    /// Like [`EntityState::update_many_association_value`], the state is
    /// only marked updated when `update` reports a change.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state has been removed.
    pub fn update_named_association_value(
        &mut self,
        name: &QualifiedName,
        update: impl FnOnce(&mut NamedReferences) -> bool,
    ) -> Result<bool> {
        self.check_not_removed()?;
        let changed = update(self.named_associations.entry(name.clone()).or_default());
        if changed {
            self.mark_updated();
        }
        Ok(changed)
    }

    /// Marks this state removed.
    ///
    /// # Errors
    ///
    /// Returns `EntityRemoved` if the state was already removed; removing
    /// twice is a programming error.
    pub fn remove(&mut self) -> Result<()> {
        self.check_not_removed()?;
        self.status = EntityStatus::Removed;
        Ok(())
    }

    /// Iterates over all stored property values.
    pub fn properties(&self) -> impl Iterator<Item = (&QualifiedName, &Value)> {
        self.properties.iter()
    }

    /// Iterates over all single association references.
    pub fn associations(&self) -> impl Iterator<Item = (&QualifiedName, Option<&EntityReference>)> {
        self.associations.iter().map(|(k, v)| (k, v.as_ref()))
    }
}
