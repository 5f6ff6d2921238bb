//! Schema definitions for entity state.
//!
//! An [`EntityStateModel`] is built once per entity type at bootstrap and
//! never changes afterwards. It maps every accessor (property, association,
//! many-association, named association) to a stable [`Accessor`] key and a
//! [`QualifiedName`] used to address the raw [`EntityState`](crate::EntityState).

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use tessera_foundation::{
    AccessorKind, EntityReference, Error, QualifiedName, Result, Type, Value, Violation,
};

/// Bare name of the identity property every entity type declares.
pub const IDENTITY: &str = "identity";

/// Property slot of the identity. The builder declares it before any other
/// property and rejects redeclaring it.
pub const IDENTITY_SLOT: usize = 0;

/// Name of the violation reported for a missing required value.
pub const NOT_NULL: &str = "not-null";

/// Stable key for one accessor of an entity type.
///
/// The slot is the declaration index within the accessor's kind.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct Accessor {
    /// The kind of state the accessor addresses.
    pub kind: AccessorKind,
    /// Declaration index within that kind.
    pub slot: usize,
}

impl Accessor {
    /// Creates an accessor key.
    #[must_use]
    pub const fn new(kind: AccessorKind, slot: usize) -> Self {
        Self { kind, slot }
    }
}

impl fmt::Display for Accessor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}#{}", self.kind, self.slot)
    }
}

/// A declared invariant on a property value.
///
/// Constraints never apply to nil; a required property holding nil is
/// reported as [`NOT_NULL`] instead.
#[derive(Clone, Debug)]
pub enum Constraint {
    /// Strings, lists and maps must not be empty.
    NotEmpty,
    /// Strings, lists and maps may hold at most this many elements.
    MaxLength(usize),
    /// Numbers must lie within `min..=max`.
    Range {
        /// Inclusive lower bound.
        min: i64,
        /// Inclusive upper bound.
        max: i64,
    },
    /// The value must equal one of the listed values.
    OneOf(Vec<Value>),
    /// A named custom check.
    Predicate {
        /// Name reported in violations.
        name: &'static str,
        /// Returns true if the value is acceptable.
        check: fn(&Value) -> bool,
    },
}

impl Constraint {
    /// Returns the name reported when this constraint is violated.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::NotEmpty => "not-empty",
            Self::MaxLength(_) => "max-length",
            Self::Range { .. } => "range",
            Self::OneOf(_) => "one-of",
            Self::Predicate { name, .. } => name,
        }
    }

    /// Returns true if the value satisfies this constraint.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn is_satisfied_by(&self, value: &Value) -> bool {
        if value.is_nil() {
            return true;
        }
        match self {
            Self::NotEmpty => !value.is_empty(),
            Self::MaxLength(max) => value.len().is_none_or(|len| len <= *max),
            Self::Range { min, max } => match value {
                Value::Int(n) => (*min..=*max).contains(n),
                Value::Float(n) => *n >= *min as f64 && *n <= *max as f64,
                _ => true,
            },
            Self::OneOf(allowed) => allowed.contains(value),
            Self::Predicate { check, .. } => check(value),
        }
    }
}

/// Descriptor for one declared property.
#[derive(Clone, Debug)]
pub struct PropertyDescriptor {
    qualified_name: QualifiedName,
    accessor: Accessor,
    ty: Type,
    default: Option<Value>,
    optional: bool,
    immutable: bool,
    use_defaults: bool,
    constraints: Vec<Constraint>,
}

impl PropertyDescriptor {
    fn new(name: &str, ty: Type, optional: bool) -> Self {
        Self {
            qualified_name: QualifiedName::new("", name),
            accessor: Accessor::new(AccessorKind::Property, 0),
            ty,
            default: None,
            optional,
            immutable: false,
            use_defaults: false,
            constraints: Vec::new(),
        }
    }

    /// Declares a property that must hold a non-nil value.
    #[must_use]
    pub fn required(name: &str, ty: Type) -> Self {
        Self::new(name, ty, false)
    }

    /// Declares a property that may hold nil.
    #[must_use]
    pub fn optional(name: &str, ty: Type) -> Self {
        Self::new(name, ty, true)
    }

    /// Sets the initial value of the property.
    #[must_use]
    pub fn with_default(mut self, default: impl Into<Value>) -> Self {
        self.default = Some(default.into());
        self
    }

    /// Allows the property to be written only while the entity is new.
    #[must_use]
    pub fn immutable(mut self) -> Self {
        self.immutable = true;
        self
    }

    /// Seeds the property with its type's default value when no explicit
    /// default is declared.
    #[must_use]
    pub fn use_defaults(mut self) -> Self {
        self.use_defaults = true;
        self
    }

    /// Adds a constraint.
    #[must_use]
    pub fn with_constraint(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Returns the bare property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.qualified_name.name()
    }

    /// Returns the fully qualified name used as the state key.
    #[must_use]
    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified_name
    }

    /// Returns the accessor key.
    #[must_use]
    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    /// Returns the declared type.
    #[must_use]
    pub fn ty(&self) -> &Type {
        &self.ty
    }

    /// Returns true if the property may hold nil.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns true if the property may only be set while the entity is new.
    #[must_use]
    pub fn is_immutable(&self) -> bool {
        self.immutable
    }

    /// Returns the declared constraints.
    #[must_use]
    pub fn constraints(&self) -> &[Constraint] {
        &self.constraints
    }

    /// Returns the value a freshly initialised entity starts with.
    #[must_use]
    pub fn initial_value(&self) -> Value {
        match &self.default {
            Some(value) => value.clone(),
            None if self.use_defaults => self.ty.default_value(),
            None => Value::Nil,
        }
    }

    /// Checks that a value may be stored under this property's type.
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the declared type does not accept the value.
    pub fn check_type(&self, value: &Value) -> Result<()> {
        if self.ty.accepts(value) {
            Ok(())
        } else {
            Err(Error::type_mismatch(
                self.name(),
                self.ty.clone(),
                value.value_type(),
            ))
        }
    }

    /// Returns every violation the value causes.
    #[must_use]
    pub fn violations(&self, value: &Value) -> Vec<Violation> {
        if value.is_nil() {
            if self.optional {
                return Vec::new();
            }
            return vec![Violation::new(self.name(), NOT_NULL, Value::Nil)];
        }
        self.constraints
            .iter()
            .filter(|c| !c.is_satisfied_by(value))
            .map(|c| Violation::new(self.name(), c.name(), value.clone()))
            .collect()
    }
}

/// Descriptor for one declared association of any kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct AssociationDescriptor {
    qualified_name: QualifiedName,
    accessor: Accessor,
    target_type: Arc<str>,
    aggregated: bool,
    optional: bool,
}

impl AssociationDescriptor {
    fn new(name: &str, target_type: &str, optional: bool) -> Self {
        Self {
            qualified_name: QualifiedName::new("", name),
            accessor: Accessor::new(AccessorKind::Association, 0),
            target_type: target_type.into(),
            aggregated: false,
            optional,
        }
    }

    /// Declares an association that must reference an entity.
    ///
    /// Only meaningful for single associations; collections may always be
    /// empty.
    #[must_use]
    pub fn required(name: &str, target_type: &str) -> Self {
        Self::new(name, target_type, false)
    }

    /// Declares an association that may be absent or empty.
    #[must_use]
    pub fn optional(name: &str, target_type: &str) -> Self {
        Self::new(name, target_type, true)
    }

    /// Marks the association as an ownership edge: removing the owner
    /// removes the referenced entities.
    #[must_use]
    pub fn aggregated(mut self) -> Self {
        self.aggregated = true;
        self
    }

    /// Returns the bare association name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.qualified_name.name()
    }

    /// Returns the fully qualified name used as the state key.
    #[must_use]
    pub fn qualified_name(&self) -> &QualifiedName {
        &self.qualified_name
    }

    /// Returns the accessor key.
    #[must_use]
    pub fn accessor(&self) -> Accessor {
        self.accessor
    }

    /// Returns the entity type the association points at.
    #[must_use]
    pub fn target_type(&self) -> &str {
        &self.target_type
    }

    /// Returns true if removal of the owner cascades to the targets.
    #[must_use]
    pub fn is_aggregated(&self) -> bool {
        self.aggregated
    }

    /// Returns true if the association may be absent.
    #[must_use]
    pub fn is_optional(&self) -> bool {
        self.optional
    }

    /// Returns every violation a single association value causes.
    #[must_use]
    pub fn violations(&self, reference: Option<&EntityReference>) -> Vec<Violation> {
        if reference.is_none() && !self.optional {
            vec![Violation::new(self.name(), NOT_NULL, Value::Nil)]
        } else {
            Vec::new()
        }
    }
}

/// Something an [`EntityStateModel`] accessor can be looked up by.
pub trait StateKey {
    /// Finds the accessor this key names, if any.
    fn find(&self, model: &EntityStateModel) -> Option<Accessor>;

    /// Returns the key as reported in lookup failures.
    fn describe(&self) -> String;
}

impl StateKey for str {
    fn find(&self, model: &EntityStateModel) -> Option<Accessor> {
        if let Some(accessor) = model.index.get(self) {
            return Some(*accessor);
        }
        self.parse::<QualifiedName>()
            .ok()
            .and_then(|qualified| StateKey::find(&qualified, model))
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl StateKey for &str {
    fn find(&self, model: &EntityStateModel) -> Option<Accessor> {
        StateKey::find(*self, model)
    }

    fn describe(&self) -> String {
        StateKey::describe(*self)
    }
}

impl StateKey for String {
    fn find(&self, model: &EntityStateModel) -> Option<Accessor> {
        StateKey::find(self.as_str(), model)
    }

    fn describe(&self) -> String {
        self.clone()
    }
}

impl StateKey for QualifiedName {
    fn find(&self, model: &EntityStateModel) -> Option<Accessor> {
        if self.type_name() != model.entity_type() {
            return None;
        }
        model.index.get(self.name()).copied()
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

impl StateKey for Accessor {
    fn find(&self, model: &EntityStateModel) -> Option<Accessor> {
        let len = match self.kind {
            AccessorKind::Property => model.properties.len(),
            AccessorKind::Association => model.associations.len(),
            AccessorKind::ManyAssociation => model.many_associations.len(),
            AccessorKind::NamedAssociation => model.named_associations.len(),
        };
        (self.slot < len).then_some(*self)
    }

    fn describe(&self) -> String {
        self.to_string()
    }
}

/// Immutable schema of one entity type's state.
#[derive(Clone, Debug)]
pub struct EntityStateModel {
    entity_type: Arc<str>,
    properties: Vec<PropertyDescriptor>,
    associations: Vec<AssociationDescriptor>,
    many_associations: Vec<AssociationDescriptor>,
    named_associations: Vec<AssociationDescriptor>,
    index: HashMap<Arc<str>, Accessor>,
}

impl EntityStateModel {
    /// Starts building the state model for an entity type.
    #[must_use]
    pub fn builder(entity_type: &str) -> EntityStateModelBuilder {
        EntityStateModelBuilder::new(entity_type)
    }

    /// Returns the entity type name.
    #[must_use]
    pub fn entity_type(&self) -> &str {
        &self.entity_type
    }

    /// Returns the identity property descriptor.
    #[must_use]
    pub fn identity(&self) -> &PropertyDescriptor {
        &self.properties[IDENTITY_SLOT]
    }

    /// Returns all property descriptors in declaration order.
    #[must_use]
    pub fn properties(&self) -> &[PropertyDescriptor] {
        &self.properties
    }

    /// Returns all single association descriptors.
    #[must_use]
    pub fn associations(&self) -> &[AssociationDescriptor] {
        &self.associations
    }

    /// Returns all many-association descriptors.
    #[must_use]
    pub fn many_associations(&self) -> &[AssociationDescriptor] {
        &self.many_associations
    }

    /// Returns all named-association descriptors.
    #[must_use]
    pub fn named_associations(&self) -> &[AssociationDescriptor] {
        &self.named_associations
    }

    /// Iterates over every association descriptor of every kind.
    pub fn all_associations(&self) -> impl Iterator<Item = &AssociationDescriptor> {
        self.associations
            .iter()
            .chain(&self.many_associations)
            .chain(&self.named_associations)
    }

    /// Resolves a key to an accessor of the expected kind.
    ///
    /// # Errors
    ///
    /// Returns `UnknownAccessor` if nothing is declared under the key, or
    /// `AccessorKindMismatch` if the key names an accessor of another kind.
    pub fn accessor<K: StateKey + ?Sized>(&self, key: &K, kind: AccessorKind) -> Result<Accessor> {
        match key.find(self) {
            Some(accessor) if accessor.kind == kind => Ok(accessor),
            Some(accessor) => Err(Error::accessor_kind_mismatch(
                key.describe(),
                kind,
                accessor.kind,
            )),
            None => Err(Error::unknown_accessor(kind, key.describe())),
        }
    }

    /// Looks up a property descriptor.
    ///
    /// # Errors
    ///
    /// See [`EntityStateModel::accessor`].
    pub fn property<K: StateKey + ?Sized>(&self, key: &K) -> Result<&PropertyDescriptor> {
        let accessor = self.accessor(key, AccessorKind::Property)?;
        Ok(&self.properties[accessor.slot])
    }

    /// Looks up a single association descriptor.
    ///
    /// # Errors
    ///
    /// See [`EntityStateModel::accessor`].
    pub fn association<K: StateKey + ?Sized>(&self, key: &K) -> Result<&AssociationDescriptor> {
        let accessor = self.accessor(key, AccessorKind::Association)?;
        Ok(&self.associations[accessor.slot])
    }

    /// Looks up a many-association descriptor.
    ///
    /// # Errors
    ///
    /// See [`EntityStateModel::accessor`].
    pub fn many_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&AssociationDescriptor> {
        let accessor = self.accessor(key, AccessorKind::ManyAssociation)?;
        Ok(&self.many_associations[accessor.slot])
    }

    /// Looks up a named-association descriptor.
    ///
    /// # Errors
    ///
    /// See [`EntityStateModel::accessor`].
    pub fn named_association<K: StateKey + ?Sized>(
        &self,
        key: &K,
    ) -> Result<&AssociationDescriptor> {
        let accessor = self.accessor(key, AccessorKind::NamedAssociation)?;
        Ok(&self.named_associations[accessor.slot])
    }
}

/// Builder for [`EntityStateModel`].
#[derive(Debug)]
pub struct EntityStateModelBuilder {
    entity_type: Arc<str>,
    properties: Vec<PropertyDescriptor>,
    associations: Vec<AssociationDescriptor>,
    many_associations: Vec<AssociationDescriptor>,
    named_associations: Vec<AssociationDescriptor>,
}

impl EntityStateModelBuilder {
    fn new(entity_type: &str) -> Self {
        Self {
            entity_type: entity_type.into(),
            // Must stay first: see `IDENTITY_SLOT`.
            properties: vec![PropertyDescriptor::required(IDENTITY, Type::String).immutable()],
            associations: Vec::new(),
            many_associations: Vec::new(),
            named_associations: Vec::new(),
        }
    }

    /// Declares a property.
    #[must_use]
    pub fn with_property(mut self, property: PropertyDescriptor) -> Self {
        self.properties.push(property);
        self
    }

    /// Declares a single association.
    #[must_use]
    pub fn with_association(mut self, association: AssociationDescriptor) -> Self {
        self.associations.push(association);
        self
    }

    /// Declares a many-association.
    #[must_use]
    pub fn with_many_association(mut self, association: AssociationDescriptor) -> Self {
        self.many_associations.push(association);
        self
    }

    /// Declares a named association.
    #[must_use]
    pub fn with_named_association(mut self, association: AssociationDescriptor) -> Self {
        self.named_associations.push(association);
        self
    }

    /// Finalises the model, assigning accessor keys and qualified names.
    ///
    /// # Errors
    ///
    /// Returns `InvalidSchema` if the type name is empty or two accessors
    /// share a name.
    pub fn build(self) -> Result<EntityStateModel> {
        if self.entity_type.trim().is_empty() || self.entity_type.contains(':') {
            return Err(Error::invalid_schema(format!(
                "invalid entity type name {:?}",
                self.entity_type
            )));
        }

        let entity_type = self.entity_type;
        let mut index: HashMap<Arc<str>, Accessor> = HashMap::new();
        let mut register = |name: &str, accessor: Accessor| -> Result<()> {
            if index.insert(name.into(), accessor).is_some() {
                return Err(Error::invalid_schema(format!(
                    "{entity_type} declares {name} more than once"
                )));
            }
            Ok(())
        };

        let mut properties = self.properties;
        for (slot, property) in properties.iter_mut().enumerate() {
            property.accessor = Accessor::new(AccessorKind::Property, slot);
            property.qualified_name = QualifiedName::new(entity_type.clone(), property.name());
            register(property.name(), property.accessor)?;
        }

        let mut finish = |mut descriptors: Vec<AssociationDescriptor>,
                          kind: AccessorKind|
         -> Result<Vec<AssociationDescriptor>> {
            for (slot, association) in descriptors.iter_mut().enumerate() {
                association.accessor = Accessor::new(kind, slot);
                association.qualified_name =
                    QualifiedName::new(entity_type.clone(), association.name());
                register(association.name(), association.accessor)?;
            }
            Ok(descriptors)
        };
        let associations = finish(self.associations, AccessorKind::Association)?;
        let many_associations = finish(self.many_associations, AccessorKind::ManyAssociation)?;
        let named_associations = finish(self.named_associations, AccessorKind::NamedAssociation)?;

        Ok(EntityStateModel {
            entity_type,
            properties,
            associations,
            many_associations,
            named_associations,
            index,
        })
    }
}
