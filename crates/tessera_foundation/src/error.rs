//! Error types for Tessera.
//!
//! Uses `thiserror` for the error kinds. [`Error`] pairs a kind with optional
//! context describing where in the entity graph the failure happened.

use std::fmt;

use thiserror::Error;

use crate::name::AccessorKind;
use crate::reference::EntityReference;
use crate::types::Type;
use crate::value::Value;

/// Result alias used throughout Tessera.
pub type Result<T> = std::result::Result<T, Error>;

/// The main error type for Tessera operations.
#[derive(Debug)]
pub struct Error {
    /// The kind of error that occurred.
    pub kind: ErrorKind,
    /// Optional context about where the error occurred.
    pub context: Option<ErrorContext>,
}

impl Error {
    /// Creates a new error with the given kind.
    #[must_use]
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: None,
        }
    }

    /// Adds context to this error, replacing any existing context.
    #[must_use]
    pub fn with_context(mut self, context: ErrorContext) -> Self {
        self.context = Some(context);
        self
    }

    /// Pushes a frame onto this error's context, creating one if needed.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        let context = self.context.take().unwrap_or_default();
        self.context = Some(context.with_frame(frame));
        self
    }

    /// Creates a not-found error.
    #[must_use]
    pub fn not_found(reference: EntityReference) -> Self {
        Self::new(ErrorKind::NotFound(reference))
    }

    /// Creates a duplicate-identity error.
    #[must_use]
    pub fn already_exists(reference: EntityReference) -> Self {
        Self::new(ErrorKind::AlreadyExists(reference))
    }

    /// Creates a closed-scope error.
    #[must_use]
    pub fn scope_closed() -> Self {
        Self::new(ErrorKind::ScopeClosed)
    }

    /// Creates an error for a mutation of removed state.
    #[must_use]
    pub fn entity_removed(reference: EntityReference) -> Self {
        Self::new(ErrorKind::EntityRemoved(reference))
    }

    /// Creates a constraint violation error without an owning entity.
    #[must_use]
    pub fn constraint_violation(violations: Vec<Violation>) -> Self {
        Self::new(ErrorKind::ConstraintViolation(ConstraintViolations {
            entity_type: None,
            reference: None,
            violations,
        }))
    }

    /// Wraps a backend failure raised while constructing new entity state.
    #[must_use]
    pub fn construction(
        entity_type: impl Into<String>,
        reference: EntityReference,
        source: Error,
    ) -> Self {
        Self::new(ErrorKind::Construction {
            entity_type: entity_type.into(),
            reference,
            source: Box::new(source),
        })
    }

    /// Creates a storage failure.
    #[must_use]
    pub fn storage(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Storage(message.into()))
    }

    /// Creates an optimistic-concurrency failure.
    #[must_use]
    pub fn concurrent_modification(references: Vec<EntityReference>) -> Self {
        Self::new(ErrorKind::ConcurrentModification(references))
    }

    /// Creates an unknown accessor error.
    #[must_use]
    pub fn unknown_accessor(kind: AccessorKind, name: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownAccessor {
            kind,
            name: name.into(),
        })
    }

    /// Creates an error for a name that exists under a different accessor kind.
    #[must_use]
    pub fn accessor_kind_mismatch(
        name: impl Into<String>,
        expected: AccessorKind,
        actual: AccessorKind,
    ) -> Self {
        Self::new(ErrorKind::AccessorKindMismatch {
            name: name.into(),
            expected,
            actual,
        })
    }

    /// Creates an unknown entity type error.
    #[must_use]
    pub fn no_such_entity_type(type_name: impl Into<String>) -> Self {
        Self::new(ErrorKind::NoSuchEntityType(type_name.into()))
    }

    /// Creates an unknown method error.
    #[must_use]
    pub fn unknown_method(entity_type: impl Into<String>, method: impl Into<String>) -> Self {
        Self::new(ErrorKind::UnknownMethod {
            entity_type: entity_type.into(),
            method: method.into(),
        })
    }

    /// Creates a type mismatch error for a property write.
    #[must_use]
    pub fn type_mismatch(accessor: impl Into<String>, expected: Type, actual: Type) -> Self {
        Self::new(ErrorKind::TypeMismatch {
            accessor: accessor.into(),
            expected,
            actual,
        })
    }

    /// Creates an error for a write to an immutable property.
    #[must_use]
    pub fn immutable_property(accessor: impl Into<String>) -> Self {
        Self::new(ErrorKind::ImmutableProperty(accessor.into()))
    }

    /// Creates an invalid reference error.
    #[must_use]
    pub fn invalid_reference(identity: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidReference(identity.into()))
    }

    /// Creates an invalid schema error.
    #[must_use]
    pub fn invalid_schema(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidSchema(message.into()))
    }

    /// Creates a semantic limit exceeded error.
    #[must_use]
    pub fn limit_exceeded(limit: SemanticLimit) -> Self {
        Self::new(ErrorKind::LimitExceeded(limit))
    }

    /// Creates an internal error.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal(message.into()))
    }

    /// Returns true if this is a not-found error.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self.kind, ErrorKind::NotFound(_))
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(context) = &self.context {
            write!(f, " {context}")?;
        }
        Ok(())
    }
}

impl std::error::Error for Error {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        std::error::Error::source(&self.kind)
    }
}

impl From<ErrorKind> for Error {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

/// Categorized error kinds for pattern matching.
#[derive(Debug, Error)]
pub enum ErrorKind {
    /// The reference has no backing state, or the entity was removed.
    #[error("no such entity: {0}")]
    NotFound(EntityReference),

    /// An entity with this identity already exists.
    #[error("entity already exists: {0}")]
    AlreadyExists(EntityReference),

    /// The owning unit of work has been completed or discarded.
    #[error("unit of work has been closed")]
    ScopeClosed,

    /// Mutation of entity state that has already been removed.
    #[error("entity removed: {0}")]
    EntityRemoved(EntityReference),

    /// One or more declared constraints are not satisfied.
    #[error("{0}")]
    ConstraintViolation(ConstraintViolations),

    /// The storage backend failed while constructing new entity state.
    #[error("could not create {entity_type} {reference}: {source}")]
    Construction {
        /// The entity type being created.
        entity_type: String,
        /// The identity being created.
        reference: EntityReference,
        /// The backend failure.
        #[source]
        source: Box<Error>,
    },

    /// Backend I/O or consistency failure.
    #[error("storage failure: {0}")]
    Storage(String),

    /// Another unit of work changed these entities since they were loaded.
    #[error("concurrent modification of {0:?}")]
    ConcurrentModification(Vec<EntityReference>),

    /// No state of this kind is declared under the given name.
    #[error("unknown {kind}: {name}")]
    UnknownAccessor {
        /// The kind that was looked up.
        kind: AccessorKind,
        /// The name or accessor that was not found.
        name: String,
    },

    /// The name exists but is declared as a different kind of state.
    #[error("{name} is declared as {actual}, not {expected}")]
    AccessorKindMismatch {
        /// The name that was looked up.
        name: String,
        /// The kind the caller asked for.
        expected: AccessorKind,
        /// The kind actually declared.
        actual: AccessorKind,
    },

    /// No registered entity model provides the requested type.
    #[error("no such entity type: {0}")]
    NoSuchEntityType(String),

    /// The entity type's method table has no such method.
    #[error("{entity_type} has no method {method}")]
    UnknownMethod {
        /// The entity type.
        entity_type: String,
        /// The requested method name.
        method: String,
    },

    /// A property write did not match the declared type.
    #[error("type mismatch on {accessor}: expected {expected}, got {actual}")]
    TypeMismatch {
        /// The property written.
        accessor: String,
        /// The declared type.
        expected: Type,
        /// The type of the rejected value.
        actual: Type,
    },

    /// Write to an immutable property after creation.
    #[error("property is immutable: {0}")]
    ImmutableProperty(String),

    /// Malformed identity string.
    #[error("invalid entity reference: {0:?}")]
    InvalidReference(String),

    /// Inconsistent schema declaration.
    #[error("invalid schema: {0}")]
    InvalidSchema(String),

    /// Semantic limit exceeded (kill switch triggered).
    #[error("limit exceeded: {0}")]
    LimitExceeded(SemanticLimit),

    /// Internal error (should not happen).
    #[error("internal error: {0}")]
    Internal(String),
}

/// A single failed constraint on one accessor.
#[derive(Clone, Debug, PartialEq)]
pub struct Violation {
    /// Bare name of the property or association.
    pub accessor: String,
    /// Name of the violated constraint (e.g. `not-null`).
    pub constraint: String,
    /// The offending value; associations report the reference identity.
    pub value: Value,
}

impl Violation {
    /// Creates a violation record.
    #[must_use]
    pub fn new(accessor: impl Into<String>, constraint: impl Into<String>, value: Value) -> Self {
        Self {
            accessor: accessor.into(),
            constraint: constraint.into(),
            value,
        }
    }
}

impl fmt::Display for Violation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} violates {} (value: {:?})",
            self.accessor, self.constraint, self.value
        )
    }
}

/// Constraint violations, optionally attributed to their owning entity.
#[derive(Clone, Debug, PartialEq)]
pub struct ConstraintViolations {
    /// Entity type owning the violated state, once known.
    pub entity_type: Option<String>,
    /// Entity owning the violated state, once known.
    pub reference: Option<EntityReference>,
    /// The individual violations.
    pub violations: Vec<Violation>,
}

impl ConstraintViolations {
    /// Returns true if any violation concerns the given accessor.
    #[must_use]
    pub fn involves(&self, accessor: &str) -> bool {
        self.violations.iter().any(|v| v.accessor == accessor)
    }
}

impl fmt::Display for ConstraintViolations {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "constraint violation")?;
        match (&self.entity_type, &self.reference) {
            (Some(ty), Some(reference)) => write!(f, " in {ty} {reference}")?,
            (Some(ty), None) => write!(f, " in {ty}")?,
            (None, Some(reference)) => write!(f, " in {reference}")?,
            (None, None) => {}
        }
        write!(f, ":")?;
        for violation in &self.violations {
            write!(f, " [{violation}]")?;
        }
        Ok(())
    }
}

/// Semantic limits (kill switches) that can be exceeded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SemanticLimit {
    /// Aggregation cascade went deeper than allowed.
    MaxCascadeDepth {
        /// The configured limit.
        limit: usize,
        /// The entity at which the limit was hit.
        reference: Option<EntityReference>,
    },
}

impl fmt::Display for SemanticLimit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MaxCascadeDepth { limit, reference } => {
                write!(f, "max cascade depth ({limit}) exceeded")?;
                if let Some(reference) = reference {
                    write!(f, " at {reference}")?;
                }
                Ok(())
            }
        }
    }
}

/// Context about where an error occurred.
#[derive(Debug, Clone, Default)]
pub struct ErrorContext {
    /// Usecase of the unit of work that raised the error.
    pub usecase: Option<String>,
    /// Entity type involved.
    pub entity_type: Option<String>,
    /// Entity involved.
    pub reference: Option<EntityReference>,
    /// Accessor involved.
    pub accessor: Option<String>,
    /// Path through the entity graph, innermost first.
    pub stack: Vec<String>,
}

impl ErrorContext {
    /// Creates a new empty context.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the usecase.
    #[must_use]
    pub fn with_usecase(mut self, usecase: impl Into<String>) -> Self {
        self.usecase = Some(usecase.into());
        self
    }

    /// Sets the entity type and reference.
    #[must_use]
    pub fn with_entity(mut self, entity_type: impl Into<String>, reference: EntityReference) -> Self {
        self.entity_type = Some(entity_type.into());
        self.reference = Some(reference);
        self
    }

    /// Sets the accessor.
    #[must_use]
    pub fn with_accessor(mut self, accessor: impl Into<String>) -> Self {
        self.accessor = Some(accessor.into());
        self
    }

    /// Adds a stack frame.
    #[must_use]
    pub fn with_frame(mut self, frame: impl Into<String>) -> Self {
        self.stack.push(frame.into());
        self
    }
}

impl fmt::Display for ErrorContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let (Some(ty), Some(reference)) = (&self.entity_type, &self.reference) {
            write!(f, "at {ty} {reference}")?;
            if let Some(accessor) = &self.accessor {
                write!(f, ".{accessor}")?;
            }
        }
        if let Some(usecase) = &self.usecase {
            write!(f, " (usecase {usecase})")?;
        }
        for frame in &self.stack {
            write!(f, "\n  in {frame}")?;
        }
        Ok(())
    }
}
