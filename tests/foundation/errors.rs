//! Integration tests for Error types
//!
//! Tests error construction, display, context, and error kinds.

use std::error::Error as _;

use tessera_foundation::{
    AccessorKind, EntityReference, Error, ErrorContext, ErrorKind, SemanticLimit, Type, Value,
    Violation,
};

// =============================================================================
// Error Construction
// =============================================================================

#[test]
fn error_not_found() {
    let err = Error::not_found(EntityReference::new("p1"));
    assert!(err.is_not_found());
    assert!(format!("{err}").contains("p1"));
}

#[test]
fn error_unknown_accessor() {
    let err = Error::unknown_accessor(AccessorKind::NamedAssociation, "friends");
    assert!(matches!(err.kind, ErrorKind::UnknownAccessor { kind: AccessorKind::NamedAssociation, .. }));
    assert_eq!(err.to_string(), "unknown named-association: friends");
}

#[test]
fn error_accessor_kind_mismatch() {
    let err = Error::accessor_kind_mismatch(
        "phones",
        AccessorKind::Association,
        AccessorKind::ManyAssociation,
    );
    assert_eq!(
        err.to_string(),
        "phones is declared as many-association, not association"
    );
}

#[test]
fn error_type_mismatch() {
    let err = Error::type_mismatch("age", Type::Int, Type::String);
    if let ErrorKind::TypeMismatch { accessor, expected, actual } = &err.kind {
        assert_eq!(accessor, "age");
        assert_eq!(*expected, Type::Int);
        assert_eq!(*actual, Type::String);
    } else {
        panic!("expected TypeMismatch");
    }
}

#[test]
fn error_limit_exceeded() {
    let err = Error::limit_exceeded(SemanticLimit::MaxCascadeDepth {
        limit: 4,
        reference: Some(EntityReference::new("p1")),
    });
    let msg = err.to_string();
    assert!(msg.contains('4'));
    assert!(msg.contains("p1"));
}

// =============================================================================
// Construction Failures
// =============================================================================

#[test]
fn construction_keeps_backend_cause() {
    let err = Error::construction(
        "Person",
        EntityReference::new("p1"),
        Error::storage("disk full"),
    );
    assert!(!err.is_not_found());
    let source = err.source().expect("backend cause");
    assert!(source.to_string().contains("disk full"));
}

// =============================================================================
// Constraint Violations
// =============================================================================

#[test]
fn constraint_violation_lists_every_violation() {
    let err = Error::constraint_violation(vec![
        Violation::new("name", "not-empty", Value::from("")),
        Violation::new("age", "range", Value::Int(-1)),
    ]);
    let ErrorKind::ConstraintViolation(violations) = &err.kind else {
        panic!("expected ConstraintViolation");
    };
    assert!(violations.involves("name"));
    assert!(violations.involves("age"));
    assert!(!violations.involves("address"));
    assert!(violations.reference.is_none());
    assert!(err.to_string().starts_with("constraint violation:"));
}

// =============================================================================
// Error Context
// =============================================================================

#[test]
fn context_is_rendered_after_kind() {
    let err = Error::immutable_property("identity").with_context(
        ErrorContext::new()
            .with_entity("Person", EntityReference::new("p1"))
            .with_accessor("identity")
            .with_usecase("import"),
    );
    assert_eq!(
        err.to_string(),
        "property is immutable: identity at Person p1.identity (usecase import)"
    );
}

#[test]
fn frames_accumulate_innermost_first() {
    let err = Error::not_found(EntityReference::new("a1"))
        .with_frame("removing Address a1")
        .with_frame("removing Person p1");
    let context = err.context.expect("frames create a context");
    assert_eq!(context.stack, ["removing Address a1", "removing Person p1"]);
}

#[test]
fn with_context_replaces_previous_context() {
    let err = Error::scope_closed()
        .with_context(ErrorContext::new().with_usecase("first"))
        .with_context(ErrorContext::new().with_usecase("second"));
    assert_eq!(err.context.unwrap().usecase.as_deref(), Some("second"));
}
