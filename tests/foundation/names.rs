//! Integration tests for qualified names and accessor kinds

use tessera_foundation::{AccessorKind, ErrorKind, QualifiedName};

// =============================================================================
// Qualified Names
// =============================================================================

#[test]
fn qualified_name_parts() {
    let name = QualifiedName::new("Person", "address");
    assert_eq!(name.type_name(), "Person");
    assert_eq!(name.name(), "address");
    assert_eq!(name.to_string(), "Person:address");
}

#[test]
fn qualified_name_parses_from_display() {
    let name: QualifiedName = "Person:address".parse().unwrap();
    assert_eq!(name, QualifiedName::new("Person", "address"));
}

#[test]
fn qualified_name_splits_on_last_colon() {
    let name: QualifiedName = "app:Person:address".parse().unwrap();
    assert_eq!(name.type_name(), "app:Person");
    assert_eq!(name.name(), "address");
}

#[test]
fn malformed_qualified_names_are_rejected() {
    for bad in ["address", ":address", "Person:", ""] {
        let err = bad.parse::<QualifiedName>().unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidSchema(_)), "{bad:?}");
    }
}

#[test]
fn same_name_on_different_types_differs() {
    assert_ne!(
        QualifiedName::new("Person", "name"),
        QualifiedName::new("Country", "name")
    );
}

// =============================================================================
// Accessor Kinds
// =============================================================================

#[test]
fn accessor_kind_display() {
    assert_eq!(AccessorKind::Property.to_string(), "property");
    assert_eq!(AccessorKind::Association.to_string(), "association");
    assert_eq!(AccessorKind::ManyAssociation.to_string(), "many-association");
    assert_eq!(AccessorKind::NamedAssociation.to_string(), "named-association");
}
