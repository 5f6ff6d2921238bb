//! Integration tests for entity references
//!
//! Tests identity equality, parsing and generation.

use std::collections::HashSet;

use tessera_foundation::{EntityReference, ErrorKind};

// =============================================================================
// Equality
// =============================================================================

#[test]
fn references_with_same_identity_are_equal() {
    let a = EntityReference::new("person-1");
    let b = EntityReference::from(String::from("person-1"));
    assert_eq!(a, b);

    let set: HashSet<_> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn references_order_by_identity() {
    let mut refs = vec![
        EntityReference::new("c"),
        EntityReference::new("a"),
        EntityReference::new("b"),
    ];
    refs.sort();
    let ids: Vec<_> = refs.iter().map(EntityReference::identity).collect();
    assert_eq!(ids, ["a", "b", "c"]);
}

#[test]
fn display_is_identity() {
    let r = EntityReference::new("person-1");
    assert_eq!(r.to_string(), "person-1");
    assert_eq!(r.as_ref(), "person-1");
}

// =============================================================================
// Parsing
// =============================================================================

#[test]
fn parse_accepts_plain_identity() {
    let r = EntityReference::parse("order/42").unwrap();
    assert_eq!(r.identity(), "order/42");
}

#[test]
fn parse_rejects_empty_and_whitespace() {
    for bad in ["", "two words", "tab\there", " lead"] {
        let err = EntityReference::parse(bad).unwrap_err();
        assert!(matches!(err.kind, ErrorKind::InvalidReference(_)), "{bad:?}");
    }
}

// =============================================================================
// Generation
// =============================================================================

#[test]
fn generated_references_are_unique() {
    let refs: HashSet<_> = (0..1_000).map(|_| EntityReference::generate()).collect();
    assert_eq!(refs.len(), 1_000);
}

#[test]
fn generated_references_keep_prefix() {
    let r = EntityReference::generate_with_prefix("person-");
    assert!(r.identity().starts_with("person-"));
    assert!(r.identity().len() > "person-".len());
    assert!(EntityReference::parse(r.identity()).is_ok());
}
