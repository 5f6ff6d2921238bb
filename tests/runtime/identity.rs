//! Integration tests for entity identity
//!
//! Tests equality by reference, the identity map and typed loading.

use std::collections::HashSet;

use tessera_foundation::{EntityReference, ErrorKind};
use tessera_runtime::{Entity, UnitOfWorkConfig};
use tessera_storage::Usecase;

use crate::fixtures::{household, module, new_person};

// =============================================================================
// Equality
// =============================================================================

#[test]
fn entities_from_different_units_of_work_are_equal() {
    let (module, _store) = module();
    let home = household(&module);

    let first = module.new_unit_of_work();
    let second = module.new_unit_of_work();
    let a = first.get(&home.person).unwrap();
    let b = second.get(&home.person).unwrap();

    assert_eq!(a, b);
    assert!(!Entity::ptr_eq(&a, &b));
    let set: HashSet<_> = [a, b].into_iter().collect();
    assert_eq!(set.len(), 1);
}

#[test]
fn identity_map_returns_same_instance() {
    let (module, _store) = module();
    let home = household(&module);
    let uow = module.new_unit_of_work();

    let a = uow.get(&home.person).unwrap();
    let b = uow.get(&home.person).unwrap();
    assert!(Entity::ptr_eq(&a, &b));
    assert!(uow.contains(&home.person));
}

#[test]
fn identity_property_matches_reference() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let person = new_person(&uow, "Ada");
    assert_eq!(
        person.get("identity").unwrap().as_str(),
        Some(person.reference().identity())
    );
}

// =============================================================================
// Loading
// =============================================================================

#[test]
fn unknown_reference_is_not_found() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let err = uow.get(&EntityReference::new("nobody")).unwrap_err();
    assert!(err.is_not_found());
}

#[test]
fn typed_get_checks_declared_types() {
    let (module, _store) = module();
    let home = household(&module);
    let uow = module.new_unit_of_work();

    assert!(uow.get_typed(&home.person, "Person").is_ok());
    assert!(uow.get_typed(&home.person, "Named").is_ok());
    let err = uow.get_typed(&home.person, "Country").unwrap_err();
    assert!(matches!(err.kind, ErrorKind::NoSuchEntityType(_)));
}

#[test]
fn explicit_identity_is_kept() {
    let (module, store) = module();
    let uow = module.new_unit_of_work();
    let reference = EntityReference::new("sweden");
    let country = uow.new_entity_with_identity("Country", reference.clone()).unwrap();
    assert_eq!(country.reference(), &reference);
    uow.complete().unwrap();
    assert!(store.contains(&reference));
}

#[test]
fn generated_identities_use_configured_prefix() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work_with(
        Usecase::new("import"),
        UnitOfWorkConfig::default().with_identity_prefix("person-"),
    );
    let person = new_person(&uow, "Ada");
    assert!(person.reference().identity().starts_with("person-"));
}

// =============================================================================
// Properties
// =============================================================================

mod proptests {
    use std::collections::hash_map::DefaultHasher;
    use std::hash::{Hash, Hasher};

    use proptest::prelude::*;
    use tessera_foundation::EntityReference;

    use crate::fixtures::module;

    fn hash_of<T: Hash>(value: &T) -> u64 {
        let mut hasher = DefaultHasher::new();
        value.hash(&mut hasher);
        hasher.finish()
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(32))]

        #[test]
        fn equal_references_give_equal_entities(identity in "[a-z][a-z0-9-]{0,15}") {
            let (module, _store) = module();
            let reference = EntityReference::new(identity.as_str());
            let uow = module.new_unit_of_work();
            uow.new_entity_with_identity("Country", reference.clone()).unwrap();
            uow.complete().unwrap();

            let first = module.new_unit_of_work();
            let second = module.new_unit_of_work();
            let a = first.get(&reference).unwrap();
            let b = second.get(&EntityReference::parse(&identity).unwrap()).unwrap();
            prop_assert_eq!(&a, &b);
            prop_assert_eq!(hash_of(&a), hash_of(&b));
        }
    }
}
