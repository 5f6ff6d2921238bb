//! Integration tests for aggregation
//!
//! Tests cascading removal through aggregated associations, cycle safety
//! and the cascade depth limit.

use tessera_foundation::{ErrorKind, SemanticLimit};
use tessera_runtime::{Entity, UnitOfWork, UnitOfWorkConfig};
use tessera_storage::{EntityStatus, Usecase};

use crate::fixtures::{household, module, new_named, new_person};

fn chain(uow: &UnitOfWork, len: usize) -> Vec<Entity> {
    let nodes: Vec<Entity> = (0..len).map(|_| uow.new_entity("Node").unwrap()).collect();
    for pair in nodes.windows(2) {
        pair[0].association("next").unwrap().set(Some(&pair[1])).unwrap();
    }
    nodes
}

// =============================================================================
// Cascading Removal
// =============================================================================

#[test]
fn removal_cascades_to_aggregated_entities_only() {
    let (module, store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    let person = uow.get(&home.person).unwrap();
    uow.remove(&person).unwrap();

    assert!(uow.get(&home.address).unwrap_err().is_not_found());
    for phone in &home.phones {
        assert!(uow.get(phone).unwrap_err().is_not_found());
    }
    assert!(uow.get(&home.country).is_ok());
    uow.complete().unwrap();

    assert!(!store.contains(&home.person));
    assert!(!store.contains(&home.address));
    assert!(home.phones.iter().all(|phone| !store.contains(phone)));
    assert!(store.contains(&home.country));
}

#[test]
fn discarded_removal_leaves_store_untouched() {
    let (module, store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    let person = uow.get(&home.person).unwrap();
    uow.remove(&person).unwrap();
    uow.discard();

    assert!(store.contains(&home.person));
    assert!(store.contains(&home.address));
}

#[test]
fn cascade_into_removed_child_is_not_found() {
    let (module, _store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    let address = uow.get(&home.address).unwrap();
    uow.remove(&address).unwrap();

    let person = uow.get(&home.person).unwrap();
    let err = uow.remove(&person).unwrap_err();
    assert!(err.is_not_found());
    let context = err.context.expect("cascade frames");
    assert!(context.stack.iter().any(|frame| frame.contains("Person")));
}

#[test]
fn removal_cascades_through_named_associations() {
    let (module, store) = module();
    let uow = module.new_unit_of_work();
    let person = new_person(&uow, "Ada");
    let phone_book = person.named_association("phone_book").unwrap();
    let mut phones = Vec::new();
    for (name, number) in [
        ("Home", "555-0100"),
        ("Chinese", "555-0101"),
        ("Swedish", "555-0102"),
        ("German", "555-0103"),
    ] {
        let phone = new_named(&uow, "PhoneNumber", "number", number);
        assert!(phone_book.put(name, &phone).unwrap());
        phones.push(phone.reference().clone());
    }
    let reference = person.reference().clone();
    uow.complete().unwrap();

    let uow = module.new_unit_of_work();
    let person = uow.get(&reference).unwrap();
    uow.remove(&person).unwrap();
    for phone in &phones {
        assert!(uow.get(phone).unwrap_err().is_not_found());
    }
    uow.complete().unwrap();
    assert!(phones.iter().all(|phone| !store.contains(phone)));
}

#[test]
fn shared_aggregated_child_is_removed_once() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let owner = uow.new_entity("Node").unwrap();
    let middle = uow.new_entity("Node").unwrap();
    let shared = uow.new_entity("Node").unwrap();
    owner.association("next").unwrap().set(Some(&middle)).unwrap();
    owner.many_association("children").unwrap().push(&shared).unwrap();
    middle.association("next").unwrap().set(Some(&shared)).unwrap();

    uow.remove(&owner).unwrap();
    assert!(owner.is_removed());
    assert!(middle.is_removed());
    assert!(shared.is_removed());
    uow.complete().unwrap();
}

#[test]
fn failed_cascade_leaves_every_entity_untouched() {
    let (module, _store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    let second_phone = uow.get(&home.phones[1]).unwrap();
    uow.remove(&second_phone).unwrap();

    let person = uow.get(&home.person).unwrap();
    assert!(uow.remove(&person).unwrap_err().is_not_found());

    assert_eq!(person.status(), EntityStatus::Loaded);
    assert_eq!(person.get("name").unwrap().as_str(), Some("Ada"));
    let address = uow.get(&home.address).unwrap();
    assert_eq!(address.status(), EntityStatus::Loaded);
    let first_phone = uow.get(&home.phones[0]).unwrap();
    assert_eq!(first_phone.status(), EntityStatus::Loaded);
}

// =============================================================================
// Cycles
// =============================================================================

#[test]
fn aggregation_cycle_terminates() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let nodes = chain(&uow, 3);
    nodes[2].association("next").unwrap().set(Some(&nodes[0])).unwrap();

    uow.remove(&nodes[0]).unwrap();
    assert!(nodes.iter().all(|node| node.is_removed()));
    uow.complete().unwrap();
}

#[test]
fn self_aggregation_terminates() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let node = uow.new_entity("Node").unwrap();
    node.association("next").unwrap().set(Some(&node)).unwrap();

    uow.remove(&node).unwrap();
    assert!(node.is_removed());
}

// =============================================================================
// Depth Limit
// =============================================================================

#[test]
fn deep_cascade_hits_configured_limit() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work_with(
        Usecase::new("deep"),
        UnitOfWorkConfig::default().with_max_cascade_depth(4),
    );
    let nodes = chain(&uow, 10);

    let err = uow.remove(&nodes[0]).unwrap_err();
    assert!(matches!(
        err.kind,
        ErrorKind::LimitExceeded(SemanticLimit::MaxCascadeDepth { limit: 4, .. })
    ));
    assert!(!nodes[0].is_removed());
    assert!(uow.is_open());
}

#[test]
fn cascade_within_limit_succeeds() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work_with(
        Usecase::new("shallow"),
        UnitOfWorkConfig::default().with_max_cascade_depth(4),
    );
    let nodes = chain(&uow, 5);
    uow.remove(&nodes[0]).unwrap();
    assert!(nodes.iter().all(|node| node.is_removed()));
}
