//! Integration tests for constraint checking
//!
//! Tests where violations surface and what they carry.

use tessera_foundation::{ErrorKind, Value};
use tessera_runtime::UnitOfWorkConfig;
use tessera_storage::{NOT_NULL, Usecase};

use crate::fixtures::{household, module, new_person};

// =============================================================================
// Creation
// =============================================================================

#[test]
fn builder_rejects_invalid_prototype() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let builder = uow.new_entity_builder("Person").unwrap();
    let reference = builder.reference().clone();

    let err = builder.new_instance().unwrap_err();
    let ErrorKind::ConstraintViolation(violations) = &err.kind else {
        panic!("expected ConstraintViolation, got {err}");
    };
    assert_eq!(violations.reference.as_ref(), Some(&reference));
    assert_eq!(violations.violations[0].accessor, "name");
    assert_eq!(violations.violations[0].constraint, NOT_NULL);
    assert!(!uow.contains(&reference));
}

// =============================================================================
// Completion
// =============================================================================

#[test]
fn complete_reports_owner_and_accessor() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let person = new_person(&uow, "Ada");
    person.set("age", 200).unwrap();

    let err = uow.complete().unwrap_err();
    let context = err.context.clone().expect("attributed violation");
    let ErrorKind::ConstraintViolation(violations) = err.kind else {
        panic!("expected ConstraintViolation");
    };
    assert_eq!(violations.reference.as_ref(), Some(person.reference()));
    assert_eq!(violations.entity_type.as_deref(), Some("Person"));
    assert!(violations.involves("age"));
    assert_eq!(violations.violations[0].value, Value::Int(200));
    assert_eq!(context.accessor.as_deref(), Some("age"));
    assert_eq!(context.reference.as_ref(), Some(person.reference()));
}

#[test]
fn failed_complete_can_be_retried() {
    let (module, store) = module();
    let uow = module.new_unit_of_work();
    let person = new_person(&uow, "Ada");
    person.set("name", "").unwrap();

    assert!(uow.complete().is_err());
    assert!(uow.is_open());
    person.set("name", "Ada").unwrap();
    uow.complete().unwrap();
    assert!(store.contains(person.reference()));
}

#[test]
fn loaded_entities_are_checked_once_modified() {
    let (module, _store) = module();
    let home = household(&module);
    let uow = module.new_unit_of_work();
    let person = uow.get(&home.person).unwrap();
    person.set("age", -1).unwrap();

    let err = uow.complete().unwrap_err();
    assert!(matches!(err.kind, ErrorKind::ConstraintViolation(_)));
}

#[test]
fn relaxed_config_skips_completion_checks() {
    let (module, store) = module();
    let uow = module.new_unit_of_work_with(Usecase::new("bulk"), UnitOfWorkConfig::relaxed());
    let person = new_person(&uow, "Ada");
    person.set("age", 999).unwrap();
    uow.complete().unwrap();
    assert!(store.contains(person.reference()));
}

// =============================================================================
// Explicit Checks
// =============================================================================

#[test]
fn explicit_check_lists_every_violation() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let person = new_person(&uow, "Ada");
    person.set("name", "").unwrap();
    person.set("age", 151).unwrap();

    let err = person.check_constraints().unwrap_err();
    let ErrorKind::ConstraintViolation(violations) = err.kind else {
        panic!("expected ConstraintViolation");
    };
    assert_eq!(violations.violations.len(), 2);
    assert!(violations.involves("name"));
    assert!(violations.involves("age"));
}
