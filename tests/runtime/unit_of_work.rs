//! Integration tests for units of work
//!
//! Tests completion, discarding, optimistic concurrency, callbacks and
//! backend failures during construction.

use std::cell::RefCell;
use std::rc::Rc;

use tessera_foundation::{EntityReference, Error, ErrorKind, Result, Value};
use tessera_runtime::{
    EntityModel, EntityModule, UnitOfWork, UnitOfWorkCallback, UnitOfWorkStatus,
};
use tessera_storage::{
    EntityState, EntityStateModel, EntityStore, EntityStoreUnitOfWork, MemoryEntityStore,
    Usecase,
};

use crate::fixtures::{household, module, new_person, node, person};

// =============================================================================
// Completion
// =============================================================================

#[test]
fn complete_persists_changes() {
    let (module, _store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    uow.get(&home.person).unwrap().set("age", 36).unwrap();
    uow.complete().unwrap();

    let uow = module.new_unit_of_work();
    assert_eq!(uow.get(&home.person).unwrap().get("age").unwrap(), Value::Int(36));
}

#[test]
fn discard_drops_changes() {
    let (module, store) = module();
    let home = household(&module);

    let uow = module.new_unit_of_work();
    uow.get(&home.person).unwrap().set("age", 36).unwrap();
    let extra = new_person(&uow, "Bea");
    uow.discard();
    uow.discard();

    assert!(!store.contains(extra.reference()));
    let uow = module.new_unit_of_work();
    assert_eq!(uow.get(&home.person).unwrap().get("age").unwrap(), Value::Nil);
}

#[test]
fn closed_unit_of_work_rejects_operations() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    uow.complete().unwrap();

    assert!(!uow.is_open());
    assert!(matches!(uow.complete().unwrap_err().kind, ErrorKind::ScopeClosed));
    assert!(matches!(
        uow.new_entity("Country").unwrap_err().kind,
        ErrorKind::ScopeClosed
    ));
}

#[test]
fn dropping_open_unit_of_work_discards() {
    let (module, store) = module();
    let person = {
        let uow = module.new_unit_of_work();
        new_person(&uow, "Ada")
    };
    assert!(matches!(person.get("name").unwrap_err().kind, ErrorKind::ScopeClosed));
    assert!(store.is_empty());
}

// =============================================================================
// Optimistic Concurrency
// =============================================================================

#[test]
fn concurrent_update_is_detected() {
    let (module, _store) = module();
    let home = household(&module);

    let first = module.new_unit_of_work_for(Usecase::new("first"));
    let second = module.new_unit_of_work_for(Usecase::new("second"));
    first.get(&home.person).unwrap().set("age", 30).unwrap();
    second.get(&home.person).unwrap().set("age", 40).unwrap();

    first.complete().unwrap();
    let err = second.complete().unwrap_err();
    let context = err.context.clone().expect("usecase context");
    assert!(matches!(err.kind, ErrorKind::ConcurrentModification(ref refs) if refs.contains(&home.person)));
    assert_eq!(context.usecase.as_deref(), Some("second"));
    assert!(second.is_open());
    second.discard();

    let uow = module.new_unit_of_work();
    assert_eq!(uow.get(&home.person).unwrap().get("age").unwrap(), Value::Int(30));
}

#[test]
fn unmodified_loads_do_not_conflict() {
    let (module, _store) = module();
    let home = household(&module);

    let reader = module.new_unit_of_work();
    let writer = module.new_unit_of_work();
    reader.get(&home.person).unwrap().get("name").unwrap();
    writer.get(&home.person).unwrap().set("age", 1).unwrap();
    writer.complete().unwrap();
    reader.complete().unwrap();
}

// =============================================================================
// Callbacks
// =============================================================================

#[derive(Default)]
struct Journal {
    events: RefCell<Vec<String>>,
    veto: bool,
}

impl UnitOfWorkCallback for Journal {
    fn before_completion(&self, uow: &UnitOfWork) -> Result<()> {
        self.events.borrow_mut().push(format!("before {}", uow.usecase()));
        if self.veto {
            return Err(Error::internal("vetoed"));
        }
        Ok(())
    }

    fn after_completion(&self, status: UnitOfWorkStatus) -> Result<()> {
        self.events.borrow_mut().push(format!("after {status:?}"));
        Ok(())
    }
}

#[test]
fn callbacks_bracket_completion() {
    let (module, _store) = module();
    let journal = Rc::new(Journal::default());
    let uow = module.new_unit_of_work_for(Usecase::new("signup"));
    uow.add_callback(journal.clone());
    new_person(&uow, "Ada");
    uow.complete().unwrap();

    assert_eq!(*journal.events.borrow(), ["before signup", "after Completed"]);
}

#[test]
fn discard_notifies_without_before_completion() {
    let (module, _store) = module();
    let journal = Rc::new(Journal::default());
    let uow = module.new_unit_of_work();
    uow.add_callback(journal.clone());
    uow.discard();

    assert_eq!(*journal.events.borrow(), ["after Discarded"]);
}

#[test]
fn before_completion_can_veto() {
    let (module, store) = module();
    let journal = Rc::new(Journal { veto: true, ..Journal::default() });
    let uow = module.new_unit_of_work();
    uow.add_callback(journal.clone());
    new_person(&uow, "Ada");

    assert!(uow.complete().is_err());
    assert!(uow.is_open());
    assert!(store.is_empty());
}

// =============================================================================
// Construction Failures
// =============================================================================

struct BrokenStore;

struct BrokenUnitOfWork;

impl EntityStore for BrokenStore {
    fn new_unit_of_work(&self, _usecase: &Usecase) -> Box<dyn EntityStoreUnitOfWork> {
        Box::new(BrokenUnitOfWork)
    }
}

impl EntityStoreUnitOfWork for BrokenUnitOfWork {
    fn new_entity_state(
        &mut self,
        _reference: &EntityReference,
        _model: &EntityStateModel,
    ) -> Result<EntityState> {
        Err(Error::storage("connection reset"))
    }

    fn entity_state_of(&mut self, reference: &EntityReference) -> Result<EntityState> {
        Err(Error::not_found(reference.clone()))
    }

    fn apply_changes(&mut self, _changes: Vec<EntityState>) -> Result<()> {
        Ok(())
    }

    fn discard(&mut self) {}
}

#[test]
fn backend_failure_is_construction_error() {
    let country = EntityModel::builder(EntityStateModel::builder("Country").build().unwrap())
        .build()
        .unwrap();
    let module = EntityModule::builder("broken")
        .with_entity(country)
        .build(BrokenStore)
        .unwrap();
    let uow = module.new_unit_of_work();

    let err = uow.new_entity("Country").unwrap_err();
    let ErrorKind::Construction { entity_type, source, .. } = err.kind else {
        panic!("expected Construction, got {err}");
    };
    assert_eq!(entity_type, "Country");
    assert!(matches!(source.kind, ErrorKind::Storage(_)));
}

#[test]
fn taken_identity_is_not_a_construction_error() {
    let (module, _store) = module();
    let uow = module.new_unit_of_work();
    let reference = EntityReference::new("sweden");
    uow.new_entity_with_identity("Country", reference.clone()).unwrap();
    uow.complete().unwrap();

    let uow = module.new_unit_of_work();
    let err = uow.new_entity_with_identity("Country", reference).unwrap_err();
    assert!(matches!(err.kind, ErrorKind::AlreadyExists(_)));
}

// =============================================================================
// Module Validation
// =============================================================================

#[test]
fn module_missing_association_targets_is_rejected() {
    let store = MemoryEntityStore::new();
    let err = EntityModule::builder("incomplete")
        .with_entity(person())
        .with_entity(node())
        .build(store)
        .unwrap_err();
    assert!(matches!(err.kind, ErrorKind::InvalidSchema(_)));
}
