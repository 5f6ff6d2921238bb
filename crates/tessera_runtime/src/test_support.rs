//! Shared model for unit tests.

use tessera_foundation::{Result, Type, Value};
use tessera_storage::{
    AssociationDescriptor, Constraint, EntityStateModel, MemoryEntityStore, PropertyDescriptor,
};

use crate::instance::Entity;
use crate::model::{EntityModel, Method};
use crate::module::EntityModule;

fn describe(entity: &Entity, _args: &[Value]) -> Result<Value> {
    Ok(Value::from(format!("{} {}", entity.get("name")?, entity.reference())))
}

pub(crate) fn person() -> EntityModel {
    let state = EntityStateModel::builder("Person")
        .with_property(
            PropertyDescriptor::required("name", Type::String).with_constraint(Constraint::NotEmpty),
        )
        .with_property(PropertyDescriptor::optional("age", Type::Int))
        .with_association(AssociationDescriptor::optional("address", "Address").aggregated())
        .with_association(AssociationDescriptor::optional("country", "Country"))
        .with_many_association(AssociationDescriptor::optional("phones", "Phone").aggregated())
        .with_named_association(AssociationDescriptor::optional("contacts", "Person"))
        .build()
        .unwrap();
    EntityModel::builder(state)
        .with_type("Named")
        .with_method(Method::new("describe", "Describer", describe))
        .build()
        .unwrap()
}

pub(crate) fn leaf(entity_type: &str) -> EntityModel {
    let state = EntityStateModel::builder(entity_type)
        .with_property(PropertyDescriptor::optional("label", Type::String))
        .build()
        .unwrap();
    EntityModel::builder(state).build().unwrap()
}

pub(crate) fn node() -> EntityModel {
    let state = EntityStateModel::builder("Node")
        .with_association(AssociationDescriptor::optional("next", "Node").aggregated())
        .build()
        .unwrap();
    EntityModel::builder(state).build().unwrap()
}

pub(crate) fn module() -> (EntityModule, MemoryEntityStore) {
    let store = MemoryEntityStore::new();
    let module = EntityModule::builder("test")
        .with_entity(person())
        .with_entity(leaf("Address"))
        .with_entity(leaf("Country"))
        .with_entity(leaf("Phone"))
        .with_entity(node())
        .build(store.clone())
        .unwrap();
    (module, store)
}

pub(crate) fn new_person(uow: &crate::UnitOfWork, name: &str) -> Entity {
    let builder = uow.new_entity_builder("Person").unwrap();
    builder.prototype().set("name", name).unwrap();
    builder.new_instance().unwrap()
}
