//! Property wrappers.

use std::fmt;
use std::rc::Rc;

use tessera_foundation::{Error, Result, Value, Violation};
use tessera_storage::{EntityStatus, PropertyDescriptor};

use crate::state_instance::StateHandle;

/// Typed view of one property of one entity.
///
/// Reads and writes go straight to the entity's state.
pub struct PropertyInstance {
    handle: Rc<StateHandle>,
    slot: usize,
}

impl PropertyInstance {
    pub(crate) fn new(handle: Rc<StateHandle>, slot: usize) -> Self {
        Self { handle, slot }
    }

    /// Returns the property's declaration.
    #[must_use]
    pub fn descriptor(&self) -> &PropertyDescriptor {
        &self.handle.model.state_model().properties()[self.slot]
    }

    /// Returns the bare property name.
    #[must_use]
    pub fn name(&self) -> &str {
        self.descriptor().name()
    }

    /// Reads the current value.
    ///
    /// # Errors
    ///
    /// Returns `ScopeClosed` if the unit of work is no longer open, or
    /// `NotFound` if the entity has been removed.
    pub fn get(&self) -> Result<Value> {
        self.handle.guard()?;
        Ok(self
            .handle
            .state
            .borrow()
            .property_value_of(self.descriptor().qualified_name()))
    }

    /// Writes a new value.
    ///
    /// Only the declared type and immutability are checked here; constraints
    /// are checked by [`PropertyInstance::check_constraints`].
    ///
    /// # Errors
    ///
    /// Returns `TypeMismatch` if the declared type does not accept the value,
    /// `ImmutableProperty` when writing an immutable property of a stored
    /// entity, and the errors of [`PropertyInstance::get`].
    pub fn set(&self, value: impl Into<Value>) -> Result<()> {
        self.handle.guard()?;
        let value = value.into();
        let descriptor = self.descriptor();
        descriptor
            .check_type(&value)
            .map_err(|err| err.with_context(self.handle.context(descriptor.name())))?;

        let mut state = self.handle.state.borrow_mut();
        if descriptor.is_immutable() && state.status() != EntityStatus::New {
            return Err(Error::immutable_property(descriptor.name())
                .with_context(self.handle.context(descriptor.name())));
        }
        state.set_property_value(descriptor.qualified_name(), value)
    }

    /// Returns every declared constraint the current value violates.
    ///
    /// # Errors
    ///
    /// See [`PropertyInstance::get`].
    pub fn violations(&self) -> Result<Vec<Violation>> {
        Ok(self.descriptor().violations(&self.get()?))
    }

    /// Validates the current value against the declaration.
    ///
    /// # Errors
    ///
    /// Returns `ConstraintViolation` for the violated constraints, and the
    /// errors of [`PropertyInstance::get`].
    pub fn check_constraints(&self) -> Result<()> {
        let violations = self.violations()?;
        if violations.is_empty() {
            Ok(())
        } else {
            Err(Error::constraint_violation(violations))
        }
    }
}

impl fmt::Debug for PropertyInstance {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "PropertyInstance({} {}.{})",
            self.handle.model.entity_type(),
            self.handle.reference,
            self.name()
        )
    }
}
