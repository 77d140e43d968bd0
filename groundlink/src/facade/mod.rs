//! Narrow named-variable facades into the two simulated systems.
//!
//! The core never talks to a simulator directly. It consumes two traits:
//!
//! - [`AircraftDataFacade`] - named reads/writes into the aircraft-systems
//!   simulation (fuel quantity, door flags, passenger counts, ...)
//! - [`GroundServiceDataFacade`] - the same named surface into the
//!   ground-services simulation, plus its automation triggers
//!
//! Both share [`VariableAccess`], which moves untyped [`DataValue`]s. Callers
//! use the typed accessor from [`TypedRead`] instead of casting by hand; a
//! value of the wrong kind becomes [`DataAccessError::TypeMismatch`].

mod error;
mod memory;
mod value;

pub use error::DataAccessError;
pub use memory::{InMemoryFacade, ServiceCall};
pub use value::{DataValue, FromDataValue};

use crate::orchestrator::ServiceType;

/// Untyped named read/write surface shared by both facades.
pub trait VariableAccess: Send + Sync {
    /// Read the current value of a named variable.
    fn read_value(&self, name: &str) -> Result<DataValue, DataAccessError>;

    /// Write a named variable.
    fn write_value(&self, name: &str, value: DataValue) -> Result<(), DataAccessError>;
}

/// Facade into the aircraft-systems simulation.
pub trait AircraftDataFacade: VariableAccess {}

/// Facade into the ground-services simulation.
pub trait GroundServiceDataFacade: VariableAccess {
    /// Ask the ground-services simulation to start an automated service.
    fn trigger_service(&self, service: ServiceType) -> Result<(), DataAccessError>;

    /// Ask the ground-services simulation to abandon an automated service.
    fn cancel_service(&self, service: ServiceType) -> Result<(), DataAccessError>;
}

/// Typed accessor over any [`VariableAccess`] implementation.
pub trait TypedRead {
    /// Read a named variable and convert it to `T`.
    fn read<T: FromDataValue>(&self, name: &str) -> Result<T, DataAccessError>;

    /// Convenience wrapper converting `value` into a [`DataValue`].
    fn write<V: Into<DataValue>>(&self, name: &str, value: V) -> Result<(), DataAccessError>;
}

impl<F: VariableAccess + ?Sized> TypedRead for F {
    fn read<T: FromDataValue>(&self, name: &str) -> Result<T, DataAccessError> {
        let value = self.read_value(name)?;
        T::from_data_value(name, value)
    }

    fn write<V: Into<DataValue>>(&self, name: &str, value: V) -> Result<(), DataAccessError> {
        self.write_value(name, value.into())
    }
}
