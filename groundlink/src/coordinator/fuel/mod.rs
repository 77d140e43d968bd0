//! Fuel quantity and the refueling workflow.

mod commands;
mod coordinator;
mod refueling;
mod units;

pub use commands::{ActivateTransfer, FuelCommand, PrepareTransfer, StopTransfer};
pub use coordinator::{FuelCoordinator, FuelSettings, FuelState, TransferTick};
pub use refueling::{RefuelingStateChange, RefuelingStateManager, RefuelingSubState};
pub use units::FuelUnits;
