//! Fuel transfer commands.
//!
//! Starting a transfer takes two steps. [`PrepareTransfer`] sets the target and
//! zeroes the rate; [`ActivateTransfer`] switches the transfer on once the
//! fuel truck is physically connected.

use crate::facade::{AircraftDataFacade, DataAccessError, TypedRead};

pub(crate) const VAR_CURRENT: &str = "fuel.current";
pub(crate) const VAR_PLANNED: &str = "fuel.planned";
pub(crate) const VAR_TARGET: &str = "fuel.target";
pub(crate) const VAR_RATE: &str = "fuel.transfer_rate";
pub(crate) const VAR_POWER: &str = "fuel.transfer_power";

/// A single write sequence against the aircraft facade.
pub trait FuelCommand {
    fn name(&self) -> &'static str;

    fn execute(&self, facade: &dyn AircraftDataFacade) -> Result<(), DataAccessError>;
}

/// Write the transfer target and zero the rate.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PrepareTransfer {
    pub target: f64,
}

impl PrepareTransfer {
    /// Target `planned` rounded up to the next multiple of 100.
    pub fn for_planned(planned: f64) -> Self {
        Self {
            target: (planned / 100.0).ceil() * 100.0,
        }
    }
}

impl FuelCommand for PrepareTransfer {
    fn name(&self) -> &'static str {
        "prepare transfer"
    }

    fn execute(&self, facade: &dyn AircraftDataFacade) -> Result<(), DataAccessError> {
        facade.write(VAR_TARGET, self.target)?;
        facade.write(VAR_RATE, 0.0)
    }
}

/// Switch the transfer pump on at `rate` units per second.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ActivateTransfer {
    pub rate: f64,
}

impl FuelCommand for ActivateTransfer {
    fn name(&self) -> &'static str {
        "activate transfer"
    }

    fn execute(&self, facade: &dyn AircraftDataFacade) -> Result<(), DataAccessError> {
        facade.write(VAR_RATE, self.rate)?;
        facade.write(VAR_POWER, true)
    }
}

/// Switch the pump off and zero the rate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct StopTransfer;

impl FuelCommand for StopTransfer {
    fn name(&self) -> &'static str {
        "stop transfer"
    }

    fn execute(&self, facade: &dyn AircraftDataFacade) -> Result<(), DataAccessError> {
        facade.write(VAR_POWER, false)?;
        facade.write(VAR_RATE, 0.0)
    }
}
