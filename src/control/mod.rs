//! Control loops.

pub mod thermostat;

pub use thermostat::{ThermostatController, TickOutcome};
