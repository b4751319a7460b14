//! Thermostat decision loop.
//!
//! Each tick, in order:
//!
//! 1. Read the current temperature and the setpoint.
//! 2. Run the maximum on-time guard. A forced off ends the tick.
//! 3. Without a published reading, do nothing.
//! 4. At or below target request on, above target request off.
//!
//! The controller never waits on a decision beyond the relay call; the
//! gatekeeper decides whether the request is honoured.

use std::sync::Arc;

use log::{debug, warn};

use crate::app::ports::{ClockPort, RelayActuator, TransitionRecorder};
use crate::error::ActuatorError;
use crate::safety::{Decision, SafetyGateKeeper};

pub const BELOW_TARGET_REASON: &str = "temperature at or below target";
pub const ABOVE_TARGET_REASON: &str = "temperature above target";

/// What one controller tick did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// The maximum on-time guard switched the relay off.
    ForcedOff,
    /// No temperature has been published yet.
    NoReading,
    /// A normal on/off request was made.
    Decided(Decision),
    /// The relay did not respond; the next tick retries.
    ActuatorFault(ActuatorError),
}

pub struct ThermostatController<R, T, C> {
    gatekeeper: Arc<SafetyGateKeeper<R, T, C>>,
}

impl<R, T, C> ThermostatController<R, T, C>
where
    R: RelayActuator,
    T: TransitionRecorder,
    C: ClockPort,
{
    pub fn new(gatekeeper: Arc<SafetyGateKeeper<R, T, C>>) -> Self {
        Self { gatekeeper }
    }

    pub fn tick(&mut self) -> TickOutcome {
        let state = self.gatekeeper.state();
        let current = state.get_temperature();
        let target = state.get_target();

        match self.gatekeeper.check_max_on_time() {
            Ok(Decision::TurnedOff) => return TickOutcome::ForcedOff,
            Ok(_) => {}
            Err(e) => {
                warn!("Maximum on-time guard could not switch the relay off: {e}");
                return TickOutcome::ActuatorFault(e);
            }
        }

        let Some(current) = current else {
            debug!("No temperature published yet, skipping decision");
            return TickOutcome::NoReading;
        };

        let result = if current <= target {
            self.gatekeeper.turn_on(current, BELOW_TARGET_REASON)
        } else {
            self.gatekeeper.turn_off(current, ABOVE_TARGET_REASON)
        };
        match result {
            Ok(decision) => {
                debug!("{current:.2} °C vs target {target:.2} °C -> {decision}");
                TickOutcome::Decided(decision)
            }
            Err(e) => TickOutcome::ActuatorFault(e),
        }
    }
}
