//! Heating relay drivers.
//!
//! - [`SimulatedRelay`]: in-memory relay for simulation mode and tests.
//!   A cloneable [`RelayProbe`] observes it and injects failures.
//! - [`GpioRelay`]: drives any `embedded-hal` output pin, active-high or
//!   active-low.
//!
//! Both are dumb actuators: the gatekeeper decides, the driver switches.
//! Switching to the state the relay is already in is harmless.

use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;

use embedded_hal::digital::{OutputPin, PinState};
use log::{debug, info};

use crate::app::ports::RelayActuator;
use crate::error::ActuatorError;

// ── Simulated ─────────────────────────────────────────────────────

#[derive(Debug, Default)]
struct SimShared {
    energized: AtomicBool,
    failing: AtomicBool,
    switch_count: AtomicU32,
}

/// In-memory relay.
#[derive(Debug, Default)]
pub struct SimulatedRelay {
    shared: Arc<SimShared>,
}

/// Observer/failure injector for a [`SimulatedRelay`].
#[derive(Debug, Clone)]
pub struct RelayProbe {
    shared: Arc<SimShared>,
}

impl SimulatedRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn probe(&self) -> RelayProbe {
        RelayProbe {
            shared: Arc::clone(&self.shared),
        }
    }

    fn switch(&mut self, on: bool, effective_temperature: f64) -> Result<(), ActuatorError> {
        if self.shared.failing.load(Ordering::Relaxed) {
            return Err(ActuatorError::NoResponse);
        }
        let was = self.shared.energized.swap(on, Ordering::Relaxed);
        if was != on {
            self.shared.switch_count.fetch_add(1, Ordering::Relaxed);
        }
        info!(
            "Simulated relay {} ({effective_temperature:.2} °C)",
            if on { "ON" } else { "OFF" }
        );
        Ok(())
    }
}

impl RelayActuator for SimulatedRelay {
    fn turn_on(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.switch(true, effective_temperature)
    }

    fn turn_off(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.switch(false, effective_temperature)
    }
}

impl RelayProbe {
    pub fn is_energized(&self) -> bool {
        self.shared.energized.load(Ordering::Relaxed)
    }

    /// Number of actual state changes (repeat commands not counted).
    pub fn switch_count(&self) -> u32 {
        self.shared.switch_count.load(Ordering::Relaxed)
    }

    /// Make the relay stop responding.
    pub fn set_failing(&self, failing: bool) {
        self.shared.failing.store(failing, Ordering::Relaxed);
    }
}

// ── GPIO ──────────────────────────────────────────────────────────

/// Relay on a digital output pin.
pub struct GpioRelay<P> {
    pin: P,
    active_low: bool,
}

impl<P: OutputPin> GpioRelay<P> {
    /// Wrap `pin` and drive it to the de-energized level.
    pub fn new(pin: P, active_low: bool) -> Result<Self, ActuatorError> {
        let mut relay = Self { pin, active_low };
        relay.drive(false)?;
        Ok(relay)
    }

    /// Release the pin.
    pub fn into_inner(self) -> P {
        self.pin
    }

    fn level(&self, on: bool) -> PinState {
        PinState::from(on != self.active_low)
    }

    fn drive(&mut self, on: bool) -> Result<(), ActuatorError> {
        let level = self.level(on);
        debug!("Relay pin -> {level:?}");
        self.pin
            .set_state(level)
            .map_err(|_| ActuatorError::GpioWriteFailed)
    }
}

impl<P: OutputPin> RelayActuator for GpioRelay<P> {
    fn turn_on(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.drive(true)?;
        info!("Relay ON ({effective_temperature:.2} °C)");
        Ok(())
    }

    fn turn_off(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.drive(false)?;
        info!("Relay OFF ({effective_temperature:.2} °C)");
        Ok(())
    }
}
