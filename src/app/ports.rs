//! Port traits: the boundary between the control core and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ Sampler / GateKeeper / Controller
//! ```
//!
//! Driven adapters (sensor, relay, audit sinks, storage, clock) implement
//! these traits. The core consumes them via generics or trait objects
//! chosen once at startup, so it never touches hardware directly.
//!
//! None of these ports report failure by panicking: sensors return `None`,
//! the relay returns an [`ActuatorError`], recorders swallow their own I/O
//! errors, and storage returns a [`StorageError`].

use chrono::{DateTime, Utc};

use crate::error::{ActuatorError, StorageError};

use super::events::TransitionEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (hardware → core)
// ───────────────────────────────────────────────────────────────

/// One instantaneous temperature reading per call.
pub trait TemperatureSensor {
    /// Degrees Celsius, or `None` on a sensor fault.
    fn read(&mut self) -> Option<f64>;
}

impl<T: TemperatureSensor + ?Sized> TemperatureSensor for Box<T> {
    fn read(&mut self) -> Option<f64> {
        (**self).read()
    }
}

// ───────────────────────────────────────────────────────────────
// Actuator port (core → hardware)
// ───────────────────────────────────────────────────────────────

/// The heating relay.
///
/// Calling `turn_on` while already on (or `turn_off` while already off)
/// must be harmless. The effective temperature is informational.
pub trait RelayActuator {
    fn turn_on(&mut self, effective_temperature: f64) -> Result<(), ActuatorError>;

    fn turn_off(&mut self, effective_temperature: f64) -> Result<(), ActuatorError>;
}

impl<T: RelayActuator + ?Sized> RelayActuator for Box<T> {
    fn turn_on(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        (**self).turn_on(effective_temperature)
    }

    fn turn_off(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        (**self).turn_off(effective_temperature)
    }
}

// ───────────────────────────────────────────────────────────────
// Transition recorder (core → audit log)
// ───────────────────────────────────────────────────────────────

/// Append-only audit sink for relay transitions.
///
/// Delivery is fire-and-forget: implementations handle their own storage
/// errors and rotation.
pub trait TransitionRecorder {
    fn record(&mut self, event: &TransitionEvent);
}

impl<T: TransitionRecorder + ?Sized> TransitionRecorder for Box<T> {
    fn record(&mut self, event: &TransitionEvent) {
        (**self).record(event);
    }
}

impl TransitionRecorder for Vec<Box<dyn TransitionRecorder + Send>> {
    fn record(&mut self, event: &TransitionEvent) {
        for sink in self.iter_mut() {
            sink.record(event);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Storage port (core ↔ backing store)
// ───────────────────────────────────────────────────────────────

/// Persistent key-value storage.
///
/// - Keys are namespaced to prevent collisions between subsystems.
/// - Write operations MUST be atomic: a reader sees either the old value
///   or the new value, never a mix.
pub trait StoragePort {
    /// Read a value.  Returns the number of bytes written to `buf`.
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError>;

    /// Write a value atomically, creating the key if needed.
    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError>;

    /// Delete a key.  Returns `Ok(())` even if the key didn't exist.
    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError>;

    /// Check whether a key exists without reading it.
    fn exists(&self, namespace: &str, key: &str) -> bool;
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Wall-clock source for decision timestamps.
pub trait ClockPort {
    fn now(&self) -> DateTime<Utc>;
}
