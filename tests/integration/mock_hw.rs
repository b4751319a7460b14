//! Mock adapters for integration tests.
//!
//! Every mock is a cloneable handle over shared state, so a test can give
//! one clone to the gatekeeper and keep another to inspect the full call
//! history.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, TimeZone, Utc};
use thermogate::app::events::TransitionEvent;
use thermogate::app::ports::{RelayActuator, TemperatureSensor, TransitionRecorder};
use thermogate::error::ActuatorError;

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 8, 0, 0).unwrap()
}

// ── Relay ─────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RelayCall {
    On(f64),
    Off(f64),
}

#[derive(Default)]
struct RelayInner {
    calls: Vec<RelayCall>,
    energized: bool,
    fail_remaining: u32,
}

#[derive(Clone, Default)]
pub struct MockRelay {
    inner: Arc<Mutex<RelayInner>>,
}

#[allow(dead_code)]
impl MockRelay {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn calls(&self) -> Vec<RelayCall> {
        self.inner.lock().unwrap().calls.clone()
    }

    pub fn is_energized(&self) -> bool {
        self.inner.lock().unwrap().energized
    }

    /// Fail the next `n` commands without changing the relay.
    pub fn fail_next(&self, n: u32) {
        self.inner.lock().unwrap().fail_remaining = n;
    }

    fn command(&mut self, call: RelayCall) -> Result<(), ActuatorError> {
        let mut inner = self.inner.lock().unwrap();
        if inner.fail_remaining > 0 {
            inner.fail_remaining -= 1;
            return Err(ActuatorError::NoResponse);
        }
        inner.energized = matches!(call, RelayCall::On(_));
        inner.calls.push(call);
        Ok(())
    }
}

impl RelayActuator for MockRelay {
    fn turn_on(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.command(RelayCall::On(effective_temperature))
    }

    fn turn_off(&mut self, effective_temperature: f64) -> Result<(), ActuatorError> {
        self.command(RelayCall::Off(effective_temperature))
    }
}

// ── Sensors ───────────────────────────────────────────────────

/// Returns queued readings, then repeats the last one forever.
#[derive(Clone, Default)]
pub struct ScriptedSensor {
    queue: Arc<Mutex<VecDeque<Option<f64>>>>,
    last: Arc<Mutex<Option<f64>>>,
}

#[allow(dead_code)]
impl ScriptedSensor {
    pub fn new(readings: &[Option<f64>]) -> Self {
        let s = Self::default();
        s.queue.lock().unwrap().extend(readings.iter().copied());
        s
    }

    pub fn constant(value: f64) -> Self {
        Self::new(&[Some(value)])
    }
}

impl TemperatureSensor for ScriptedSensor {
    fn read(&mut self) -> Option<f64> {
        let next = self.queue.lock().unwrap().pop_front();
        let mut last = self.last.lock().unwrap();
        match next {
            Some(r) => {
                *last = r;
                r
            }
            None => *last,
        }
    }
}

// ── Recorder ──────────────────────────────────────────────────

#[derive(Clone, Default)]
pub struct CollectingRecorder {
    events: Arc<Mutex<Vec<TransitionEvent>>>,
}

#[allow(dead_code)]
impl CollectingRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<TransitionEvent> {
        self.events.lock().unwrap().clone()
    }

    pub fn last(&self) -> Option<TransitionEvent> {
        self.events.lock().unwrap().last().cloned()
    }
}

impl TransitionRecorder for CollectingRecorder {
    fn record(&mut self, event: &TransitionEvent) {
        self.events.lock().unwrap().push(event.clone());
    }
}
