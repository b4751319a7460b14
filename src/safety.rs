//! Safety gatekeeper.
//!
//! Every relay transition goes through the [`SafetyGateKeeper`]. Each call
//! is a decision against the current [`SharedDeviceState`] plus the
//! [`SafetyConfig`] timing guards, with actuation on approval:
//!
//! | Request     | Guard                                        | Clock field        |
//! |-------------|----------------------------------------------|--------------------|
//! | `turn_on`   | elapsed off-time ≥ `cool_down_minutes`       | `last_turned_off`  |
//! | `turn_off`  | elapsed on-time ≥ `minimum_on_minutes`       | `last_turned_on`   |
//! | max-on check| elapsed on-time ≥ `maximum_on_minutes` → off | `last_turned_on`   |
//!
//! ## Ordering
//!
//! Decisions are serialized by an actuation lock that owns the relay and
//! the recorder. It is distinct from the state locks, so a slow relay never
//! stalls the sampler. The state is only mutated after the relay reports
//! success; on failure the relay and the state keep agreeing and the next
//! controller tick retries.

use std::sync::{Mutex, MutexGuard, PoisonError};

use chrono::{DateTime, Utc};
use core::fmt;
use log::{error, info, warn};

use crate::app::events::{PowerStatus, TransitionEvent, minutes_between};
use crate::app::ports::{ClockPort, RelayActuator, TransitionRecorder};
use crate::config::SafetyConfig;
use crate::error::ActuatorError;
use crate::state::{PowerSnapshot, SharedDeviceState};

/// Cause recorded when the maximum on-time guard forces the relay off.
pub const MAX_ON_TIME_REASON: &str = "maximum on-time exceeded";
/// Cause recorded for the off transition issued at process exit.
pub const SHUTDOWN_REASON: &str = "shutdown";

/// Result of one gatekeeper call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    AlreadyOn,
    AlreadyOff,
    TurnedOn,
    TurnedOff,
    RequestDenied,
    NoAction,
}

impl Decision {
    /// True if the call changed the relay.
    pub fn is_transition(self) -> bool {
        matches!(self, Self::TurnedOn | Self::TurnedOff)
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::AlreadyOn => "ALREADY_ON",
            Self::AlreadyOff => "ALREADY_OFF",
            Self::TurnedOn => "TURNED_ON",
            Self::TurnedOff => "TURNED_OFF",
            Self::RequestDenied => "REQUEST_DENIED",
            Self::NoAction => "NO_ACTION",
        };
        f.write_str(s)
    }
}

struct Actuation<R, T> {
    relay: R,
    recorder: T,
}

pub struct SafetyGateKeeper<R, T, C> {
    state: SharedDeviceState,
    config: SafetyConfig,
    clock: C,
    actuation: Mutex<Actuation<R, T>>,
}

impl<R, T, C> SafetyGateKeeper<R, T, C>
where
    R: RelayActuator,
    T: TransitionRecorder,
    C: ClockPort,
{
    pub fn new(
        state: SharedDeviceState,
        config: SafetyConfig,
        relay: R,
        recorder: T,
        clock: C,
    ) -> Self {
        Self {
            state,
            config,
            clock,
            actuation: Mutex::new(Actuation { relay, recorder }),
        }
    }

    pub fn state(&self) -> &SharedDeviceState {
        &self.state
    }

    /// Request the relay on.
    pub fn turn_on(
        &self,
        effective_temperature: f64,
        reason: &str,
    ) -> Result<Decision, ActuatorError> {
        let mut act = self.lock();
        let now = self.clock.now();
        self.turn_on_locked(&mut act, effective_temperature, reason, now)
    }

    /// Request the relay off.
    pub fn turn_off(
        &self,
        effective_temperature: f64,
        reason: &str,
    ) -> Result<Decision, ActuatorError> {
        let mut act = self.lock();
        let now = self.clock.now();
        self.turn_off_locked(&mut act, effective_temperature, reason, now)
    }

    /// Force the relay off once it has been on for `maximum_on_minutes`.
    ///
    /// The effective temperature attributed to a forced off is the last
    /// published reading, or the setpoint when there is none.
    pub fn check_max_on_time(&self) -> Result<Decision, ActuatorError> {
        let mut act = self.lock();
        let snap = self.state.power_snapshot();
        let Some(on_since) = snap.last_turned_on.filter(|_| snap.is_on) else {
            return Ok(Decision::NoAction);
        };
        let now = self.clock.now();
        let on_for = minutes_between(on_since, now);
        if on_for < self.config.maximum_on_minutes {
            return Ok(Decision::NoAction);
        }
        warn!(
            "Relay on for {on_for:.2} min (limit {:.2}), forcing off",
            self.config.maximum_on_minutes
        );
        let temperature = self
            .state
            .get_temperature()
            .unwrap_or_else(|| self.state.get_target());
        self.turn_off_locked(&mut act, temperature, MAX_ON_TIME_REASON, now)
    }

    /// Drive the relay off at process exit, bypassing the minimum on-time.
    pub fn shutdown_off(&self) -> Result<Decision, ActuatorError> {
        let mut act = self.lock();
        let snap = self.state.power_snapshot();
        if !snap.is_on {
            return Ok(Decision::AlreadyOff);
        }
        let temperature = self
            .state
            .get_temperature()
            .unwrap_or_else(|| self.state.get_target());
        let now = self.clock.now();
        self.actuate(&mut act, PowerStatus::Off, temperature, SHUTDOWN_REASON, now)
    }

    // ── Internal ──────────────────────────────────────────────────
    //
    // `now` is the decision time: the guards and the applied timestamp both
    // use it, however long the relay takes to switch.

    fn turn_on_locked(
        &self,
        act: &mut Actuation<R, T>,
        effective_temperature: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, ActuatorError> {
        let snap = self.state.power_snapshot();
        if snap.is_on {
            return Ok(Decision::AlreadyOn);
        }
        if let Some(off_since) = snap.last_turned_off {
            let off_for = minutes_between(off_since, now);
            if off_for < self.config.cool_down_minutes {
                warn!(
                    "Turn on denied: off for {off_for:.2} min, cool-down is {:.2} min",
                    self.config.cool_down_minutes
                );
                return Ok(Decision::RequestDenied);
            }
        }
        self.actuate(act, PowerStatus::On, effective_temperature, reason, now)
    }

    fn turn_off_locked(
        &self,
        act: &mut Actuation<R, T>,
        effective_temperature: f64,
        reason: &str,
        now: DateTime<Utc>,
    ) -> Result<Decision, ActuatorError> {
        let snap = self.state.power_snapshot();
        if !snap.is_on {
            return Ok(Decision::AlreadyOff);
        }
        if let Some(on_since) = snap.last_turned_on {
            let on_for = minutes_between(on_since, now);
            if on_for < self.config.minimum_on_minutes {
                warn!(
                    "Turn off denied: on for {on_for:.2} min, minimum on-time is {:.2} min",
                    self.config.minimum_on_minutes
                );
                return Ok(Decision::RequestDenied);
            }
        }
        self.actuate(act, PowerStatus::Off, effective_temperature, reason, now)
    }

    /// Drive the relay, then apply and record the transition on success.
    fn actuate(
        &self,
        act: &mut Actuation<R, T>,
        status: PowerStatus,
        effective_temperature: f64,
        reason: &str,
        at: DateTime<Utc>,
    ) -> Result<Decision, ActuatorError> {
        let driven = match status {
            PowerStatus::On => act.relay.turn_on(effective_temperature),
            PowerStatus::Off => act.relay.turn_off(effective_temperature),
        };
        if let Err(e) = driven {
            error!("Relay did not switch {status:?} ({e}); state left unchanged");
            return Err(e);
        }

        let previous = self.state.apply_transition(status.is_on(), at);
        let event = self.event(status, effective_temperature, reason, at, previous);
        info!(
            "{status} at {effective_temperature:.2} °C (target {:.2} °C): {reason}",
            event.target_temperature
        );
        act.recorder.record(&event);

        Ok(match status {
            PowerStatus::On => Decision::TurnedOn,
            PowerStatus::Off => Decision::TurnedOff,
        })
    }

    fn event(
        &self,
        status: PowerStatus,
        effective_temperature: f64,
        reason: &str,
        at: DateTime<Utc>,
        previous: PowerSnapshot,
    ) -> TransitionEvent {
        TransitionEvent::new(
            status,
            effective_temperature,
            self.state.get_target(),
            reason,
            at,
            previous.last_turned_on,
            previous.last_turned_off,
        )
    }

    fn lock(&self) -> MutexGuard<'_, Actuation<R, T>> {
        self.actuation.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
