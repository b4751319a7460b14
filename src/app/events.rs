//! Outbound transition events.
//!
//! The [`SafetyGateKeeper`](crate::safety::SafetyGateKeeper) emits one
//! [`TransitionEvent`] per applied relay transition through the
//! [`TransitionRecorder`](super::ports::TransitionRecorder) port and keeps
//! no copy. Recorders that persist events convert them to an
//! [`AuditRecord`] first; durations are derived there, at the boundary.

use core::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Relay state after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PowerStatus {
    On,
    Off,
}

impl PowerStatus {
    pub fn from_bool(on: bool) -> Self {
        if on { Self::On } else { Self::Off }
    }

    pub fn is_on(self) -> bool {
        self == Self::On
    }
}

impl fmt::Display for PowerStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::On => write!(f, "Device Turned On"),
            Self::Off => write!(f, "Device Turned Off"),
        }
    }
}

/// One applied relay transition.
#[derive(Debug, Clone, PartialEq)]
pub struct TransitionEvent {
    pub status: PowerStatus,
    /// Temperature the decision was based on.
    pub effective_temperature: f64,
    /// Setpoint at decision time.
    pub target_temperature: f64,
    pub cause: heapless::String<64>,
    /// Decision time; also the new `last_turned_on`/`last_turned_off`.
    pub at: DateTime<Utc>,
    /// `last_turned_on` before this transition was applied.
    pub previous_on: Option<DateTime<Utc>>,
    /// `last_turned_off` before this transition was applied.
    pub previous_off: Option<DateTime<Utc>>,
}

impl TransitionEvent {
    /// Build an event, truncating `cause` to 63 bytes on a char boundary.
    pub fn new(
        status: PowerStatus,
        effective_temperature: f64,
        target_temperature: f64,
        cause: &str,
        at: DateTime<Utc>,
        previous_on: Option<DateTime<Utc>>,
        previous_off: Option<DateTime<Utc>>,
    ) -> Self {
        let mut end = cause.len().min(63);
        while !cause.is_char_boundary(end) {
            end -= 1;
        }
        let mut c = heapless::String::new();
        let _ = c.push_str(&cause[..end]);
        Self {
            status,
            effective_temperature,
            target_temperature,
            cause: c,
            at,
            previous_on,
            previous_off,
        }
    }

    /// How long the device had been on, for an off transition.
    pub fn on_for_minutes(&self) -> Option<f64> {
        match self.status {
            PowerStatus::Off => self.previous_on.map(|t| minutes_between(t, self.at)),
            PowerStatus::On => None,
        }
    }

    /// How long the device had been off, for an on transition.
    pub fn off_for_minutes(&self) -> Option<f64> {
        match self.status {
            PowerStatus::On => self.previous_off.map(|t| minutes_between(t, self.at)),
            PowerStatus::Off => None,
        }
    }
}

/// Minutes from `earlier` to `later`; negative spans clamp to zero.
pub fn minutes_between(earlier: DateTime<Utc>, later: DateTime<Utc>) -> f64 {
    let ms = (later - earlier).num_milliseconds().max(0);
    ms as f64 / 60_000.0
}

/// Round to two decimal places.
pub fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

/// Serialized form of a [`TransitionEvent`] for the audit log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditRecord {
    pub state_change: String,
    pub status: PowerStatus,
    pub effective_temperature: f64,
    pub target_temperature: f64,
    pub state_change_cause: String,
    pub current_timestamp: DateTime<Utc>,
    pub last_turned_on: Option<DateTime<Utc>>,
    pub last_turned_off: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub on_for_minutes: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub off_for_minutes: Option<f64>,
}

impl From<&TransitionEvent> for AuditRecord {
    fn from(e: &TransitionEvent) -> Self {
        Self {
            state_change: e.status.to_string(),
            status: e.status,
            effective_temperature: e.effective_temperature,
            target_temperature: e.target_temperature,
            state_change_cause: e.cause.as_str().to_string(),
            current_timestamp: e.at,
            last_turned_on: if e.status.is_on() { Some(e.at) } else { e.previous_on },
            last_turned_off: if e.status.is_on() { e.previous_off } else { Some(e.at) },
            on_for_minutes: e.on_for_minutes().map(round2),
            off_for_minutes: e.off_for_minutes().map(round2),
        }
    }
}
