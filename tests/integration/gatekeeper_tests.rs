//! Safety gatekeeper against mock relay, recorder and a manual clock.

use std::sync::Arc;
use std::thread;

use chrono::Duration;
use thermogate::adapters::time::ManualClock;
use thermogate::app::events::{AuditRecord, PowerStatus};
use thermogate::config::SafetyConfig;
use thermogate::error::ActuatorError;
use thermogate::safety::{Decision, MAX_ON_TIME_REASON, SafetyGateKeeper};
use thermogate::state::SharedDeviceState;

use crate::mock_hw::{CollectingRecorder, MockRelay, RelayCall, t0};

type Gk = SafetyGateKeeper<MockRelay, CollectingRecorder, ManualClock>;

struct Rig {
    gk: Gk,
    relay: MockRelay,
    recorder: CollectingRecorder,
    clock: ManualClock,
}

fn rig_with(safety: SafetyConfig) -> Rig {
    let relay = MockRelay::new();
    let recorder = CollectingRecorder::new();
    let clock = ManualClock::new(t0());
    let gk = SafetyGateKeeper::new(
        SharedDeviceState::new(22.0),
        safety,
        relay.clone(),
        recorder.clone(),
        clock.clone(),
    );
    Rig {
        gk,
        relay,
        recorder,
        clock,
    }
}

fn rig() -> Rig {
    rig_with(SafetyConfig::default())
}

// ── Idempotence ───────────────────────────────────────────────

#[test]
fn turn_on_twice_yields_turned_on_then_already_on() {
    let r = rig();
    assert_eq!(r.gk.turn_on(21.0, "cold"), Ok(Decision::TurnedOn));
    assert_eq!(r.gk.turn_on(21.0, "cold"), Ok(Decision::AlreadyOn));
    assert_eq!(r.relay.calls(), vec![RelayCall::On(21.0)]);
    assert_eq!(r.recorder.events().len(), 1);
}

// ── Minimum on-time / cool-down ───────────────────────────────

#[test]
fn turn_off_before_minimum_on_time_is_denied() {
    let r = rig();
    r.gk.turn_on(21.0, "cold").unwrap();
    r.clock.advance_minutes(0.1);
    assert_eq!(r.gk.turn_off(23.0, "warm"), Ok(Decision::RequestDenied));
    assert!(r.gk.state().get_status());
    assert_eq!(r.relay.calls().len(), 1);
}

#[test]
fn turn_on_during_cool_down_is_denied() {
    let r = rig();
    r.gk.turn_on(21.0, "cold").unwrap();
    r.clock.advance_minutes(0.5);
    assert_eq!(r.gk.turn_off(23.0, "warm"), Ok(Decision::TurnedOff));
    r.clock.advance_minutes(0.1);
    assert_eq!(r.gk.turn_on(21.0, "cold"), Ok(Decision::RequestDenied));
    assert!(!r.gk.state().get_status());
}

#[test]
fn denied_request_is_idempotent() {
    let r = rig();
    r.gk.turn_on(21.0, "cold").unwrap();
    for _ in 0..20 {
        assert_eq!(r.gk.turn_off(23.0, "warm"), Ok(Decision::RequestDenied));
    }
    assert!(r.gk.state().get_status());
    assert_eq!(r.recorder.events().len(), 1);
}

// ── Maximum on-time ───────────────────────────────────────────

#[test]
fn max_on_time_forces_off_regardless_of_temperature() {
    let r = rig();
    r.gk.state().update_temperature(5.0);
    r.gk.turn_on(5.0, "cold").unwrap();

    r.clock.advance_minutes(9.99);
    assert_eq!(r.gk.check_max_on_time(), Ok(Decision::NoAction));
    assert!(r.gk.state().get_status());

    r.clock.advance_minutes(0.01);
    assert_eq!(r.gk.check_max_on_time(), Ok(Decision::TurnedOff));
    assert!(!r.gk.state().get_status());

    let ev = r.recorder.last().unwrap();
    assert_eq!(ev.status, PowerStatus::Off);
    assert_eq!(ev.cause.as_str(), MAX_ON_TIME_REASON);
    assert_eq!(ev.effective_temperature, 5.0);
    assert_eq!(AuditRecord::from(&ev).on_for_minutes, Some(10.0));
}

// ── Actuator faults ───────────────────────────────────────────

#[test]
fn actuator_failure_leaves_state_unchanged() {
    let r = rig();
    r.relay.fail_next(1);
    assert_eq!(r.gk.turn_on(21.0, "cold"), Err(ActuatorError::NoResponse));
    assert!(!r.gk.state().get_status());
    assert_eq!(r.gk.state().get_last_on_time(), None);
    assert!(r.recorder.events().is_empty());

    assert_eq!(r.gk.turn_on(21.0, "cold"), Ok(Decision::TurnedOn));
    assert!(r.relay.is_energized());
}

#[test]
fn failed_forced_off_keeps_relay_and_state_on() {
    let r = rig();
    r.gk.turn_on(21.0, "cold").unwrap();
    r.clock.advance_minutes(11.0);
    r.relay.fail_next(1);
    assert_eq!(r.gk.check_max_on_time(), Err(ActuatorError::NoResponse));
    assert!(r.gk.state().get_status());
    assert!(r.relay.is_energized());
    assert_eq!(r.gk.check_max_on_time(), Ok(Decision::TurnedOff));
}

// ── Events ────────────────────────────────────────────────────

#[test]
fn events_carry_previous_timestamps_and_target() {
    let r = rig();
    r.gk.turn_on(21.0, "cold").unwrap();
    r.clock.advance_minutes(1.5);
    r.gk.turn_off(23.0, "warm").unwrap();
    r.clock.advance_minutes(0.25);
    r.gk.turn_on(20.5, "cold again").unwrap();

    let events = r.recorder.events();
    assert_eq!(events.len(), 3);

    let off = &events[1];
    assert_eq!(off.previous_on, Some(t0()));
    assert_eq!(off.on_for_minutes(), Some(1.5));
    assert_eq!(off.target_temperature, 22.0);

    let on = AuditRecord::from(&events[2]);
    assert_eq!(on.off_for_minutes, Some(0.25));
    assert_eq!(on.last_turned_on, Some(t0() + Duration::seconds(105)));
    assert_eq!(on.state_change_cause, "cold again");
}

// ── Concurrency ───────────────────────────────────────────────

#[test]
fn concurrent_requests_keep_relay_and_state_in_step() {
    let safety = SafetyConfig {
        minimum_on_minutes: 0.0001,
        cool_down_minutes: 0.0001,
        maximum_on_minutes: 1000.0,
    };
    let r = rig_with(safety);
    let gk = Arc::new(r.gk);

    let workers: Vec<_> = (0..4)
        .map(|i| {
            let gk = Arc::clone(&gk);
            let clock = r.clock.clone();
            thread::spawn(move || {
                for n in 0..200 {
                    clock.advance(Duration::milliseconds(10));
                    if (n + i) % 2 == 0 {
                        let _ = gk.turn_on(20.0, "cold");
                    } else {
                        let _ = gk.turn_off(24.0, "warm");
                    }
                }
            })
        })
        .collect();
    for w in workers {
        w.join().unwrap();
    }

    let calls = r.relay.calls();
    let events = r.recorder.events();
    assert_eq!(calls.len(), events.len());
    assert_eq!(gk.state().get_status(), r.relay.is_energized());
    // Transitions strictly alternate.
    for pair in events.windows(2) {
        assert_ne!(pair[0].status, pair[1].status);
        assert!(pair[0].at <= pair[1].at);
    }
}
