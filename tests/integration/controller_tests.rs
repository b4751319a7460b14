//! Sampler → shared state → controller → gatekeeper, driven tick by tick.

use std::sync::Arc;

use thermogate::adapters::time::ManualClock;
use thermogate::config::{SafetyConfig, SamplerConfig};
use thermogate::control::thermostat::{ABOVE_TARGET_REASON, BELOW_TARGET_REASON};
use thermogate::control::{ThermostatController, TickOutcome};
use thermogate::error::ActuatorError;
use thermogate::safety::{Decision, SafetyGateKeeper};
use thermogate::sensors::TemperatureSampler;
use thermogate::state::SharedDeviceState;

use crate::mock_hw::{CollectingRecorder, MockRelay, ScriptedSensor, t0};

type Controller = ThermostatController<MockRelay, CollectingRecorder, ManualClock>;

struct Rig {
    controller: Controller,
    state: SharedDeviceState,
    relay: MockRelay,
    recorder: CollectingRecorder,
    clock: ManualClock,
}

fn rig(target: f64) -> Rig {
    let state = SharedDeviceState::new(target);
    let relay = MockRelay::new();
    let recorder = CollectingRecorder::new();
    let clock = ManualClock::new(t0());
    let gk = SafetyGateKeeper::new(
        state.clone(),
        SafetyConfig::default(),
        relay.clone(),
        recorder.clone(),
        clock.clone(),
    );
    Rig {
        controller: ThermostatController::new(Arc::new(gk)),
        state,
        relay,
        recorder,
        clock,
    }
}

#[test]
fn below_target_from_cold_start_turns_on() {
    let mut r = rig(22.0);
    r.state.update_temperature(21.0);

    assert_eq!(r.controller.tick(), TickOutcome::Decided(Decision::TurnedOn));
    assert!(r.state.get_status());
    assert_eq!(r.state.get_last_on_time(), Some(t0()));

    let ev = r.recorder.last().unwrap();
    assert_eq!(ev.cause.as_str(), BELOW_TARGET_REASON);
    assert_eq!(ev.effective_temperature, 21.0);
}

#[test]
fn above_target_within_minimum_on_time_is_denied() {
    let mut r = rig(22.0);
    r.state.update_temperature(21.0);
    r.controller.tick();

    r.clock.advance_minutes(0.1);
    r.state.update_temperature(23.0);
    let before = r.state.power_snapshot();
    assert_eq!(r.controller.tick(), TickOutcome::Decided(Decision::RequestDenied));
    assert_eq!(r.state.power_snapshot(), before);

    r.clock.advance_minutes(0.1);
    assert_eq!(r.controller.tick(), TickOutcome::Decided(Decision::TurnedOff));
    assert_eq!(r.recorder.last().unwrap().cause.as_str(), ABOVE_TARGET_REASON);
}

#[test]
fn no_reading_means_no_relay_command() {
    let mut r = rig(22.0);
    for _ in 0..3 {
        assert_eq!(r.controller.tick(), TickOutcome::NoReading);
    }
    assert!(r.relay.calls().is_empty());
    assert!(r.recorder.events().is_empty());
}

#[test]
fn forced_off_ends_the_tick() {
    let mut r = rig(22.0);
    r.state.update_temperature(10.0);
    r.controller.tick();
    r.clock.advance_minutes(10.0);

    assert_eq!(r.controller.tick(), TickOutcome::ForcedOff);
    // Only the forced off reached the relay this tick.
    assert_eq!(r.relay.calls().len(), 2);
    assert!(!r.state.get_status());
}

#[test]
fn relay_fault_is_retried_next_tick() {
    let mut r = rig(22.0);
    r.state.update_temperature(19.0);
    r.relay.fail_next(1);

    assert_eq!(
        r.controller.tick(),
        TickOutcome::ActuatorFault(ActuatorError::NoResponse)
    );
    assert!(!r.state.get_status());
    assert_eq!(r.controller.tick(), TickOutcome::Decided(Decision::TurnedOn));
}

#[test]
fn sampler_feeds_controller() {
    let r = rig(22.0);
    let mut controller = r.controller;
    let sensor = ScriptedSensor::new(&[
        Some(20.0),
        Some(20.5),
        Some(21.0),
        Some(19.5),
        Some(20.0),
    ]);
    let mut sampler = TemperatureSampler::new(sensor, r.state.clone(), &SamplerConfig::default());

    for _ in 0..4 {
        sampler.tick();
        assert_eq!(controller.tick(), TickOutcome::NoReading);
    }
    assert_eq!(sampler.tick(), Some(20.2));
    assert_eq!(controller.tick(), TickOutcome::Decided(Decision::TurnedOn));
    assert_eq!(r.recorder.last().unwrap().effective_temperature, 20.2);
}
