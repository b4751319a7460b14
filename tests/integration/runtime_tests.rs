//! Threaded runtime: workers start, converge, and shut down to a safe relay.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;
use std::time::{Duration, Instant};

use thermogate::adapters::audit_file::read_records;
use thermogate::adapters::store::FileStore;
use thermogate::adapters::time::SystemClock;
use thermogate::app::events::PowerStatus;
use thermogate::app::ports::TemperatureSensor;
use thermogate::app::service::{StopCause, Thermostat};
use thermogate::config::{
    AuditConfig, ControllerConfig, SamplerConfig, StateStoreConfig, ThermostatConfig,
};
use thermogate::safety::{Decision, SHUTDOWN_REASON};
use thermogate::state::{SharedDeviceState, StatePersistence};

use crate::mock_hw::{CollectingRecorder, MockRelay, ScriptedSensor};

fn fast_config() -> ThermostatConfig {
    ThermostatConfig {
        sampler: SamplerConfig {
            interval_ms: 5,
            sample_size: 1,
            publish_raw_readings: false,
        },
        controller: ControllerConfig { interval_ms: 5 },
        audit: AuditConfig {
            path: None,
            max_records: 20,
        },
        ..ThermostatConfig::default()
    }
}

fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let start = Instant::now();
    while start.elapsed() < timeout {
        if cond() {
            return true;
        }
        thread::sleep(Duration::from_millis(5));
    }
    cond()
}

#[test]
fn cold_room_turns_relay_on_and_shutdown_turns_it_off() {
    let cfg = fast_config();
    let state = SharedDeviceState::new(cfg.target_temperature_c);
    let relay = MockRelay::new();
    let recorder = CollectingRecorder::new();

    let running = Thermostat::new(
        &cfg,
        state.clone(),
        ScriptedSensor::constant(18.0),
        relay.clone(),
        recorder.clone(),
        SystemClock,
    )
    .start()
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get_status()));
    assert!(relay.is_energized());
    assert!(running.workers_alive());

    assert_eq!(running.shutdown(), Decision::TurnedOff);
    assert!(!state.get_status());
    assert!(!relay.is_energized());
    let last = recorder.last().unwrap();
    assert_eq!(last.status, PowerStatus::Off);
    assert_eq!(last.cause.as_str(), SHUTDOWN_REASON);
}

#[test]
fn shutdown_when_off_is_already_off() {
    let cfg = fast_config();
    let state = SharedDeviceState::new(cfg.target_temperature_c);
    let relay = MockRelay::new();
    let running = Thermostat::new(
        &cfg,
        state.clone(),
        ScriptedSensor::constant(30.0),
        relay.clone(),
        CollectingRecorder::new(),
        SystemClock,
    )
    .start()
    .unwrap();

    assert!(wait_until(Duration::from_secs(5), || state.get_temperature().is_some()));
    assert_eq!(running.shutdown(), Decision::AlreadyOff);
    assert!(relay.calls().is_empty());
}

#[test]
fn simulation_from_config_persists_state_and_audit() {
    let dir = tempfile::tempdir().unwrap();
    let audit_path = dir.path().join("audit.jsonl");
    let cfg = ThermostatConfig {
        audit: AuditConfig {
            path: Some(audit_path.clone()),
            max_records: 20,
        },
        state_store: StateStoreConfig {
            dir: Some(dir.path().join("state")),
        },
        ..fast_config()
    };

    let thermostat = Thermostat::from_config(&cfg).unwrap();
    let state = thermostat.state().clone();
    let running = thermostat.start().unwrap();
    assert!(wait_until(Duration::from_secs(5), || state.get_status()));
    running.shutdown();

    let store = FileStore::new(dir.path().join("state"));
    let record = StatePersistence::load(&store).unwrap();
    assert!(!record.is_on);
    assert!(record.last_turned_on.is_some());
    assert!(record.last_turned_off.is_some());
    assert_eq!(record.target_temperature, 22.0);

    let audit = read_records(&audit_path).unwrap();
    assert_eq!(audit.len(), 2);
    assert_eq!(audit[0].status, PowerStatus::On);
    assert_eq!(audit[1].state_change_cause, SHUTDOWN_REASON);
}

#[test]
fn stop_flag_ends_supervision_and_leaves_relay_off() {
    let cfg = fast_config();
    let state = SharedDeviceState::new(cfg.target_temperature_c);
    let relay = MockRelay::new();
    let running = Thermostat::new(
        &cfg,
        state.clone(),
        ScriptedSensor::constant(18.0),
        relay.clone(),
        CollectingRecorder::new(),
        SystemClock,
    )
    .start()
    .unwrap();
    assert!(wait_until(Duration::from_secs(5), || state.get_status()));

    let stop = Arc::new(AtomicBool::new(false));
    let raiser = {
        let stop = Arc::clone(&stop);
        thread::spawn(move || {
            thread::sleep(Duration::from_millis(50));
            stop.store(true, Ordering::Release);
        })
    };
    assert_eq!(running.supervise(&stop, None), StopCause::Signal);
    raiser.join().unwrap();

    assert_eq!(running.shutdown(), Decision::TurnedOff);
    assert!(!relay.is_energized());
}

/// Sensor that panics on its first read.
struct ExplodingSensor;

impl TemperatureSensor for ExplodingSensor {
    fn read(&mut self) -> Option<f64> {
        panic!("sensor bus fault");
    }
}

#[test]
fn dead_worker_ends_supervision() {
    let cfg = fast_config();
    let running = Thermostat::new(
        &cfg,
        SharedDeviceState::new(cfg.target_temperature_c),
        ExplodingSensor,
        MockRelay::new(),
        CollectingRecorder::new(),
        SystemClock,
    )
    .start()
    .unwrap();

    let stop = AtomicBool::new(false);
    let deadline = Instant::now() + Duration::from_secs(10);
    assert_eq!(running.supervise(&stop, Some(deadline)), StopCause::WorkerDied);
    assert!(!running.workers_alive());
    assert_eq!(running.shutdown(), Decision::AlreadyOff);
}
