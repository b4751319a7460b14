//! Thermostat runtime: wires the core to its adapters and runs the loops.
//!
//! ```text
//!  TemperatureSensor ──▶ Sampler ──▶ SharedDeviceState ◀── Controller
//!                                          ▲                   │
//!                                          │                   ▼
//!                    TransitionRecorder ◀── SafetyGateKeeper ──▶ RelayActuator
//! ```
//!
//! [`Thermostat::start`] spawns one thread per periodic worker. Each worker
//! owns a liveness flag checked once per tick; clearing it lets the current
//! tick finish and the loop exit without waiting out its sleep.

use std::io;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use log::{error, info, warn};

use crate::adapters::audit_file::AuditFileRecorder;
use crate::adapters::hardware::{BoxedRelay, BoxedSensor, HardwareAdapter};
use crate::adapters::log_sink::LogRecorder;
use crate::adapters::store::FileStore;
use crate::adapters::time::SystemClock;
use crate::config::ThermostatConfig;
use crate::control::ThermostatController;
use crate::error::Error;
use crate::safety::{Decision, SafetyGateKeeper};
use crate::sensors::TemperatureSampler;
use crate::state::{SharedDeviceState, StatePersistence};

use super::ports::{ClockPort, RelayActuator, TemperatureSensor, TransitionRecorder};

/// Fan-out of every configured recorder.
pub type Recorders = Vec<Box<dyn TransitionRecorder + Send>>;

/// Stack for worker threads (KB).
const WORKER_STACK_KB: usize = 64;

/// How long shutdown waits for the persisted record to catch up.
const PERSIST_SYNC_TIMEOUT: Duration = Duration::from_secs(5);

/// Poll period of [`RunningThermostat::supervise`].
const SUPERVISE_POLL: Duration = Duration::from_millis(200);

/// How often `supervise` logs a status line.
const STATUS_INTERVAL: Duration = Duration::from_secs(60);

// ───────────────────────────────────────────────────────────────
// Worker threads
// ───────────────────────────────────────────────────────────────

/// Handle to one periodic worker thread.
pub struct WorkerHandle {
    name: &'static str,
    alive: Arc<AtomicBool>,
    thread: JoinHandle<()>,
}

impl WorkerHandle {
    /// Spawn `tick` every `interval` until stopped.
    pub fn spawn_periodic(
        name: &'static str,
        interval: Duration,
        mut tick: impl FnMut() + Send + 'static,
    ) -> io::Result<Self> {
        let alive = Arc::new(AtomicBool::new(true));
        let flag = Arc::clone(&alive);
        let thread = thread::Builder::new()
            .name(name.into())
            .stack_size(WORKER_STACK_KB * 1024)
            .spawn(move || {
                info!("{name} started ({} ms)", interval.as_millis());
                while flag.load(Ordering::Acquire) {
                    let next = Instant::now() + interval;
                    tick();
                    // park_timeout may wake early; sleep out the rest.
                    loop {
                        if !flag.load(Ordering::Acquire) {
                            break;
                        }
                        let now = Instant::now();
                        if now >= next {
                            break;
                        }
                        thread::park_timeout(next - now);
                    }
                }
                info!("{name} terminated");
            })?;
        Ok(Self {
            name,
            alive,
            thread,
        })
    }

    pub fn name(&self) -> &'static str {
        self.name
    }

    /// Running and not asked to stop. A thread that panicked is not alive.
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire) && !self.thread.is_finished()
    }

    /// Clear the liveness flag and wake the thread from its sleep.
    pub fn stop(&self) {
        self.alive.store(false, Ordering::Release);
        self.thread.thread().unpark();
    }

    /// Stop and wait for the thread to exit.
    pub fn join(self) {
        self.stop();
        if self.thread.join().is_err() {
            error!("{} panicked", self.name);
        }
    }
}

// ───────────────────────────────────────────────────────────────
// Thermostat
// ───────────────────────────────────────────────────────────────

/// A fully wired thermostat, not yet running.
pub struct Thermostat<S, R, T, C> {
    state: SharedDeviceState,
    gatekeeper: Arc<SafetyGateKeeper<R, T, C>>,
    sampler: TemperatureSampler<S>,
    sampler_interval: Duration,
    controller_interval: Duration,
}

impl<S, R, T, C> Thermostat<S, R, T, C>
where
    S: TemperatureSensor + Send + 'static,
    R: RelayActuator + Send + 'static,
    T: TransitionRecorder + Send + 'static,
    C: ClockPort + Send + Sync + 'static,
{
    pub fn new(
        config: &ThermostatConfig,
        state: SharedDeviceState,
        sensor: S,
        relay: R,
        recorder: T,
        clock: C,
    ) -> Self {
        let gatekeeper = Arc::new(SafetyGateKeeper::new(
            state.clone(),
            config.safety,
            relay,
            recorder,
            clock,
        ));
        Self {
            sampler: TemperatureSampler::new(sensor, state.clone(), &config.sampler),
            state,
            gatekeeper,
            sampler_interval: Duration::from_millis(config.sampler.interval_ms),
            controller_interval: Duration::from_millis(config.controller.interval_ms),
        }
    }

    pub fn state(&self) -> &SharedDeviceState {
        &self.state
    }

    /// Spawn the sampler and controller threads.
    pub fn start(self) -> io::Result<RunningThermostat<R, T, C>> {
        let Self {
            state,
            gatekeeper,
            mut sampler,
            sampler_interval,
            controller_interval,
        } = self;

        let sampler = WorkerHandle::spawn_periodic("sampler", sampler_interval, move || {
            sampler.tick();
        })?;

        let mut controller = ThermostatController::new(Arc::clone(&gatekeeper));
        let controller = match WorkerHandle::spawn_periodic(
            "controller",
            controller_interval,
            move || {
                controller.tick();
            },
        ) {
            Ok(c) => c,
            Err(e) => {
                sampler.join();
                return Err(e);
            }
        };

        info!("Thermostat running, target {:.2} °C", state.get_target());
        Ok(RunningThermostat {
            state,
            gatekeeper,
            workers: vec![sampler, controller],
        })
    }
}

impl Thermostat<BoxedSensor, BoxedRelay, Recorders, SystemClock> {
    /// Build everything `config` describes: persistence, hardware for the
    /// configured mode, and the log + audit-file recorders.
    pub fn from_config(config: &ThermostatConfig) -> Result<Self, Error> {
        config.validate()?;

        let state = match &config.state_store.dir {
            Some(dir) => SharedDeviceState::with_persistence(
                config.target_temperature_c,
                StatePersistence::new(Box::new(FileStore::new(dir.clone())))?,
            ),
            None => SharedDeviceState::new(config.target_temperature_c),
        };

        let hw = HardwareAdapter::build(config, &state)?;

        let mut recorders: Recorders = vec![Box::new(LogRecorder::new())];
        if let Some(path) = &config.audit.path {
            recorders.push(Box::new(AuditFileRecorder::new(
                path.clone(),
                config.audit.max_records,
            )));
        }

        Ok(Self::new(config, state, hw.sensor, hw.relay, recorders, SystemClock))
    }
}

// ───────────────────────────────────────────────────────────────
// Running thermostat
// ───────────────────────────────────────────────────────────────

/// Why [`RunningThermostat::supervise`] returned.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    /// The stop flag was raised (SIGINT/SIGTERM in the binary).
    Signal,
    /// A worker thread exited on its own, e.g. after a panic.
    WorkerDied,
    Deadline,
}

pub struct RunningThermostat<R, T, C> {
    state: SharedDeviceState,
    gatekeeper: Arc<SafetyGateKeeper<R, T, C>>,
    workers: Vec<WorkerHandle>,
}

impl<R, T, C> RunningThermostat<R, T, C>
where
    R: RelayActuator,
    T: TransitionRecorder,
    C: ClockPort,
{
    pub fn state(&self) -> &SharedDeviceState {
        &self.state
    }

    /// False as soon as any worker has stopped or died.
    pub fn workers_alive(&self) -> bool {
        self.workers.iter().all(WorkerHandle::is_alive)
    }

    /// Block until `stop` is raised, a worker dies, or `deadline` passes,
    /// logging a status line every minute.
    pub fn supervise(&self, stop: &AtomicBool, deadline: Option<Instant>) -> StopCause {
        let mut next_status = Instant::now() + STATUS_INTERVAL;
        loop {
            if stop.load(Ordering::Acquire) {
                return StopCause::Signal;
            }
            if !self.workers_alive() {
                return StopCause::WorkerDied;
            }
            let now = Instant::now();
            if deadline.is_some_and(|d| now >= d) {
                return StopCause::Deadline;
            }
            if now >= next_status {
                info!(
                    "STATUS | relay={} | T={} | target={:.2}",
                    if self.state.get_status() { "ON" } else { "OFF" },
                    self.state
                        .get_temperature()
                        .map_or_else(|| "n/a".to_string(), |t| format!("{t:.2}")),
                    self.state.get_target(),
                );
                next_status = now + STATUS_INTERVAL;
            }
            thread::sleep(SUPERVISE_POLL);
        }
    }

    /// Stop both workers, leave the relay off, and flush the persisted
    /// record.
    pub fn shutdown(self) -> Decision {
        for w in &self.workers {
            w.stop();
        }
        for w in self.workers {
            w.join();
        }
        let decision = match self.gatekeeper.shutdown_off() {
            Ok(decision) => {
                info!("Thermostat stopped, relay {decision}");
                decision
            }
            Err(e) => {
                warn!("Relay did not confirm off at shutdown: {e}");
                Decision::NoAction
            }
        };
        if !self.state.sync_persistence(PERSIST_SYNC_TIMEOUT) {
            warn!("Persisted state still behind after {PERSIST_SYNC_TIMEOUT:?}");
        }
        decision
    }
}
