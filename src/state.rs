//! Shared device state.
//!
//! One [`SharedDeviceState`] is created at startup and handed (as a cheap
//! clone of an `Arc`) to every worker. It holds two independently locked
//! field groups:
//!
//! | Group       | Fields                                        | Mutator                |
//! |-------------|-----------------------------------------------|------------------------|
//! | temperature | `last_temperature`                            | `update_temperature`   |
//! | power       | `is_on`, `last_turned_on`, `last_turned_off`  | `apply_transition`     |
//!
//! The setpoint is fixed at construction and needs no lock.
//!
//! No critical section performs I/O. When a [`StatePersistence`] mirror is
//! attached, the snapshot taken inside the critical section is handed to
//! the mirror's writer thread after the lock is released.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use chrono::{DateTime, Utc};
use log::{debug, error, warn};
use serde::{Deserialize, Serialize};

use crate::app::ports::StoragePort;
use crate::error::StorageError;

/// Consistent view of the power group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PowerSnapshot {
    pub is_on: bool,
    pub last_turned_on: Option<DateTime<Utc>>,
    pub last_turned_off: Option<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct PowerRecord {
    snapshot: PowerSnapshot,
    generation: u64,
}

#[derive(Debug, Default)]
struct TemperatureRecord {
    value: Option<f64>,
    generation: u64,
}

struct Inner {
    target_temperature: f64,
    temperature: Mutex<TemperatureRecord>,
    power: Mutex<PowerRecord>,
    persistence: Option<StatePersistence>,
}

/// Concurrency-safe store shared by the sampler, the gatekeeper, and the
/// controller.
#[derive(Clone)]
pub struct SharedDeviceState {
    inner: Arc<Inner>,
}

impl SharedDeviceState {
    /// Device off, no reading, no transitions yet.
    pub fn new(target_temperature: f64) -> Self {
        Self::build(target_temperature, None)
    }

    /// Same as [`new`](Self::new), mirroring every update into `persistence`.
    pub fn with_persistence(target_temperature: f64, persistence: StatePersistence) -> Self {
        Self::build(target_temperature, Some(persistence))
    }

    fn build(target_temperature: f64, persistence: Option<StatePersistence>) -> Self {
        let state = Self {
            inner: Arc::new(Inner {
                target_temperature,
                temperature: Mutex::new(TemperatureRecord::default()),
                power: Mutex::new(PowerRecord::default()),
                persistence,
            }),
        };
        if let Some(p) = &state.inner.persistence {
            p.initialise(target_temperature);
        }
        state
    }

    // ── Readers ───────────────────────────────────────────────

    pub fn get_status(&self) -> bool {
        self.power().snapshot.is_on
    }

    pub fn get_temperature(&self) -> Option<f64> {
        self.temperature().value
    }

    pub fn get_target(&self) -> f64 {
        self.inner.target_temperature
    }

    pub fn get_last_on_time(&self) -> Option<DateTime<Utc>> {
        self.power().snapshot.last_turned_on
    }

    pub fn get_last_off_time(&self) -> Option<DateTime<Utc>> {
        self.power().snapshot.last_turned_off
    }

    /// Status and both timestamps read under one lock.
    pub fn power_snapshot(&self) -> PowerSnapshot {
        self.power().snapshot
    }

    // ── Mutators ──────────────────────────────────────────────

    /// Set `is_on` and the matching timestamp as one unit.
    ///
    /// Returns the snapshot as it was before the update.
    pub fn apply_transition(&self, new_status: bool, at: DateTime<Utc>) -> PowerSnapshot {
        let (previous, current, generation) = {
            let mut rec = self.power();
            let previous = rec.snapshot;
            rec.snapshot.is_on = new_status;
            if new_status {
                rec.snapshot.last_turned_on = Some(at);
            } else {
                rec.snapshot.last_turned_off = Some(at);
            }
            rec.generation += 1;
            (previous, rec.snapshot, rec.generation)
        };
        if let Some(p) = &self.inner.persistence {
            p.store_power(current, generation);
        }
        previous
    }

    pub fn update_temperature(&self, value: f64) {
        let generation = {
            let mut rec = self.temperature();
            rec.value = Some(value);
            rec.generation += 1;
            rec.generation
        };
        if let Some(p) = &self.inner.persistence {
            p.store_temperature(value, generation);
        }
    }

    /// Wait for the persistence mirror to catch up. `true` when there is
    /// no mirror or it caught up within `timeout`.
    pub fn sync_persistence(&self, timeout: Duration) -> bool {
        self.inner
            .persistence
            .as_ref()
            .is_none_or(|p| p.sync(timeout))
    }

    // ── Internal ──────────────────────────────────────────────

    fn power(&self) -> MutexGuard<'_, PowerRecord> {
        self.inner.power.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn temperature(&self) -> MutexGuard<'_, TemperatureRecord> {
        self.inner
            .temperature
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }
}

// ═══════════════════════════════════════════════════════════════
//  Persistence mirror
// ═══════════════════════════════════════════════════════════════

/// Namespace of the persisted record.
pub const STATE_NAMESPACE: &str = "shared_data";
/// Fixed row id of the single persisted record.
pub const STATE_KEY: &str = "1";

const MAX_RECORD_SIZE: usize = 256;
const FAILURE_ESCALATION_EVERY: u32 = 10;
const WRITER_STACK_KB: usize = 32;

/// The persisted single-row record; columns mirror [`SharedDeviceState`].
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct PersistedDeviceState {
    pub is_on: bool,
    pub last_temperature: Option<f64>,
    pub target_temperature: f64,
    pub last_turned_on: Option<DateTime<Utc>>,
    pub last_turned_off: Option<DateTime<Utc>>,
}

/// Record awaiting the writer, plus the bookkeeping that orders updates.
struct Pending {
    record: PersistedDeviceState,
    power_generation: u64,
    temperature_generation: u64,
    /// Bumped on every merge.
    revision: u64,
    /// Last revision the writer finished with.
    written: u64,
    closed: bool,
}

struct MirrorShared {
    pending: Mutex<Pending>,
    changed: Condvar,
    consecutive_failures: AtomicU32,
}

/// Write-through mirror of the shared state into a [`StoragePort`].
///
/// Updates are merged into an in-memory record under a short lock; a
/// dedicated writer thread owns the store and always writes the newest
/// record, skipping any revisions that piled up meanwhile. Every write
/// stores the whole record, so a status change is never visible without
/// its timestamp. Snapshots older than the last one merged for the same
/// group are dropped.
pub struct StatePersistence {
    shared: Arc<MirrorShared>,
    writer: Option<JoinHandle<()>>,
}

impl StatePersistence {
    /// Start the writer thread that owns `store`.
    pub fn new(store: Box<dyn StoragePort + Send>) -> Result<Self, StorageError> {
        let shared = Arc::new(MirrorShared {
            pending: Mutex::new(Pending {
                record: PersistedDeviceState::default(),
                power_generation: 0,
                temperature_generation: 0,
                revision: 0,
                written: 0,
                closed: false,
            }),
            changed: Condvar::new(),
            consecutive_failures: AtomicU32::new(0),
        });
        let writer = {
            let shared = Arc::clone(&shared);
            thread::Builder::new()
                .name("state-writer".into())
                .stack_size(WRITER_STACK_KB * 1024)
                .spawn(move || shared.run_writer(store))
                .map_err(|e| {
                    error!("State writer thread failed to start: {e}");
                    StorageError::IoError
                })?
        };
        Ok(Self {
            shared,
            writer: Some(writer),
        })
    }

    /// Read the record from `store`. `None` when absent or unreadable.
    pub fn load(store: &dyn StoragePort) -> Option<PersistedDeviceState> {
        let mut buf = [0u8; MAX_RECORD_SIZE];
        match store.read(STATE_NAMESPACE, STATE_KEY, &mut buf) {
            Ok(len) => match postcard::from_bytes::<PersistedDeviceState>(&buf[..len]) {
                Ok(rec) => Some(rec),
                Err(e) => {
                    warn!("Persisted state corrupted ({e}), treating as unavailable");
                    None
                }
            },
            Err(StorageError::NotFound) => None,
            Err(e) => {
                warn!("Persisted state read failed: {e}");
                None
            }
        }
    }

    /// Number of writes that have failed in a row.
    pub fn consecutive_failures(&self) -> u32 {
        self.shared.consecutive_failures.load(Ordering::Relaxed)
    }

    /// Wait until every merged update has reached the store.
    ///
    /// Returns `false` if `timeout` ran out first.
    pub fn sync(&self, timeout: Duration) -> bool {
        let pending = self.shared.lock();
        let (pending, result) = self
            .shared
            .changed
            .wait_timeout_while(pending, timeout, |p| p.written < p.revision)
            .unwrap_or_else(PoisonError::into_inner);
        drop(pending);
        !result.timed_out()
    }

    fn initialise(&self, target_temperature: f64) {
        self.merge(|p| {
            p.record = PersistedDeviceState {
                target_temperature,
                ..PersistedDeviceState::default()
            };
            true
        });
    }

    fn store_power(&self, snapshot: PowerSnapshot, generation: u64) {
        self.merge(|p| {
            if generation <= p.power_generation {
                debug!("Dropping stale power snapshot (gen {generation})");
                return false;
            }
            p.power_generation = generation;
            p.record.is_on = snapshot.is_on;
            p.record.last_turned_on = snapshot.last_turned_on;
            p.record.last_turned_off = snapshot.last_turned_off;
            true
        });
    }

    fn store_temperature(&self, value: f64, generation: u64) {
        self.merge(|p| {
            if generation <= p.temperature_generation {
                return false;
            }
            p.temperature_generation = generation;
            p.record.last_temperature = Some(value);
            true
        });
    }

    /// Apply `update` to the pending record and wake the writer if it
    /// changed anything.
    fn merge(&self, update: impl FnOnce(&mut Pending) -> bool) {
        let mut pending = self.shared.lock();
        if update(&mut pending) {
            pending.revision += 1;
            drop(pending);
            self.shared.changed.notify_all();
        }
    }
}

impl Drop for StatePersistence {
    /// Write whatever is still pending, then stop the writer.
    fn drop(&mut self) {
        self.shared.lock().closed = true;
        self.shared.changed.notify_all();
        if let Some(writer) = self.writer.take() {
            if writer.join().is_err() {
                error!("State writer panicked");
            }
        }
    }
}

impl MirrorShared {
    fn run_writer(&self, mut store: Box<dyn StoragePort + Send>) {
        loop {
            let (record, revision) = {
                let pending = self.lock();
                let pending = self
                    .changed
                    .wait_while(pending, |p| p.written == p.revision && !p.closed)
                    .unwrap_or_else(PoisonError::into_inner);
                if pending.written == pending.revision {
                    break;
                }
                (pending.record, pending.revision)
            };

            self.write(store.as_mut(), &record);

            self.lock().written = revision;
            self.changed.notify_all();
        }
        debug!("State writer stopped");
    }

    fn write(&self, store: &mut dyn StoragePort, record: &PersistedDeviceState) {
        let result = postcard::to_allocvec(record)
            .map_err(|_| StorageError::Corrupted)
            .and_then(|bytes| store.write(STATE_NAMESPACE, STATE_KEY, &bytes));
        match result {
            Ok(()) => {
                self.consecutive_failures.store(0, Ordering::Relaxed);
            }
            Err(e) => {
                let n = self.consecutive_failures.fetch_add(1, Ordering::Relaxed) + 1;
                if n % FAILURE_ESCALATION_EVERY == 0 {
                    error!("Shared state persistence failing repeatedly ({n} in a row): {e}");
                } else {
                    warn!("Shared state write not applied: {e}");
                }
            }
        }
    }

    fn lock(&self) -> MutexGuard<'_, Pending> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
