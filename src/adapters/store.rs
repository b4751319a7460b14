//! Key-value storage adapters.
//!
//! Both implement [`StoragePort`]:
//!
//! - [`MemoryStore`]: in-process map, cloneable handle (tests, simulation).
//! - [`FileStore`]: one file per `namespace/key` under a root directory.
//!   Writes go to a temporary file that is renamed over the target, so a
//!   reader sees either the old or the new value.

use std::collections::HashMap;
use std::fs;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use log::info;

use crate::app::ports::StoragePort;
use crate::error::StorageError;

fn composite_key(namespace: &str, key: &str) -> String {
    format!("{}::{}", namespace, key)
}

fn copy_out(value: &[u8], buf: &mut [u8]) -> Result<usize, StorageError> {
    if value.len() > buf.len() {
        return Err(StorageError::BufferTooSmall);
    }
    buf[..value.len()].copy_from_slice(value);
    Ok(value.len())
}

// ───────────────────────────────────────────────────────────────
// MemoryStore
// ───────────────────────────────────────────────────────────────

/// In-memory store. Clones share the same map.
#[derive(Clone, Default)]
pub struct MemoryStore {
    map: Arc<Mutex<HashMap<String, Vec<u8>>>>,
    failing: Arc<AtomicBool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Make every subsequent write fail with [`StorageError::IoError`].
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::Relaxed);
    }
}

impl StoragePort for MemoryStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        let map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        match map.get(&composite_key(namespace, key)) {
            Some(v) => copy_out(v, buf),
            None => Err(StorageError::NotFound),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        if self.failing.load(Ordering::Relaxed) {
            return Err(StorageError::IoError);
        }
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(composite_key(namespace, key), data.to_vec());
        Ok(())
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&composite_key(namespace, key));
        Ok(())
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.map
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(&composite_key(namespace, key))
    }
}

// ───────────────────────────────────────────────────────────────
// FileStore
// ───────────────────────────────────────────────────────────────

/// Directory-backed store.
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        info!("FileStore: {}", root.display());
        Self { root }
    }

    fn path(&self, namespace: &str, key: &str) -> PathBuf {
        self.root.join(namespace).join(key)
    }
}

impl StoragePort for FileStore {
    fn read(&self, namespace: &str, key: &str, buf: &mut [u8]) -> Result<usize, StorageError> {
        match fs::read(self.path(namespace, key)) {
            Ok(bytes) => copy_out(&bytes, buf),
            Err(e) if e.kind() == ErrorKind::NotFound => Err(StorageError::NotFound),
            Err(_) => Err(StorageError::IoError),
        }
    }

    fn write(&mut self, namespace: &str, key: &str, data: &[u8]) -> Result<(), StorageError> {
        let target = self.path(namespace, key);
        let dir = self.root.join(namespace);
        fs::create_dir_all(&dir).map_err(|_| StorageError::IoError)?;
        let tmp = dir.join(format!(".{key}.tmp"));
        fs::write(&tmp, data).map_err(|_| StorageError::IoError)?;
        fs::rename(&tmp, &target).map_err(|_| StorageError::IoError)
    }

    fn delete(&mut self, namespace: &str, key: &str) -> Result<(), StorageError> {
        match fs::remove_file(self.path(namespace, key)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(_) => Err(StorageError::IoError),
        }
    }

    fn exists(&self, namespace: &str, key: &str) -> bool {
        self.path(namespace, key).is_file()
    }
}
