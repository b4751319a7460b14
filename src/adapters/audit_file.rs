//! Rotating JSON-lines audit log.
//!
//! One [`AuditRecord`] per line. After `max_records` lines the file is
//! renamed to `<path>.1` (replacing any older generation) and a fresh
//! file is started, so disk use is bounded by two generations.
//!
//! Delivery is fire-and-forget: I/O errors are logged and the record is
//! dropped. The gatekeeper's decision never depends on the audit log.

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use crate::app::events::{AuditRecord, TransitionEvent};
use crate::app::ports::TransitionRecorder;

pub struct AuditFileRecorder {
    path: PathBuf,
    rotated_path: PathBuf,
    max_records: usize,
    written: usize,
}

impl AuditFileRecorder {
    /// Append to `path`, counting any records already in it toward the
    /// rotation threshold.
    pub fn new(path: impl Into<PathBuf>, max_records: usize) -> Self {
        let path = path.into();
        let mut rotated = path.clone().into_os_string();
        rotated.push(".1");
        let written = count_lines(&path).unwrap_or(0);
        debug!("Audit log {} holds {written} records", path.display());
        Self {
            path,
            rotated_path: PathBuf::from(rotated),
            max_records: max_records.max(1),
            written,
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn rotated_path(&self) -> &Path {
        &self.rotated_path
    }

    /// Records in the current generation.
    pub fn written(&self) -> usize {
        self.written
    }

    fn append(&mut self, record: &AuditRecord) -> io::Result<()> {
        if self.written >= self.max_records {
            self.rotate()?;
        }
        let mut line = serde_json::to_vec(record).map_err(io::Error::other)?;
        line.push(b'\n');
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)?;
        file.write_all(&line)?;
        self.written += 1;
        Ok(())
    }

    fn rotate(&mut self) -> io::Result<()> {
        match fs::rename(&self.path, &self.rotated_path) {
            Ok(()) => {}
            Err(e) if e.kind() == io::ErrorKind::NotFound => {}
            Err(e) => return Err(e),
        }
        self.written = 0;
        debug!("Audit log rotated to {}", self.rotated_path.display());
        Ok(())
    }
}

impl TransitionRecorder for AuditFileRecorder {
    fn record(&mut self, event: &TransitionEvent) {
        if let Err(e) = self.append(&AuditRecord::from(event)) {
            warn!("Audit record dropped ({}): {e}", self.path.display());
        }
    }
}

fn count_lines(path: &Path) -> io::Result<usize> {
    let file = File::open(path)?;
    Ok(BufReader::new(file).lines().map_while(Result::ok).count())
}

/// Read every record from a JSON-lines audit file; unparsable lines are skipped.
pub fn read_records(path: &Path) -> io::Result<Vec<AuditRecord>> {
    let file = File::open(path)?;
    Ok(BufReader::new(file)
        .lines()
        .map_while(Result::ok)
        .filter_map(|l| serde_json::from_str(&l).ok())
        .collect())
}
