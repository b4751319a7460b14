//! In-memory transition history.
//!
//! Keeps the last [`HISTORY_CAPACITY`] events in a fixed ring; older
//! events are overwritten. Clones share the ring, so one handle can go to
//! the gatekeeper while another is read for status output and tests.

use std::sync::{Arc, Mutex, PoisonError};

use heapless::HistoryBuffer;

use crate::app::events::TransitionEvent;
use crate::app::ports::TransitionRecorder;

pub const HISTORY_CAPACITY: usize = 32;

#[derive(Clone, Default)]
pub struct HistoryRecorder {
    ring: Arc<Mutex<HistoryBuffer<TransitionEvent, HISTORY_CAPACITY>>>,
}

impl HistoryRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Retained events, oldest first.
    pub fn events(&self) -> Vec<TransitionEvent> {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .oldest_ordered()
            .cloned()
            .collect()
    }

    pub fn last(&self) -> Option<TransitionEvent> {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .recent()
            .cloned()
    }

    pub fn len(&self) -> usize {
        self.ring.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl TransitionRecorder for HistoryRecorder {
    fn record(&mut self, event: &TransitionEvent) {
        self.ring
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .write(event.clone());
    }
}
