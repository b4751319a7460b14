//! Log-based transition recorder.
//!
//! Implements [`TransitionRecorder`] by writing each transition through
//! the `log` facade, so the console shows the audit trail even when no
//! audit file is configured.

use log::info;

use crate::app::events::{TransitionEvent, round2};
use crate::app::ports::TransitionRecorder;

/// Adapter that logs every [`TransitionEvent`].
#[derive(Debug, Default)]
pub struct LogRecorder;

impl LogRecorder {
    pub fn new() -> Self {
        Self
    }
}

impl TransitionRecorder for LogRecorder {
    fn record(&mut self, event: &TransitionEvent) {
        let held = match (event.on_for_minutes(), event.off_for_minutes()) {
            (Some(m), _) => format!(" | was on {:.2} min", round2(m)),
            (_, Some(m)) => format!(" | was off {:.2} min", round2(m)),
            _ => String::new(),
        };
        info!(
            "AUDIT | {} | T={:.2}\u{00b0}C target={:.2}\u{00b0}C | {}{}",
            event.status,
            event.effective_temperature,
            event.target_temperature,
            event.cause,
            held,
        );
    }
}
