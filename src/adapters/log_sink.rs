//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing every engine decision to the `log`
//! facade as one line of JSON.  Alarms go out at `warn`, everything else
//! at `info`.

use log::{info, warn};

use crate::app::events::{LogEvent, TS_FORMAT};
use crate::app::ports::EventSink;

/// Event kinds that need a human's attention.
const ATTENTION_KINDS: &[&str] = &[
    "fall_alert",
    "checkin_timeout",
    "med_missed",
    "notify_warning",
    "notify_failed",
    "open_compartment_failed",
];

/// Adapter that logs every [`LogEvent`] to the console.
#[derive(Debug, Default)]
pub struct LogEventSink;

impl LogEventSink {
    pub fn new() -> Self {
        Self
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &LogEvent) {
        let ts = event.ts.format(TS_FORMAT);
        if ATTENTION_KINDS.contains(&event.kind.as_str()) {
            warn!("EVENT | {ts} | {} | {}", event.kind, event.payload);
        } else {
            info!("EVENT | {ts} | {} | {}", event.kind, event.payload);
        }
    }
}
