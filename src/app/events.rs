//! Outbound log events and the append-only event log.
//!
//! The [`CareService`](super::service::CareService) emits a [`LogEvent`]
//! for every decision through the [`EventSink`](super::ports::EventSink)
//! port.  [`EventLog`] is the in-memory sink a display surface reads from;
//! it keeps every event, newest first, and never truncates.

use std::collections::VecDeque;

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::ports::EventSink;

/// Timestamp format of the log stream.
pub const TS_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One engine decision.  Never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogEvent {
    #[serde(with = "ts_format")]
    pub ts: NaiveDateTime,
    #[serde(rename = "type")]
    pub kind: String,
    /// Always a JSON object.
    pub payload: Value,
}

impl LogEvent {
    pub fn new(ts: NaiveDateTime, kind: &str, payload: Value) -> Self {
        let payload = match payload {
            Value::Object(_) => payload,
            Value::Null => Value::Object(serde_json::Map::new()),
            other => serde_json::json!({ "value": other }),
        };
        Self {
            ts,
            kind: kind.to_owned(),
            payload,
        }
    }

    /// String field of the payload, if present.
    pub fn field_str(&self, key: &str) -> Option<&str> {
        self.payload.get(key).and_then(Value::as_str)
    }
}

mod ts_format {
    use chrono::NaiveDateTime;
    use serde::{Deserialize, Deserializer, Serializer};

    use super::TS_FORMAT;

    pub fn serialize<S: Serializer>(ts: &NaiveDateTime, s: S) -> Result<S::Ok, S::Error> {
        s.collect_str(&ts.format(TS_FORMAT))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<NaiveDateTime, D::Error> {
        let raw = String::deserialize(d)?;
        NaiveDateTime::parse_from_str(&raw, TS_FORMAT).map_err(serde::de::Error::custom)
    }
}

// ───────────────────────────────────────────────────────────────
// EventLog
// ───────────────────────────────────────────────────────────────

/// Append-only, newest-first record of log events.
///
/// Growth is unbounded; consumers that persist it must choose their own
/// retention policy.
#[derive(Debug, Default)]
pub struct EventLog {
    events: VecDeque<LogEvent>,
}

impl EventLog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push(&mut self, event: LogEvent) {
        self.events.push_front(event);
    }

    /// The `n` most recent events, newest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &LogEvent> {
        self.events.iter().take(n)
    }

    /// All events, newest first.
    pub fn iter(&self) -> impl Iterator<Item = &LogEvent> {
        self.events.iter()
    }

    /// Number of events of the given kind.
    pub fn count_kind(&self, kind: &str) -> usize {
        self.events.iter().filter(|e| e.kind == kind).count()
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}

impl EventSink for EventLog {
    fn emit(&mut self, event: &LogEvent) {
        self.push(event.clone());
    }
}
