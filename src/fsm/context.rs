//! Shared mutable context threaded through every FSM handler.
//!
//! `CareContext` is the single struct that state handlers read from and
//! write to: the latest sensor snapshot, the intended actuator outputs,
//! the configuration and the engine's working memory.  Handlers never do
//! I/O; log events and escalation requests are queued here and drained
//! by the service after the tick.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::app::events::LogEvent;
use crate::config::CareConfig;
use crate::notify::{Alert, ContactTarget};
use crate::presence::PresenceTracker;
use crate::schedule::{DoseLedger, DueMedication};

// ---------------------------------------------------------------------------
// Sensor snapshot (read-only to state handlers)
// ---------------------------------------------------------------------------

/// One reading of every sensor, taken fresh each tick.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SensorSnapshot {
    /// Someone is in view of the presence sensor.
    pub presence: bool,
    /// The SOS button is latched.
    pub sos: bool,
    /// The fall detector is latched.
    pub fall: bool,
    pub timestamp: NaiveDateTime,
}

impl SensorSnapshot {
    /// Fall or SOS: the highest-precedence condition.
    pub fn alarm(&self) -> bool {
        self.fall || self.sos
    }
}

// ---------------------------------------------------------------------------
// Actuator outputs (written by state handlers; applied by the service)
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Led {
    #[default]
    Off,
    On,
    Red,
    Green,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Buzzer {
    #[default]
    Off,
    On,
}

/// The actuator state the engine intends.  It reflects what the engine
/// decided even when delivery to the device failed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ActuatorCommands {
    pub led: Led,
    pub buzzer: Buzzer,
}

impl ActuatorCommands {
    /// Everything off.
    pub fn all_off() -> Self {
        Self::default()
    }
}

// ---------------------------------------------------------------------------
// CareContext
// ---------------------------------------------------------------------------

/// The shared context passed to every state handler function.
pub struct CareContext {
    // -- Timing --
    /// Timestamp of the tick being evaluated.
    pub now: NaiveDateTime,
    /// When the current state was entered.
    pub state_entered_at: NaiveDateTime,

    // -- Inputs --
    pub sensors: SensorSnapshot,
    pub config: CareConfig,

    // -- Outputs --
    pub commands: ActuatorCommands,
    /// Log events produced this tick, oldest first.
    pub events: Vec<LogEvent>,
    /// Escalations requested this tick.
    pub escalations: Vec<(ContactTarget, Alert)>,

    // -- Working memory --
    pub presence: PresenceTracker,
    pub ledger: DoseLedger,
    /// Set if and only if the state is `Reminder`.
    pub pending_medication: Option<DueMedication>,
    /// Set if and only if the state is `CheckIn`.
    pub checkin_started_at: Option<NaiveDateTime>,
    /// When the help LED was switched on by a wake word.
    pub help_led_since: Option<NaiveDateTime>,
}

impl CareContext {
    pub fn new(config: CareConfig, now: NaiveDateTime) -> Self {
        Self {
            now,
            state_entered_at: now,
            sensors: SensorSnapshot {
                presence: false,
                sos: false,
                fall: false,
                timestamp: now,
            },
            config,
            commands: ActuatorCommands::all_off(),
            events: Vec::new(),
            escalations: Vec::new(),
            presence: PresenceTracker::new(now),
            ledger: DoseLedger::new(),
            pending_medication: None,
            checkin_started_at: None,
            help_led_since: None,
        }
    }

    /// Take in a fresh snapshot; its timestamp becomes the tick's `now`.
    pub fn observe(&mut self, snapshot: SensorSnapshot) {
        self.now = snapshot.timestamp;
        self.sensors = snapshot;
        self.presence.update(&snapshot);
        self.ledger.prune(self.now.date());
    }

    /// Seconds elapsed since the current state was entered (never negative).
    pub fn secs_in_state(&self) -> i64 {
        (self.now - self.state_entered_at).num_seconds().max(0)
    }

    /// Queue a log event stamped with the tick's time.
    pub fn record(&mut self, kind: &str, payload: Value) {
        self.events.push(LogEvent::new(self.now, kind, payload));
    }
}
