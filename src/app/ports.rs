//! Port traits — the hexagonal boundary between the engine and the outside world.
//!
//! ```text
//!   Adapter ──▶ Port trait ──▶ CareService (domain)
//! ```
//!
//! Driven adapters (hardware bridge, notifier, event sinks, config store,
//! clock) implement these traits.  The
//! [`CareService`](super::service::CareService) consumes them via
//! generics, so the engine never inspects a concrete implementation.
//!
//! Every call is synchronous and expected to be fast.  A slow or
//! asynchronous transport must buffer on its own side of the port.

use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::config::{CareConfig, Contact, Rules, UserProfile};
use crate::error::{ActuatorError, ConfigError, NotifyError};
use crate::fsm::context::{Buzzer, Led, SensorSnapshot};
use crate::notify::Alert;
use crate::schedule::MedicationEntry;

use super::events::LogEvent;

// ───────────────────────────────────────────────────────────────
// Sensor port (driven adapter: hardware → domain)
// ───────────────────────────────────────────────────────────────

/// Read side of the hardware bridge.
pub trait SensorPort {
    /// Read presence, SOS and fall.  The bridge stamps the reading; a
    /// bridge without its own clock uses `now`.
    fn read(&mut self, now: NaiveDateTime) -> SensorSnapshot;

    /// Clear the SOS and fall latches (silence / reset).
    fn clear_latches(&mut self);
}

// ───────────────────────────────────────────────────────────────
// Actuator port (driven adapter: domain → hardware)
// ───────────────────────────────────────────────────────────────

/// A command for the device.  `None` fields are left unchanged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ActuatorCommand {
    Signal {
        led: Option<Led>,
        buzzer: Option<Buzzer>,
    },
    /// Swing the servo of `compartment` to `angle` degrees (0–180).
    Servo { compartment: u8, angle: u8 },
}

/// Write side of the hardware bridge.
pub trait ActuatorPort {
    /// Deliver one command.  Best effort: the engine logs failures and
    /// retries level commands on the next tick.
    fn act(&mut self, command: &ActuatorCommand) -> Result<(), ActuatorError>;
}

// ───────────────────────────────────────────────────────────────
// Notifier port (driven adapter: domain → WhatsApp / email / SMS)
// ───────────────────────────────────────────────────────────────

/// Delivers an alert to an already-resolved contact.
pub trait NotifierPort {
    fn dispatch(&mut self, contact: &Contact, alert: &Alert) -> Result<(), NotifyError>;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven adapter: domain → log / display)
// ───────────────────────────────────────────────────────────────

/// The engine emits every [`LogEvent`] through this port.  Adapters
/// decide where they go (in-memory log, logger, a file).
pub trait EventSink {
    fn emit(&mut self, event: &LogEvent);
}

/// Fan out to two sinks.
impl<A: EventSink, B: EventSink> EventSink for (A, B) {
    fn emit(&mut self, event: &LogEvent) {
        self.0.emit(event);
        self.1.emit(event);
    }
}

// ───────────────────────────────────────────────────────────────
// Clock port
// ───────────────────────────────────────────────────────────────

/// Source of the current local wall-clock time, read once per tick.
pub trait ClockPort {
    fn now(&self) -> NaiveDateTime;
}

// ───────────────────────────────────────────────────────────────
// Configuration port (driven adapter: domain ↔ persisted documents)
// ───────────────────────────────────────────────────────────────

/// Loads and persists the three configuration documents.
///
/// Implementations MUST validate before persisting and reject invalid
/// values with [`ConfigError::ValidationFailed`] rather than clamping.
pub trait ConfigPort {
    fn load_profile(&self) -> Result<UserProfile, ConfigError>;
    fn load_schedule(&self) -> Result<Vec<MedicationEntry>, ConfigError>;
    fn load_rules(&self) -> Result<Rules, ConfigError>;

    fn save_profile(&self, profile: &UserProfile) -> Result<(), ConfigError>;
    fn save_schedule(&self, schedule: &[MedicationEntry]) -> Result<(), ConfigError>;
    fn save_rules(&self, rules: &Rules) -> Result<(), ConfigError>;

    /// Load every document, falling back to the built-in default for any
    /// document that is missing, malformed or invalid.  Never fails.
    fn load_or_default(&self) -> CareConfig {
        let defaults = CareConfig::default();
        CareConfig {
            profile: fallback("profile", self.load_profile(), defaults.profile),
            schedule: fallback("schedule", self.load_schedule(), defaults.schedule),
            rules: fallback("rules", self.load_rules(), defaults.rules),
        }
    }

    /// Save all three documents.
    fn save_all(&self, config: &CareConfig) -> Result<(), ConfigError> {
        self.save_profile(&config.profile)?;
        self.save_schedule(&config.schedule)?;
        self.save_rules(&config.rules)
    }
}

fn fallback<T>(what: &str, loaded: Result<T, ConfigError>, default: T) -> T {
    match loaded {
        Ok(value) => value,
        Err(ConfigError::NotFound) => {
            log::info!("Config: no stored {what}, using defaults");
            default
        }
        Err(e) => {
            log::warn!("Config: {what} unusable ({e}), using defaults");
            default
        }
    }
}
