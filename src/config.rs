//! Care configuration documents.
//!
//! Three documents make up the configuration: the user profile (with the
//! escalation contact list), the medication schedule and the rules
//! (thresholds).  They are read at startup and written only on an
//! explicit save, never per tick.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::schedule::{MedicationEntry, TimeOfDay};

/// Highest dispenser compartment number.
pub const MAX_COMPARTMENT: u8 = 8;

// ───────────────────────────────────────────────────────────────
// Rules
// ───────────────────────────────────────────────────────────────

/// Global thresholds read by the engine every tick.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rules {
    /// Minutes without presence during the day before a check-in starts.
    pub no_presence_minutes_day: u32,
    /// Start of the daytime window for inactivity checks.
    pub day_start: TimeOfDay,
    /// End of the daytime window (inclusive).
    pub day_end: TimeOfDay,
    /// Seconds a check-in waits for confirmation before escalating.
    pub checkin_timeout_seconds: u32,
    /// Minutes an unacknowledged reminder stays pending; 0 keeps it forever.
    #[serde(default = "default_reminder_timeout")]
    pub reminder_timeout_minutes: u32,
    /// Word that turns the help LED on when heard in a transcript.
    #[serde(default = "default_wake_word")]
    pub wake_word: String,
    /// Seconds before the help LED switches itself off; 0 keeps it on.
    #[serde(default = "default_help_auto_off")]
    pub help_led_auto_off_seconds: u32,
}

fn default_reminder_timeout() -> u32 {
    30
}

fn default_wake_word() -> String {
    "help".into()
}

fn default_help_auto_off() -> u32 {
    10
}

impl Default for Rules {
    fn default() -> Self {
        Self {
            no_presence_minutes_day: 20,
            day_start: hm(6, 0),
            day_end: hm(22, 0),
            checkin_timeout_seconds: 30,
            reminder_timeout_minutes: default_reminder_timeout(),
            wake_word: default_wake_word(),
            help_led_auto_off_seconds: default_help_auto_off(),
        }
    }
}

impl Rules {
    /// Whether `time` lies within `[day_start, day_end]`.
    pub fn is_daytime(&self, time: chrono::NaiveTime) -> bool {
        time >= self.day_start.as_time() && time <= self.day_end.as_time()
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.day_start >= self.day_end {
            return Err(ConfigError::ValidationFailed(
                "day_start must precede day_end",
            ));
        }
        if self.checkin_timeout_seconds == 0 {
            return Err(ConfigError::ValidationFailed(
                "checkin_timeout_seconds must be positive",
            ));
        }
        if self.wake_word.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("wake_word must not be empty"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Contacts and profile
// ───────────────────────────────────────────────────────────────

/// Delivery channel for a contact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Channel {
    Whatsapp,
    Email,
    Sms,
}

impl Channel {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Whatsapp => "whatsapp",
            Self::Email => "email",
            Self::Sms => "sms",
        }
    }
}

/// A person to escalate to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Contact {
    pub name: String,
    pub channel: Channel,
    /// 1 is the highest priority.
    pub priority: u32,
}

/// The monitored person and their contact list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserProfile {
    pub name: String,
    pub birth_year: u16,
    pub contacts: Vec<Contact>,
}

impl Default for UserProfile {
    fn default() -> Self {
        Self {
            name: "Resident".into(),
            birth_year: 1945,
            contacts: vec![Contact {
                name: "Caregiver".into(),
                channel: Channel::Sms,
                priority: 1,
            }],
        }
    }
}

impl UserProfile {
    /// First contact with the given priority, in list order.
    pub fn contact_by_priority(&self, priority: u32) -> Option<&Contact> {
        self.contacts.iter().find(|c| c.priority == priority)
    }

    /// Case-insensitive lookup by name.
    pub fn contact_by_name(&self, name: &str) -> Option<&Contact> {
        self.contacts
            .iter()
            .find(|c| c.name.eq_ignore_ascii_case(name))
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.contacts.iter().any(|c| c.priority == 0) {
            return Err(ConfigError::ValidationFailed(
                "contact priority must be 1 or greater",
            ));
        }
        if self.contacts.iter().any(|c| c.name.trim().is_empty()) {
            return Err(ConfigError::ValidationFailed("contact name must not be empty"));
        }
        Ok(())
    }
}

// ───────────────────────────────────────────────────────────────
// Schedule
// ───────────────────────────────────────────────────────────────

/// The built-in schedule used when none is stored.
pub fn default_schedule() -> Vec<MedicationEntry> {
    vec![
        MedicationEntry {
            drug: "Losartan".into(),
            dose: "50mg".into(),
            times: vec![hm(8, 0), hm(20, 0)],
            days: MedicationEntry::ALL_DAYS.to_vec(),
            tolerance_minutes: 15,
            requires_voice_confirm: false,
            compartment: Some(1),
        },
        MedicationEntry {
            drug: "Metformin".into(),
            dose: "500mg".into(),
            times: vec![hm(13, 0)],
            days: MedicationEntry::ALL_DAYS.to_vec(),
            tolerance_minutes: 15,
            requires_voice_confirm: false,
            compartment: Some(2),
        },
    ]
}

pub fn validate_schedule(schedule: &[MedicationEntry]) -> Result<(), ConfigError> {
    for (i, entry) in schedule.iter().enumerate() {
        if schedule[..i]
            .iter()
            .any(|other| other.drug.eq_ignore_ascii_case(&entry.drug))
        {
            return Err(ConfigError::ValidationFailed("drug names must be unique"));
        }
        if entry.drug.trim().is_empty() {
            return Err(ConfigError::ValidationFailed("drug name must not be empty"));
        }
        if entry.times.is_empty() {
            return Err(ConfigError::ValidationFailed(
                "medication must have at least one time",
            ));
        }
        if entry.tolerance_minutes > 180 {
            return Err(ConfigError::ValidationFailed(
                "tolerance_minutes must be 0–180",
            ));
        }
        if let Some(c) = entry.compartment {
            if !(1..=MAX_COMPARTMENT).contains(&c) {
                return Err(ConfigError::ValidationFailed("compartment must be 1–8"));
            }
        }
    }
    Ok(())
}

// ───────────────────────────────────────────────────────────────
// Bundle
// ───────────────────────────────────────────────────────────────

/// All three documents together, as handed to the engine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CareConfig {
    pub profile: UserProfile,
    pub schedule: Vec<MedicationEntry>,
    pub rules: Rules,
}

impl Default for CareConfig {
    fn default() -> Self {
        Self {
            profile: UserProfile::default(),
            schedule: default_schedule(),
            rules: Rules::default(),
        }
    }
}

impl CareConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.profile.validate()?;
        validate_schedule(&self.schedule)?;
        self.rules.validate()
    }
}

fn hm(hour: u32, minute: u32) -> TimeOfDay {
    // Only called with literal, in-range values.
    TimeOfDay::new(hour, minute).unwrap_or_default()
}
