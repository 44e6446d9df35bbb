//! Inbound commands to the care service.
//!
//! These are the external acknowledgements and operator actions (buttons
//! on the device, voice confirmation, a caregiver UI) that the
//! [`CareService`](super::service::CareService) interprets between ticks.

use serde::{Deserialize, Serialize};

use crate::config::CareConfig;
use crate::notify::ContactTarget;

/// Where a help request transcript came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HelpSource {
    Mic,
    Text,
}

/// Commands that external adapters can send into the engine.
#[derive(Debug, Clone)]
pub enum CareCommand {
    /// The pending medication was taken.
    MedTaken,
    /// Re-offer the pending medication `minutes` from now.
    MedSnooze { minutes: u32 },
    /// The pending medication is skipped.
    MedSkip,

    /// The person confirmed they are fine during a check-in.
    CheckInOk,

    /// Silence / reset: clears sensor latches, buzzer off, back to SAFE.
    /// Available from any state.
    Silence,

    /// A transcript to scan for the wake word.
    HelpRequest { transcript: String, source: HelpSource },
    /// Turn the help LED off.
    LedOff,

    /// Open the dispenser compartment holding `drug`.
    OpenCompartment { drug: String },

    /// Escalate to a contact right away.
    NotifyContact(ContactTarget),

    /// Hot-reload configuration.  Rejected if it fails validation.
    UpdateConfig(CareConfig),
    /// Persist the live configuration at the next opportunity.
    SaveConfig,
}

impl CareCommand {
    /// Short name for logs and `command_ignored` events.
    pub fn name(&self) -> &'static str {
        match self {
            Self::MedTaken => "med_taken",
            Self::MedSnooze { .. } => "med_snooze",
            Self::MedSkip => "med_skip",
            Self::CheckInOk => "checkin_ok",
            Self::Silence => "silence",
            Self::HelpRequest { .. } => "help_request",
            Self::LedOff => "led_off",
            Self::OpenCompartment { .. } => "open_compartment",
            Self::NotifyContact(_) => "notify_contact",
            Self::UpdateConfig(_) => "update_config",
            Self::SaveConfig => "save_config",
        }
    }
}
