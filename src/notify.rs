//! Escalation to human contacts.
//!
//! The engine only decides *when* to escalate and *to whom*.  Delivery is
//! the job of a [`NotifierPort`] adapter; this module resolves the target
//! against the profile and hands the alert over.

use core::fmt;

use log::info;

use crate::app::ports::NotifierPort;
use crate::config::{Channel, UserProfile};
use crate::error::NotifyError;

/// Who to notify: the first contact with a priority, or a contact by name.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContactTarget {
    Priority(u32),
    Name(String),
}

impl fmt::Display for ContactTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Priority(p) => write!(f, "priority {p}"),
            Self::Name(name) => write!(f, "name {name:?}"),
        }
    }
}

/// Why an alert is being sent.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AlertReason {
    /// A check-in went unanswered.
    CheckInTimeout,
    /// The operator asked for it.
    Manual,
}

impl AlertReason {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::CheckInTimeout => "checkin_timeout",
            Self::Manual => "manual",
        }
    }
}

/// Message handed to the notifier adapter.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub reason: AlertReason,
    pub text: String,
}

impl Alert {
    pub fn checkin_timeout(person: &str, minutes_no_presence: u64) -> Self {
        Self {
            reason: AlertReason::CheckInTimeout,
            text: format!(
                "{person} did not answer a check-in after {minutes_no_presence} minutes without movement"
            ),
        }
    }

    pub fn manual(person: &str) -> Self {
        Self {
            reason: AlertReason::Manual,
            text: format!("Please check on {person}"),
        }
    }
}

/// Successful delivery: which contact and channel were used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContactNotified {
    pub contact: String,
    pub channel: Channel,
}

/// Resolve `target` in `profile` and dispatch `alert` through `port`.
pub fn notify(
    profile: &UserProfile,
    target: &ContactTarget,
    alert: &Alert,
    port: &mut impl NotifierPort,
) -> Result<ContactNotified, NotifyError> {
    let contact = match target {
        ContactTarget::Priority(p) => profile.contact_by_priority(*p),
        ContactTarget::Name(name) => profile.contact_by_name(name),
    }
    .ok_or_else(|| NotifyError::NoContactFound(target.clone()))?;

    port.dispatch(contact, alert)?;
    info!(
        "NOTIFY: {} alert sent to {} via {}",
        alert.reason.as_str(),
        contact.name,
        contact.channel.as_str()
    );

    Ok(ContactNotified {
        contact: contact.name.clone(),
        channel: contact.channel,
    })
}
