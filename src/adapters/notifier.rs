//! Console notifier adapter.
//!
//! Implements [`NotifierPort`] without a real gateway: each alert is
//! written to the log as the message the contact would receive, and kept
//! in an outbox for inspection.  A WhatsApp, email or SMS gateway adapter
//! would implement the same trait.

use log::warn;

use crate::app::ports::NotifierPort;
use crate::config::{Channel, Contact};
use crate::error::NotifyError;
use crate::notify::Alert;

/// One delivered message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub contact: String,
    pub channel: Channel,
    pub text: String,
}

#[derive(Debug, Default)]
pub struct LogNotifier {
    outbox: Vec<SentMessage>,
}

impl LogNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn outbox(&self) -> &[SentMessage] {
        &self.outbox
    }
}

impl NotifierPort for LogNotifier {
    fn dispatch(&mut self, contact: &Contact, alert: &Alert) -> Result<(), NotifyError> {
        warn!(
            "NOTIFY | {} via {} | {}",
            contact.name,
            contact.channel.as_str(),
            alert.text
        );
        self.outbox.push(SentMessage {
            contact: contact.name.clone(),
            channel: contact.channel,
            text: alert.text.clone(),
        });
        Ok(())
    }
}
