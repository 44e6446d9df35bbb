//! Mock adapters for integration tests.
//!
//! Records every actuator and notifier call so tests can assert on the
//! full command history without a device or a messaging gateway.

use careloop::app::ports::{ActuatorCommand, ActuatorPort, NotifierPort, SensorPort};
use careloop::config::Contact;
use careloop::error::{ActuatorError, NotifyError};
use careloop::fsm::context::{Buzzer, Led, SensorSnapshot};
use careloop::notify::Alert;
use chrono::NaiveDateTime;

// ── MockHardware ──────────────────────────────────────────────

/// Sensor inputs are plain fields; SOS and fall behave as latches.
#[derive(Default)]
pub struct MockHardware {
    pub presence: bool,
    pub sos: bool,
    pub fall: bool,
    /// While set, every actuator command fails.
    pub unreachable: bool,
    pub calls: Vec<ActuatorCommand>,
    pub latch_clears: u32,
}

#[allow(dead_code)]
impl MockHardware {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn present() -> Self {
        Self {
            presence: true,
            ..Self::default()
        }
    }

    /// LED level the device would show after replaying every call.
    pub fn led(&self) -> Led {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCommand::Signal { led, .. } => *led,
                ActuatorCommand::Servo { .. } => None,
            })
            .last()
            .unwrap_or_default()
    }

    pub fn buzzer(&self) -> Buzzer {
        self.calls
            .iter()
            .filter_map(|c| match c {
                ActuatorCommand::Signal { buzzer, .. } => *buzzer,
                ActuatorCommand::Servo { .. } => None,
            })
            .last()
            .unwrap_or_default()
    }

    pub fn servo_calls(&self) -> Vec<(u8, u8)> {
        self.calls
            .iter()
            .filter_map(|c| match *c {
                ActuatorCommand::Servo { compartment, angle } => Some((compartment, angle)),
                ActuatorCommand::Signal { .. } => None,
            })
            .collect()
    }
}

impl SensorPort for MockHardware {
    fn read(&mut self, now: NaiveDateTime) -> SensorSnapshot {
        SensorSnapshot {
            presence: self.presence,
            sos: self.sos,
            fall: self.fall,
            timestamp: now,
        }
    }

    fn clear_latches(&mut self) {
        self.sos = false;
        self.fall = false;
        self.latch_clears += 1;
    }
}

impl ActuatorPort for MockHardware {
    fn act(&mut self, command: &ActuatorCommand) -> Result<(), ActuatorError> {
        if self.unreachable {
            return Err(ActuatorError::Unreachable);
        }
        self.calls.push(*command);
        Ok(())
    }
}

// ── MockNotifier ──────────────────────────────────────────────

#[derive(Default)]
pub struct MockNotifier {
    pub sent: Vec<(Contact, Alert)>,
    pub fail: bool,
}

#[allow(dead_code)]
impl MockNotifier {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NotifierPort for MockNotifier {
    fn dispatch(&mut self, contact: &Contact, alert: &Alert) -> Result<(), NotifyError> {
        if self.fail {
            return Err(NotifyError::Transport("gateway offline".into()));
        }
        self.sent.push((contact.clone(), alert.clone()));
        Ok(())
    }
}
