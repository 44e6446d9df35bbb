//! Simulated hardware bridge.
//!
//! Stands in for the microcontroller link when no device is attached.
//! Sensor inputs are set by the caller (the CLI simulator or a test) and
//! behave like the real ones: SOS and fall are latches that only
//! [`SensorPort::clear_latches`] releases, presence is a level.
//!
//! Every accepted actuator command is kept in a fixed-capacity history so
//! the last few can be inspected without unbounded growth.

use chrono::NaiveDateTime;
use heapless::HistoryBuffer;
use log::{debug, info};

use crate::app::ports::{ActuatorCommand, ActuatorPort, SensorPort};
use crate::config::MAX_COMPARTMENT;
use crate::error::ActuatorError;
use crate::fsm::context::{Buzzer, Led, SensorSnapshot};

/// Number of actuator commands remembered.
pub const HISTORY_LEN: usize = 32;

pub struct SimulatedBridge {
    presence: bool,
    sos: bool,
    fall: bool,
    online: bool,
    led: Led,
    buzzer: Buzzer,
    history: HistoryBuffer<ActuatorCommand, HISTORY_LEN>,
}

impl Default for SimulatedBridge {
    fn default() -> Self {
        Self::new()
    }
}

impl SimulatedBridge {
    pub fn new() -> Self {
        Self {
            presence: false,
            sos: false,
            fall: false,
            online: true,
            led: Led::Off,
            buzzer: Buzzer::Off,
            history: HistoryBuffer::new(),
        }
    }

    // ── Inputs ────────────────────────────────────────────────

    pub fn set_presence(&mut self, presence: bool) {
        self.presence = presence;
    }

    pub fn press_sos(&mut self) {
        info!("SIM: SOS pressed");
        self.sos = true;
    }

    pub fn trigger_fall(&mut self) {
        info!("SIM: fall detected");
        self.fall = true;
    }

    /// Disconnect or reconnect the device.  While offline every actuator
    /// command fails with [`ActuatorError::Unreachable`].
    pub fn set_online(&mut self, online: bool) {
        self.online = online;
    }

    // ── Observed outputs ──────────────────────────────────────

    pub fn led(&self) -> Led {
        self.led
    }

    pub fn buzzer(&self) -> Buzzer {
        self.buzzer
    }

    /// Accepted commands, oldest first.
    pub fn history(&self) -> impl Iterator<Item = &ActuatorCommand> {
        self.history.oldest_ordered()
    }

    pub fn last_command(&self) -> Option<&ActuatorCommand> {
        self.history.recent()
    }
}

impl SensorPort for SimulatedBridge {
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
    }
}

impl ActuatorPort for SimulatedBridge {
    fn act(&mut self, command: &ActuatorCommand) -> Result<(), ActuatorError> {
        if !self.online {
            return Err(ActuatorError::Unreachable);
        }
        match *command {
            ActuatorCommand::Signal { led, buzzer } => {
                if let Some(led) = led {
                    self.led = led;
                }
                if let Some(buzzer) = buzzer {
                    self.buzzer = buzzer;
                }
            }
            ActuatorCommand::Servo { compartment, angle } => {
                if compartment == 0 || compartment > MAX_COMPARTMENT {
                    return Err(ActuatorError::Rejected("compartment out of range"));
                }
                if angle > 180 {
                    return Err(ActuatorError::Rejected("servo angle out of range"));
                }
            }
        }
        match serde_json::to_string(command) {
            Ok(wire) => debug!("SIM: -> {wire}"),
            Err(e) => debug!("SIM: unserialisable command: {e}"),
        }
        self.history.write(*command);
        Ok(())
    }
}
