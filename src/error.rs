//! Unified error types for the care engine.
//!
//! A single `Error` enum that every port error converts into, keeping the
//! binary's error handling uniform.  None of these ever escape the
//! engine's per-tick evaluation: the service absorbs them, logs a warning
//! and records a log event instead.

use core::fmt;

use crate::notify::ContactTarget;

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible operation around the engine funnels into this type.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Error {
    /// An actuator command could not be delivered.
    Actuator(ActuatorError),
    /// A notification could not be dispatched.
    Notify(NotifyError),
    /// Configuration could not be loaded or saved.
    Config(ConfigError),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Actuator(e) => write!(f, "actuator: {e}"),
            Self::Notify(e) => write!(f, "notify: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
        }
    }
}

impl std::error::Error for Error {}

// ---------------------------------------------------------------------------
// Actuator errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ActuatorError {
    /// The serial / MQTT transport to the device is down.
    Unreachable,
    /// The device refused the command.
    Rejected(&'static str),
}

impl fmt::Display for ActuatorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Unreachable => write!(f, "device unreachable"),
            Self::Rejected(why) => write!(f, "command rejected: {why}"),
        }
    }
}

impl From<ActuatorError> for Error {
    fn from(e: ActuatorError) -> Self {
        Self::Actuator(e)
    }
}

// ---------------------------------------------------------------------------
// Notification errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotifyError {
    /// No contact in the profile matches the requested priority or name.
    NoContactFound(ContactTarget),
    /// The contact exists but the channel could not deliver the alert.
    Transport(String),
}

impl fmt::Display for NotifyError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NoContactFound(target) => write!(f, "no contact found for {target}"),
            Self::Transport(msg) => write!(f, "transport failure: {msg}"),
        }
    }
}

impl From<NotifyError> for Error {
    fn from(e: NotifyError) -> Self {
        Self::Notify(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

/// Errors from [`ConfigPort`](crate::app::ports::ConfigPort) operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// No document found in storage (first start).
    NotFound,
    /// The stored document is not valid JSON for its schema.
    Corrupted(String),
    /// A field failed range validation.
    ValidationFailed(&'static str),
    /// Generic I/O error from the storage backend.
    Io(String),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotFound => write!(f, "config not found"),
            Self::Corrupted(msg) => write!(f, "config corrupted: {msg}"),
            Self::ValidationFailed(msg) => write!(f, "validation failed: {msg}"),
            Self::Io(msg) => write!(f, "I/O error: {msg}"),
        }
    }
}

impl std::error::Error for ConfigError {}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
