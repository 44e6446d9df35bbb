//! CareLoop care automation engine.
//!
//! Watches presence, SOS and fall sensors, reminds about medication on a
//! daily schedule, checks in after long inactivity and escalates to
//! contacts.  The pure-logic modules are exposed for integration testing;
//! the device, contacts and storage are reached only through the port
//! traits in [`app::ports`].

#![deny(unused_must_use)]

pub mod adapters;
pub mod app;
pub mod config;
pub mod error;
pub mod fsm;
pub mod notify;
pub mod presence;
pub mod runner;
pub mod schedule;

pub use error::{Error, Result};
