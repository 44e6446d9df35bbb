//! Clock adapters.
//!
//! - [`SystemClock`] reads the host's local wall-clock time.
//! - [`ManualClock`] is set by hand; the simulator and tests drive it.

use std::cell::Cell;

use chrono::{Duration, Local, NaiveDateTime, Timelike};

use crate::app::ports::ClockPort;

/// Local wall-clock time of the host, with sub-second precision dropped.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl SystemClock {
    pub fn new() -> Self {
        Self
    }
}

impl ClockPort for SystemClock {
    fn now(&self) -> NaiveDateTime {
        let now = Local::now().naive_local();
        now.with_nanosecond(0).unwrap_or(now)
    }
}

/// A clock that only moves when told to.
#[derive(Debug, Clone)]
pub struct ManualClock {
    now: Cell<NaiveDateTime>,
}

impl ManualClock {
    pub fn new(start: NaiveDateTime) -> Self {
        Self {
            now: Cell::new(start),
        }
    }

    pub fn set(&self, now: NaiveDateTime) {
        self.now.set(now);
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }
}

impl ClockPort for ManualClock {
    fn now(&self) -> NaiveDateTime {
        self.now.get()
    }
}
