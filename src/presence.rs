//! Presence tracker.
//!
//! Remembers when the presence sensor last fired.  A clock that steps
//! backwards past that moment resets the no-presence duration to zero
//! instead of producing a negative (or huge) duration, so a bad clock can
//! never cause a spurious check-in.

use chrono::NaiveDateTime;
use log::warn;

use crate::fsm::context::SensorSnapshot;

#[derive(Debug, Clone, Copy)]
pub struct PresenceTracker {
    last_presence_at: NaiveDateTime,
}

impl PresenceTracker {
    /// Start tracking as if the person was last seen at `now`.
    pub fn new(now: NaiveDateTime) -> Self {
        Self {
            last_presence_at: now,
        }
    }

    pub fn update(&mut self, snapshot: &SensorSnapshot) {
        if snapshot.presence {
            self.last_presence_at = snapshot.timestamp;
        } else if snapshot.timestamp < self.last_presence_at {
            warn!(
                "PRESENCE: clock went backwards ({} < {}), resetting",
                snapshot.timestamp, self.last_presence_at
            );
            self.last_presence_at = snapshot.timestamp;
        }
    }

    /// Restart the no-presence duration from `now`, as if the person had
    /// just been seen.  Used once a check-in has been resolved.
    pub fn rearm(&mut self, now: NaiveDateTime) {
        self.last_presence_at = now;
    }

    /// Whole minutes since presence was last seen; zero if `now` is earlier.
    pub fn minutes_since_presence(&self, now: NaiveDateTime) -> u64 {
        let minutes = (now - self.last_presence_at).num_minutes();
        u64::try_from(minutes).unwrap_or(0)
    }

    pub fn last_presence_at(&self) -> NaiveDateTime {
        self.last_presence_at
    }
}
