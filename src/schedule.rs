//! Medication schedule and due-dose selection.
//!
//! The scheduler is a pure function of `(schedule, now)`.  It never touches
//! engine state; the care state machine decides what to do with the dose
//! it returns and records acknowledgements in the [`DoseLedger`].
//!
//! ```text
//!           tolerance            tolerance
//!   ◀──────────────────── time ────────────────────▶
//!   [ due ......................................... due ]
//!   time - tol                                 time + tol
//! ```
//!
//! A dose counts as due on both sides of its nominal time.

use core::fmt;
use std::collections::HashMap;

use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime, NaiveTime, Timelike, Weekday};
use log::debug;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

// ═══════════════════════════════════════════════════════════════
//  Time of day
// ═══════════════════════════════════════════════════════════════

/// Minute-precision wall-clock time, serialized as `"HH:MM"`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimeOfDay(NaiveTime);

impl TimeOfDay {
    /// `None` if `hour > 23` or `minute > 59`.
    pub fn new(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(Self)
    }

    /// Truncate a wall-clock time to the minute.
    pub fn from_time(time: NaiveTime) -> Self {
        Self(time.with_second(0).and_then(|t| t.with_nanosecond(0)).unwrap_or(time))
    }

    /// Parse `"HH:MM"` (seconds are accepted and dropped).
    pub fn parse(s: &str) -> Option<Self> {
        NaiveTime::parse_from_str(s, "%H:%M")
            .or_else(|_| NaiveTime::parse_from_str(s, "%H:%M:%S"))
            .ok()
            .map(Self::from_time)
    }

    pub fn as_time(self) -> NaiveTime {
        self.0
    }

    /// Seconds between `time` and this time of day, ignoring the date.
    pub fn abs_diff_secs(self, time: NaiveTime) -> i64 {
        (time - self.0).num_seconds().abs()
    }
}

impl fmt::Display for TimeOfDay {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.format("%H:%M"))
    }
}

impl Serialize for TimeOfDay {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for TimeOfDay {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid time of day: {raw:?}")))
    }
}

// ═══════════════════════════════════════════════════════════════
//  Schedule entries
// ═══════════════════════════════════════════════════════════════

/// One medication and the times it should be taken.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MedicationEntry {
    pub drug: String,
    pub dose: String,
    /// Nominal dose times, in schedule order.  Snoozing appends to this.
    pub times: Vec<TimeOfDay>,
    /// Weekdays on which the medication is taken.
    pub days: Vec<Weekday>,
    pub tolerance_minutes: u32,
    pub requires_voice_confirm: bool,
    /// Dispenser compartment (1–8) holding this medication, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub compartment: Option<u8>,
}

impl MedicationEntry {
    /// Every day of the week.
    pub const ALL_DAYS: [Weekday; 7] = [
        Weekday::Mon,
        Weekday::Tue,
        Weekday::Wed,
        Weekday::Thu,
        Weekday::Fri,
        Weekday::Sat,
        Weekday::Sun,
    ];

    fn window_secs(&self) -> i64 {
        i64::from(self.tolerance_minutes) * 60
    }

    /// Append a time unless it is already scheduled.  Returns whether the
    /// list grew.
    pub fn add_time(&mut self, time: TimeOfDay) -> bool {
        if self.times.contains(&time) {
            debug!("{}: {} already scheduled", self.drug, time);
            return false;
        }
        self.times.push(time);
        true
    }
}

/// A schedule entry together with the times that matched this tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DueMedication {
    pub entry: MedicationEntry,
    /// Never empty; in the order the times appear in `entry.times`.
    pub due_times: Vec<TimeOfDay>,
}

impl DueMedication {
    pub fn due_times_display(&self) -> Vec<String> {
        self.due_times.iter().map(ToString::to_string).collect()
    }
}

// ═══════════════════════════════════════════════════════════════
//  Selection
// ═══════════════════════════════════════════════════════════════

/// The medication due at `now`, if any.
///
/// Among several candidates, the one whose earliest matching time is
/// smallest wins; ties keep schedule order.
pub fn next_due(schedule: &[MedicationEntry], now: NaiveDateTime) -> Option<DueMedication> {
    next_due_where(schedule, now, |_, _| true)
}

/// Like [`next_due`], but only times for which `accept(entry, time)` holds
/// are considered.  The filter runs before candidate selection.
pub fn next_due_where<F>(
    schedule: &[MedicationEntry],
    now: NaiveDateTime,
    mut accept: F,
) -> Option<DueMedication>
where
    F: FnMut(&MedicationEntry, TimeOfDay) -> bool,
{
    let today = now.weekday();
    let clock = now.time();
    let mut best: Option<(TimeOfDay, DueMedication)> = None;

    for entry in schedule {
        if !entry.days.contains(&today) {
            continue;
        }

        let window = entry.window_secs();
        let due_times: Vec<TimeOfDay> = entry
            .times
            .iter()
            .copied()
            .filter(|t| t.abs_diff_secs(clock) <= window)
            .filter(|t| accept(entry, *t))
            .collect();

        let Some(earliest) = due_times.iter().copied().min() else {
            continue;
        };

        // Strict comparison keeps the first entry on ties.
        if best.as_ref().is_none_or(|(current, _)| earliest < *current) {
            best = Some((
                earliest,
                DueMedication {
                    entry: entry.clone(),
                    due_times,
                },
            ));
        }
    }

    best.map(|(_, due)| due)
}

// ═══════════════════════════════════════════════════════════════
//  Dose ledger
// ═══════════════════════════════════════════════════════════════

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct DoseKey {
    drug: String,
    date: NaiveDate,
    time: TimeOfDay,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum DoseMark {
    /// Taken, skipped, snoozed away or missed.  Never offered again.
    Handled,
    /// Added by a snooze.  Offered only from its nominal time onwards.
    Deferred,
}

/// Per-day record of doses the engine has already dealt with.
///
/// Without it the symmetric tolerance window would re-offer a dose on
/// the very next tick after it was acknowledged.
#[derive(Debug, Default)]
pub struct DoseLedger {
    marks: HashMap<DoseKey, DoseMark>,
}

impl DoseLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Whether `time` of `drug` may be offered at `now`.
    pub fn accepts(&self, drug: &str, time: TimeOfDay, now: NaiveDateTime) -> bool {
        let key = DoseKey {
            drug: drug.to_owned(),
            date: now.date(),
            time,
        };
        match self.marks.get(&key) {
            None => true,
            Some(DoseMark::Handled) => false,
            Some(DoseMark::Deferred) => now.time() >= time.as_time(),
        }
    }

    pub fn mark_handled(&mut self, drug: &str, date: NaiveDate, times: &[TimeOfDay]) {
        for &time in times {
            self.marks.insert(
                DoseKey {
                    drug: drug.to_owned(),
                    date,
                    time,
                },
                DoseMark::Handled,
            );
        }
    }

    /// Record a snoozed dose due at `at`.
    pub fn defer(&mut self, drug: &str, at: NaiveDateTime) {
        self.marks.insert(
            DoseKey {
                drug: drug.to_owned(),
                date: at.date(),
                time: TimeOfDay::from_time(at.time()),
            },
            DoseMark::Deferred,
        );
    }

    /// Drop marks for days before `today`.
    pub fn prune(&mut self, today: NaiveDate) {
        self.marks.retain(|key, _| key.date >= today);
    }

    pub fn len(&self) -> usize {
        self.marks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.marks.is_empty()
    }
}

/// `now` truncated to the minute, plus `minutes`.
pub fn snooze_target(now: NaiveDateTime, minutes: u32) -> NaiveDateTime {
    let base = now
        .date()
        .and_time(TimeOfDay::from_time(now.time()).as_time());
    base + Duration::minutes(i64::from(minutes))
}
