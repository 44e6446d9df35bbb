//! Concrete state handler functions and table builder.
//!
//! ```text
//!  SAFE ──[dose due]──────────▶ REMINDER ──[taken/snooze/skip/timeout]──▶ SAFE
//!    │
//!    └──[no presence, daytime]─▶ CHECK_IN ──[ok / timeout + escalate]────▶ SAFE
//!
//!  Any state ──[fall or SOS]──▶ ALERT_FALL ──[silence/reset only]────────▶ SAFE
//! ```
//!
//! Precedence inside one tick is fixed: fall/SOS, then medication, then
//! inactivity.  Acknowledgements and the silence action arrive as
//! commands and are applied by the service through `force_transition`.

use log::{info, warn};
use serde_json::json;

use super::context::{Buzzer, CareContext, Led};
use super::{StateDescriptor, StateId};
use crate::notify::{Alert, ContactTarget};
use crate::schedule::next_due_where;

// ═══════════════════════════════════════════════════════════════════════════
//  Table builder
// ═══════════════════════════════════════════════════════════════════════════

/// Build the static state table.  Called once at startup.
pub fn build_state_table() -> [StateDescriptor; StateId::COUNT] {
    [
        // Index 0 — Safe
        StateDescriptor {
            id: StateId::Safe,
            name: "SAFE",
            on_enter: Some(safe_enter),
            on_exit: Some(safe_exit),
            on_update: safe_update,
        },
        // Index 1 — Reminder
        StateDescriptor {
            id: StateId::Reminder,
            name: "REMINDER",
            on_enter: Some(reminder_enter),
            on_exit: Some(reminder_exit),
            on_update: reminder_update,
        },
        // Index 2 — AlertFall
        StateDescriptor {
            id: StateId::AlertFall,
            name: "ALERT_FALL",
            on_enter: Some(alert_fall_enter),
            on_exit: Some(alert_fall_exit),
            on_update: alert_fall_update,
        },
        // Index 3 — CheckIn
        StateDescriptor {
            id: StateId::CheckIn,
            name: "CHECK_IN",
            on_enter: Some(checkin_enter),
            on_exit: Some(checkin_exit),
            on_update: checkin_update,
        },
    ]
}

// ═══════════════════════════════════════════════════════════════════════════
//  SAFE state
// ═══════════════════════════════════════════════════════════════════════════

fn safe_enter(_ctx: &mut CareContext) {
    info!("SAFE: monitoring");
}

fn safe_exit(ctx: &mut CareContext) {
    // The next state owns the LED from here on; a help light must not
    // outlive SAFE.
    if ctx.help_led_since.take().is_some() {
        ctx.commands.led = Led::Off;
    }
}

fn safe_update(ctx: &mut CareContext) -> Option<StateId> {
    if ctx.sensors.alarm() {
        return Some(StateId::AlertFall);
    }

    expire_help_led(ctx);

    let now = ctx.now;
    let ledger = &ctx.ledger;
    let due = next_due_where(&ctx.config.schedule, now, |entry, time| {
        ledger.accepts(&entry.drug, time, now)
    });
    if let Some(due) = due {
        ctx.pending_medication = Some(due);
        return Some(StateId::Reminder);
    }

    let rules = &ctx.config.rules;
    if rules.is_daytime(now.time())
        && ctx.presence.minutes_since_presence(now) > u64::from(rules.no_presence_minutes_day)
    {
        return Some(StateId::CheckIn);
    }

    None
}

fn expire_help_led(ctx: &mut CareContext) {
    let Some(since) = ctx.help_led_since else {
        return;
    };
    let auto_off = i64::from(ctx.config.rules.help_led_auto_off_seconds);
    if auto_off > 0 && (ctx.now - since).num_seconds() >= auto_off {
        ctx.help_led_since = None;
        ctx.commands.led = Led::Off;
        info!("SAFE: help LED off after {auto_off}s");
        ctx.record("led_off", json!({ "auto": true }));
    }
}

// ═══════════════════════════════════════════════════════════════════════════
//  REMINDER state: a dose is due and waits for taken / snooze / skip
// ═══════════════════════════════════════════════════════════════════════════

fn reminder_enter(ctx: &mut CareContext) {
    ctx.commands.led = Led::Green;
    let Some(due) = ctx.pending_medication.as_ref() else {
        warn!("REMINDER: entered without a pending medication");
        return;
    };
    info!(
        "REMINDER: {} {} due at {:?}",
        due.entry.drug,
        due.entry.dose,
        due.due_times_display()
    );
    let payload = json!({
        "drug": due.entry.drug,
        "dose": due.entry.dose,
        "due_times": due.due_times_display(),
    });
    ctx.record("med_reminder", payload);
}

fn reminder_exit(ctx: &mut CareContext) {
    ctx.pending_medication = None;
    ctx.commands.led = Led::Off;
}

fn reminder_update(ctx: &mut CareContext) -> Option<StateId> {
    if ctx.sensors.alarm() {
        return Some(StateId::AlertFall);
    }

    let timeout_secs = i64::from(ctx.config.rules.reminder_timeout_minutes) * 60;
    if timeout_secs == 0 || ctx.secs_in_state() < timeout_secs {
        return None;
    }

    if let Some(due) = ctx.pending_medication.take() {
        warn!(
            "REMINDER: {} not acknowledged within {} min, marking missed",
            due.entry.drug, ctx.config.rules.reminder_timeout_minutes
        );
        let date = ctx.now.date();
        ctx.ledger.mark_handled(&due.entry.drug, date, &due.due_times);
        ctx.record(
            "med_missed",
            json!({
                "drug": due.entry.drug,
                "dose": due.entry.dose,
                "due_times": due.due_times_display(),
            }),
        );
    }
    Some(StateId::Safe)
}

// ═══════════════════════════════════════════════════════════════════════════
//  ALERT_FALL state: buzzer on until someone silences it
// ═══════════════════════════════════════════════════════════════════════════

fn alert_fall_enter(ctx: &mut CareContext) {
    ctx.commands.buzzer = Buzzer::On;
    ctx.commands.led = Led::Red;
    let (fall, sos) = (ctx.sensors.fall, ctx.sensors.sos);
    warn!("ALERT_FALL: fall={fall} sos={sos}, buzzer on");
    ctx.record("fall_alert", json!({ "fall": fall, "sos": sos }));
}

fn alert_fall_exit(ctx: &mut CareContext) {
    ctx.commands.buzzer = Buzzer::Off;
    ctx.commands.led = Led::Off;
    info!("ALERT_FALL: silenced");
}

fn alert_fall_update(_ctx: &mut CareContext) -> Option<StateId> {
    // Only the silence/reset command leaves this state.
    None
}

// ═══════════════════════════════════════════════════════════════════════════
//  CHECK_IN state: asking the person to confirm they are fine
// ═══════════════════════════════════════════════════════════════════════════

fn checkin_enter(ctx: &mut CareContext) {
    let minutes = ctx.presence.minutes_since_presence(ctx.now);
    ctx.checkin_started_at = Some(ctx.now);
    info!("CHECK_IN: no presence for {minutes} min, waiting for confirmation");
    ctx.record("checkin_start", json!({ "minutes_no_presence": minutes }));
}

fn checkin_exit(ctx: &mut CareContext) {
    ctx.checkin_started_at = None;
    // Whatever ended the check-in, someone has dealt with the person.
    ctx.presence.rearm(ctx.now);
}

fn checkin_update(ctx: &mut CareContext) -> Option<StateId> {
    if ctx.sensors.alarm() {
        return Some(StateId::AlertFall);
    }

    let started = ctx.checkin_started_at.unwrap_or(ctx.state_entered_at);
    let waited = (ctx.now - started).num_seconds();
    if waited <= i64::from(ctx.config.rules.checkin_timeout_seconds) {
        return None;
    }

    let minutes = ctx.presence.minutes_since_presence(ctx.now);
    warn!("CHECK_IN: no confirmation after {waited}s, escalating");
    ctx.record(
        "checkin_timeout",
        json!({ "minutes_no_presence": minutes, "waited_seconds": waited }),
    );
    let alert = Alert::checkin_timeout(&ctx.config.profile.name, minutes);
    ctx.escalations.push((ContactTarget::Priority(1), alert));
    Some(StateId::Safe)
}
