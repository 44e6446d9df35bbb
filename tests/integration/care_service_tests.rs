//! Integration tests for the CareService → FSM → ports pipeline.
//!
//! Drives the service tick by tick against mock hardware and a mock
//! notifier, checking state, actuator traffic, escalations and the event
//! log together.

use careloop::app::commands::{CareCommand, HelpSource};
use careloop::app::events::EventLog;
use careloop::app::service::CareService;
use careloop::config::CareConfig;
use careloop::fsm::StateId;
use careloop::fsm::context::{Buzzer, Led};
use careloop::notify::AlertReason;
use careloop::schedule::{MedicationEntry, TimeOfDay};
use chrono::{Duration, NaiveDate, NaiveDateTime, Weekday};

use crate::mock_hw::{MockHardware, MockNotifier};

// ── Fixtures ──────────────────────────────────────────────────

/// 2024-06-03 is a Monday.
fn at(h: u32, m: u32) -> NaiveDateTime {
    NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_opt(h, m, 0))
        .unwrap()
}

fn tod(h: u32, m: u32) -> TimeOfDay {
    TimeOfDay::new(h, m).unwrap()
}

fn losartan() -> MedicationEntry {
    MedicationEntry {
        drug: "Losartan".into(),
        dose: "50mg".into(),
        times: vec![tod(10, 30), tod(22, 0)],
        days: MedicationEntry::ALL_DAYS.to_vec(),
        tolerance_minutes: 15,
        requires_voice_confirm: false,
        compartment: Some(1),
    }
}

fn config_with(schedule: Vec<MedicationEntry>) -> CareConfig {
    CareConfig {
        schedule,
        ..CareConfig::default()
    }
}

struct Rig {
    svc: CareService,
    hw: MockHardware,
    notifier: MockNotifier,
    log: EventLog,
}

impl Rig {
    fn new(config: CareConfig, start: NaiveDateTime) -> Self {
        let mut svc = CareService::new(config, start);
        let mut log = EventLog::new();
        svc.start(&mut log);
        Self {
            svc,
            hw: MockHardware::present(),
            notifier: MockNotifier::new(),
            log,
        }
    }

    fn tick(&mut self, now: NaiveDateTime) -> StateId {
        self.svc
            .tick(now, &mut self.hw, &mut self.notifier, &mut self.log);
        assert!(
            self.svc.engine_state().is_consistent(),
            "working memory inconsistent in {:?}",
            self.svc.state()
        );
        self.svc.state()
    }

    fn command(&mut self, cmd: CareCommand, now: NaiveDateTime) -> StateId {
        self.svc
            .handle_command(cmd, now, &mut self.hw, &mut self.notifier, &mut self.log);
        assert!(self.svc.engine_state().is_consistent());
        self.svc.state()
    }
}

// ── Precedence ────────────────────────────────────────────────

#[test]
fn fall_preempts_pending_reminder() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    assert_eq!(rig.tick(at(10, 40)), StateId::Reminder);

    rig.hw.fall = true;
    assert_eq!(rig.tick(at(10, 41)), StateId::AlertFall);
    assert!(rig.svc.engine_state().pending_medication.is_none());
    assert_eq!(rig.hw.buzzer(), Buzzer::On);
    assert_eq!(rig.hw.led(), Led::Red);
}

#[test]
fn sos_preempts_check_in() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.presence = false;
    assert_eq!(rig.tick(at(9, 21)), StateId::CheckIn);

    rig.hw.sos = true;
    assert_eq!(rig.tick(at(9, 21) + Duration::seconds(5)), StateId::AlertFall);
    assert!(rig.svc.engine_state().checkin_started_at.is_none());
    assert!(rig.notifier.sent.is_empty());
}

#[test]
fn alert_fall_holds_until_silenced() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.fall = true;
    rig.tick(at(9, 1));
    // The latch stays set; nothing but silence leaves ALERT_FALL.
    for m in 2..40 {
        assert_eq!(rig.tick(at(9, m)), StateId::AlertFall);
    }
    assert_eq!(rig.log.count_kind("fall_alert"), 1);

    assert_eq!(rig.command(CareCommand::Silence, at(9, 40)), StateId::Safe);
    assert_eq!(rig.hw.latch_clears, 1);
    assert_eq!(rig.hw.buzzer(), Buzzer::Off);
    assert_eq!(rig.tick(at(9, 41)), StateId::Safe);
}

// ── Scheduler correctness ─────────────────────────────────────

#[test]
fn reminder_carries_matching_due_times() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    assert_eq!(rig.tick(at(10, 40)), StateId::Reminder);

    let pending = rig.svc.engine_state().pending_medication.unwrap();
    assert_eq!(pending.entry.drug, "Losartan");
    assert_eq!(pending.due_times_display(), vec!["10:30".to_string()]);
    assert_eq!(rig.hw.led(), Led::Green);

    let reminder = rig.log.recent(1).next().unwrap();
    assert_eq!(reminder.kind, "med_reminder");
    assert_eq!(reminder.payload["due_times"][0], "10:30");
}

#[test]
fn no_reminder_outside_window() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    assert_eq!(rig.tick(at(10, 46)), StateId::Safe);
    assert_eq!(rig.log.count_kind("med_reminder"), 0);
}

#[test]
fn no_reminder_on_excluded_weekday() {
    let mut entry = losartan();
    entry.days = vec![Weekday::Tue];
    let mut rig = Rig::new(config_with(vec![entry]), at(10, 0));
    assert_eq!(rig.tick(at(10, 30)), StateId::Safe);
}

// ── Acknowledgements ──────────────────────────────────────────

#[test]
fn taken_dose_is_not_offered_again() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    rig.tick(at(10, 30));
    assert_eq!(rig.command(CareCommand::MedTaken, at(10, 31)), StateId::Safe);
    assert_eq!(rig.hw.servo_calls(), vec![(1, 90)]);

    for m in 32..=45 {
        assert_eq!(rig.tick(at(10, m)), StateId::Safe);
    }
    assert_eq!(rig.log.count_kind("med_reminder"), 1);
    assert_eq!(rig.log.count_kind("med_taken"), 1);
}

#[test]
fn snooze_appends_one_time_and_reminds_once_later() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    rig.tick(at(10, 40));

    let state = rig.command(CareCommand::MedSnooze { minutes: 10 }, at(10, 40));
    assert_eq!(state, StateId::Safe);
    let times = &rig.svc.config().schedule[0].times;
    assert_eq!(times, &vec![tod(10, 30), tod(22, 0), tod(10, 50)]);
    assert!(rig.svc.is_config_dirty());

    // Before the snoozed time, no tick re-opens the reminder.
    for m in 41..50 {
        assert_eq!(rig.tick(at(10, m)), StateId::Safe, "reminded early at 10:{m}");
    }
    assert_eq!(rig.log.count_kind("med_reminder"), 1);

    assert_eq!(rig.tick(at(10, 50)), StateId::Reminder);
    let pending = rig.svc.engine_state().pending_medication.unwrap();
    assert_eq!(pending.due_times, vec![tod(10, 50)]);
}

#[test]
fn skip_records_and_returns_to_safe() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    rig.tick(at(10, 30));
    assert_eq!(rig.command(CareCommand::MedSkip, at(10, 31)), StateId::Safe);
    assert_eq!(rig.log.count_kind("med_skipped"), 1);
    assert_eq!(rig.tick(at(10, 32)), StateId::Safe);
}

#[test]
fn unanswered_reminder_times_out_as_missed() {
    let mut rig = Rig::new(config_with(vec![losartan()]), at(10, 0));
    rig.tick(at(10, 20));
    assert_eq!(rig.tick(at(10, 49)), StateId::Reminder);
    assert_eq!(rig.tick(at(10, 50)), StateId::Safe);
    assert_eq!(rig.log.count_kind("med_missed"), 1);
    assert_eq!(rig.hw.led(), Led::Off);
    assert!(rig.notifier.sent.is_empty());
}

// ── Check-in escalation ───────────────────────────────────────

#[test]
fn check_in_timeout_escalates_exactly_once() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.presence = false;

    assert_eq!(rig.tick(at(9, 20)), StateId::Safe);
    assert_eq!(rig.tick(at(9, 21)), StateId::CheckIn);
    assert_eq!(rig.tick(at(9, 21) + Duration::seconds(30)), StateId::CheckIn);
    assert_eq!(rig.tick(at(9, 21) + Duration::seconds(31)), StateId::Safe);

    // Still nobody there: no repeat while the baseline is fresh.
    for s in 32..600 {
        rig.tick(at(9, 21) + Duration::seconds(s));
    }

    assert_eq!(rig.log.count_kind("checkin_timeout"), 1);
    assert_eq!(rig.notifier.sent.len(), 1);
    let (contact, alert) = &rig.notifier.sent[0];
    assert_eq!(contact.priority, 1);
    assert_eq!(alert.reason, AlertReason::CheckInTimeout);
    assert_eq!(rig.log.count_kind("notify"), 1);
}

#[test]
fn confirmed_check_in_returns_to_safe_without_escalation() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.presence = false;
    rig.tick(at(9, 21));
    assert_eq!(rig.command(CareCommand::CheckInOk, at(9, 21)), StateId::Safe);
    rig.tick(at(9, 22));
    assert!(rig.notifier.sent.is_empty());
    assert_eq!(rig.log.count_kind("checkin_ok"), 1);
}

#[test]
fn help_light_does_not_outlive_safe() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.presence = false;
    rig.tick(at(9, 20));

    let help = CareCommand::HelpRequest {
        transcript: "help".into(),
        source: HelpSource::Text,
    };
    rig.command(help, at(9, 20) + Duration::seconds(55));
    assert_eq!(rig.hw.led(), Led::On);

    // Entering CHECK_IN before the auto-off fires.
    assert_eq!(rig.tick(at(9, 21)), StateId::CheckIn);
    assert_eq!(rig.hw.led(), Led::Off);

    assert_eq!(rig.command(CareCommand::CheckInOk, at(9, 21)), StateId::Safe);
    for s in 1..600 {
        rig.tick(at(9, 21) + Duration::seconds(s));
    }
    assert_eq!(rig.svc.commands().led, Led::Off);
    assert_eq!(rig.hw.led(), Led::Off);
}

#[test]
fn no_check_in_at_night() {
    let mut rig = Rig::new(CareConfig::default(), at(22, 30));
    rig.hw.presence = false;
    assert_eq!(rig.tick(at(23, 55)), StateId::Safe);
}

#[test]
fn missing_contact_is_a_warning_not_a_failure() {
    let mut config = CareConfig::default();
    config.profile.contacts.clear();
    let mut rig = Rig::new(config, at(9, 0));
    rig.hw.presence = false;
    rig.tick(at(9, 21));
    assert_eq!(rig.tick(at(9, 22)), StateId::Safe);
    assert_eq!(rig.log.count_kind("notify_warning"), 1);
    assert!(rig.notifier.sent.is_empty());
}

#[test]
fn notifier_failure_is_logged_and_state_advances() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.notifier.fail = true;
    rig.hw.presence = false;
    rig.tick(at(9, 21));
    assert_eq!(rig.tick(at(9, 22)), StateId::Safe);
    assert_eq!(rig.log.count_kind("notify_failed"), 1);
    assert_eq!(rig.log.count_kind("checkin_timeout"), 1);
}

// ── Manual reset ──────────────────────────────────────────────

#[test]
fn silence_resets_from_every_state() {
    // SAFE
    let mut rig = Rig::new(config_with(vec![losartan()]), at(9, 0));
    assert_eq!(rig.command(CareCommand::Silence, at(9, 0)), StateId::Safe);

    // REMINDER
    rig.tick(at(10, 30));
    assert_eq!(rig.svc.state(), StateId::Reminder);
    assert_eq!(rig.command(CareCommand::Silence, at(10, 31)), StateId::Safe);

    // CHECK_IN
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.presence = false;
    rig.tick(at(9, 21));
    assert_eq!(rig.command(CareCommand::Silence, at(9, 21)), StateId::Safe);

    // ALERT_FALL
    rig.hw.sos = true;
    rig.tick(at(9, 22));
    assert_eq!(rig.command(CareCommand::Silence, at(9, 23)), StateId::Safe);
    assert_eq!(rig.svc.commands().buzzer, Buzzer::Off);
    assert_eq!(rig.hw.buzzer(), Buzzer::Off);
}

// ── Actuator failures ─────────────────────────────────────────

#[test]
fn unreachable_device_does_not_change_engine_state() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.hw.unreachable = true;
    rig.hw.fall = true;
    assert_eq!(rig.tick(at(9, 1)), StateId::AlertFall);
    assert_eq!(rig.svc.commands().buzzer, Buzzer::On);
    assert!(rig.hw.calls.is_empty());

    rig.hw.unreachable = false;
    rig.tick(at(9, 2));
    assert_eq!(rig.hw.buzzer(), Buzzer::On);
}

#[test]
fn open_unknown_drug_logs_failure() {
    let mut rig = Rig::new(CareConfig::default(), at(9, 0));
    rig.command(
        CareCommand::OpenCompartment {
            drug: "Aspirin".into(),
        },
        at(9, 0),
    );
    assert!(rig.hw.servo_calls().is_empty());
    assert_eq!(rig.log.count_kind("open_compartment_failed"), 1);

    rig.command(
        CareCommand::OpenCompartment {
            drug: "Metformin".into(),
        },
        at(9, 0),
    );
    assert_eq!(rig.hw.servo_calls(), vec![(2, 90)]);
}
