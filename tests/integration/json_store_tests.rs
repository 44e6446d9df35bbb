//! Integration tests for the JSON document store.
//!
//! Each test works in its own directory under the system temp dir.

use std::fs;
use std::path::PathBuf;

use careloop::adapters::json_store::{JsonFileStore, PROFILE_FILE, RULES_FILE, SCHEDULE_FILE};
use careloop::app::commands::CareCommand;
use careloop::app::events::EventLog;
use careloop::app::ports::ConfigPort;
use careloop::app::service::CareService;
use careloop::config::{CareConfig, Channel, Contact};
use careloop::error::ConfigError;
use careloop::schedule::TimeOfDay;
use chrono::{NaiveDate, Weekday};

use crate::mock_hw::{MockHardware, MockNotifier};

struct TempDir(PathBuf);

impl TempDir {
    fn new(name: &str) -> Self {
        let dir = std::env::temp_dir().join(format!("careloop-{}-{name}", std::process::id()));
        let _ = fs::remove_dir_all(&dir);
        Self(dir)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.0);
    }
}

#[test]
fn documents_round_trip_field_for_field() {
    let tmp = TempDir::new("round-trip");
    let store = JsonFileStore::new(&tmp.0);

    let mut config = CareConfig::default();
    config.profile.name = "María".into();
    config.profile.contacts.push(Contact {
        name: "Ana".into(),
        channel: Channel::Whatsapp,
        priority: 2,
    });
    config.schedule[0].days = vec![Weekday::Mon, Weekday::Thu];
    config.schedule[0].requires_voice_confirm = true;
    config.rules.reminder_timeout_minutes = 0;
    config.rules.wake_word = "ayuda".into();

    store.save_all(&config).unwrap();

    assert_eq!(store.load_profile().unwrap(), config.profile);
    assert_eq!(store.load_schedule().unwrap(), config.schedule);
    assert_eq!(store.load_rules().unwrap(), config.rules);
    assert_eq!(store.load_or_default(), config);
}

#[test]
fn wire_format_uses_readable_fields() {
    let tmp = TempDir::new("wire");
    let store = JsonFileStore::new(&tmp.0);
    store.save_all(&CareConfig::default()).unwrap();

    let raw = fs::read_to_string(tmp.0.join(SCHEDULE_FILE)).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v[0]["drug"], "Losartan");
    assert_eq!(v[0]["times"][0], "08:00");

    let raw = fs::read_to_string(tmp.0.join(PROFILE_FILE)).unwrap();
    let v: serde_json::Value = serde_json::from_str(&raw).unwrap();
    assert_eq!(v["contacts"][0]["channel"], "sms");
}

#[test]
fn missing_documents_fall_back_to_defaults() {
    let tmp = TempDir::new("missing");
    let store = JsonFileStore::new(&tmp.0);
    assert_eq!(store.load_rules(), Err(ConfigError::NotFound));
    assert_eq!(store.load_or_default(), CareConfig::default());
}

#[test]
fn corrupt_document_falls_back_alone() {
    let tmp = TempDir::new("corrupt");
    let store = JsonFileStore::new(&tmp.0);

    let mut config = CareConfig::default();
    config.profile.name = "Kept".into();
    store.save_all(&config).unwrap();
    fs::write(tmp.0.join(RULES_FILE), "{ not json").unwrap();

    assert!(matches!(store.load_rules(), Err(ConfigError::Corrupted(_))));
    let loaded = store.load_or_default();
    assert_eq!(loaded.profile.name, "Kept");
    assert_eq!(loaded.rules, CareConfig::default().rules);
}

#[test]
fn invalid_values_are_rejected_on_save_and_load() {
    let tmp = TempDir::new("invalid");
    let store = JsonFileStore::new(&tmp.0);

    let mut rules = CareConfig::default().rules;
    rules.checkin_timeout_seconds = 0;
    assert!(matches!(
        store.save_rules(&rules),
        Err(ConfigError::ValidationFailed(_))
    ));
    assert!(!tmp.0.join(RULES_FILE).exists());

    fs::create_dir_all(&tmp.0).unwrap();
    fs::write(
        tmp.0.join(SCHEDULE_FILE),
        r#"[{"drug":"X","dose":"1","times":["08:00"],"days":["Mon"],
            "tolerance_minutes":15,"requires_voice_confirm":false,"compartment":99}]"#,
    )
    .unwrap();
    assert!(matches!(
        store.load_schedule(),
        Err(ConfigError::ValidationFailed(_))
    ));
}

#[test]
fn snoozed_time_is_persisted_on_save() {
    let tmp = TempDir::new("snooze-save");
    let store = JsonFileStore::new(&tmp.0);
    let start = NaiveDate::from_ymd_opt(2024, 6, 3)
        .and_then(|d| d.and_hms_opt(7, 55, 0))
        .unwrap();

    let mut svc = CareService::new(CareConfig::default(), start);
    let (mut hw, mut notifier, mut log) = (MockHardware::present(), MockNotifier::new(), EventLog::new());
    svc.start(&mut log);
    svc.tick(start, &mut hw, &mut notifier, &mut log);
    svc.handle_command(
        CareCommand::MedSnooze { minutes: 15 },
        start,
        &mut hw,
        &mut notifier,
        &mut log,
    );
    assert!(!svc.save_if_requested(&store).unwrap());

    svc.handle_command(CareCommand::SaveConfig, start, &mut hw, &mut notifier, &mut log);
    assert!(svc.save_if_requested(&store).unwrap());
    assert!(!svc.is_config_dirty());

    let schedule = store.load_schedule().unwrap();
    assert!(schedule[0].times.contains(&TimeOfDay::new(8, 10).unwrap()));
}
