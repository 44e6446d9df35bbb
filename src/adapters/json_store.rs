//! JSON file configuration store.
//!
//! Implements [`ConfigPort`] over three documents in one data directory:
//!
//! | File            | Holds                   |
//! |-----------------|-------------------------|
//! | `profile.json`  | [`UserProfile`]         |
//! | `schedule.json` | `[MedicationEntry]`     |
//! | `rules.json`    | [`Rules`]               |
//!
//! Documents are validated on load and on save.  Writes go to a sibling
//! temp file that is then renamed over the target, so a crash mid-write
//! leaves the previous document intact.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use log::info;
use serde::Serialize;
use serde::de::DeserializeOwned;

use crate::app::ports::ConfigPort;
use crate::config::{Rules, UserProfile, validate_schedule};
use crate::error::ConfigError;
use crate::schedule::MedicationEntry;

pub const PROFILE_FILE: &str = "profile.json";
pub const SCHEDULE_FILE: &str = "schedule.json";
pub const RULES_FILE: &str = "rules.json";

pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Store rooted at `dir`.  The directory is created on first save.
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn read<T: DeserializeOwned>(&self, file: &str) -> Result<T, ConfigError> {
        let path = self.dir.join(file);
        let contents = fs::read_to_string(&path).map_err(|e| match e.kind() {
            ErrorKind::NotFound => ConfigError::NotFound,
            _ => ConfigError::Io(format!("{}: {e}", path.display())),
        })?;
        serde_json::from_str(&contents)
            .map_err(|e| ConfigError::Corrupted(format!("{}: {e}", path.display())))
    }

    fn write<T: Serialize + ?Sized>(&self, file: &str, value: &T) -> Result<(), ConfigError> {
        let path = self.dir.join(file);
        let contents = serde_json::to_string_pretty(value)
            .map_err(|e| ConfigError::Corrupted(format!("{}: {e}", path.display())))?;

        let io_err = |e: std::io::Error| ConfigError::Io(format!("{}: {e}", path.display()));
        fs::create_dir_all(&self.dir).map_err(io_err)?;
        let tmp = path.with_extension("json.tmp");
        fs::write(&tmp, contents).map_err(io_err)?;
        fs::rename(&tmp, &path).map_err(io_err)?;

        info!("Config: wrote {}", path.display());
        Ok(())
    }
}

impl ConfigPort for JsonFileStore {
    fn load_profile(&self) -> Result<UserProfile, ConfigError> {
        let profile: UserProfile = self.read(PROFILE_FILE)?;
        profile.validate()?;
        Ok(profile)
    }

    fn load_schedule(&self) -> Result<Vec<MedicationEntry>, ConfigError> {
        let schedule: Vec<MedicationEntry> = self.read(SCHEDULE_FILE)?;
        validate_schedule(&schedule)?;
        Ok(schedule)
    }

    fn load_rules(&self) -> Result<Rules, ConfigError> {
        let rules: Rules = self.read(RULES_FILE)?;
        rules.validate()?;
        Ok(rules)
    }

    fn save_profile(&self, profile: &UserProfile) -> Result<(), ConfigError> {
        profile.validate()?;
        self.write(PROFILE_FILE, profile)
    }

    fn save_schedule(&self, schedule: &[MedicationEntry]) -> Result<(), ConfigError> {
        validate_schedule(schedule)?;
        self.write(SCHEDULE_FILE, schedule)
    }

    fn save_rules(&self, rules: &Rules) -> Result<(), ConfigError> {
        rules.validate()?;
        self.write(RULES_FILE, rules)
    }
}
