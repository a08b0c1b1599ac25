//! # Settings Storage
//!
//! Tuner preferences that survive between sessions: the reference pitch,
//! the last instrument and mode, and how targets follow the reference.
//! Stored as pretty-printed JSON.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};
use serde::{Deserialize, Serialize};

use crate::error::{SettingsError, TunerError};
use crate::instrument::{DEFAULT_INSTRUMENT, TargetScaling};
use crate::session::{SessionConfig, TuningMode};
use crate::tuning::ReferencePitch;

/// Environment variable that overrides the settings file location.
pub const SETTINGS_PATH_ENV: &str = "SOUNDWISE_SETTINGS";

/// Settings file used when the environment does not name one.
pub const DEFAULT_SETTINGS_FILE: &str = "soundwise_settings.json";

/// Accepted range for a user-entered A4.
pub const MIN_REFERENCE_HZ: f64 = 400.0;
pub const MAX_REFERENCE_HZ: f64 = 500.0;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TunerSettings {
    pub reference_pitch: ReferencePitch,
    pub instrument: String,
    pub target_scaling: TargetScaling,
    pub auto_mode: bool,
}

impl Default for TunerSettings {
    fn default() -> Self {
        Self {
            reference_pitch: ReferencePitch::default(),
            instrument: DEFAULT_INSTRUMENT.to_string(),
            target_scaling: TargetScaling::Fixed,
            auto_mode: true,
        }
    }
}

impl From<&TunerSettings> for SessionConfig {
    fn from(settings: &TunerSettings) -> Self {
        SessionConfig {
            instrument: settings.instrument.clone(),
            mode: if settings.auto_mode {
                TuningMode::Auto
            } else {
                TuningMode::Manual
            },
            reference_pitch: settings.reference_pitch,
            target_scaling: settings.target_scaling,
            ..SessionConfig::default()
        }
    }
}

/// Where settings live between sessions.
pub trait SettingsStore {
    fn load(&self) -> Result<TunerSettings, SettingsError>;

    fn save(&mut self, settings: &TunerSettings) -> Result<(), SettingsError>;

    /// The stored reference pitch, or 440 Hz if nothing usable is stored.
    fn reference_pitch(&self) -> ReferencePitch {
        self.load()
            .map(|settings| settings.reference_pitch)
            .unwrap_or_default()
    }

    /// Updates only the reference pitch, keeping every other setting.
    fn set_reference_pitch(&mut self, reference_pitch: ReferencePitch) -> Result<(), SettingsError> {
        let mut settings = self.load().unwrap_or_default();
        settings.reference_pitch = reference_pitch;
        self.save(&settings)
    }
}

/// Settings persisted to a JSON file.
#[derive(Debug, Clone)]
pub struct JsonSettingsStore {
    path: PathBuf,
}

impl JsonSettingsStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Store at `$SOUNDWISE_SETTINGS`, or `soundwise_settings.json` in the
    /// working directory.
    pub fn from_env() -> Self {
        let path = std::env::var_os(SETTINGS_PATH_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE));
        Self::new(path)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SettingsStore for JsonSettingsStore {
    /// A missing file yields defaults; an unreadable or malformed one is an error.
    fn load(&self) -> Result<TunerSettings, SettingsError> {
        if !self.path.exists() {
            debug!("[SETTINGS] {} not found, using defaults", self.path.display());
            return Ok(TunerSettings::default());
        }
        let data = fs::read_to_string(&self.path)?;
        let settings = serde_json::from_str(&data)?;
        Ok(settings)
    }

    fn save(&mut self, settings: &TunerSettings) -> Result<(), SettingsError> {
        let json_string = serde_json::to_string_pretty(settings)?;
        fs::write(&self.path, json_string)?;
        info!("[SETTINGS] Saved to {}", self.path.display());
        Ok(())
    }
}

/// Settings held in memory only.
#[derive(Debug, Clone, Default)]
pub struct MemorySettingsStore {
    settings: TunerSettings,
}

impl SettingsStore for MemorySettingsStore {
    fn load(&self) -> Result<TunerSettings, SettingsError> {
        Ok(self.settings.clone())
    }

    fn save(&mut self, settings: &TunerSettings) -> Result<(), SettingsError> {
        self.settings = settings.clone();
        Ok(())
    }
}

/// Parses a user-entered A4 such as `"442"` or `" 441.5 "`.
///
/// Values are rounded to one decimal place and must lie within
/// [`MIN_REFERENCE_HZ`, `MAX_REFERENCE_HZ`].
pub fn parse_reference_input(text: &str) -> Result<ReferencePitch, TunerError> {
    let hz: f64 = text
        .trim()
        .parse()
        .map_err(|_| TunerError::InvalidReferencePitch(f64::NAN))?;
    let hz = (hz * 10.0).round() / 10.0;
    if !(MIN_REFERENCE_HZ..=MAX_REFERENCE_HZ).contains(&hz) {
        return Err(TunerError::InvalidReferencePitch(hz));
    }
    ReferencePitch::new(hz)
}
