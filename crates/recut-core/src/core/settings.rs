//! Settings Persistence
//!
//! Engine settings with tolerant loading (missing or corrupt files fall back
//! to defaults) and atomic saves (temp file + rename).
//!
//! Default location: {config_dir}/recut/settings.json

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::{CoreError, CoreResult, TimeSec, DURATION_TOLERANCE_SEC};

/// Settings schema version
pub const SETTINGS_VERSION: u32 = 1;

/// Settings file name
pub const SETTINGS_FILE: &str = "settings.json";

/// Engine settings
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecutSettings {
    #[serde(default = "default_version")]
    pub version: u32,

    /// Rendering backend connection
    #[serde(default)]
    pub backend: BackendSettings,

    /// Tracking url templates
    #[serde(default)]
    pub tracking: TrackingSettings,

    #[serde(default)]
    pub validation: ValidationSettings,

    /// Recomposition record store
    #[serde(default)]
    pub store: StoreSettings,

    #[serde(default)]
    pub logging: LoggingSettings,
}

fn default_version() -> u32 {
    SETTINGS_VERSION
}

impl Default for RecutSettings {
    fn default() -> Self {
        Self {
            version: SETTINGS_VERSION,
            backend: BackendSettings::default(),
            tracking: TrackingSettings::default(),
            validation: ValidationSettings::default(),
            store: StoreSettings::default(),
            logging: LoggingSettings::default(),
        }
    }
}

impl RecutSettings {
    /// Clamps out-of-range values instead of failing, so a bad file never
    /// stops the engine from starting.
    pub fn normalize(&mut self) {
        self.version = SETTINGS_VERSION;

        self.backend.timeout_sec = self.backend.timeout_sec.clamp(1, 300);
        if self.backend.composition_path.trim().is_empty() {
            self.backend.composition_path = default_composition_path();
        }

        let base = self.tracking.base_path.trim().trim_end_matches('/');
        self.tracking.base_path = if base.is_empty() {
            default_tracking_base()
        } else {
            base.to_string()
        };

        self.validation.duration_tolerance_sec =
            clamp_f64(self.validation.duration_tolerance_sec, 0.0001, 1.0);
        self.validation.min_confidence = clamp_f64(self.validation.min_confidence, 0.0, 1.0);

        self.store.max_records = self.store.max_records.max(1);

        let level = self.logging.level.trim().to_ascii_lowercase();
        self.logging.level = if ["trace", "debug", "info", "warn", "error"].contains(&level.as_str()) {
            level
        } else {
            default_log_level()
        };
    }
}

fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if !value.is_finite() {
        return min;
    }
    value.clamp(min, max)
}

// =============================================================================
// Sections
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BackendSettings {
    #[serde(default)]
    pub base_url: String,

    /// Path of the composition submission endpoint
    #[serde(default = "default_composition_path")]
    pub composition_path: String,

    #[serde(default)]
    pub api_key: Option<String>,

    /// Submission timeout in seconds
    #[serde(default = "default_timeout_sec")]
    pub timeout_sec: u64,
}

fn default_composition_path() -> String {
    "/compositions".to_string()
}

fn default_timeout_sec() -> u64 {
    30
}

impl Default for BackendSettings {
    fn default() -> Self {
        Self {
            base_url: String::new(),
            composition_path: default_composition_path(),
            api_key: None,
            timeout_sec: default_timeout_sec(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TrackingSettings {
    /// Prefix of the status/result urls handed back to callers
    #[serde(default = "default_tracking_base")]
    pub base_path: String,
}

fn default_tracking_base() -> String {
    "/recompositions".to_string()
}

impl Default for TrackingSettings {
    fn default() -> Self {
        Self {
            base_path: default_tracking_base(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ValidationSettings {
    #[serde(default = "default_tolerance")]
    pub duration_tolerance_sec: TimeSec,

    /// Plans below this classifier confidence get a warning
    #[serde(default = "default_min_confidence")]
    pub min_confidence: f64,
}

fn default_tolerance() -> TimeSec {
    DURATION_TOLERANCE_SEC
}

fn default_min_confidence() -> f64 {
    0.5
}

impl Default for ValidationSettings {
    fn default() -> Self {
        Self {
            duration_tolerance_sec: default_tolerance(),
            min_confidence: default_min_confidence(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSettings {
    #[serde(default = "default_max_records")]
    pub max_records: usize,

    /// How long finished records are kept, in seconds
    #[serde(default = "default_terminal_expiry")]
    pub terminal_expiry_sec: u64,
}

fn default_max_records() -> usize {
    1000
}

fn default_terminal_expiry() -> u64 {
    86_400
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            max_records: default_max_records(),
            terminal_expiry_sec: default_terminal_expiry(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LoggingSettings {
    /// Default filter level; RUST_LOG takes precedence
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Directory for daily-rolling log files (stdout only when unset)
    #[serde(default)]
    pub file_dir: Option<PathBuf>,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file_dir: None,
        }
    }
}

// =============================================================================
// Settings Manager
// =============================================================================

/// Loads and saves settings at a fixed path
pub struct SettingsManager {
    settings_path: PathBuf,
}

impl SettingsManager {
    pub fn new(settings_path: impl Into<PathBuf>) -> Self {
        Self {
            settings_path: settings_path.into(),
        }
    }

    /// Manager for the per-user default location
    pub fn at_default_location() -> CoreResult<Self> {
        let dir = dirs::config_dir()
            .ok_or_else(|| CoreError::Internal("No user config directory".to_string()))?;
        Ok(Self::new(dir.join("recut").join(SETTINGS_FILE)))
    }

    pub fn settings_path(&self) -> &Path {
        &self.settings_path
    }

    /// Loads settings, returning defaults if the file is missing or unreadable
    pub fn load(&self) -> RecutSettings {
        if !self.settings_path.exists() {
            info!("Settings file not found, using defaults");
            return RecutSettings::default();
        }

        let parsed = fs::read_to_string(&self.settings_path)
            .map_err(CoreError::from)
            .and_then(|content| serde_json::from_str::<RecutSettings>(&content).map_err(CoreError::from));

        match parsed {
            Ok(mut settings) => {
                settings.normalize();
                settings
            }
            Err(e) => {
                warn!(
                    "Failed to load settings from {}, using defaults: {}",
                    self.settings_path.display(),
                    e
                );
                RecutSettings::default()
            }
        }
    }

    /// Normalizes and writes settings atomically; returns what was written
    pub fn save(&self, settings: &RecutSettings) -> CoreResult<RecutSettings> {
        let mut normalized = settings.clone();
        normalized.normalize();

        if let Some(parent) = self.settings_path.parent() {
            fs::create_dir_all(parent)?;
        }

        let content = serde_json::to_string_pretty(&normalized)?;

        let temp_path = self.settings_path.with_extension("json.tmp");
        {
            let mut file = fs::File::create(&temp_path)?;
            file.write_all(content.as_bytes())?;
            file.sync_all()?;
        }

        if let Err(e) = fs::rename(&temp_path, &self.settings_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(e.into());
        }

        info!("Settings saved to {}", self.settings_path.display());
        Ok(normalized)
    }
}
