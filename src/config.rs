//! Configuration loading for Overload.
//!
//! Configuration follows a precedence chain:
//! 1. Environment variables (highest priority)
//! 2. Project config (`.overload/config.toml`)
//! 3. User config (`~/.overload/config.toml`)
//! 4. Defaults (lowest priority)
//!
//! All configuration is optional. The engine runs with the built-in policy
//! defaults when no config exists.

use serde::{Deserialize, Serialize};
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

use crate::core::{
    clamp_unit, EngineSettings, PrescriberSettings, ProgressionPolicy, StoredTag,
    DEFAULT_HISTORY_CAP,
};
use crate::error::{FailOpen, OverloadError, Result};

/// Name of the per-project and per-user config directory.
pub const CONFIG_DIR_NAME: &str = ".overload";

/// Main configuration struct for Overload.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct Config {
    /// Progression engine tunables.
    pub progression: ProgressionConfig,
    /// Progression history log.
    pub history: HistoryConfig,
}

/// Progression engine tunables.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct ProgressionConfig {
    /// Maximum number of outcomes kept per exercise.
    pub history_cap: usize,
    /// Confidence given to a newly tracked exercise.
    pub initial_confidence: f64,
    /// Minimum confidence before an increase is issued.
    pub confidence_floor: f64,
    /// Plate increment loads are rounded to (0 disables rounding).
    pub weight_rounding: f64,
    /// Policy given to newly created programs.
    pub default_policy: ProgressionPolicy,
}

impl ProgressionConfig {
    /// Check if a history cap is valid.
    pub fn is_valid_history_cap(value: usize) -> bool {
        value >= 1
    }

    /// Check if a confidence value is valid (must be in [0.0, 1.0]).
    pub fn is_valid_confidence(value: f64) -> bool {
        (0.0..=1.0).contains(&value)
    }

    /// Check if a rounding increment is valid.
    pub fn is_valid_weight_rounding(value: f64) -> bool {
        value.is_finite() && value >= 0.0
    }
}

impl Default for ProgressionConfig {
    fn default() -> Self {
        Self {
            history_cap: DEFAULT_HISTORY_CAP,
            initial_confidence: 0.0,
            confidence_floor: 0.5,
            weight_rounding: 2.5,
            default_policy: ProgressionPolicy::Moderate,
        }
    }
}

/// Progression history log configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct HistoryConfig {
    /// Whether CLI commands append events to the history log.
    pub enabled: bool,
}

impl Default for HistoryConfig {
    fn default() -> Self {
        Self { enabled: true }
    }
}

impl Config {
    /// Load configuration with full precedence chain.
    ///
    /// Precedence (highest to lowest):
    /// 1. Environment variables
    /// 2. Project config (`.overload/config.toml` in cwd)
    /// 3. User config (`~/.overload/config.toml`)
    /// 4. Defaults
    pub fn load() -> Self {
        match env::current_dir() {
            Ok(cwd) => Self::load_from_cwd(&cwd),
            Err(_) => {
                let mut config = Config::default();
                if let Some(user_config) = Self::load_user_config() {
                    config = config.merge(user_config);
                }
                config.apply_env_overrides();
                config
            }
        }
    }

    /// Load configuration with a specific working directory.
    pub fn load_from_cwd(cwd: &Path) -> Self {
        let mut config = Config::default();

        if let Some(user_config) = Self::load_user_config() {
            config = config.merge(user_config);
        }

        if let Some(project_config) = Self::load_project_config(cwd) {
            config = config.merge(project_config);
        }

        config.apply_env_overrides();

        config
    }

    /// Load user config from `~/.overload/config.toml`.
    fn load_user_config() -> Option<Config> {
        let home = overload_home()?;
        Self::load_layer(&home.join("config.toml"))
    }

    /// Load project config from `.overload/config.toml` in the given directory.
    fn load_project_config(cwd: &Path) -> Option<Config> {
        Self::load_layer(&project_config_path(cwd))
    }

    /// A missing file is silent; an unreadable or invalid one is reported.
    fn load_layer(path: &Path) -> Option<Config> {
        if !path.exists() {
            return None;
        }
        Self::load_from_file(path)
            .map(Some)
            .fail_open_default(&format!("ignoring config file {}", path.display()))
    }

    /// Load config from a specific file path.
    fn load_from_file(path: &Path) -> Result<Config> {
        let content = fs::read_to_string(path).map_err(|e| OverloadError::storage(path, e))?;
        toml::from_str(&content).map_err(|e| OverloadError::config(e.to_string()))
    }

    /// Apply environment variable overrides.
    fn apply_env_overrides(&mut self) {
        // OVERLOAD_HISTORY_CAP
        if let Ok(val) = env::var("OVERLOAD_HISTORY_CAP") {
            match val.parse::<usize>() {
                Ok(n) if ProgressionConfig::is_valid_history_cap(n) => {
                    self.progression.history_cap = n;
                }
                Ok(n) => eprintln!(
                    "Warning: Invalid OVERLOAD_HISTORY_CAP value '{}'. \
                    Must be >= 1. Using '{}'.",
                    n, self.progression.history_cap
                ),
                Err(_) => eprintln!(
                    "Warning: Invalid OVERLOAD_HISTORY_CAP value '{}'. \
                    Expected a positive integer. Using '{}'.",
                    val, self.progression.history_cap
                ),
            }
        }

        // OVERLOAD_INITIAL_CONFIDENCE
        if let Some(n) = env_unit("OVERLOAD_INITIAL_CONFIDENCE", self.progression.initial_confidence)
        {
            self.progression.initial_confidence = n;
        }

        // OVERLOAD_CONFIDENCE_FLOOR
        if let Some(n) = env_unit("OVERLOAD_CONFIDENCE_FLOOR", self.progression.confidence_floor) {
            self.progression.confidence_floor = n;
        }

        // OVERLOAD_WEIGHT_ROUNDING
        if let Ok(val) = env::var("OVERLOAD_WEIGHT_ROUNDING") {
            match val.parse::<f64>() {
                Ok(n) if ProgressionConfig::is_valid_weight_rounding(n) => {
                    self.progression.weight_rounding = n;
                }
                Ok(n) => eprintln!(
                    "Warning: Invalid OVERLOAD_WEIGHT_ROUNDING value '{}'. \
                    Must be >= 0. Using '{}'.",
                    n, self.progression.weight_rounding
                ),
                Err(_) => eprintln!(
                    "Warning: Invalid OVERLOAD_WEIGHT_ROUNDING value '{}'. \
                    Expected a decimal number. Using '{}'.",
                    val, self.progression.weight_rounding
                ),
            }
        }

        // OVERLOAD_DEFAULT_POLICY
        if let Ok(val) = env::var("OVERLOAD_DEFAULT_POLICY") {
            match ProgressionPolicy::from_tag(&val) {
                Some(policy) => self.progression.default_policy = policy,
                None => eprintln!(
                    "Warning: Invalid OVERLOAD_DEFAULT_POLICY value '{}'. \
                    Valid values: conservative, moderate, adaptive. Using '{}'.",
                    val, self.progression.default_policy
                ),
            }
        }

        // OVERLOAD_HISTORY_ENABLED
        if let Ok(val) = env::var("OVERLOAD_HISTORY_ENABLED") {
            self.history.enabled = val == "true" || val == "1";
        }
    }

    /// Merge another config into this one.
    ///
    /// Takes each value from `other` that differs from the default, so a
    /// layer that explicitly restates a default cannot undo a customization
    /// made by a lower-precedence layer.
    fn merge(mut self, other: Config) -> Self {
        let defaults = ProgressionConfig::default();
        if other.progression.history_cap != defaults.history_cap {
            self.progression.history_cap = other.progression.history_cap;
        }
        if other.progression.initial_confidence != defaults.initial_confidence {
            self.progression.initial_confidence = other.progression.initial_confidence;
        }
        if other.progression.confidence_floor != defaults.confidence_floor {
            self.progression.confidence_floor = other.progression.confidence_floor;
        }
        if other.progression.weight_rounding != defaults.weight_rounding {
            self.progression.weight_rounding = other.progression.weight_rounding;
        }
        if other.progression.default_policy != defaults.default_policy {
            self.progression.default_policy = other.progression.default_policy;
        }

        if other.history.enabled != HistoryConfig::default().enabled {
            self.history.enabled = other.history.enabled;
        }

        self
    }

    /// Build the settings the engine consumes.
    ///
    /// Out-of-range values that came from config files are pulled back into
    /// range here.
    pub fn engine_settings(&self) -> EngineSettings {
        let p = &self.progression;
        let weight_rounding = if ProgressionConfig::is_valid_weight_rounding(p.weight_rounding) {
            p.weight_rounding
        } else {
            tracing::warn!(
                weight_rounding = p.weight_rounding,
                "invalid weight_rounding, disabling rounding"
            );
            0.0
        };

        EngineSettings {
            history_cap: p.history_cap.max(1),
            initial_confidence: clamp_unit(p.initial_confidence),
            prescriber: PrescriberSettings {
                confidence_floor: clamp_unit(p.confidence_floor),
                weight_rounding,
            },
        }
    }
}

/// Parse a [0, 1] value from an env var, reporting invalid values.
fn env_unit(name: &str, current: f64) -> Option<f64> {
    let val = env::var(name).ok()?;
    match val.parse::<f64>() {
        Ok(n) if ProgressionConfig::is_valid_confidence(n) => Some(n),
        Ok(n) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. \
                Must be in range [0.0, 1.0]. Using '{}'.",
                name, n, current
            );
            None
        }
        Err(_) => {
            eprintln!(
                "Warning: Invalid {} value '{}'. \
                Expected a decimal number. Using '{}'.",
                name, val, current
            );
            None
        }
    }
}

/// Get the Overload home directory.
///
/// Checks `OVERLOAD_HOME` environment variable first, then falls back to
/// `~/.overload`. An empty `OVERLOAD_HOME` is ignored.
pub fn overload_home() -> Option<PathBuf> {
    if let Ok(home) = env::var("OVERLOAD_HOME") {
        if home.is_empty() {
            tracing::warn!("OVERLOAD_HOME is empty, using default");
        } else {
            let path = PathBuf::from(&home);
            if path.is_absolute() {
                return Some(path);
            }
            if let Ok(canonical) = path.canonicalize() {
                return Some(canonical);
            }
            tracing::warn!("OVERLOAD_HOME is relative and doesn't exist, using as-is");
            return Some(path);
        }
    }

    if let Some(home) = dirs::home_dir() {
        return Some(home.join(CONFIG_DIR_NAME));
    }

    let fallback_path = fallback_overload_home();
    tracing::warn!(
        "HOME not set, using fallback location: {}",
        fallback_path.display()
    );
    Some(fallback_path)
}

/// Get fallback home path when HOME is unavailable.
#[cfg(unix)]
fn fallback_overload_home() -> PathBuf {
    use std::os::unix::fs::MetadataExt;
    let uid = std::fs::metadata("/").map(|m| m.uid()).unwrap_or(0);
    PathBuf::from(format!("/tmp/overload-{}", uid))
}

/// Get fallback home path when HOME is unavailable.
#[cfg(not(unix))]
fn fallback_overload_home() -> PathBuf {
    std::env::temp_dir().join("overload")
}

/// Get the programs directory.
///
/// Returns `<overload_home>/programs/`.
pub fn programs_dir() -> Option<PathBuf> {
    overload_home().map(|h| h.join("programs"))
}

/// Get the progression history log path.
///
/// Returns `<overload_home>/history.log`.
pub fn history_log_path() -> Option<PathBuf> {
    overload_home().map(|h| h.join("history.log"))
}

/// Get the crash log path.
///
/// Returns `<overload_home>/crash.log`.
pub fn crash_log_path() -> Option<PathBuf> {
    overload_home().map(|h| h.join("crash.log"))
}

/// Get the project config path for a given working directory.
///
/// Returns `<cwd>/.overload/config.toml`.
pub fn project_config_path(cwd: &Path) -> PathBuf {
    cwd.join(CONFIG_DIR_NAME).join("config.toml")
}
