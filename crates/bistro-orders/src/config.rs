//! # Station Configuration
//!
//! Configuration for one dashboard station (a kitchen screen, a dispatcher
//! desk, a driver phone).
//!
//! Values are layered, each step overriding the one before:
//!
//! 1. built-in defaults (10 s refresh, 30 s repeat alert, built-in tones)
//! 2. `station.toml` in the platform config directory, e.g.
//!    `~/.config/bistro-ops/station.toml`
//! 3. `BISTRO_RESTAURANT_ID`, `BISTRO_DB_PATH`, `BISTRO_REFRESH_SECS`,
//!    `BISTRO_REPEAT_ALERT_SECS`
//!
//! ## File Format
//! ```toml
//! # station.toml
//! [restaurant]
//! id = "550e8400-e29b-41d4-a716-446655440000"
//! name = "Baan Noodle House"
//!
//! [polling]
//! refresh_interval_secs = 10
//! repeat_alert_secs = 30
//!
//! [alerts.kitchen_tone]
//! frequency_hz = 1200
//! duration_ms = 150
//! repeats = 3
//!
//! [storage]
//! database_path = "/var/lib/bistro/bistro.db"
//! ```

use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;
use tracing::{debug, info, warn};

use bistro_core::validation::validate_uuid;
use bistro_core::{AlertContext, ToneProfile};

use crate::error::{OrdersError, OrdersResult};
use crate::prefs::write_atomic;

const DB_FILE: &str = "bistro.db";
const PREFS_FILE: &str = "preferences.toml";
const SESSION_FILE: &str = "session.toml";

// =============================================================================
// Restaurant
// =============================================================================

/// The restaurant this station serves. An unset id means the session has to
/// pick one (see [`SessionState`](crate::prefs::SessionState)).
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RestaurantSettings {
    #[serde(default)]
    pub id: Option<String>,

    #[serde(default)]
    pub name: String,
}

// =============================================================================
// Polling
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PollingSettings {
    /// Interval between board refreshes (seconds).
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,

    /// Interval of the reminder cue while orders are pending (seconds).
    #[serde(default = "default_repeat_alert")]
    pub repeat_alert_secs: u64,
}

fn default_refresh_interval() -> u64 {
    10
}

fn default_repeat_alert() -> u64 {
    30
}

impl Default for PollingSettings {
    fn default() -> Self {
        PollingSettings {
            refresh_interval_secs: default_refresh_interval(),
            repeat_alert_secs: default_repeat_alert(),
        }
    }
}

impl PollingSettings {
    pub fn refresh_interval(&self) -> Duration {
        Duration::from_secs(self.refresh_interval_secs)
    }

    pub fn repeat_alert(&self) -> Duration {
        Duration::from_secs(self.repeat_alert_secs)
    }
}

// =============================================================================
// Alerts
// =============================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AlertSettings {
    #[serde(default = "default_kitchen_tone")]
    pub kitchen_tone: ToneProfile,

    #[serde(default = "default_delivery_tone")]
    pub delivery_tone: ToneProfile,

    /// Play a cue when the kitchen alert is unmuted.
    #[serde(default = "default_true")]
    pub kitchen_confirm_on_unmute: bool,

    /// Play a cue when the delivery badge is unmuted.
    #[serde(default)]
    pub delivery_confirm_on_unmute: bool,
}

fn default_kitchen_tone() -> ToneProfile {
    AlertContext::Kitchen.default_tone()
}

fn default_delivery_tone() -> ToneProfile {
    AlertContext::Delivery.default_tone()
}

fn default_true() -> bool {
    true
}

impl Default for AlertSettings {
    fn default() -> Self {
        AlertSettings {
            kitchen_tone: default_kitchen_tone(),
            delivery_tone: default_delivery_tone(),
            kitchen_confirm_on_unmute: AlertContext::Kitchen.default_confirm_on_unmute(),
            delivery_confirm_on_unmute: AlertContext::Delivery.default_confirm_on_unmute(),
        }
    }
}

impl AlertSettings {
    pub fn tone(&self, context: AlertContext) -> ToneProfile {
        match context {
            AlertContext::Kitchen => self.kitchen_tone,
            AlertContext::Delivery => self.delivery_tone,
        }
    }

    pub fn confirm_on_unmute(&self, context: AlertContext) -> bool {
        match context {
            AlertContext::Kitchen => self.kitchen_confirm_on_unmute,
            AlertContext::Delivery => self.delivery_confirm_on_unmute,
        }
    }
}

// =============================================================================
// Storage
// =============================================================================

/// File locations. Unset paths resolve under the platform data directory.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StorageSettings {
    #[serde(default)]
    pub database_path: Option<PathBuf>,

    #[serde(default)]
    pub preferences_path: Option<PathBuf>,

    #[serde(default)]
    pub session_path: Option<PathBuf>,
}

impl StorageSettings {
    pub fn database_path(&self) -> PathBuf {
        resolve(&self.database_path, DB_FILE)
    }

    pub fn preferences_path(&self) -> PathBuf {
        resolve(&self.preferences_path, PREFS_FILE)
    }

    pub fn session_path(&self) -> PathBuf {
        resolve(&self.session_path, SESSION_FILE)
    }
}

fn resolve(configured: &Option<PathBuf>, file: &str) -> PathBuf {
    match configured {
        Some(path) => path.clone(),
        None => project_dirs()
            .map(|dirs| dirs.data_dir().join(file))
            .unwrap_or_else(|| PathBuf::from(file)),
    }
}

fn project_dirs() -> Option<directories::ProjectDirs> {
    directories::ProjectDirs::from("com", "bistro", "ops")
}

// =============================================================================
// Station Configuration
// =============================================================================

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct StationConfig {
    #[serde(default)]
    pub restaurant: RestaurantSettings,

    #[serde(default)]
    pub polling: PollingSettings,

    #[serde(default)]
    pub alerts: AlertSettings,

    #[serde(default)]
    pub storage: StorageSettings,
}

impl StationConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// Defaults, then the file (if present), then the environment. The
    /// result is validated before it is returned.
    pub fn load(config_path: Option<PathBuf>) -> OrdersResult<Self> {
        let file = config_path.or_else(Self::default_config_path);
        let mut config = match file {
            Some(ref path) if path.is_file() => {
                let text = std::fs::read_to_string(path)?;
                let parsed: StationConfig = toml::from_str(&text)?;
                info!(path = %path.display(), "Station config loaded");
                parsed
            }
            other => {
                debug!(path = ?other, "No station config file; defaults apply");
                StationConfig::default()
            }
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Like [`load`](Self::load), but a broken file falls back to defaults.
    pub fn load_or_default(config_path: Option<PathBuf>) -> Self {
        match Self::load(config_path) {
            Ok(config) => config,
            Err(err) => {
                warn!(error = %err, "Station config unusable, falling back to defaults");
                StationConfig::default()
            }
        }
    }

    pub fn save(&self, config_path: Option<PathBuf>) -> OrdersResult<()> {
        let Some(path) = config_path.or_else(Self::default_config_path) else {
            return Err(OrdersError::ConfigSaveFailed(
                "no config directory on this platform".into(),
            ));
        };
        write_atomic(&path, &toml::to_string_pretty(self)?)?;
        info!(path = %path.display(), "Station config written");
        Ok(())
    }

    pub fn validate(&self) -> OrdersResult<()> {
        if let Some(ref id) = self.restaurant.id {
            validate_uuid("restaurant.id", id)
                .map_err(|e| OrdersError::InvalidConfig(e.to_string()))?;
        }

        for (name, secs) in [
            ("refresh_interval_secs", self.polling.refresh_interval_secs),
            ("repeat_alert_secs", self.polling.repeat_alert_secs),
        ] {
            if secs == 0 {
                return Err(OrdersError::InvalidConfig(format!("{name} must be at least 1")));
            }
        }

        for (name, tone) in [
            ("kitchen_tone", &self.alerts.kitchen_tone),
            ("delivery_tone", &self.alerts.delivery_tone),
        ] {
            if !(20..=20_000).contains(&tone.frequency_hz) {
                return Err(OrdersError::InvalidConfig(format!(
                    "{name}.frequency_hz must be between 20 and 20000"
                )));
            }
            if tone.duration_ms == 0 || tone.duration_ms > 5_000 {
                return Err(OrdersError::InvalidConfig(format!(
                    "{name}.duration_ms must be between 1 and 5000"
                )));
            }
            if tone.repeats == 0 || tone.repeats > 10 {
                return Err(OrdersError::InvalidConfig(format!(
                    "{name}.repeats must be between 1 and 10"
                )));
            }
        }

        Ok(())
    }

    fn apply_env_overrides(&mut self) {
        if let Some(id) = env_var("BISTRO_RESTAURANT_ID") {
            self.restaurant.id = Some(id);
        }
        if let Some(path) = env_var("BISTRO_DB_PATH") {
            self.storage.database_path = Some(PathBuf::from(path));
        }
        if let Some(secs) = env_secs("BISTRO_REFRESH_SECS") {
            self.polling.refresh_interval_secs = secs;
        }
        if let Some(secs) = env_secs("BISTRO_REPEAT_ALERT_SECS") {
            self.polling.repeat_alert_secs = secs;
        }
    }

    pub fn default_config_path() -> Option<PathBuf> {
        project_dirs().map(|dirs| dirs.config_dir().join("station.toml"))
    }

    pub fn restaurant_id(&self) -> Option<&str> {
        self.restaurant.id.as_deref()
    }

    pub fn refresh_interval(&self) -> Duration {
        self.polling.refresh_interval()
    }

    pub fn repeat_alert(&self) -> Duration {
        self.polling.repeat_alert()
    }
}

fn env_var(var: &str) -> Option<String> {
    let value = std::env::var(var).ok()?;
    debug!(var, value = %value, "Config overridden from environment");
    Some(value)
}

fn env_secs(var: &str) -> Option<u64> {
    let raw = env_var(var)?;
    match raw.parse() {
        Ok(secs) => Some(secs),
        Err(_) => {
            warn!(var, value = %raw, "Ignoring non-numeric interval");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config() {
        let config = StationConfig::default();
        assert_eq!(config.polling.refresh_interval_secs, 10);
        assert_eq!(config.polling.repeat_alert_secs, 30);
        assert_eq!(config.alerts.kitchen_tone, ToneProfile::KITCHEN);
        assert_eq!(config.alerts.delivery_tone, ToneProfile::DELIVERY);
        assert!(config.alerts.confirm_on_unmute(AlertContext::Kitchen));
        assert!(!config.alerts.confirm_on_unmute(AlertContext::Delivery));
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_validation() {
        let mut config = StationConfig::default();

        config.restaurant.id = Some("not-a-uuid".into());
        assert!(matches!(config.validate(), Err(OrdersError::InvalidConfig(_))));

        config.restaurant.id = Some("550e8400-e29b-41d4-a716-446655440000".into());
        assert!(config.validate().is_ok());

        config.polling.refresh_interval_secs = 0;
        assert!(config.validate().is_err());

        config.polling.refresh_interval_secs = 10;
        config.alerts.delivery_tone.repeats = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: StationConfig = toml::from_str(
            r#"
            [restaurant]
            name = "Baan Noodle House"

            [polling]
            refresh_interval_secs = 5
            "#,
        )
        .unwrap();

        assert_eq!(config.restaurant.name, "Baan Noodle House");
        assert_eq!(config.polling.refresh_interval_secs, 5);
        assert_eq!(config.polling.repeat_alert_secs, 30);
        assert_eq!(config.alerts.kitchen_tone, ToneProfile::KITCHEN);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("station.toml");

        let mut config = StationConfig::default();
        config.storage.database_path = Some(dir.path().join("bistro.db"));
        config.polling.repeat_alert_secs = 45;
        config.save(Some(path.clone())).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.contains("[polling]"));

        let loaded: StationConfig = toml::from_str(&contents).unwrap();
        assert_eq!(loaded.polling.repeat_alert_secs, 45);
        assert_eq!(loaded.storage.database_path(), dir.path().join("bistro.db"));
    }
}
