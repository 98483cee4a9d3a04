//! # Preferences & Session
//!
//! Small per-station state that outlives a restart: alert mute flags and the
//! selected restaurant/user/language.
//!
//! ```text
//! preferences.toml              session.toml
//! ─────────────────             ─────────────────────────────
//! deliveryAlertMuted = "true"   restaurant_id = "550e8400-..."
//! kitchenAlertMuted = "false"   user_id = "7c9e6679-..."
//!                               language = "th"
//! ```
//!
//! Both files are written atomically (temp file, then rename) so a crash
//! mid-write leaves the previous version in place.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{OrdersError, OrdersResult};

pub(crate) fn write_atomic(path: &Path, contents: &str) -> OrdersResult<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| OrdersError::ConfigSaveFailed(e.to_string()))?;
    }
    let tmp = path.with_extension("toml.tmp");
    std::fs::write(&tmp, contents).map_err(|e| OrdersError::ConfigSaveFailed(e.to_string()))?;
    std::fs::rename(&tmp, path).map_err(|e| OrdersError::ConfigSaveFailed(e.to_string()))?;
    Ok(())
}

// =============================================================================
// Preference Store
// =============================================================================

/// String key-value preferences backed by a TOML file.
///
/// Cloning shares the same values. An in-memory store never touches disk.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    values: Arc<Mutex<BTreeMap<String, String>>>,
}

impl PreferenceStore {
    /// Opens the file at `path`. A missing file is an empty store.
    pub fn load(path: impl Into<PathBuf>) -> OrdersResult<Self> {
        let path = path.into();
        let values = if path.exists() {
            let contents = std::fs::read_to_string(&path)?;
            toml::from_str(&contents)?
        } else {
            debug!(?path, "Preference file not found, starting empty");
            BTreeMap::new()
        };

        Ok(PreferenceStore {
            path: Some(path),
            values: Arc::new(Mutex::new(values)),
        })
    }

    pub fn in_memory() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, BTreeMap<String, String>> {
        self.values.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<String> {
        self.lock().get(key).cloned()
    }

    /// `"true"` is true, anything else (or nothing) is false.
    pub fn get_bool(&self, key: &str) -> bool {
        self.lock().get(key).map(|v| v == "true").unwrap_or(false)
    }

    /// Stores a value and writes the file through.
    pub fn set(&self, key: &str, value: impl Into<String>) -> OrdersResult<()> {
        let contents = {
            let mut values = self.lock();
            values.insert(key.to_string(), value.into());
            toml::to_string(&*values)?
        };

        if let Some(path) = &self.path {
            write_atomic(path, &contents)?;
            debug!(key = %key, ?path, "Preference saved");
        }
        Ok(())
    }

    pub fn set_bool(&self, key: &str, value: bool) -> OrdersResult<()> {
        self.set(key, if value { "true" } else { "false" })
    }
}

// =============================================================================
// Session
// =============================================================================

fn default_language() -> String {
    "en".to_string()
}

/// Persisted session selection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionState {
    #[serde(default)]
    pub restaurant_id: Option<String>,

    #[serde(default)]
    pub user_id: Option<String>,

    #[serde(default = "default_language")]
    pub language: String,
}

impl Default for SessionState {
    fn default() -> Self {
        SessionState {
            restaurant_id: None,
            user_id: None,
            language: default_language(),
        }
    }
}

impl SessionState {
    /// Reads the session file. A missing file is an empty session.
    pub fn load(path: &Path) -> OrdersResult<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }

    pub fn save(&self, path: &Path) -> OrdersResult<()> {
        let contents = toml::to_string_pretty(self)?;
        write_atomic(path, &contents)?;
        info!(?path, "Session saved");
        Ok(())
    }
}

/// The resolved session every workflow and board runs under.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub restaurant_id: String,
    pub user_id: Option<String>,
    pub language: String,
}

impl SessionContext {
    pub fn new(restaurant_id: impl Into<String>) -> Self {
        SessionContext {
            restaurant_id: restaurant_id.into(),
            user_id: None,
            language: default_language(),
        }
    }

    pub fn with_user(mut self, user_id: impl Into<String>) -> Self {
        self.user_id = Some(user_id.into());
        self
    }

    /// Fails with [`OrdersError::NoRestaurant`] when nothing is selected.
    pub fn from_state(state: &SessionState) -> OrdersResult<Self> {
        let restaurant_id = state
            .restaurant_id
            .clone()
            .filter(|id| !id.trim().is_empty())
            .ok_or(OrdersError::NoRestaurant)?;

        Ok(SessionContext {
            restaurant_id,
            user_id: state.user_id.clone(),
            language: state.language.clone(),
        })
    }
}
