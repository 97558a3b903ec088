//! Configuration Management
//!
//! Two files, both JSON:
//!
//! - **Gateway config**: behavior knobs (`profilePath`, `largeIntegersAsStrings`,
//!   `logFilter`).
//! - **Profile store**: the last-used connection profile, `{"lastProfile": {...}}`.
//!
//! # Configuration Locations
//! - Local: `.sqlgate/config.json` (per project)
//! - Global: `<config dir>/sqlgate/config.json` (per user)
//! - Profile store: `profilePath` from the config, else `<config dir>/sqlgate/profile.json`
//!
//! # Resolution Precedence
//! 1. Local config file, when present
//! 2. Global config file, when present
//! 3. Built-in defaults
//!
//! # Passwords
//! A stored profile may reference its password through `passwordEnv` instead of
//! holding it; the variable is read at load time.

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::{Path, PathBuf};

use crate::error::{GatewayError, Result};
use crate::normalize::NormalizeOptions;
use crate::profile::{AuthSpec, ConnectionProfile};

const APP_DIR: &str = "sqlgate";

/// Gateway configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GatewayConfig {
    /// Where the last-used profile is persisted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile_path: Option<PathBuf>,

    /// Render integers beyond ±(2^53 - 1) as strings
    #[serde(default)]
    pub large_integers_as_strings: bool,

    /// Default tracing filter (overridden by `SQLGATE_LOG`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub log_filter: Option<String>,
}

impl GatewayConfig {
    /// Load with precedence: local, then global, then defaults
    pub fn resolve() -> Result<Self> {
        for path in [local_config_path()?, global_config_path()?] {
            if let Some(config) = Self::load(&path)? {
                tracing::debug!(path = %path.display(), "loaded gateway config");
                return Ok(config);
            }
        }
        Ok(Self::default())
    }

    /// Load one config file; `None` when it does not exist
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .map_err(|e| GatewayError::config_error(format!("Could not read config file: {e}")))?;

        serde_json::from_str(&contents)
            .map(Some)
            .map_err(|e| GatewayError::config_error(format!("Invalid config file format: {e}")))
    }

    pub fn normalize_options(&self) -> NormalizeOptions {
        NormalizeOptions { large_integers_as_strings: self.large_integers_as_strings }
    }

    /// The profile store this config points at
    pub fn profile_store(&self) -> Result<ProfileStore> {
        match &self.profile_path {
            Some(path) => Ok(ProfileStore::new(path.clone())),
            None => Ok(ProfileStore::new(default_profile_path()?)),
        }
    }
}

/// Get path to local config file (`.sqlgate/config.json`)
pub fn local_config_path() -> Result<PathBuf> {
    let current_dir = std::env::current_dir().map_err(|e| {
        GatewayError::config_error(format!("Could not determine current directory: {e}"))
    })?;

    Ok(current_dir.join(format!(".{APP_DIR}")).join("config.json"))
}

/// Get path to global config file (`<config dir>/sqlgate/config.json`)
pub fn global_config_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("config.json"))
}

/// Default profile store location (`<config dir>/sqlgate/profile.json`)
pub fn default_profile_path() -> Result<PathBuf> {
    Ok(user_config_dir()?.join("profile.json"))
}

fn user_config_dir() -> Result<PathBuf> {
    let config_dir = dirs::config_dir()
        .ok_or_else(|| GatewayError::config_error("Could not determine user config directory"))?;

    Ok(config_dir.join(APP_DIR))
}

/// Profile as written to disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredProfile {
    #[serde(flatten)]
    pub profile: ConnectionProfile,

    /// Environment variable holding the SQL login password
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub password_env: Option<String>,
}

impl StoredProfile {
    /// Resolve the password reference, if any
    pub fn resolve(&self) -> Result<ConnectionProfile> {
        let mut profile = self.profile.clone();

        if let (Some(env_var), AuthSpec::SqlLogin { password, .. }) =
            (&self.password_env, &mut profile.auth)
        {
            *password = std::env::var(env_var).map_err(|_| {
                GatewayError::config_error(format!(
                    "Environment variable {env_var} not found for password"
                ))
            })?;
        }

        Ok(profile)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ProfileRecord {
    last_profile: StoredProfile,
}

/// Persists the last-used connection profile
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProfileStore {
    path: PathBuf,
}

impl ProfileStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the last profile
    ///
    /// A missing, unreadable or malformed file yields the default profile.
    /// A `passwordEnv` naming an unset variable is an error.
    pub fn load(&self) -> Result<ConnectionProfile> {
        let contents = match fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(e) => {
                if self.path.exists() {
                    tracing::warn!(path = %self.path.display(), error = %e, "profile store unreadable, using default profile");
                }
                return Ok(ConnectionProfile::default());
            }
        };

        match serde_json::from_str::<ProfileRecord>(&contents) {
            Ok(record) => record.last_profile.resolve(),
            Err(e) => {
                tracing::warn!(path = %self.path.display(), error = %e, "profile store malformed, using default profile");
                Ok(ConnectionProfile::default())
            }
        }
    }

    /// Save `profile` as the last profile
    ///
    /// With `password_env`, the password is left out of the file and the
    /// variable name is stored instead.
    pub fn save(&self, profile: &ConnectionProfile, password_env: Option<&str>) -> Result<()> {
        let mut stored = StoredProfile { profile: profile.clone(), password_env: None };
        if let Some(env_var) = password_env {
            if let AuthSpec::SqlLogin { password, .. } = &mut stored.profile.auth {
                password.clear();
                stored.password_env = Some(env_var.to_string());
            }
        }

        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|e| {
                GatewayError::config_error(format!("Could not create config directory: {e}"))
            })?;
        }

        let contents = serde_json::to_string_pretty(&ProfileRecord { last_profile: stored })
            .map_err(|e| GatewayError::config_error(format!("Could not serialize profile: {e}")))?;

        fs::write(&self.path, contents)
            .map_err(|e| GatewayError::config_error(format!("Could not write profile store: {e}")))
    }
}
