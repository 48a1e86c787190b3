//! User configuration.
//!
//! Read from `~/.modkit/config.toml` when present; every field has a
//! default and can be overridden from the environment.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, warn};

use crate::tree::CaseFix;

/// Repository API used when nothing else is configured.
pub const DEFAULT_API_URL: &str = "https://fsnebula.org/api/1/";

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {}: {source}", .path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid config {}: {source}", .path.display())]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

/// Settings shared by every command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Base URL of the repository API.
    pub api_url: String,
    /// Session token sent with API requests.
    pub token: Option<String>,
    /// Path or name of the 7-Zip compatible extraction tool.
    pub seven_zip: PathBuf,
    /// How case-variant names are reconciled when merging into a destination.
    pub case_fix: CaseFix,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            token: None,
            seven_zip: PathBuf::from("7z"),
            case_fix: CaseFix::Recursive,
        }
    }
}

impl Config {
    /// Load from the default location with process environment overrides.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(&crate::paths::config_path(), |key| std::env::var(key).ok())
    }

    /// Load from `path` (missing file means defaults), then apply overrides
    /// looked up through `env`.
    ///
    /// # Errors
    ///
    /// Fails if the file exists but cannot be read or parsed.
    pub fn load_from(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let mut config = if path.exists() {
            let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                path: path.to_path_buf(),
                source,
            })?;
            toml::from_str(&raw).map_err(|source| ConfigError::Parse {
                path: path.to_path_buf(),
                source,
            })?
        } else {
            debug!("No config at {}, using defaults", path.display());
            Self::default()
        };

        if let Some(url) = env("MODKIT_API_URL") {
            config.api_url = url;
        }
        if let Some(token) = env("MODKIT_TOKEN") {
            config.token = Some(token);
        }
        if let Some(tool) = env("MODKIT_7Z") {
            config.seven_zip = PathBuf::from(tool);
        }
        if let Some(policy) = env("MODKIT_CASE_FIX") {
            match policy.parse() {
                Ok(policy) => config.case_fix = policy,
                Err(e) => warn!("Ignoring MODKIT_CASE_FIX: {e}"),
            }
        }

        Ok(config)
    }

    /// Merge policy for [`crate::tree::movetree`].
    pub fn case_policy(&self) -> CaseFix {
        self.case_fix
    }
}
