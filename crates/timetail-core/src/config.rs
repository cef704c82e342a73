//! Layered configuration.
//!
//! Settings come from four layers; the first one that sets a value wins:
//!
//! 1. command-line flags,
//! 2. the `TIMETAIL_SINCE` environment variable (`--since` only),
//! 3. the user config file at `<config_dir>/timetail/config.toml`,
//! 4. built-in defaults (`since = "2h"`, 256-byte scan window).
//!
//! ```toml
//! since = "30m"
//! window_size = 4096
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::ErrorCode;
use crate::locate::DEFAULT_WINDOW_SIZE;
use crate::threshold::DEFAULT_SINCE;

/// Environment variable holding a default `--since` window.
pub const SINCE_ENV: &str = "TIMETAIL_SINCE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {path}: {source}")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },
}

impl ConfigError {
    #[must_use]
    pub const fn code(&self) -> ErrorCode {
        ErrorCode::ConfigParseError
    }
}

/// Optional per-user defaults from `<config_dir>/timetail/config.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct UserConfig {
    #[serde(default)]
    pub since: Option<String>,
    #[serde(default)]
    pub window_size: Option<usize>,
}

/// Where an effective setting came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ConfigSource {
    Flag,
    Env,
    File,
    Default,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EffectiveConfig {
    pub since: String,
    pub since_source: ConfigSource,
    pub window_size: usize,
}

#[must_use]
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join("timetail/config.toml"))
}

/// Load a config file. A missing file yields the defaults.
///
/// # Errors
///
/// [`ConfigError::Read`] if the file exists but cannot be read, and
/// [`ConfigError::Parse`] if it is not valid TOML for [`UserConfig`].
pub fn load_config_file(path: &Path) -> Result<UserConfig, ConfigError> {
    if !path.exists() {
        return Ok(UserConfig::default());
    }

    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    toml::from_str::<UserConfig>(&content).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })
}

/// Load the user config from the platform config directory, if any.
///
/// # Errors
///
/// See [`load_config_file`].
pub fn load_user_config() -> Result<UserConfig, ConfigError> {
    let Some(path) = user_config_path() else {
        return Ok(UserConfig::default());
    };
    load_config_file(&path)
}

/// Merge the layers. Precedence (highest wins): flag, env var, config file,
/// built-in default. Blank values are treated as unset.
#[must_use]
pub fn resolve_config(
    cli_since: Option<&str>,
    cli_window_size: Option<usize>,
    env_since: Option<String>,
    user: &UserConfig,
) -> EffectiveConfig {
    fn present(raw: Option<&str>) -> Option<&str> {
        raw.map(str::trim).filter(|value| !value.is_empty())
    }

    let (since, since_source) = if let Some(value) = present(cli_since) {
        (value.to_string(), ConfigSource::Flag)
    } else if let Some(value) = present(env_since.as_deref()) {
        (value.to_string(), ConfigSource::Env)
    } else if let Some(value) = present(user.since.as_deref()) {
        (value.to_string(), ConfigSource::File)
    } else {
        (DEFAULT_SINCE.to_string(), ConfigSource::Default)
    };

    let window_size = cli_window_size
        .or(user.window_size)
        .unwrap_or(DEFAULT_WINDOW_SIZE);

    EffectiveConfig {
        since,
        since_source,
        window_size,
    }
}
