//! Configuration loader
//!
//! Builds a [`RetryClientConfig`] from defaults, an optional config file and
//! environment variables.
//!
//! ## Loading Strategy
//! 1. Start from defaults
//! 2. Overlay the first config file found by [`discover_config_path`]
//! 3. Overlay environment variables
//!
//! Later sources win. The result is validated before it is returned.
//!
//! ## Environment Variables
//! - `EBBFLOW_MAX_ATTEMPTS`: attempt ceiling, a positive integer
//! - `EBBFLOW_RETRY_MODE`: `standard` or `adaptive` (case-insensitive)
//! - `EBBFLOW_RETRY_DEADLINE_MS`: bound on a whole call, in milliseconds
//!
//! ## File Locations
//! The loader searches the following paths (in order):
//! 1. `./ebbflow.toml`, `./ebbflow.json`
//! 2. `./config/ebbflow.toml`, `./config/ebbflow.json`
//! 3. The same names relative to the executable's directory

use std::path::{Path, PathBuf};
use std::time::Duration;

use ebbflow_common::retry::RetryMode;
use tracing::{debug, info};

use super::RetryClientConfig;
use crate::errors::{InfraError, InfraResult};

/// Attempt ceiling override
pub const ENV_MAX_ATTEMPTS: &str = "EBBFLOW_MAX_ATTEMPTS";
/// Retry mode override
pub const ENV_RETRY_MODE: &str = "EBBFLOW_RETRY_MODE";
/// Call deadline override, milliseconds
pub const ENV_RETRY_DEADLINE_MS: &str = "EBBFLOW_RETRY_DEADLINE_MS";

const CONFIG_FILE_NAMES: [&str; 4] =
    ["ebbflow.toml", "ebbflow.json", "config/ebbflow.toml", "config/ebbflow.json"];

/// Load configuration from defaults, the first config file found, and the
/// environment.
///
/// # Errors
/// Returns `InfraError` if:
/// - A config file exists but cannot be read or parsed
/// - An environment variable holds an invalid value
/// - The merged configuration fails validation
pub fn load() -> InfraResult<RetryClientConfig> {
    let config = match discover_config_path() {
        Some(path) => load_from_file(&path)?,
        None => {
            debug!("No config file found, using defaults");
            RetryClientConfig::default()
        }
    };

    let config = apply_env_overrides(config)?;
    config.validate().map_err(InfraError::Config)?;

    info!(
        max_attempts = config.max_attempts,
        retry_mode = %config.retry_mode,
        deadline_ms = config.deadline.map(|d| d.as_millis()),
        "Retry configuration loaded"
    );
    Ok(config)
}

/// Load configuration from a file
///
/// Format is detected by file extension (`.json` or `.toml`). Fields missing
/// from the file keep their defaults.
///
/// # Errors
/// Returns `InfraError` if the file is missing, unreadable, in an unsupported
/// format or malformed.
pub fn load_from_file(path: &Path) -> InfraResult<RetryClientConfig> {
    if !path.exists() {
        return Err(InfraError::config(format!("Config file not found: {}", path.display())));
    }

    info!(path = %path.display(), "Loading configuration from file");
    let contents = std::fs::read_to_string(path)?;
    parse_config(&contents, path)
}

/// Parse configuration from string content
fn parse_config(contents: &str, path: &Path) -> InfraResult<RetryClientConfig> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();

    match extension {
        "toml" => Ok(toml::from_str(contents)?),
        "json" => Ok(serde_json::from_str(contents)?),
        other => Err(InfraError::config(format!("Unsupported config format: '{other}'"))),
    }
}

/// Search the working directory, then the executable's directory, for a
/// config file.
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn discover_config_path() -> Option<PathBuf> {
    let mut bases = Vec::new();
    if let Ok(cwd) = std::env::current_dir() {
        bases.push(cwd);
    }
    if let Some(exe_dir) = std::env::current_exe().ok().and_then(|p| p.parent().map(Path::to_path_buf))
    {
        bases.push(exe_dir);
    }

    bases.iter().find_map(|base| find_config_in(base))
}

/// First config file under `base`, in search order.
pub fn find_config_in(base: &Path) -> Option<PathBuf> {
    CONFIG_FILE_NAMES.iter().map(|name| base.join(name)).find(|path| path.is_file())
}

/// Overlay environment variables onto `config`.
///
/// Unset variables leave the field unchanged.
///
/// # Errors
/// Returns `InfraError::Config` naming the variable when a value cannot be
/// parsed.
pub fn apply_env_overrides(mut config: RetryClientConfig) -> InfraResult<RetryClientConfig> {
    if let Some(raw) = env_var(ENV_MAX_ATTEMPTS) {
        config.max_attempts = parse_max_attempts(&raw)
            .map_err(|e| InfraError::config(format!("Invalid {ENV_MAX_ATTEMPTS}: {e}")))?;
        debug!(max_attempts = config.max_attempts, "Max attempts overridden from environment");
    }

    if let Some(raw) = env_var(ENV_RETRY_MODE) {
        config.retry_mode = raw
            .parse::<RetryMode>()
            .map_err(|e| InfraError::config(format!("Invalid {ENV_RETRY_MODE}: {e}")))?;
        debug!(retry_mode = %config.retry_mode, "Retry mode overridden from environment");
    }

    if let Some(raw) = env_var(ENV_RETRY_DEADLINE_MS) {
        let millis = raw.trim().parse::<u64>().map_err(|e| {
            InfraError::config(format!("Invalid {ENV_RETRY_DEADLINE_MS} '{raw}': {e}"))
        })?;
        config.deadline = Some(Duration::from_millis(millis));
    }

    Ok(config)
}

/// Parse an attempt ceiling, rejecting zero.
pub(crate) fn parse_max_attempts(raw: &str) -> Result<u32, String> {
    match raw.trim().parse::<u32>() {
        Ok(0) => Err("'0' is not a positive integer".to_string()),
        Ok(attempts) => Ok(attempts),
        Err(e) => Err(format!("'{raw}' is not a positive integer: {e}")),
    }
}

/// Environment variable value, treating empty as unset.
fn env_var(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}
