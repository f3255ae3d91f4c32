//! Healer Configuration Module
//!
//! Typed, validated configuration loaded from a TOML file.
//!
//! ## Loading Order
//!
//! 1. `--config <path>` on the command line
//! 2. `PLC_HEALER_CONFIG` environment variable (path to TOML file)
//! 3. `healer.toml` in the current working directory
//!
//! There are no built-in tag defaults, so finding no file is fatal. The
//! validated [`AppConfig`] is passed explicitly (behind an `Arc`) to the
//! control plane; there is no global config.

mod healer_config;
pub mod defaults;
pub mod validation;

pub use healer_config::*;

use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Resolve the config path using the standard search order and load it.
///
/// An explicit path (CLI or env var) that does not exist is an error rather
/// than a silent fall-through to the next location.
pub fn load(cli_path: Option<&Path>) -> Result<AppConfig, ConfigError> {
    if let Some(path) = cli_path {
        return AppConfig::load_from_file(path);
    }

    if let Ok(path) = std::env::var(defaults::CONFIG_ENV_VAR) {
        let p = PathBuf::from(&path);
        if !p.exists() {
            warn!(path = %path, "{} points to a non-existent file", defaults::CONFIG_ENV_VAR);
            return Err(ConfigError::NotFound(vec![p]));
        }
        info!(path = %p.display(), "Using config from {}", defaults::CONFIG_ENV_VAR);
        return AppConfig::load_from_file(&p);
    }

    let local = PathBuf::from(defaults::CONFIG_FILE_NAME);
    if local.exists() {
        return AppConfig::load_from_file(&local);
    }

    Err(ConfigError::NotFound(vec![local]))
}
