//! Default values for worksync configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::env;

/// File name of the base configuration document.
///
/// Overridden by the `--config` CLI flag or the `WORKSYNC_CONFIG`
/// environment variable.
pub const DEFAULT_CONFIG_FILE: &str = ".worksync.yaml";

/// Environment variable that switches on CI mode.
pub const CI_ENV_VAR: &str = "CI";

/// Whether the environment asks for CI mode.
///
/// Most CI services export `CI=true`; an empty value, `0` or `false` keeps
/// CI mode off.
pub fn ci_mode_from_env() -> bool {
    match env::var(CI_ENV_VAR) {
        Ok(value) => {
            let value = value.trim().to_ascii_lowercase();
            !(value.is_empty() || value == "0" || value == "false")
        }
        Err(_) => false,
    }
}
