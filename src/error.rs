//! # Error Handling
//!
//! This module defines the centralized error type for `worksync`. It uses the
//! `thiserror` library to build a single `Error` enum that covers every
//! failure mode of a sync run, from loading configuration to executing a
//! corrective action.
//!
//! ## Key Components
//!
//! - **`Error`**: The main enum. The first group of variants mirrors the
//!   orchestration taxonomy (configuration, probing, planning, actions); the
//!   rest wrap collaborator failures and third-party library errors.
//!
//! - **`Result<T>`**: A type alias for `std::result::Result<T, Error>`.
//!
//! Whether an error halts a run is decided by the orchestrator through the
//! error-state latch, not by the error itself. The only variant that carries
//! its own severity is [`Error::ActionFailureFatal`], which a collaborator
//! returns when a failure must stop the run even for a non-blocking action.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for worksync operations
#[derive(Error, Debug)]
pub enum Error {
    /// The base configuration, or a present overlay, could not be loaded.
    ///
    /// Raised when the file is missing (base only), unparsable, or fails
    /// schema validation. Optionally carries a hint about how to fix it.
    #[error("Configuration load error in {}: {message}{}", path.display(), hint.as_ref().map(|h| format!("\n  hint: {}", h)).unwrap_or_default())]
    ConfigLoad {
        path: PathBuf,
        message: String,
        /// Optional hint for how to fix the configuration issue
        hint: Option<String>,
    },

    /// A required configuration key is absent and has no default.
    #[error("Missing configuration key: {key}")]
    MissingKey { key: String },

    /// A configuration value has a different type than the caller asked for.
    #[error("Configuration key {key} has type {found}, expected {expected}")]
    ConfigType {
        key: String,
        expected: String,
        found: String,
    },

    /// A required version probe failed.
    #[error("Probe failure ({probe}): {message}")]
    ProbeFailure { probe: String, message: String },

    /// The planner found an unsafe combination of inputs.
    #[error("Sync plan invalid: {reason}")]
    PlanInvalid { reason: String },

    /// A corrective action failed.
    #[error("Action {action} failed: {message}")]
    ActionFailure { action: String, message: String },

    /// A corrective action failed in a way that must halt the run.
    #[error("Action {action} failed fatally: {message}")]
    ActionFailureFatal { action: String, message: String },

    /// A `git` invocation failed.
    #[error("Git command failed: git {command} - {stderr}")]
    GitCommand { command: String, stderr: String },

    /// An external tool command could not be run or reported an error.
    #[error("Tool command failed: {command} - {message}")]
    ToolCommand { command: String, message: String },

    /// The project descriptor could not be located or read.
    #[error("Project descriptor error for {}: {message}", path.display())]
    ProjectDescriptor { path: PathBuf, message: String },

    /// More than one project descriptor matched and none was selected.
    #[error("Multiple projects found, select one with --project: {}", candidates.iter().map(|c| c.display().to_string()).collect::<Vec<_>>().join(", "))]
    ProjectSelection { candidates: Vec<PathBuf> },

    /// A version string could not be interpreted.
    #[error("Version error: {message}")]
    Version { message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A YAML parsing error, wrapped from `serde_yaml::Error`.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A TOML parsing error, wrapped from `toml::de::Error`.
    #[error("TOML parsing error: {0}")]
    Toml(#[from] toml::de::Error),

    /// An INI error, wrapped from `ini::Error`.
    #[error("INI error: {0}")]
    Ini(#[from] ini::Error),

    /// A semantic versioning parsing error, wrapped from `semver::Error`.
    #[error("Semver parsing error: {0}")]
    Semver(#[from] semver::Error),

    /// A regular expression error, wrapped from `regex::Error`.
    #[error("Regex error: {0}")]
    Regex(#[from] regex::Error),

    /// A glob pattern error, wrapped from `glob::PatternError`.
    #[error("Glob pattern error: {0}")]
    Glob(#[from] glob::PatternError),
}

impl Error {
    /// Returns `true` if this error demands that the run halt regardless of
    /// whether the failing action was marked blocking.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::ActionFailureFatal { .. }
                | Error::PlanInvalid { .. }
                | Error::ConfigLoad { .. }
                | Error::MissingKey { .. }
                | Error::ProbeFailure { .. }
        )
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
