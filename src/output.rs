//! # Output Configuration
//!
//! This module provides utilities for controlling CLI output appearance,
//! including color and emoji support based on terminal capabilities and
//! user preferences, and the text rendering of plans and sync results.
//!
//! ## Respecting User Preferences
//!
//! The module respects the following environment variables and flags:
//! - `--color=never|always|auto` - CLI flag for color control
//! - `NO_COLOR` - Disables colors when set (per https://no-color.org/)
//! - `CLICOLOR=0` - Disables colors
//! - `CLICOLOR_FORCE=1` - Forces colors even in non-TTY
//! - `TERM=dumb` - Disables colors for dumb terminals
//!
//! ## Usage
//!
//! ```rust,ignore
//! use worksync::output::{OutputConfig, emoji};
//!
//! let config = OutputConfig::from_env_and_flag("auto");
//!
//! // Use emoji helper that respects config
//! println!("{} Probing workspace...", emoji(&config, "🔍", "[SCAN]"));
//! ```

use crate::phases::{ActionOutcome, SyncPlan, SyncResult, SyncStatus, VersionSnapshot};
use console::style;
use std::env;
use std::fmt::Write;

/// Output configuration for controlling colors and emojis.
#[derive(Debug, Clone)]
pub struct OutputConfig {
    /// Whether colors and emojis should be used in output.
    pub use_color: bool,
}

impl OutputConfig {
    /// Create an output configuration from environment and CLI flag.
    ///
    /// # Arguments
    /// * `color_flag` - The value of the --color CLI flag: "always", "never", or "auto"
    ///
    /// # Behavior
    /// - `--color=always`: Force colors on (overrides NO_COLOR)
    /// - `--color=never`: Force colors off
    /// - `--color=auto`: Detect based on environment
    ///
    /// In auto mode, colors are disabled if:
    /// - `NO_COLOR` environment variable is set (any value, including empty)
    /// - `CLICOLOR=0` is set
    /// - `TERM=dumb` is set
    /// - stdout is not a TTY (unless `CLICOLOR_FORCE=1`)
    pub fn from_env_and_flag(color_flag: &str) -> Self {
        let use_color = match color_flag.to_lowercase().as_str() {
            "always" => true,
            "never" => false,
            _ => Self::detect_color_support(),
        };

        Self { use_color }
    }

    /// Detect whether color output is supported based on environment.
    fn detect_color_support() -> bool {
        // The presence of the variable (even if empty) disables colors
        if env::var_os("NO_COLOR").is_some() {
            return false;
        }

        if env::var("CLICOLOR").is_ok_and(|v| v == "0") {
            return false;
        }

        if env::var("CLICOLOR_FORCE").is_ok_and(|v| v != "0" && !v.is_empty()) {
            return true;
        }

        if env::var("TERM").is_ok_and(|v| v == "dumb") {
            return false;
        }

        console::Term::stdout().features().colors_supported()
    }

    /// Create a configuration with colors always enabled.
    pub fn with_color() -> Self {
        Self { use_color: true }
    }

    /// Create a configuration with colors always disabled.
    pub fn without_color() -> Self {
        Self { use_color: false }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self::from_env_and_flag("auto")
    }
}

/// Returns the appropriate string based on color configuration.
///
/// When colors are enabled, returns the emoji. When disabled, returns
/// the plain text alternative.
pub fn emoji<'a>(config: &OutputConfig, emoji_str: &'a str, plain: &'a str) -> &'a str {
    if config.use_color {
        emoji_str
    } else {
        plain
    }
}

fn outcome_marker(config: &OutputConfig, outcome: ActionOutcome) -> String {
    let (glyph, plain) = match outcome {
        ActionOutcome::Succeeded => ("✅", "[OK]"),
        ActionOutcome::SkippedDueToPriorFatal => ("⏭️", "[SKIP]"),
        ActionOutcome::FailedNonFatal => ("⚠️", "[WARN]"),
        ActionOutcome::FailedFatal => ("❌", "[ERR]"),
    };
    emoji(config, glyph, plain).to_string()
}

/// Renders the probed snapshot and the plan computed from it.
pub fn render_plan(config: &OutputConfig, snapshot: &VersionSnapshot, plan: &SyncPlan) -> String {
    let mut out = String::new();
    let unknown = "unknown".to_string();

    let _ = writeln!(out, "{} Workspace state:", emoji(config, "🔍", "[SCAN]"));
    let _ = writeln!(
        out,
        "   Branch: {} at {}{}",
        snapshot.local_branch,
        snapshot.local_commit.get(..7).unwrap_or(&snapshot.local_commit),
        if snapshot.is_dirty { " (uncommitted changes)" } else { "" }
    );
    if let Some(history) = snapshot.history {
        let _ = writeln!(out, "   Remote: {:?}", history);
    }
    let _ = writeln!(
        out,
        "   Engine: declared {}, installed {}",
        snapshot.declared_engine_version.as_deref().unwrap_or("none"),
        snapshot.installed_engine_version.as_ref().unwrap_or(&unknown)
    );
    let _ = writeln!(
        out,
        "   Project version: {}",
        snapshot.project_version.as_ref().unwrap_or(&unknown)
    );
    for (tool, version) in &snapshot.tool_versions {
        let _ = writeln!(
            out,
            "   {}: {}",
            tool,
            version.as_deref().unwrap_or("not installed")
        );
    }

    if plan.is_empty() {
        let _ = writeln!(out, "\n{} Workspace is up to date", emoji(config, "✅", "[OK]"));
    } else {
        let _ = writeln!(out, "\n{} Planned actions:", emoji(config, "📋", "[PLAN]"));
        for (index, planned) in plan.actions.iter().enumerate() {
            let _ = writeln!(
                out,
                "   {}. {}{}",
                index + 1,
                planned.action,
                if planned.blocking { "" } else { " (non-blocking)" }
            );
        }
    }

    for note in &plan.notes {
        let _ = writeln!(out, "{} {}", emoji(config, "⚠️", "[WARN]"), note);
    }

    out
}

/// Renders a finished sync run.
pub fn render_result(config: &OutputConfig, result: &SyncResult) -> String {
    let mut out = String::new();

    for report in &result.reports {
        let line = match &report.message {
            Some(message) => format!("{} {}: {}", outcome_marker(config, report.outcome), report.action, message),
            None => format!("{} {}", outcome_marker(config, report.outcome), report.action),
        };
        let _ = writeln!(out, "{}", line);
    }

    for warning in &result.warnings {
        let _ = writeln!(
            out,
            "{} {}",
            emoji(config, "⚠️", "[WARN]"),
            style(warning).yellow().force_styling(config.use_color)
        );
    }

    match result.status() {
        SyncStatus::Succeeded => {
            let _ = writeln!(
                out,
                "{} {}",
                emoji(config, "✅", "[OK]"),
                style("Sync complete").green().force_styling(config.use_color)
            );
        }
        SyncStatus::SucceededWithWarnings => {
            let _ = writeln!(
                out,
                "{} {}",
                emoji(config, "✅", "[OK]"),
                style(format!("Sync complete with {} warning(s)", result.warnings.len()))
                    .yellow()
                    .force_styling(config.use_color)
            );
        }
        SyncStatus::Failed => {
            let _ = writeln!(
                out,
                "{} {}",
                emoji(config, "❌", "[ERR]"),
                style(format!(
                    "Sync failed: {}",
                    result.fatal.as_deref().unwrap_or("unknown error")
                ))
                .red()
                .force_styling(config.use_color)
            );
            if let Some(support) = &result.support {
                let _ = writeln!(out, "   Please request help from {}", support);
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::{ActionReport, History, PlannedAction, RemoteState, SyncAction};
    use std::collections::BTreeMap;

    fn snapshot() -> VersionSnapshot {
        VersionSnapshot {
            local_branch: "main".to_string(),
            local_commit: "3f9a2c1d8e".to_string(),
            remote: RemoteState::Commit("3f9a2c1d8e".to_string()),
            history: Some(History::UpToDate),
            is_dirty: false,
            rebase_in_progress: false,
            declared_engine_version: Some("5.3".to_string()),
            installed_engine_version: Some("5.2".to_string()),
            project_version: None,
            latest_tag: None,
            tool_versions: BTreeMap::new(),
            degraded: Vec::new(),
        }
    }

    #[test]
    fn test_color_always() {
        let config = OutputConfig::from_env_and_flag("always");
        assert!(config.use_color);
    }

    #[test]
    fn test_color_never() {
        let config = OutputConfig::from_env_and_flag("never");
        assert!(!config.use_color);
    }

    #[test]
    fn test_emoji_helper_without_color() {
        let config = OutputConfig::without_color();
        assert_eq!(emoji(&config, "🔍", "[SCAN]"), "[SCAN]");
    }

    #[test]
    fn test_render_plan_lists_actions() {
        let plan = SyncPlan {
            actions: vec![
                PlannedAction::new(SyncAction::EngineSwitch {
                    version: "5.3".to_string(),
                }),
                PlannedAction::new(SyncAction::ProjectFileRegen),
            ],
            notes: vec!["Could not determine fetch: offline".to_string()],
        };
        let text = render_plan(&OutputConfig::without_color(), &snapshot(), &plan);

        assert!(text.contains("Branch: main at 3f9a2c1"));
        assert!(text.contains("1. ENGINE_SWITCH(5.3)"));
        assert!(text.contains("2. PROJECT_FILE_REGEN (non-blocking)"));
        assert!(text.contains("[WARN] Could not determine fetch"));
    }

    #[test]
    fn test_render_plan_up_to_date() {
        let text = render_plan(
            &OutputConfig::without_color(),
            &snapshot(),
            &SyncPlan::default(),
        );
        assert!(text.contains("[OK] Workspace is up to date"));
    }

    #[test]
    fn test_render_failed_result_with_support() {
        let result = SyncResult {
            reports: vec![ActionReport {
                action: SyncAction::ProjectFileRegen,
                outcome: ActionOutcome::SkippedDueToPriorFatal,
                message: None,
            }],
            warnings: Vec::new(),
            fatal: Some("engine switch failed".to_string()),
            support: Some("#build-help".to_string()),
        };
        let text = render_result(&OutputConfig::without_color(), &result);

        assert!(text.contains("[SKIP] PROJECT_FILE_REGEN"));
        assert!(text.contains("Sync failed: engine switch failed"));
        assert!(text.contains("Please request help from #build-help"));
    }

    #[test]
    fn test_render_result_with_warnings() {
        let result = SyncResult {
            reports: Vec::new(),
            warnings: vec!["regen failed".to_string()],
            fatal: None,
            support: None,
        };
        let text = render_result(&OutputConfig::without_color(), &result);
        assert!(text.contains("Sync complete with 1 warning(s)"));
    }
}
