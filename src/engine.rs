//! # Engine Project Files
//!
//! Reads the version signals an engine project carries on disk and runs the
//! configured engine commands.
//!
//! - The project descriptor (`*.uproject`, JSON) declares the engine version
//!   in `EngineAssociation`. A descriptor without one uses an unmanaged
//!   engine.
//! - The project version lives in `Config/DefaultGame.ini` next to the
//!   descriptor, under [`PROJECT_SETTINGS_SECTION`], key `ProjectVersion`.
//!
//! Engine installation and project-file generation are external; this module
//! only invokes the commands configured under `engine.*`.

use crate::error::{Error, Result};
use crate::policy::EngineCommands;
use crate::tools::{expand_command, run_command};
use ini::Ini;
use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};

/// INI section holding the project version.
pub const PROJECT_SETTINGS_SECTION: &str = "/Script/EngineSettings.GeneralProjectSettings";

/// INI key holding the project version.
pub const PROJECT_VERSION_KEY: &str = "ProjectVersion";

#[derive(Debug, Deserialize)]
struct ProjectDescriptor {
    #[serde(rename = "EngineAssociation", default)]
    engine_association: Option<String>,
}

/// Reads the engine version declared by the project descriptor.
///
/// Returns `None` when the descriptor declares no engine association.
pub fn declared_version(descriptor: &Path) -> Result<Option<String>> {
    let content = fs::read_to_string(descriptor).map_err(|e| Error::ProjectDescriptor {
        path: descriptor.to_path_buf(),
        message: e.to_string(),
    })?;

    let parsed: ProjectDescriptor =
        serde_json::from_str(&content).map_err(|e| Error::ProjectDescriptor {
            path: descriptor.to_path_buf(),
            message: format!("invalid descriptor: {}", e),
        })?;

    Ok(parsed
        .engine_association
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Location of the project settings file for a descriptor.
pub fn project_settings_path(descriptor: &Path) -> PathBuf {
    let project_dir = match descriptor.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };
    project_dir.join("Config").join("DefaultGame.ini")
}

/// Reads the project version from the settings file.
///
/// A missing file or key is `None`.
pub fn read_project_version(settings: &Path) -> Result<Option<String>> {
    if !settings.exists() {
        return Ok(None);
    }

    let ini = Ini::load_from_file(settings)?;
    Ok(ini
        .section(Some(PROJECT_SETTINGS_SECTION))
        .and_then(|section| section.get(PROJECT_VERSION_KEY))
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty()))
}

/// Writes `version` into the settings file, creating it if necessary.
///
/// Only the `ProjectVersion` line changes; comments, formatting and line
/// endings elsewhere in the file are kept so the stamp shows up as a
/// one-line diff.
pub fn write_project_version(settings: &Path, version: &str) -> Result<()> {
    let content = if settings.exists() {
        fs::read_to_string(settings)?
    } else {
        if let Some(parent) = settings.parent() {
            fs::create_dir_all(parent)?;
        }
        String::new()
    };

    let updated = set_ini_value(&content, PROJECT_SETTINGS_SECTION, PROJECT_VERSION_KEY, version);
    fs::write(settings, updated)?;

    log::info!("Set {} to {} in {}", PROJECT_VERSION_KEY, version, settings.display());
    Ok(())
}

/// Sets `key` in `section`, replacing the first existing entry, adding it at
/// the end of the section, or appending the section.
fn set_ini_value(content: &str, section: &str, key: &str, value: &str) -> String {
    let newline = if content.contains("\r\n") { "\r\n" } else { "\n" };
    let header = format!("[{}]", section);
    let entry = format!("{}={}", key, value);
    let mut lines: Vec<String> = content.lines().map(str::to_string).collect();

    // Only the first occurrence of the section is edited
    let mut in_section = false;
    let mut left_section = false;
    let mut existing = None;
    let mut section_end = None;
    for (i, line) in lines.iter().enumerate() {
        let trimmed = line.trim().trim_start_matches('\u{feff}');
        if trimmed.starts_with('[') {
            left_section |= in_section;
            in_section = !left_section && trimmed == header;
            if in_section {
                section_end = Some(i + 1);
            }
            continue;
        }
        if !in_section {
            continue;
        }
        if matches!(trimmed.split_once('='), Some((k, _)) if k.trim() == key) {
            existing = Some(i);
            break;
        }
        if !trimmed.is_empty() {
            section_end = Some(i + 1);
        }
    }

    match (existing, section_end) {
        (Some(i), _) => lines[i] = entry,
        (None, Some(end)) => lines.insert(end, entry),
        (None, None) => {
            if lines.last().is_some_and(|line| !line.trim().is_empty()) {
                lines.push(String::new());
            }
            lines.push(header);
            lines.push(entry);
        }
    }

    let mut updated = lines.join(newline);
    if content.is_empty() || content.ends_with('\n') {
        updated.push_str(newline);
    }
    updated
}

fn require_command<'a>(argv: &'a [String], key: &str) -> Result<&'a [String]> {
    if argv.is_empty() {
        return Err(Error::ToolCommand {
            command: key.to_string(),
            message: "no command configured".to_string(),
        });
    }
    Ok(argv)
}

/// Asks the configured version command for the installed engine version.
pub fn installed_version(commands: &EngineCommands) -> Result<Option<String>> {
    let argv = require_command(&commands.version, "engine.versioncommand")?;
    let stdout = run_command(argv)?;
    Ok(stdout
        .lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string))
}

/// Runs the configured switch command for `version`.
pub fn switch_to(commands: &EngineCommands, version: &str) -> Result<()> {
    let argv = require_command(&commands.switch, "engine.switchcommand")?;
    run_command(&expand_command(argv, Some(version)))?;
    log::info!("Switched engine to {}", version);
    Ok(())
}

/// Runs the configured project-file generation command.
pub fn regenerate_project_files(commands: &EngineCommands) -> Result<()> {
    let argv = require_command(&commands.regenerate, "engine.regencommand")?;
    run_command(argv)?;
    Ok(())
}
