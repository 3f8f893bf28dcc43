//! # Tool Version Detection
//!
//! This module knows about the command-line tools a workspace depends on
//! (git, the large-file extension, and the credential manager), how to ask
//! each of them for its version, and how to decide whether an installed
//! version satisfies a configured requirement.
//!
//! Installation itself is delegated to an installer command configured per
//! tool; this crate never downloads or unpacks tool releases on its own.

use crate::error::{Error, Result};
use regex::Regex;
use semver::Version;
use serde::Serialize;
use std::fmt;
use std::io::ErrorKind;
use std::process::Command;

/// A tool whose version is managed by the sync run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum Tool {
    /// The `git` binary.
    Git,
    /// The `git-lfs` large-file extension.
    GitLfs,
    /// The git credential manager.
    GitCredentialManager,
}

impl Tool {
    /// All managed tools, in the order they are checked and updated.
    pub const ALL: [Tool; 3] = [Tool::Git, Tool::GitLfs, Tool::GitCredentialManager];

    /// The tool name used in configuration keys and reports.
    pub fn name(self) -> &'static str {
        match self {
            Tool::Git => "git",
            Tool::GitLfs => "git-lfs",
            Tool::GitCredentialManager => "git-credential-manager",
        }
    }

    /// Looks a tool up by its configuration name.
    pub fn from_name(name: &str) -> Option<Tool> {
        Tool::ALL.into_iter().find(|tool| tool.name() == name)
    }

    /// Configuration key holding the required version.
    pub fn version_key(self) -> String {
        format!("tools.{}.version", self.name())
    }

    /// Configuration key holding the installer command.
    pub fn installer_key(self) -> String {
        format!("tools.{}.installer", self.name())
    }

    /// The argv used to ask the tool for its version.
    fn version_command(self) -> (&'static str, &'static [&'static str]) {
        match self {
            Tool::Git => ("git", &["--version"]),
            Tool::GitLfs => ("git", &["lfs", "version"]),
            Tool::GitCredentialManager => ("git", &["credential-manager", "--version"]),
        }
    }

    /// Pattern capturing the version in the tool's `--version` output.
    fn version_pattern(self) -> &'static str {
        match self {
            Tool::Git => r"git version (\d[\w.\-]*)",
            Tool::GitLfs => r"git-lfs/(\d[\w.\-]*)",
            Tool::GitCredentialManager => r"^(\d[\w.\-]*)",
        }
    }
}

impl fmt::Display for Tool {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// How an installed tool version is compared against the required one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolMatch {
    /// Installed version must equal the required string.
    #[default]
    Exact,
    /// Installed version must be at least the required version.
    Minimum,
    /// Same major version and not older than the required version.
    Compat,
}

impl ToolMatch {
    /// Parses the `tools.match` configuration value.
    pub fn parse(value: &str) -> Option<ToolMatch> {
        match value {
            "exact" => Some(ToolMatch::Exact),
            "minimum" => Some(ToolMatch::Minimum),
            "compat" => Some(ToolMatch::Compat),
            _ => None,
        }
    }
}

impl fmt::Display for ToolMatch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ToolMatch::Exact => "exact",
            ToolMatch::Minimum => "minimum",
            ToolMatch::Compat => "compat",
        })
    }
}

/// A configured version requirement for one tool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum ToolRequirement {
    /// Any installed version is acceptable.
    Any,
    /// A specific version, compared with the policy's [`ToolMatch`].
    Version(String),
}

impl ToolRequirement {
    /// Interprets a `tools.<tool>.version` value.
    ///
    /// Returns `None` for an empty value, meaning the tool is not managed.
    pub fn from_config(value: &str) -> Option<ToolRequirement> {
        match value.trim() {
            "" => None,
            "*" | "latest" => Some(ToolRequirement::Any),
            version => Some(ToolRequirement::Version(version.to_string())),
        }
    }

    /// The version to install when an update is required, if pinned.
    pub fn target(&self) -> Option<&str> {
        match self {
            ToolRequirement::Any => None,
            ToolRequirement::Version(version) => Some(version),
        }
    }

    /// Checks whether `installed` satisfies this requirement.
    pub fn is_satisfied_by(&self, installed: &str, mode: ToolMatch) -> bool {
        let required = match self {
            ToolRequirement::Any => return true,
            ToolRequirement::Version(required) => required,
        };

        match mode {
            ToolMatch::Exact => installed == required,
            ToolMatch::Minimum => match (lenient_version(installed), lenient_version(required)) {
                (Some(have), Some(want)) => have >= want,
                _ => installed == required,
            },
            ToolMatch::Compat => match (lenient_version(installed), lenient_version(required)) {
                (Some(have), Some(want)) => have.major == want.major && have >= want,
                _ => installed == required,
            },
        }
    }
}

/// Parses a tool version leniently into a semantic version.
///
/// Tool versions rarely follow semver exactly (`2.43.0.windows.1`,
/// `3.4`, `2.4.1+abcdef`), so only the leading numeric components are used
/// and missing ones are treated as zero.
pub fn lenient_version(text: &str) -> Option<Version> {
    let core = text.trim().trim_start_matches('v');
    let mut parts = [0u64; 3];
    let mut seen = 0;

    for (index, component) in core.split(['.', '-', '+']).take(3).enumerate() {
        match component.parse::<u64>() {
            Ok(number) => {
                parts[index] = number;
                seen += 1;
            }
            Err(_) => break,
        }
    }

    if seen == 0 {
        return None;
    }

    Some(Version::new(parts[0], parts[1], parts[2]))
}

/// Extracts a tool's version from its `--version` output.
pub fn parse_version_output(tool: Tool, output: &str) -> Result<Option<String>> {
    let pattern = Regex::new(tool.version_pattern())?;
    let version = output.lines().find_map(|line| {
        pattern
            .captures(line.trim())
            .and_then(|captures| captures.get(1))
            .map(|m| m.as_str().split('+').next().unwrap_or_default().to_string())
    });
    Ok(version)
}

/// Asks the installed tool for its version.
///
/// Returns `Ok(None)` when the tool is not installed, and an error when it is
/// installed but its version could not be determined.
pub fn query_installed_version(tool: Tool) -> Result<Option<String>> {
    let (program, args) = tool.version_command();
    let command_line = format!("{} {}", program, args.join(" "));

    let output = match Command::new(program).args(args).output() {
        Ok(output) => output,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
        Err(e) => {
            return Err(Error::ToolCommand {
                command: command_line,
                message: e.to_string(),
            })
        }
    };

    if !output.status.success() {
        // `git lfs` and `git credential-manager` are git subcommands; git
        // reports an unknown subcommand when the extension is missing.
        let stderr = String::from_utf8_lossy(&output.stderr);
        if stderr.contains("is not a git command") {
            return Ok(None);
        }
        return Err(Error::ToolCommand {
            command: command_line,
            message: stderr.trim().to_string(),
        });
    }

    let stdout = String::from_utf8_lossy(&output.stdout);
    match parse_version_output(tool, &stdout)? {
        Some(version) => Ok(Some(version)),
        None => Err(Error::ToolCommand {
            command: command_line,
            message: format!("unrecognized version output: {}", stdout.trim()),
        }),
    }
}

/// Substitutes `{version}` in a configured command line.
pub fn expand_command(argv: &[String], version: Option<&str>) -> Vec<String> {
    argv.iter()
        .map(|arg| arg.replace("{version}", version.unwrap_or("latest")))
        .collect()
}

/// Runs a configured command line, failing on a non-zero exit status.
pub fn run_command(argv: &[String]) -> Result<String> {
    let (program, args) = argv.split_first().ok_or_else(|| Error::ToolCommand {
        command: String::new(),
        message: "empty command".to_string(),
    })?;

    log::debug!("Running {}", argv.join(" "));
    let output = Command::new(program)
        .args(args)
        .output()
        .map_err(|e| Error::ToolCommand {
            command: argv.join(" "),
            message: e.to_string(),
        })?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(Error::ToolCommand {
            command: argv.join(" "),
            message: match output.status.code() {
                Some(code) => format!("exit code {}: {}", code, stderr.trim()),
                None => format!("terminated by signal: {}", stderr.trim()),
            },
        });
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}
