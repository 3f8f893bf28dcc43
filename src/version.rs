//! # Project Version Derivation
//!
//! This module computes the project version a workspace *should* carry, given
//! the configured stamp policy and the version signals captured by the probe.
//! It also implements the `bump` arithmetic used by the `bump` subcommand.
//!
//! ## Stamp Policies
//!
//! - **`off`**: the project version is never touched by a sync.
//! - **`commit`**: the core `major.minor.patch` of the current project version
//!   is kept and the 7-character short commit is attached as build metadata,
//!   e.g. `1.4.0+3f9a2c1`.
//! - **`tag`**: the project version follows the latest release tag, with any
//!   leading `v` removed.
//!
//! Derivation is pure; reading and writing the version file belongs to the
//! engine tooling.

use crate::error::{Error, Result};
use crate::tools::lenient_version;
use semver::{BuildMetadata, Prerelease, Version};
use serde::Serialize;
use std::fmt;

/// Length of the abbreviated commit used as build metadata.
pub const SHORT_COMMIT_LEN: usize = 7;

/// How the project version is derived during a sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum StampPolicy {
    #[default]
    Off,
    Commit,
    Tag,
}

impl StampPolicy {
    /// Parses the `versioning.stamp` configuration value.
    pub fn parse(value: &str) -> Option<StampPolicy> {
        match value {
            "off" | "" => Some(StampPolicy::Off),
            "commit" => Some(StampPolicy::Commit),
            "tag" => Some(StampPolicy::Tag),
            _ => None,
        }
    }
}

impl fmt::Display for StampPolicy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            StampPolicy::Off => "off",
            StampPolicy::Commit => "commit",
            StampPolicy::Tag => "tag",
        };
        f.write_str(name)
    }
}

/// Which component of the project version to increase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum BumpKind {
    Patch,
    Minor,
    Major,
}

/// Extracts a semantic version from a release tag.
///
/// Accepts `v1.2.3`, `1.2.3`, and `refs/tags/v1.2.3`.
pub fn tag_version(tag: &str) -> Option<Version> {
    let tag = tag.strip_prefix("refs/tags/").unwrap_or(tag);
    let tag = tag.strip_prefix('v').unwrap_or(tag);
    Version::parse(tag).ok()
}

/// Parses a project version, falling back to lenient parsing for values such
/// as `1.4` that are common in project settings.
pub fn parse_project_version(text: &str) -> Option<Version> {
    Version::parse(text.trim()).ok().or_else(|| lenient_version(text))
}

/// Computes the version the project should carry under `policy`.
///
/// Returns `None` when the policy is off or when the policy has nothing to
/// derive from (no release tag for `tag`).
pub fn derive_project_version(
    policy: StampPolicy,
    current: Option<&str>,
    local_commit: &str,
    latest_tag: Option<&str>,
) -> Option<String> {
    match policy {
        StampPolicy::Off => None,
        StampPolicy::Commit => {
            let short: String = local_commit.chars().take(SHORT_COMMIT_LEN).collect();
            if short.is_empty() {
                return None;
            }
            let mut version = current
                .and_then(parse_project_version)
                .unwrap_or_else(|| Version::new(0, 1, 0));
            version.pre = Prerelease::EMPTY;
            version.build = BuildMetadata::new(&short).ok()?;
            Some(version.to_string())
        }
        StampPolicy::Tag => {
            let tag = latest_tag?;
            let tag = tag.strip_prefix("refs/tags/").unwrap_or(tag);
            Some(tag.strip_prefix('v').unwrap_or(tag).to_string())
        }
    }
}

/// Increases one component of `current`, resetting the lower ones and
/// dropping pre-release and build metadata.
pub fn bump_version(current: &str, kind: BumpKind) -> Result<String> {
    let mut version = parse_project_version(current).ok_or_else(|| Error::Version {
        message: format!("'{}' is not a valid project version", current),
    })?;

    match kind {
        BumpKind::Patch => version.patch += 1,
        BumpKind::Minor => {
            version.minor += 1;
            version.patch = 0;
        }
        BumpKind::Major => {
            version.major += 1;
            version.minor = 0;
            version.patch = 0;
        }
    }
    version.pre = Prerelease::EMPTY;
    version.build = BuildMetadata::EMPTY;

    Ok(version.to_string())
}
