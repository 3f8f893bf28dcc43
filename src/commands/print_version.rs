//! # Print Version Command Implementation
//!
//! Prints a single version string on stdout so scripts can capture it:
//!
//! - `current-engine`: the installed engine, as reported by
//!   `engine.versioncommand`
//! - `project`: the project version from the project settings file
//! - `latest-project`: the newest release tag, without its `v` prefix

use anyhow::{anyhow, Result};
use clap::{Args, ValueEnum};

use super::Context;
use worksync::policy::SyncPolicy;
use worksync::{engine, git, version};

/// Which version to print
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum VersionTarget {
    /// Installed engine version
    CurrentEngine,
    /// Project version from the project settings
    Project,
    /// Latest release tag
    LatestProject,
}

/// Print the engine or project version
#[derive(Args, Debug)]
pub struct PrintVersionArgs {
    /// The version to print
    #[arg(value_enum)]
    pub target: VersionTarget,
}

/// Execute the `print-version` command.
pub fn execute(args: PrintVersionArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let version = match args.target {
        VersionTarget::CurrentEngine => {
            let policy = SyncPolicy::from_config(&config)?;
            engine::installed_version(&policy.engine)?
                .ok_or_else(|| anyhow!("The engine did not report a version"))?
        }
        VersionTarget::Project => {
            let layout = context.resolve_layout(&config)?;
            let settings = engine::project_settings_path(&layout.descriptor);
            engine::read_project_version(&settings)?.ok_or_else(|| {
                anyhow!("No project version set in {}", settings.display())
            })?
        }
        VersionTarget::LatestProject => {
            let tag = git::latest_tag(config.root())?
                .ok_or_else(|| anyhow!("No release tag found"))?;
            match version::tag_version(&tag) {
                Some(v) => v.to_string(),
                None => anyhow::bail!("Latest tag {} is not a version", tag),
            }
        }
    };

    println!("{}", version);
    Ok(())
}
