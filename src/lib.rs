//! # Workspace Sync Library
//!
//! This library keeps a version-controlled engine project consistent with its
//! team: the local branch with the remote, the installed tools and engine with
//! what the project requires, and the project version with the stamp policy.
//! It is designed to be used by the `worksync` command-line tool but can also
//! be embedded in other launchers.
//!
//! ## Quick Example
//!
//! ```no_run
//! use std::path::Path;
//! use worksync::config::ConfigStack;
//!
//! let config = ConfigStack::load(Path::new(".worksync.yaml"), false).unwrap();
//! let result = worksync::run_sync(&config);
//! for warning in &result.warnings {
//!     println!("warning: {}", warning);
//! }
//! assert!(result.is_success());
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`)**: A base document overlaid by optional user
//!   and CI documents, resolved against a declared schema.
//! - **Error latch (`latch`)**: Per-run record of whether a fatal condition
//!   occurred. Every step consults it before acting.
//! - **Collaborators (`workspace`, `git`, `engine`, `tools`)**: The version
//!   control client, engine tooling, and tool inspector the core drives.
//! - **Phases (`phases`)**: Probe, plan, and execute.
//!
//! ## Execution Flow
//!
//! 1.  **Probe**: Capture branch, commit, remote, dirty state, engine, project
//!     and tool versions into a frozen snapshot.
//! 2.  **Plan**: Reconcile the snapshot with the policy into an ordered list
//!     of corrective actions.
//! 3.  **Execute**: Run the actions in order, halting on the first fatal
//!     failure.

pub mod config;
pub mod defaults;
pub mod engine;
pub mod error;
pub mod git;
pub mod latch;
pub mod output;
pub mod phases;
pub mod policy;
pub mod tools;
pub mod version;
pub mod workspace;

#[cfg(test)]
mod planner_proptest;

use config::ConfigStack;
use latch::ErrorState;
use phases::orchestrator::{aborted, Orchestrator};
use phases::SyncResult;
use policy::SyncPolicy;
use std::path::PathBuf;
use workspace::WorkspaceLayout;

/// Per-invocation overrides for a sync run.
#[derive(Debug, Clone, Default)]
pub struct SyncOptions {
    /// Sync even when off an expected branch with autosync disabled.
    pub force: bool,
    /// Use this project descriptor instead of discovering one.
    pub descriptor: Option<PathBuf>,
}

/// Runs a sync with default options and a fresh error latch.
pub fn run_sync(config: &ConfigStack) -> SyncResult {
    run_sync_with(config, &SyncOptions::default(), &mut ErrorState::new())
}

/// Runs a sync with the given options, recording errors in `latch`.
pub fn run_sync_with(config: &ConfigStack, options: &SyncOptions, latch: &mut ErrorState) -> SyncResult {
    latch.clear();

    let policy = match SyncPolicy::from_config(config) {
        Ok(policy) => policy.with_force(options.force),
        Err(err) => return aborted(err, latch),
    };

    let layout = match resolve_layout(config, options) {
        Ok(layout) => layout,
        Err(err) => {
            let mut result = aborted(err, latch);
            result.support = policy.support.clone();
            return result;
        }
    };

    Orchestrator::new(&layout, &policy).run(&policy, latch)
}

/// Locates the project descriptor for a configuration.
pub fn resolve_layout(config: &ConfigStack, options: &SyncOptions) -> error::Result<WorkspaceLayout> {
    let root = config.root();
    match &options.descriptor {
        Some(descriptor) => Ok(WorkspaceLayout::with_descriptor(root, descriptor)),
        None => WorkspaceLayout::discover(root, config.get_str("project.name")?),
    }
}
