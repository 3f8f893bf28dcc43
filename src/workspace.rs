//! # Workspace Collaborators
//!
//! This module defines the seams between the sync engine and the outside
//! world: the version-control client, the engine tooling, and the tool
//! inspector. The orchestration core only talks to these traits, so every
//! phase can be exercised against in-memory fakes.
//!
//! ## Design
//!
//! - **`VcsClient`**: branch, commit, remote, and history queries plus the
//!   fast-forward and rebase mutations. `DefaultVcsClient` shells out to
//!   `git` via [`crate::git`].
//!
//! - **`EngineTooling`**: engine and project-version signals and the engine
//!   commands. `DefaultEngineTooling` reads the project descriptor and
//!   settings through [`crate::engine`].
//!
//! - **`ToolInspector`**: installed tool versions and the per-tool installer.
//!   `DefaultToolInspector` uses [`crate::tools`].
//!
//! All three are `Send + Sync` so the probe can query them from several
//! threads at once.

use crate::engine::PROJECT_VERSION_KEY;
use crate::error::{Error, Result};
use crate::policy::{EngineCommands, SyncPolicy};
use crate::tools::{self, expand_command, run_command, Tool};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

/// Result of a rebase attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RebaseOutcome {
    Success,
    /// The rebase stopped on a conflict and is still in progress.
    Conflict { detail: String },
}

/// Version-control operations used by a sync run.
pub trait VcsClient: Send + Sync {
    /// The checked-out branch, or `HEAD` when detached.
    fn current_branch(&self) -> Result<String>;

    fn current_commit(&self) -> Result<String>;

    /// The remote's commit for `branch`; `Ok(None)` if the remote has no such
    /// branch, an error if the remote is unreachable.
    fn remote_commit(&self, branch: &str) -> Result<Option<String>>;

    /// Whether tracked files have uncommitted changes.
    fn is_dirty(&self) -> Result<bool>;

    /// Whether `ancestor` is reachable from `descendant`.
    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool>;

    fn rebase_in_progress(&self) -> Result<bool>;

    /// The most recent release tag, if any.
    fn latest_tag(&self) -> Result<Option<String>>;

    fn fetch(&self) -> Result<()>;

    fn fast_forward(&self, commit: &str) -> Result<()>;

    fn rebase(&self, onto: &str) -> Result<RebaseOutcome>;

    fn abort_rebase(&self) -> Result<()>;
}

/// Engine and project-file operations used by a sync run.
pub trait EngineTooling: Send + Sync {
    /// Engine version the project declares; `None` for an unmanaged engine.
    fn declared_version(&self) -> Result<Option<String>>;

    /// Engine version installed on this machine.
    fn installed_version(&self) -> Result<Option<String>>;

    /// Version recorded in the project settings.
    fn project_version(&self) -> Result<Option<String>>;

    fn switch_to(&self, version: &str) -> Result<()>;

    fn regenerate_project_files(&self) -> Result<()>;

    fn stamp_project_version(&self, version: &str) -> Result<()>;
}

/// Tool version queries and updates.
pub trait ToolInspector: Send + Sync {
    /// The installed version of `tool`, or `None` if it is not installed.
    fn installed_version(&self, tool: Tool) -> Result<Option<String>>;

    /// Installs or updates `tool`; `None` requests the latest version.
    fn update(&self, tool: Tool, version: Option<&str>) -> Result<()>;
}

/// Borrowed set of collaborators handed to the probe and the executor.
#[derive(Clone, Copy)]
pub struct Collaborators<'a> {
    pub vcs: &'a dyn VcsClient,
    pub engine: &'a dyn EngineTooling,
    pub tools: &'a dyn ToolInspector,
}

/// `VcsClient` backed by the system `git` binary.
pub struct DefaultVcsClient {
    root: PathBuf,
    remote: String,
    /// Settings file the version stamp writes into.
    stamp_file: Option<PathBuf>,
}

impl DefaultVcsClient {
    pub fn new(root: PathBuf, remote: impl Into<String>) -> Self {
        Self {
            root,
            remote: remote.into(),
            stamp_file: None,
        }
    }

    /// Treats stamp-only edits to `settings` as clean and discards them
    /// before the branch moves; the stamp is reapplied afterwards.
    pub fn with_stamp_file(mut self, settings: PathBuf) -> Self {
        self.stamp_file = Some(settings);
        self
    }

    fn restore_stamp_file(&self) -> Result<()> {
        if let Some(settings) = &self.stamp_file {
            if crate::git::restore_if_only_key_changed(&self.root, settings, PROJECT_VERSION_KEY)? {
                log::info!("Reverted version stamp in {} before moving the branch", settings.display());
            }
        }
        Ok(())
    }
}

impl VcsClient for DefaultVcsClient {
    fn current_branch(&self) -> Result<String> {
        crate::git::current_branch(&self.root)
    }

    fn current_commit(&self) -> Result<String> {
        crate::git::current_commit(&self.root)
    }

    fn remote_commit(&self, branch: &str) -> Result<Option<String>> {
        crate::git::remote_commit(&self.root, &self.remote, branch)
    }

    fn is_dirty(&self) -> Result<bool> {
        match &self.stamp_file {
            Some(settings) => {
                crate::git::is_dirty_except_key(&self.root, settings, PROJECT_VERSION_KEY)
            }
            None => crate::git::is_dirty(&self.root),
        }
    }

    fn is_ancestor(&self, ancestor: &str, descendant: &str) -> Result<bool> {
        crate::git::is_ancestor(&self.root, ancestor, descendant)
    }

    fn rebase_in_progress(&self) -> Result<bool> {
        crate::git::rebase_in_progress(&self.root)
    }

    fn latest_tag(&self) -> Result<Option<String>> {
        crate::git::latest_tag(&self.root)
    }

    fn fetch(&self) -> Result<()> {
        crate::git::fetch(&self.root, &self.remote)
    }

    fn fast_forward(&self, commit: &str) -> Result<()> {
        self.restore_stamp_file()?;
        crate::git::fast_forward(&self.root, commit)
    }

    fn rebase(&self, onto: &str) -> Result<RebaseOutcome> {
        self.restore_stamp_file()?;
        crate::git::rebase(&self.root, onto)
    }

    fn abort_rebase(&self) -> Result<()> {
        crate::git::abort_rebase(&self.root)
    }
}

/// `EngineTooling` backed by the project files and configured commands.
pub struct DefaultEngineTooling {
    descriptor: PathBuf,
    commands: EngineCommands,
}

impl DefaultEngineTooling {
    pub fn new(descriptor: PathBuf, commands: EngineCommands) -> Self {
        Self {
            descriptor,
            commands,
        }
    }

    fn settings_path(&self) -> PathBuf {
        crate::engine::project_settings_path(&self.descriptor)
    }
}

impl EngineTooling for DefaultEngineTooling {
    fn declared_version(&self) -> Result<Option<String>> {
        crate::engine::declared_version(&self.descriptor)
    }

    fn installed_version(&self) -> Result<Option<String>> {
        crate::engine::installed_version(&self.commands)
    }

    fn project_version(&self) -> Result<Option<String>> {
        crate::engine::read_project_version(&self.settings_path())
    }

    fn switch_to(&self, version: &str) -> Result<()> {
        crate::engine::switch_to(&self.commands, version)
    }

    fn regenerate_project_files(&self) -> Result<()> {
        crate::engine::regenerate_project_files(&self.commands)
    }

    fn stamp_project_version(&self, version: &str) -> Result<()> {
        crate::engine::write_project_version(&self.settings_path(), version)
    }
}

/// `ToolInspector` that queries installed binaries and runs configured
/// installers.
pub struct DefaultToolInspector {
    installers: BTreeMap<Tool, Vec<String>>,
}

impl DefaultToolInspector {
    pub fn new(installers: BTreeMap<Tool, Vec<String>>) -> Self {
        Self { installers }
    }
}

impl ToolInspector for DefaultToolInspector {
    fn installed_version(&self, tool: Tool) -> Result<Option<String>> {
        tools::query_installed_version(tool)
    }

    fn update(&self, tool: Tool, version: Option<&str>) -> Result<()> {
        let installer = self.installers.get(&tool).ok_or_else(|| Error::ToolCommand {
            command: tool.installer_key(),
            message: format!("no installer configured for {}", tool),
        })?;
        run_command(&expand_command(installer, version))?;
        log::info!("Updated {} to {}", tool, version.unwrap_or("latest"));
        Ok(())
    }
}

/// Location of the working copy and the project descriptor inside it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkspaceLayout {
    pub root: PathBuf,
    pub descriptor: PathBuf,
}

impl WorkspaceLayout {
    /// Uses an explicitly chosen descriptor.
    pub fn with_descriptor(root: impl Into<PathBuf>, descriptor: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            descriptor: descriptor.into(),
        }
    }

    /// Resolves `project_name` relative to `root`.
    ///
    /// `project_name` is either a descriptor file or a directory searched for
    /// descriptors. Several matches fail with [`Error::ProjectSelection`] so
    /// the caller can ask the user to choose.
    pub fn discover(root: &Path, project_name: &str) -> Result<Self> {
        let candidate = match project_name {
            "" | "." => root.to_path_buf(),
            name => root.join(name),
        };
        if candidate.is_file() {
            return Ok(Self::with_descriptor(root, candidate));
        }

        let search_dir = if candidate.is_dir() {
            candidate
        } else {
            return Err(Error::ProjectDescriptor {
                path: candidate,
                message: "project descriptor not found".to_string(),
            });
        };

        let mut candidates = find_descriptors(&search_dir)?;
        match candidates.len() {
            0 => Err(Error::ProjectDescriptor {
                path: search_dir,
                message: "no .uproject file found".to_string(),
            }),
            1 => Ok(Self::with_descriptor(root, candidates.remove(0))),
            _ => Err(Error::ProjectSelection { candidates }),
        }
    }

    /// Builds the default collaborators for this workspace.
    pub fn default_collaborators(
        &self,
        policy: &SyncPolicy,
    ) -> (DefaultVcsClient, DefaultEngineTooling, DefaultToolInspector) {
        (
            DefaultVcsClient::new(self.root.clone(), policy.remote.clone())
                .with_stamp_file(crate::engine::project_settings_path(&self.descriptor)),
            DefaultEngineTooling::new(self.descriptor.clone(), policy.engine.clone()),
            DefaultToolInspector::new(policy.installers.clone()),
        )
    }
}

/// Finds project descriptors directly in `dir` or one level below it.
pub fn find_descriptors(dir: &Path) -> Result<Vec<PathBuf>> {
    let base = glob::Pattern::escape(&dir.to_string_lossy());
    let mut found = Vec::new();

    for pattern in [format!("{}/*.uproject", base), format!("{}/*/*.uproject", base)] {
        for entry in glob::glob(&pattern)? {
            match entry {
                Ok(path) if path.is_file() => found.push(path),
                Ok(_) => {}
                Err(e) => log::debug!("Skipping unreadable path: {}", e),
            }
        }
    }

    found.sort();
    found.dedup();
    Ok(found)
}


#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn touch(path: &Path) {
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, "{}").unwrap();
    }

    #[test]
    fn test_discover_explicit_descriptor() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("Game/Game.uproject"));

        let layout = WorkspaceLayout::discover(dir.path(), "Game/Game.uproject").unwrap();
        assert_eq!(layout.descriptor, dir.path().join("Game/Game.uproject"));
        assert_eq!(layout.root, dir.path());
    }

    #[test]
    fn test_discover_searches_one_level_down() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("Game/Game.uproject"));

        let layout = WorkspaceLayout::discover(dir.path(), ".").unwrap();
        assert!(layout.descriptor.ends_with("Game/Game.uproject"));
    }

    #[test]
    fn test_discover_multiple_candidates() {
        let dir = TempDir::new().unwrap();
        touch(&dir.path().join("A/A.uproject"));
        touch(&dir.path().join("B/B.uproject"));

        match WorkspaceLayout::discover(dir.path(), ".") {
            Err(Error::ProjectSelection { candidates }) => {
                assert_eq!(candidates.len(), 2);
                assert!(candidates[0].ends_with("A/A.uproject"));
            }
            other => panic!("expected ProjectSelection, got {:?}", other),
        }
    }

    #[test]
    fn test_discover_missing() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            WorkspaceLayout::discover(dir.path(), "Nope.uproject"),
            Err(Error::ProjectDescriptor { .. })
        ));
        assert!(matches!(
            WorkspaceLayout::discover(dir.path(), "."),
            Err(Error::ProjectDescriptor { .. })
        ));
    }

    #[test]
    fn test_tool_update_without_installer_fails() {
        let inspector = DefaultToolInspector::new(BTreeMap::new());
        match inspector.update(Tool::GitLfs, Some("3.4")) {
            Err(Error::ToolCommand { command, .. }) => {
                assert_eq!(command, "tools.git-lfs.installer")
            }
            other => panic!("expected ToolCommand, got {:?}", other),
        }
    }

    #[test]
    fn test_collaborators_are_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<DefaultVcsClient>();
        assert_send_sync::<DefaultEngineTooling>();
        assert_send_sync::<DefaultToolInspector>();
        assert_send_sync::<Collaborators<'static>>();
    }
}
