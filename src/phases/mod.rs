//! Implementation of the phases of a sync run.
//!
//! ## Overview
//!
//! A sync run follows 3 phases:
//! 1. Probe - Capture every version signal once into a frozen `VersionSnapshot`
//! 2. Plan - Reconcile the snapshot against the policy into an ordered `SyncPlan`
//! 3. Execute - Run the plan through the collaborators, honouring the error latch
//!
//! The orchestrator chains the phases and routes fatal conditions through the
//! latch. Each phase depends only on the previous phases and the foundation
//! layers (config, policy, workspace collaborators).

use crate::tools::Tool;
use serde::Serialize;
use std::collections::BTreeMap;
use std::fmt;

pub mod executor;
pub mod orchestrator;
pub mod planner;
pub mod probe;

/// What the remote reports for the current branch.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state", content = "commit")]
pub enum RemoteState {
    Commit(String),
    /// The remote has no branch with this name.
    Missing,
    /// The remote could not be queried; see the degraded probes.
    Unavailable,
}

impl RemoteState {
    pub fn commit(&self) -> Option<&str> {
        match self {
            RemoteState::Commit(commit) => Some(commit),
            _ => None,
        }
    }
}

/// Relationship between the local commit and the remote commit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum History {
    UpToDate,
    /// Local is a strict ancestor of remote.
    Behind,
    /// Remote is a strict ancestor of local.
    Ahead,
    Diverged,
}

/// An optional probe that could not be completed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "tool")]
pub enum ProbeKind {
    Fetch,
    RemoteCommit,
    Ancestry,
    InstalledEngine,
    ProjectVersion,
    LatestTag,
    Tool(Tool),
}

impl fmt::Display for ProbeKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeKind::Fetch => f.write_str("fetch"),
            ProbeKind::RemoteCommit => f.write_str("remote commit"),
            ProbeKind::Ancestry => f.write_str("ancestry"),
            ProbeKind::InstalledEngine => f.write_str("installed engine version"),
            ProbeKind::ProjectVersion => f.write_str("project version"),
            ProbeKind::LatestTag => f.write_str("latest release tag"),
            ProbeKind::Tool(tool) => write!(f, "{} version", tool),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DegradedProbe {
    pub probe: ProbeKind,
    pub message: String,
}

/// Every version signal of the workspace, captured once per run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VersionSnapshot {
    pub local_branch: String,
    pub local_commit: String,
    pub remote: RemoteState,
    /// `None` when the remote commit is unknown or ancestry could not be
    /// determined.
    pub history: Option<History>,
    pub is_dirty: bool,
    pub rebase_in_progress: bool,
    /// `None` for an unmanaged engine.
    pub declared_engine_version: Option<String>,
    pub installed_engine_version: Option<String>,
    pub project_version: Option<String>,
    pub latest_tag: Option<String>,
    /// Managed tools whose probe succeeded; `None` means not installed.
    pub tool_versions: BTreeMap<Tool, Option<String>>,
    pub degraded: Vec<DegradedProbe>,
}

impl VersionSnapshot {
    /// Whether the given optional probe failed.
    pub fn is_degraded(&self, probe: ProbeKind) -> bool {
        self.degraded.iter().any(|d| d.probe == probe)
    }

    pub fn is_detached(&self) -> bool {
        self.local_branch == "HEAD"
    }
}

/// Ordering category of an action. Plans are sorted by category.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ActionCategory {
    Tooling,
    Branch,
    Engine,
    ProjectFiles,
    VersionStamp,
}

/// A corrective action. Side-effect free until executed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "action", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncAction {
    /// Install or update a tool; `version: None` requests the latest.
    ToolUpdate { tool: Tool, version: Option<String> },
    BranchFastforward { target: String },
    BranchRebase { onto: String },
    /// Local and remote have diverged and auto-rebase is off.
    BranchConflictAbort { local: String, remote: String },
    EngineSwitch { version: String },
    ProjectFileRegen,
    VersionStamp { version: String },
}

impl SyncAction {
    pub fn category(&self) -> ActionCategory {
        match self {
            SyncAction::ToolUpdate { .. } => ActionCategory::Tooling,
            SyncAction::BranchFastforward { .. }
            | SyncAction::BranchRebase { .. }
            | SyncAction::BranchConflictAbort { .. } => ActionCategory::Branch,
            SyncAction::EngineSwitch { .. } => ActionCategory::Engine,
            SyncAction::ProjectFileRegen => ActionCategory::ProjectFiles,
            SyncAction::VersionStamp { .. } => ActionCategory::VersionStamp,
        }
    }

    /// Whether a failure of this action halts the run.
    pub fn is_blocking(&self) -> bool {
        !matches!(
            self,
            SyncAction::ProjectFileRegen | SyncAction::VersionStamp { .. }
        )
    }

    /// The action's name as used in reports.
    pub fn kind(&self) -> &'static str {
        match self {
            SyncAction::ToolUpdate { .. } => "TOOL_UPDATE",
            SyncAction::BranchFastforward { .. } => "BRANCH_FASTFORWARD",
            SyncAction::BranchRebase { .. } => "BRANCH_REBASE",
            SyncAction::BranchConflictAbort { .. } => "BRANCH_CONFLICT_ABORT",
            SyncAction::EngineSwitch { .. } => "ENGINE_SWITCH",
            SyncAction::ProjectFileRegen => "PROJECT_FILE_REGEN",
            SyncAction::VersionStamp { .. } => "VERSION_STAMP",
        }
    }
}

impl fmt::Display for SyncAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncAction::ToolUpdate { tool, version } => write!(
                f,
                "{}({} {})",
                self.kind(),
                tool,
                version.as_deref().unwrap_or("latest")
            ),
            SyncAction::BranchFastforward { target } => write!(f, "{}({})", self.kind(), short(target)),
            SyncAction::BranchRebase { onto } => write!(f, "{}({})", self.kind(), short(onto)),
            SyncAction::BranchConflictAbort { local, remote } => {
                write!(f, "{}({}, {})", self.kind(), short(local), short(remote))
            }
            SyncAction::EngineSwitch { version } | SyncAction::VersionStamp { version } => {
                write!(f, "{}({})", self.kind(), version)
            }
            SyncAction::ProjectFileRegen => f.write_str(self.kind()),
        }
    }
}

fn short(commit: &str) -> &str {
    commit.get(..crate::version::SHORT_COMMIT_LEN).unwrap_or(commit)
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedAction {
    #[serde(flatten)]
    pub action: SyncAction,
    pub blocking: bool,
}

impl PlannedAction {
    pub fn new(action: SyncAction) -> Self {
        let blocking = action.is_blocking();
        Self { action, blocking }
    }
}

/// Ordered corrective actions plus planner notes.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncPlan {
    pub actions: Vec<PlannedAction>,
    /// Warnings about degraded inputs and skipped categories.
    pub notes: Vec<String>,
}

impl SyncPlan {
    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    /// The planned actions without their flags.
    pub fn action_list(&self) -> Vec<&SyncAction> {
        self.actions.iter().map(|planned| &planned.action).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionOutcome {
    Succeeded,
    SkippedDueToPriorFatal,
    FailedNonFatal,
    FailedFatal,
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ActionOutcome::Succeeded => "succeeded",
            ActionOutcome::SkippedDueToPriorFatal => "skipped-due-to-prior-fatal",
            ActionOutcome::FailedNonFatal => "failed-non-fatal",
            ActionOutcome::FailedFatal => "failed-fatal",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ActionReport {
    pub action: SyncAction,
    pub outcome: ActionOutcome,
    pub message: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    Succeeded,
    SucceededWithWarnings,
    Failed,
}

/// Terminal record of a sync run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SyncResult {
    pub reports: Vec<ActionReport>,
    pub warnings: Vec<String>,
    /// The message that first made the run fatal.
    pub fatal: Option<String>,
    /// Where to ask for help when the run fails.
    pub support: Option<String>,
}

impl SyncResult {
    pub fn status(&self) -> SyncStatus {
        if self.fatal.is_some() {
            SyncStatus::Failed
        } else if self.warnings.is_empty() {
            SyncStatus::Succeeded
        } else {
            SyncStatus::SucceededWithWarnings
        }
    }

    pub fn is_success(&self) -> bool {
        self.status() != SyncStatus::Failed
    }

    /// Reports with the given outcome.
    pub fn with_outcome(&self, outcome: ActionOutcome) -> impl Iterator<Item = &ActionReport> {
        self.reports.iter().filter(move |r| r.outcome == outcome)
    }
}
