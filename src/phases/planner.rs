//! Phase 2: Reconciliation Planner
//!
//! Turns a frozen [`VersionSnapshot`] and the [`SyncPolicy`] into an ordered
//! [`SyncPlan`]. Planning is pure and deterministic: the same inputs always
//! produce the same plan, and no collaborator is consulted.
//!
//! Each category (tooling, branch, engine, version stamp) is evaluated
//! independently and contributes its own actions. The final plan is sorted by
//! [`ActionCategory`](super::ActionCategory), so ordering does not depend on
//! rule evaluation order.

use super::{History, PlannedAction, ProbeKind, RemoteState, SyncAction, SyncPlan, VersionSnapshot};
use crate::error::{Error, Result};
use crate::policy::SyncPolicy;
use crate::version::{derive_project_version, StampPolicy};

/// Collects actions and notes while the rules run.
#[derive(Default)]
struct PlanBuilder {
    actions: Vec<SyncAction>,
    notes: Vec<String>,
}

impl PlanBuilder {
    fn push(&mut self, action: SyncAction) {
        if !self.actions.contains(&action) {
            self.actions.push(action);
        }
    }

    fn note(&mut self, note: impl Into<String>) {
        self.notes.push(note.into());
    }

    fn finish(mut self) -> SyncPlan {
        self.actions.sort_by_key(SyncAction::category);
        SyncPlan {
            actions: self.actions.into_iter().map(PlannedAction::new).collect(),
            notes: self.notes,
        }
    }
}

/// Computes the plan for `snapshot` under `policy`.
///
/// Fails with [`Error::PlanInvalid`] when the inputs are unsafe to act on; an
/// invalid plan contains no actions at all.
pub fn plan(snapshot: &VersionSnapshot, policy: &SyncPolicy) -> Result<SyncPlan> {
    if snapshot.rebase_in_progress {
        return Err(Error::PlanInvalid {
            reason: "a rebase is already in progress; finish or abort it before syncing"
                .to_string(),
        });
    }

    let mut builder = PlanBuilder::default();

    for degraded in &snapshot.degraded {
        builder.note(format!(
            "Could not determine {}: {}",
            degraded.probe, degraded.message
        ));
    }

    plan_tools(snapshot, policy, &mut builder);
    plan_branch(snapshot, policy, &mut builder)?;
    plan_engine(snapshot, policy, &mut builder);
    plan_version_stamp(snapshot, policy, &mut builder);

    let plan = builder.finish();
    log::debug!(
        "Planned {} action(s) with {} note(s)",
        plan.actions.len(),
        plan.notes.len()
    );
    Ok(plan)
}

fn plan_tools(snapshot: &VersionSnapshot, policy: &SyncPolicy, builder: &mut PlanBuilder) {
    for (tool, requirement) in &policy.tools {
        let Some(installed) = snapshot.tool_versions.get(tool) else {
            // Degraded probe; already noted
            continue;
        };

        let satisfied = installed
            .as_deref()
            .is_some_and(|version| requirement.is_satisfied_by(version, policy.tool_match));

        if !satisfied {
            builder.push(SyncAction::ToolUpdate {
                tool: *tool,
                version: requirement.target().map(str::to_string),
            });
        }
    }
}

fn plan_branch(
    snapshot: &VersionSnapshot,
    policy: &SyncPolicy,
    builder: &mut PlanBuilder,
) -> Result<()> {
    if snapshot.is_detached() {
        builder.note("Detached HEAD; branch sync skipped");
        return Ok(());
    }

    if !policy.is_expected_branch(&snapshot.local_branch) && !policy.autosync && !policy.force {
        builder.note(format!(
            "Branch '{}' is not one of the expected branches ({}) and autosync is off; branch sync skipped, use --force to override",
            snapshot.local_branch,
            policy.expected_branches.join(", ")
        ));
        return Ok(());
    }

    let remote = match &snapshot.remote {
        RemoteState::Commit(commit) => commit,
        RemoteState::Missing => {
            builder.note(format!(
                "Branch '{}' does not exist on '{}'; nothing to sync",
                snapshot.local_branch, policy.remote
            ));
            return Ok(());
        }
        // Degraded probe; already noted
        RemoteState::Unavailable => return Ok(()),
    };

    let Some(history) = snapshot.history else {
        builder.note("Branch relationship unknown; branch sync skipped");
        return Ok(());
    };

    match history {
        History::UpToDate => {}
        History::Behind if snapshot.is_dirty => builder.note(
            "Working copy has uncommitted changes; fast-forward skipped until they are committed or stashed",
        ),
        History::Behind => builder.push(SyncAction::BranchFastforward {
            target: remote.clone(),
        }),
        History::Ahead => builder.note(format!(
            "Local branch '{}' has commits not on '{}'; push them when ready",
            snapshot.local_branch, policy.remote
        )),
        History::Diverged if policy.autorebase && snapshot.is_dirty => {
            return Err(Error::PlanInvalid {
                reason: "branch has diverged and auto-rebase cannot run with uncommitted changes"
                    .to_string(),
            });
        }
        History::Diverged if policy.autorebase => builder.push(SyncAction::BranchRebase {
            onto: remote.clone(),
        }),
        History::Diverged => builder.push(SyncAction::BranchConflictAbort {
            local: snapshot.local_commit.clone(),
            remote: remote.clone(),
        }),
    }

    Ok(())
}

fn plan_engine(snapshot: &VersionSnapshot, policy: &SyncPolicy, builder: &mut PlanBuilder) {
    if let Some(declared) = &snapshot.declared_engine_version {
        if snapshot.is_degraded(ProbeKind::InstalledEngine) {
            // Degraded probe; already noted
        } else if snapshot.installed_engine_version.as_deref() != Some(declared.as_str()) {
            builder.push(SyncAction::EngineSwitch {
                version: declared.clone(),
            });
            builder.push(SyncAction::ProjectFileRegen);
        }
    }

    if policy.always_regenerate {
        builder.push(SyncAction::ProjectFileRegen);
    }
}

fn plan_version_stamp(snapshot: &VersionSnapshot, policy: &SyncPolicy, builder: &mut PlanBuilder) {
    if policy.stamp == StampPolicy::Off {
        return;
    }

    if snapshot.is_degraded(ProbeKind::ProjectVersion) {
        builder.note("Version stamp skipped; the project version could not be read");
        return;
    }

    // Stamp the commit the branch will be on after this run's branch action
    let branch_target = builder.actions.iter().find_map(|action| match action {
        SyncAction::BranchFastforward { target } => Some(Some(target.clone())),
        SyncAction::BranchRebase { .. } | SyncAction::BranchConflictAbort { .. } => Some(None),
        _ => None,
    });
    // A fast-forward reverts an uncommitted stamp, so it is always reapplied
    let restamp = matches!(branch_target, Some(Some(_)));
    let commit = match branch_target {
        Some(Some(target)) => target,
        Some(None) => {
            builder.note("Version stamp deferred until the branch is reconciled");
            return;
        }
        None => snapshot.local_commit.clone(),
    };

    let derived = derive_project_version(
        policy.stamp,
        snapshot.project_version.as_deref(),
        &commit,
        snapshot.latest_tag.as_deref(),
    );

    match derived {
        Some(version) if restamp || snapshot.project_version.as_deref() != Some(version.as_str()) => {
            builder.push(SyncAction::VersionStamp { version });
        }
        Some(_) => {}
        None if policy.stamp == StampPolicy::Tag => {
            if !snapshot.is_degraded(ProbeKind::LatestTag) {
                builder.note("Version stamp skipped; no release tag found");
            }
        }
        None => {}
    }
}
