//! Phase 3: Sync Executor
//!
//! Runs a [`SyncPlan`] strictly in order through the collaborators. The
//! executor holds no reconciliation logic; it only maps each action to a
//! collaborator call and classifies failures:
//!
//! - A failure of a blocking action, or an error that is fatal on its own,
//!   trips the latch and halts the run. Every remaining action is reported
//!   as skipped.
//! - A failure of a non-blocking action is recorded in the latch as
//!   non-fatal and becomes a warning; execution continues.

use super::{ActionOutcome, ActionReport, SyncAction, SyncPlan, SyncResult};
use crate::error::{Error, Result};
use crate::latch::ErrorState;
use crate::workspace::{Collaborators, RebaseOutcome};

/// Executes `plan`, consulting `latch` before every action.
pub fn execute(plan: &SyncPlan, collaborators: Collaborators<'_>, latch: &mut ErrorState) -> SyncResult {
    let mut reports = Vec::with_capacity(plan.actions.len());
    let mut warnings = plan.notes.clone();

    for planned in &plan.actions {
        let action = &planned.action;

        if latch.is_fatal() {
            log::debug!("Skipping {} after fatal error", action);
            reports.push(ActionReport {
                action: action.clone(),
                outcome: ActionOutcome::SkippedDueToPriorFatal,
                message: None,
            });
            continue;
        }

        log::info!("Running {}", action);
        match run_action(action, collaborators) {
            Ok(()) => reports.push(ActionReport {
                action: action.clone(),
                outcome: ActionOutcome::Succeeded,
                message: None,
            }),
            Err(err) => {
                let fatal = planned.blocking || err.is_fatal();
                let message = err.to_string();
                latch.set_error(message.clone(), fatal);

                let outcome = if fatal {
                    log::error!("{}", message);
                    ActionOutcome::FailedFatal
                } else {
                    log::warn!("{}", message);
                    warnings.push(message.clone());
                    ActionOutcome::FailedNonFatal
                };

                reports.push(ActionReport {
                    action: action.clone(),
                    outcome,
                    message: Some(message),
                });
            }
        }
    }

    SyncResult {
        reports,
        warnings,
        fatal: latch.fatal_message().map(str::to_string),
        support: None,
    }
}

fn run_action(action: &SyncAction, collaborators: Collaborators<'_>) -> Result<()> {
    let outcome = match action {
        SyncAction::ToolUpdate { tool, version } => {
            collaborators.tools.update(*tool, version.as_deref())
        }
        SyncAction::BranchFastforward { target } => collaborators.vcs.fast_forward(target),
        SyncAction::BranchRebase { onto } => match collaborators.vcs.rebase(onto) {
            Ok(RebaseOutcome::Success) => Ok(()),
            Err(e) => Err(e),
            Ok(RebaseOutcome::Conflict { detail }) => {
                let restored = match collaborators.vcs.abort_rebase() {
                    Ok(()) => "the rebase was aborted and the branch restored".to_string(),
                    Err(e) => format!("aborting the rebase also failed: {}", e),
                };
                return Err(Error::ActionFailureFatal {
                    action: action.kind().to_string(),
                    message: format!("conflict while rebasing ({}); {}", detail, restored),
                });
            }
        },
        SyncAction::BranchConflictAbort { local, remote } => {
            return Err(Error::ActionFailureFatal {
                action: action.kind().to_string(),
                message: format!(
                    "local commit {} and remote commit {} have diverged; reconcile them manually or enable sync.autorebase",
                    local, remote
                ),
            });
        }
        SyncAction::EngineSwitch { version } => collaborators.engine.switch_to(version),
        SyncAction::ProjectFileRegen => collaborators.engine.regenerate_project_files(),
        SyncAction::VersionStamp { version } => collaborators.engine.stamp_project_version(version),
    };

    outcome.map_err(|e| {
        if e.is_fatal() {
            e
        } else {
            Error::ActionFailure {
                action: action.kind().to_string(),
                message: e.to_string(),
            }
        }
    })
}
