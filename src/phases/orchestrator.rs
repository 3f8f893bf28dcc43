//! Orchestrator for the complete sync operation
//!
//! This module coordinates the probe, plan, and execute phases and owns the
//! collaborators used by them. Every fatal condition, whether raised by a
//! phase or by an action, is routed through the run's [`ErrorState`] exactly
//! once and becomes the terminal [`SyncResult`].

use super::{executor, planner, probe, SyncPlan, SyncResult, VersionSnapshot};
use crate::error::{Error, Result};
use crate::latch::ErrorState;
use crate::policy::SyncPolicy;
use crate::workspace::{Collaborators, EngineTooling, ToolInspector, VcsClient, WorkspaceLayout};

/// Runs sync phases against a set of collaborators.
pub struct Orchestrator {
    vcs: Box<dyn VcsClient>,
    engine: Box<dyn EngineTooling>,
    tools: Box<dyn ToolInspector>,
}

impl Orchestrator {
    /// Creates an orchestrator with the default collaborators for `layout`.
    pub fn new(layout: &WorkspaceLayout, policy: &SyncPolicy) -> Self {
        let (vcs, engine, tools) = layout.default_collaborators(policy);
        Self {
            vcs: Box::new(vcs),
            engine: Box::new(engine),
            tools: Box::new(tools),
        }
    }

    /// Creates an orchestrator with custom collaborators.
    pub fn with_operations(
        vcs: Box<dyn VcsClient>,
        engine: Box<dyn EngineTooling>,
        tools: Box<dyn ToolInspector>,
    ) -> Self {
        Self { vcs, engine, tools }
    }

    fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            vcs: self.vcs.as_ref(),
            engine: self.engine.as_ref(),
            tools: self.tools.as_ref(),
        }
    }

    /// Captures a snapshot without planning.
    pub fn capture(&self, policy: &SyncPolicy) -> Result<VersionSnapshot> {
        probe::capture(policy, self.collaborators())
    }

    /// Probes and plans without executing anything.
    pub fn capture_and_plan(&self, policy: &SyncPolicy) -> Result<(VersionSnapshot, SyncPlan)> {
        let snapshot = self.capture(policy)?;
        let plan = planner::plan(&snapshot, policy)?;
        Ok((snapshot, plan))
    }

    /// Runs a complete sync: probe, plan, then execute.
    ///
    /// The latch is cleared first; this is the run boundary.
    pub fn run(&self, policy: &SyncPolicy, latch: &mut ErrorState) -> SyncResult {
        latch.clear();

        let mut result = match self.capture_and_plan(policy) {
            Ok((_, plan)) => {
                log::info!("Sync plan has {} action(s)", plan.actions.len());
                executor::execute(&plan, self.collaborators(), latch)
            }
            Err(err) => aborted(err, latch),
        };

        result.support = policy.support.clone();
        result
    }
}

/// Records `err` as the run's fatal condition and builds the terminal result.
pub fn aborted(err: Error, latch: &mut ErrorState) -> SyncResult {
    let message = err.to_string();
    log::error!("{}", message);
    latch.set_error(message, true);
    SyncResult {
        reports: Vec::new(),
        warnings: Vec::new(),
        fatal: latch.fatal_message().map(str::to_string),
        support: None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::phases::{ActionOutcome, SyncStatus};
    use crate::workspace::mock::{MockEngine, MockTools, MockVcs};

    fn orchestrator(vcs: MockVcs, engine: MockEngine) -> Orchestrator {
        Orchestrator::with_operations(
            Box::new(vcs),
            Box::new(engine),
            Box::new(MockTools::default()),
        )
    }

    #[test]
    fn test_run_engine_mismatch() {
        let orchestrator = orchestrator(
            MockVcs::synced("abc"),
            MockEngine {
                declared: Some("5.3".into()),
                installed: Some("5.2".into()),
                ..Default::default()
            },
        );
        let mut latch = ErrorState::new();

        let result = orchestrator.run(&SyncPolicy::default(), &mut latch);

        assert_eq!(result.status(), SyncStatus::Succeeded);
        assert_eq!(result.reports.len(), 2);
        assert_eq!(result.with_outcome(ActionOutcome::Succeeded).count(), 2);
    }

    #[test]
    fn test_run_plan_invalid_is_fatal_without_actions() {
        let orchestrator = orchestrator(
            MockVcs {
                rebasing: true,
                ..MockVcs::synced("abc")
            },
            MockEngine::default(),
        );
        let mut latch = ErrorState::new();

        let result = orchestrator.run(&SyncPolicy::default(), &mut latch);

        assert_eq!(result.status(), SyncStatus::Failed);
        assert!(result.reports.is_empty());
        assert!(result.fatal.as_deref().unwrap().contains("rebase"));
        assert!(latch.is_fatal());
        assert_eq!(latch.history().len(), 1);
    }

    #[test]
    fn test_run_clears_previous_latch() {
        let orchestrator = orchestrator(MockVcs::synced("abc"), MockEngine::default());
        let mut latch = ErrorState::new();
        latch.set_error("left over from last run", true);

        let result = orchestrator.run(&SyncPolicy::default(), &mut latch);

        assert_eq!(result.status(), SyncStatus::Succeeded);
        assert!(!latch.is_error());
    }

    #[test]
    fn test_run_attaches_support_channel() {
        let orchestrator = orchestrator(
            MockVcs {
                rebasing: true,
                ..MockVcs::synced("abc")
            },
            MockEngine::default(),
        );
        let policy = SyncPolicy {
            support: Some("#build-help".into()),
            ..SyncPolicy::default()
        };

        let result = orchestrator.run(&policy, &mut ErrorState::new());
        assert_eq!(result.support.as_deref(), Some("#build-help"));
    }

    #[test]
    fn test_capture_and_plan_executes_nothing() {
        let engine = MockEngine {
            declared: Some("5.3".into()),
            installed: Some("5.2".into()),
            ..Default::default()
        };
        let orchestrator = orchestrator(MockVcs::synced("abc"), engine);

        let (snapshot, plan) = orchestrator.capture_and_plan(&SyncPolicy::default()).unwrap();
        assert_eq!(snapshot.installed_engine_version.as_deref(), Some("5.2"));
        assert_eq!(plan.actions.len(), 2);
    }
}
