//! Phase 1: Version Probe
//!
//! Captures the workspace's version signals into an immutable
//! [`VersionSnapshot`]. The VCS queries run in order (fetch must precede the
//! remote comparison) while engine and tool queries run concurrently beside
//! them. All results are collected first and classified afterwards:
//!
//! - a failed *required* query (branch, commit, dirty state, rebase state,
//!   declared engine) fails the capture with [`Error::ProbeFailure`];
//! - a failed *optional* query is recorded as a degraded probe and left to the
//!   planner.

use super::{DegradedProbe, History, ProbeKind, RemoteState, VersionSnapshot};
use crate::error::{Error, Result};
use crate::policy::SyncPolicy;
use crate::tools::Tool;
use crate::workspace::{Collaborators, EngineTooling, ToolInspector, VcsClient};
use rayon::prelude::*;
use std::collections::BTreeMap;

struct VcsReadings {
    branch: Result<String>,
    commit: Result<String>,
    dirty: Result<bool>,
    rebasing: Result<bool>,
    fetch: Option<Result<()>>,
    remote: Option<Result<Option<String>>>,
    ancestry: Option<Result<History>>,
    tag: Result<Option<String>>,
}

struct EngineReadings {
    declared: Result<Option<String>>,
    installed: Result<Option<String>>,
    project: Result<Option<String>>,
}

/// Captures a snapshot of every version signal.
pub fn capture(policy: &SyncPolicy, collaborators: Collaborators<'_>) -> Result<VersionSnapshot> {
    let (vcs, (engine, tools)) = rayon::join(
        || read_vcs(policy, collaborators.vcs),
        || {
            rayon::join(
                || read_engine(collaborators.engine),
                || read_tools(policy, collaborators.tools),
            )
        },
    );

    decide(vcs, engine, tools)
}

fn read_vcs(policy: &SyncPolicy, vcs: &dyn VcsClient) -> VcsReadings {
    let branch = vcs.current_branch();
    let commit = vcs.current_commit();
    let dirty = vcs.is_dirty();
    let rebasing = vcs.rebase_in_progress();
    let tag = vcs.latest_tag();

    let fetch = policy.fetch.then(|| vcs.fetch());

    let remote = match &branch {
        Ok(name) if name != "HEAD" => Some(vcs.remote_commit(name)),
        _ => None,
    };

    let ancestry = match (&commit, &remote) {
        (Ok(local), Some(Ok(Some(remote)))) => Some(compare_history(vcs, local, remote)),
        _ => None,
    };

    VcsReadings {
        branch,
        commit,
        dirty,
        rebasing,
        fetch,
        remote,
        ancestry,
        tag,
    }
}

fn compare_history(vcs: &dyn VcsClient, local: &str, remote: &str) -> Result<History> {
    if local == remote {
        return Ok(History::UpToDate);
    }
    if vcs.is_ancestor(local, remote)? {
        return Ok(History::Behind);
    }
    if vcs.is_ancestor(remote, local)? {
        return Ok(History::Ahead);
    }
    Ok(History::Diverged)
}

fn read_engine(engine: &dyn EngineTooling) -> EngineReadings {
    let (declared, (installed, project)) = rayon::join(
        || engine.declared_version(),
        || rayon::join(|| engine.installed_version(), || engine.project_version()),
    );
    EngineReadings {
        declared,
        installed,
        project,
    }
}

fn read_tools(policy: &SyncPolicy, tools: &dyn ToolInspector) -> Vec<(Tool, Result<Option<String>>)> {
    let managed: Vec<Tool> = policy.tools.keys().copied().collect();
    managed
        .into_par_iter()
        .map(|tool| (tool, tools.installed_version(tool)))
        .collect()
}

fn required<T>(probe: &str, reading: Result<T>) -> Result<T> {
    reading.map_err(|e| Error::ProbeFailure {
        probe: probe.to_string(),
        message: e.to_string(),
    })
}

fn optional<T>(probe: ProbeKind, reading: Result<T>, degraded: &mut Vec<DegradedProbe>) -> Option<T> {
    match reading {
        Ok(value) => Some(value),
        Err(e) => {
            log::warn!("Could not determine {}: {}", probe, e);
            degraded.push(DegradedProbe {
                probe,
                message: e.to_string(),
            });
            None
        }
    }
}

fn decide(
    vcs: VcsReadings,
    engine: EngineReadings,
    tools: Vec<(Tool, Result<Option<String>>)>,
) -> Result<VersionSnapshot> {
    let local_branch = required("current branch", vcs.branch)?;
    let local_commit = required("current commit", vcs.commit)?;
    let is_dirty = required("dirty state", vcs.dirty)?;
    let rebase_in_progress = required("rebase state", vcs.rebasing)?;
    let declared_engine_version = required("declared engine version", engine.declared)?;

    let mut degraded = Vec::new();

    if let Some(fetch) = vcs.fetch {
        optional(ProbeKind::Fetch, fetch, &mut degraded);
    }

    // Detached HEAD has no remote branch; the planner reports it
    let remote = match vcs.remote {
        None => RemoteState::Unavailable,
        Some(reading) => match optional(ProbeKind::RemoteCommit, reading, &mut degraded) {
            Some(Some(commit)) => RemoteState::Commit(commit),
            Some(None) => RemoteState::Missing,
            None => RemoteState::Unavailable,
        },
    };

    let history = vcs
        .ancestry
        .and_then(|reading| optional(ProbeKind::Ancestry, reading, &mut degraded));

    // Probing the installed engine is pointless for an unmanaged engine
    let installed_engine_version = if declared_engine_version.is_some() {
        optional(ProbeKind::InstalledEngine, engine.installed, &mut degraded).flatten()
    } else {
        engine.installed.ok().flatten()
    };
    let project_version =
        optional(ProbeKind::ProjectVersion, engine.project, &mut degraded).flatten();
    let latest_tag = optional(ProbeKind::LatestTag, vcs.tag, &mut degraded).flatten();

    let mut tool_versions = BTreeMap::new();
    for (tool, reading) in tools {
        if let Some(version) = optional(ProbeKind::Tool(tool), reading, &mut degraded) {
            tool_versions.insert(tool, version);
        }
    }

    degraded.sort_by_key(|d| d.probe);

    Ok(VersionSnapshot {
        local_branch,
        local_commit,
        remote,
        history,
        is_dirty,
        rebase_in_progress,
        declared_engine_version,
        installed_engine_version,
        project_version,
        latest_tag,
        tool_versions,
        degraded,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tools::ToolRequirement;
    use crate::workspace::mock::{MockEngine, MockTools, MockVcs};

    fn collaborators<'a>(
        vcs: &'a MockVcs,
        engine: &'a MockEngine,
        tools: &'a MockTools,
    ) -> Collaborators<'a> {
        Collaborators { vcs, engine, tools }
    }

    fn engine(declared: &str, installed: &str) -> MockEngine {
        MockEngine {
            declared: Some(declared.to_string()),
            installed: Some(installed.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_capture_synced_workspace() {
        let vcs = MockVcs::synced("abc123");
        let engine = engine("5.3", "5.3");
        let tools = MockTools::default();

        let snapshot =
            capture(&SyncPolicy::default(), collaborators(&vcs, &engine, &tools)).unwrap();

        assert_eq!(snapshot.local_branch, "main");
        assert_eq!(snapshot.remote, RemoteState::Commit("abc123".to_string()));
        assert_eq!(snapshot.history, Some(History::UpToDate));
        assert_eq!(snapshot.declared_engine_version.as_deref(), Some("5.3"));
        assert!(snapshot.degraded.is_empty());
    }

    #[test]
    fn test_each_query_runs_once() {
        let vcs = MockVcs::synced("abc123");
        let engine = engine("5.3", "5.3");
        let tools = MockTools::with(Tool::GitLfs, "3.4.0");
        let mut policy = SyncPolicy::default();
        policy
            .tools
            .insert(Tool::GitLfs, ToolRequirement::Version("3.4".to_string()));

        capture(&policy, collaborators(&vcs, &engine, &tools)).unwrap();

        let mut calls = vcs.calls();
        calls.sort();
        let mut deduped = calls.clone();
        deduped.dedup();
        assert_eq!(calls, deduped);
        assert_eq!(engine.calls().len(), 3);
        assert_eq!(tools.calls(), vec!["installed_version git-lfs"]);
    }

    #[test]
    fn test_behind_ahead_diverged() {
        let behind = MockVcs {
            remote: Some("remote".to_string()),
            ancestry: vec![("local".to_string(), "remote".to_string())],
            ..MockVcs::synced("local")
        };
        let ahead = MockVcs {
            remote: Some("remote".to_string()),
            ancestry: vec![("remote".to_string(), "local".to_string())],
            ..MockVcs::synced("local")
        };
        let diverged = MockVcs {
            remote: Some("remote".to_string()),
            ..MockVcs::synced("local")
        };
        let engine = MockEngine::default();
        let tools = MockTools::default();
        let policy = SyncPolicy::default();

        for (vcs, expected) in [
            (behind, History::Behind),
            (ahead, History::Ahead),
            (diverged, History::Diverged),
        ] {
            let snapshot = capture(&policy, collaborators(&vcs, &engine, &tools)).unwrap();
            assert_eq!(snapshot.history, Some(expected));
        }
    }

    #[test]
    fn test_unreachable_remote_is_degraded() {
        let vcs = MockVcs {
            remote_unreachable: true,
            ..MockVcs::synced("abc")
        };
        let engine = MockEngine::default();
        let tools = MockTools::default();

        let snapshot =
            capture(&SyncPolicy::default(), collaborators(&vcs, &engine, &tools)).unwrap();

        assert_eq!(snapshot.remote, RemoteState::Unavailable);
        assert_eq!(snapshot.history, None);
        assert!(snapshot.is_degraded(ProbeKind::Fetch));
        assert!(snapshot.is_degraded(ProbeKind::RemoteCommit));
    }

    #[test]
    fn test_fetch_skipped_when_disabled() {
        let vcs = MockVcs::synced("abc");
        let engine = MockEngine::default();
        let tools = MockTools::default();
        let policy = SyncPolicy {
            fetch: false,
            ..SyncPolicy::default()
        };

        capture(&policy, collaborators(&vcs, &engine, &tools)).unwrap();
        assert!(!vcs.calls().contains(&"fetch".to_string()));
    }

    #[test]
    fn test_detached_head_skips_remote() {
        let vcs = MockVcs {
            branch: "HEAD".to_string(),
            ..MockVcs::synced("abc")
        };
        let engine = MockEngine::default();
        let tools = MockTools::default();

        let snapshot =
            capture(&SyncPolicy::default(), collaborators(&vcs, &engine, &tools)).unwrap();
        assert!(snapshot.is_detached());
        assert_eq!(snapshot.remote, RemoteState::Unavailable);
        assert!(snapshot.degraded.is_empty());
        assert!(!vcs.calls().iter().any(|c| c.starts_with("remote_commit")));
    }

    #[test]
    fn test_installed_engine_failure_is_degraded_only_when_managed() {
        let vcs = MockVcs::synced("abc");
        let tools = MockTools::default();

        let managed = MockEngine {
            declared: Some("5.3".to_string()),
            installed_fails: true,
            ..Default::default()
        };
        let snapshot =
            capture(&SyncPolicy::default(), collaborators(&vcs, &managed, &tools)).unwrap();
        assert!(snapshot.is_degraded(ProbeKind::InstalledEngine));

        let unmanaged = MockEngine {
            installed_fails: true,
            ..Default::default()
        };
        let snapshot =
            capture(&SyncPolicy::default(), collaborators(&vcs, &unmanaged, &tools)).unwrap();
        assert!(!snapshot.is_degraded(ProbeKind::InstalledEngine));
    }

    #[test]
    fn test_missing_tool_is_recorded_as_not_installed() {
        let vcs = MockVcs::synced("abc");
        let engine = MockEngine::default();
        let tools = MockTools::default();
        let mut policy = SyncPolicy::default();
        policy.tools.insert(Tool::GitLfs, ToolRequirement::Any);

        let snapshot = capture(&policy, collaborators(&vcs, &engine, &tools)).unwrap();
        assert_eq!(snapshot.tool_versions.get(&Tool::GitLfs), Some(&None));
    }

    struct BrokenVcs;

    impl VcsClient for BrokenVcs {
        fn current_branch(&self) -> Result<String> {
            Err(Error::GitCommand {
                command: "rev-parse --abbrev-ref HEAD".to_string(),
                stderr: "not a git repository".to_string(),
            })
        }
        fn current_commit(&self) -> Result<String> {
            Ok("abc".to_string())
        }
        fn remote_commit(&self, _branch: &str) -> Result<Option<String>> {
            Ok(None)
        }
        fn is_dirty(&self) -> Result<bool> {
            Ok(false)
        }
        fn is_ancestor(&self, _a: &str, _d: &str) -> Result<bool> {
            Ok(false)
        }
        fn rebase_in_progress(&self) -> Result<bool> {
            Ok(false)
        }
        fn latest_tag(&self) -> Result<Option<String>> {
            Ok(None)
        }
        fn fetch(&self) -> Result<()> {
            Ok(())
        }
        fn fast_forward(&self, _commit: &str) -> Result<()> {
            Ok(())
        }
        fn rebase(&self, _onto: &str) -> Result<crate::workspace::RebaseOutcome> {
            Ok(crate::workspace::RebaseOutcome::Success)
        }
        fn abort_rebase(&self) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_required_probe_failure_is_fatal() {
        let engine = MockEngine::default();
        let tools = MockTools::default();
        let result = capture(
            &SyncPolicy::default(),
            Collaborators {
                vcs: &BrokenVcs,
                engine: &engine,
                tools: &tools,
            },
        );

        match result {
            Err(e @ Error::ProbeFailure { .. }) => {
                assert!(e.is_fatal());
                assert!(e.to_string().contains("current branch"));
            }
            other => panic!("expected ProbeFailure, got {:?}", other),
        }
    }
}
