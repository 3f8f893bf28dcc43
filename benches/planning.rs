//! Benchmarks for reconciliation planning.
//!
//! Planning is pure; these benchmarks measure it for a workspace that is
//! already in sync, one that needs every category of action, and one with
//! many managed tools.

use criterion::{black_box, criterion_group, criterion_main, Criterion};
use std::collections::BTreeMap;
use worksync::phases::planner::plan;
use worksync::phases::{History, RemoteState, VersionSnapshot};
use worksync::policy::SyncPolicy;
use worksync::tools::{Tool, ToolMatch, ToolRequirement};
use worksync::version::StampPolicy;

fn synced_snapshot() -> VersionSnapshot {
    VersionSnapshot {
        local_branch: "main".to_string(),
        local_commit: "3f9a2c1d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39".to_string(),
        remote: RemoteState::Commit("3f9a2c1d8e7b6a5f4e3d2c1b0a9f8e7d6c5b4a39".to_string()),
        history: Some(History::UpToDate),
        is_dirty: false,
        rebase_in_progress: false,
        declared_engine_version: Some("5.3".to_string()),
        installed_engine_version: Some("5.3".to_string()),
        project_version: Some("1.2.0+3f9a2c1".to_string()),
        latest_tag: Some("v1.2.0".to_string()),
        tool_versions: BTreeMap::new(),
        degraded: Vec::new(),
    }
}

fn stale_snapshot() -> VersionSnapshot {
    let mut tool_versions = BTreeMap::new();
    tool_versions.insert(Tool::Git, Some("2.40.1".to_string()));
    tool_versions.insert(Tool::GitLfs, Some("3.2.0".to_string()));
    tool_versions.insert(Tool::GitCredentialManager, None);

    VersionSnapshot {
        remote: RemoteState::Commit("9e8d7c6b5a4f3e2d1c0b9a8f7e6d5c4b3a2f1e0d".to_string()),
        history: Some(History::Behind),
        installed_engine_version: Some("5.2".to_string()),
        tool_versions,
        ..synced_snapshot()
    }
}

fn policy() -> SyncPolicy {
    let mut policy = SyncPolicy {
        stamp: StampPolicy::Commit,
        tool_match: ToolMatch::Minimum,
        ..SyncPolicy::default()
    };
    policy
        .tools
        .insert(Tool::Git, ToolRequirement::Version("2.44".to_string()));
    policy
        .tools
        .insert(Tool::GitLfs, ToolRequirement::Version("3.4".to_string()));
    policy
        .tools
        .insert(Tool::GitCredentialManager, ToolRequirement::Any);
    policy
}

fn bench_planning(c: &mut Criterion) {
    let mut group = c.benchmark_group("planning");
    let policy = policy();

    let synced = synced_snapshot();
    group.bench_function("in_sync", |b| {
        b.iter(|| plan(black_box(&synced), black_box(&SyncPolicy::default())))
    });

    let stale = stale_snapshot();
    group.bench_function("every_category", |b| {
        b.iter(|| plan(black_box(&stale), black_box(&policy)))
    });

    let mut diverged = stale_snapshot();
    diverged.history = Some(History::Diverged);
    group.bench_function("diverged", |b| {
        b.iter(|| plan(black_box(&diverged), black_box(&policy)))
    });

    group.finish();
}

criterion_group!(benches, bench_planning);
criterion_main!(benches);
