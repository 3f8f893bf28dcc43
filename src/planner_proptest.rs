//! Property-based tests for the reconciliation planner.
//!
//! These tests use proptest to generate random snapshots and policies and
//! verify that the planner's ordering and safety invariants hold for all of
//! them.

#[cfg(test)]
mod proptest_tests {
    use crate::error::Error;
    use crate::phases::planner::plan;
    use crate::phases::{History, RemoteState, SyncAction, VersionSnapshot};
    use crate::policy::SyncPolicy;
    use crate::tools::{Tool, ToolMatch, ToolRequirement};
    use crate::version::StampPolicy;
    use proptest::prelude::*;
    use std::collections::BTreeMap;

    fn version() -> impl Strategy<Value = String> {
        (0u64..4, 0u64..4).prop_map(|(major, minor)| format!("{}.{}", major, minor))
    }

    fn history() -> impl Strategy<Value = Option<History>> {
        prop_oneof![
            Just(None),
            Just(Some(History::UpToDate)),
            Just(Some(History::Behind)),
            Just(Some(History::Ahead)),
            Just(Some(History::Diverged)),
        ]
    }

    fn snapshot() -> impl Strategy<Value = VersionSnapshot> {
        (
            history(),
            any::<bool>(),
            proptest::option::of(version()),
            proptest::option::of(version()),
            proptest::option::of(version()),
            proptest::option::of(version()),
        )
            .prop_map(|(history, is_dirty, declared, installed, lfs, tag)| {
                let mut tool_versions = BTreeMap::new();
                tool_versions.insert(Tool::GitLfs, lfs);
                VersionSnapshot {
                    local_branch: "main".to_string(),
                    local_commit: "1111111aaaa".to_string(),
                    remote: match history {
                        Some(History::UpToDate) => RemoteState::Commit("1111111aaaa".to_string()),
                        Some(_) => RemoteState::Commit("2222222bbbb".to_string()),
                        None => RemoteState::Missing,
                    },
                    history,
                    is_dirty,
                    rebase_in_progress: false,
                    declared_engine_version: declared,
                    installed_engine_version: installed,
                    project_version: Some("1.0.0".to_string()),
                    latest_tag: tag.map(|t| format!("v{}.0", t)),
                    tool_versions,
                    degraded: Vec::new(),
                }
            })
    }

    fn policy() -> impl Strategy<Value = SyncPolicy> {
        (
            any::<bool>(),
            any::<bool>(),
            version(),
            prop_oneof![
                Just(StampPolicy::Off),
                Just(StampPolicy::Commit),
                Just(StampPolicy::Tag)
            ],
            prop_oneof![
                Just(ToolMatch::Exact),
                Just(ToolMatch::Minimum),
                Just(ToolMatch::Compat)
            ],
        )
            .prop_map(|(autorebase, always_regenerate, lfs, stamp, tool_match)| {
                let mut policy = SyncPolicy {
                    autorebase,
                    always_regenerate,
                    stamp,
                    tool_match,
                    ..SyncPolicy::default()
                };
                policy
                    .tools
                    .insert(Tool::GitLfs, ToolRequirement::Version(lfs));
                policy
            })
    }

    proptest! {
        /// Property: planning is deterministic
        #[test]
        fn plan_is_deterministic(snap in snapshot(), policy in policy()) {
            let first = plan(&snap, &policy).map_err(|e| e.to_string());
            let second = plan(&snap, &policy).map_err(|e| e.to_string());
            prop_assert_eq!(first, second);
        }

        /// Property: actions are ordered by category
        #[test]
        fn plan_is_ordered_by_category(snap in snapshot(), policy in policy()) {
            if let Ok(plan) = plan(&snap, &policy) {
                let categories: Vec<_> = plan.actions.iter().map(|a| a.action.category()).collect();
                let mut sorted = categories.clone();
                sorted.sort();
                prop_assert_eq!(categories, sorted);
            }
        }

        /// Property: ENGINE_SWITCH is always followed by PROJECT_FILE_REGEN
        #[test]
        fn engine_switch_precedes_regen(snap in snapshot(), policy in policy()) {
            if let Ok(plan) = plan(&snap, &policy) {
                let actions = plan.action_list();
                if let Some(switch) = actions.iter().position(|a| matches!(a, SyncAction::EngineSwitch { .. })) {
                    let regen = actions.iter().position(|a| **a == SyncAction::ProjectFileRegen);
                    prop_assert!(matches!(regen, Some(regen) if regen > switch));
                }
            }
        }

        /// Property: no action appears twice
        #[test]
        fn plan_has_no_duplicates(snap in snapshot(), policy in policy()) {
            if let Ok(plan) = plan(&snap, &policy) {
                let actions = plan.action_list();
                for (i, action) in actions.iter().enumerate() {
                    prop_assert!(!actions[i + 1..].contains(action));
                }
            }
        }

        /// Property: a dirty, diverged workspace with auto-rebase never yields a plan
        #[test]
        fn dirty_diverged_autorebase_is_invalid(snap in snapshot(), policy in policy()) {
            let dirty_diverged = snap.is_dirty && snap.history == Some(History::Diverged);
            let result = plan(&snap, &policy);
            if dirty_diverged && policy.autorebase {
                prop_assert!(
                    matches!(result, Err(Error::PlanInvalid { .. })),
                    "expected PlanInvalid, got {:?}",
                    result
                );
            } else {
                prop_assert!(result.is_ok());
            }
        }

        /// Property: at most one branch action is planned
        #[test]
        fn at_most_one_branch_action(snap in snapshot(), policy in policy()) {
            if let Ok(plan) = plan(&snap, &policy) {
                let branch_actions = plan
                    .action_list()
                    .into_iter()
                    .filter(|a| a.category() == crate::phases::ActionCategory::Branch)
                    .count();
                prop_assert!(branch_actions <= 1);
            }
        }
    }
}
