//! Sync policy: the typed view of configuration the planner consumes.

use crate::config::ConfigStack;
use crate::error::{Error, Result};
use crate::tools::{Tool, ToolMatch, ToolRequirement};
use crate::version::StampPolicy;
use std::collections::BTreeMap;

/// Configured commands used by the default engine tooling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EngineCommands {
    /// Prints the installed engine version.
    pub version: Vec<String>,
    /// Switches the installed engine to `{version}`.
    pub switch: Vec<String>,
    /// Regenerates project files.
    pub regenerate: Vec<String>,
}

/// Everything the planner and executor need to know from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncPolicy {
    pub remote: String,
    pub expected_branches: Vec<String>,
    pub autosync: bool,
    /// Sync even when off an expected branch with autosync disabled.
    pub force: bool,
    pub autorebase: bool,
    pub fetch: bool,
    pub tool_match: ToolMatch,
    /// Managed tools only; unmanaged tools have no entry.
    pub tools: BTreeMap<Tool, ToolRequirement>,
    pub installers: BTreeMap<Tool, Vec<String>>,
    pub engine: EngineCommands,
    pub always_regenerate: bool,
    pub stamp: StampPolicy,
    pub support: Option<String>,
}

impl Default for SyncPolicy {
    fn default() -> Self {
        Self {
            remote: "origin".to_string(),
            expected_branches: vec!["main".to_string()],
            autosync: true,
            force: false,
            autorebase: false,
            fetch: true,
            tool_match: ToolMatch::Exact,
            tools: BTreeMap::new(),
            installers: BTreeMap::new(),
            engine: EngineCommands::default(),
            always_regenerate: false,
            stamp: StampPolicy::Off,
            support: None,
        }
    }
}

impl SyncPolicy {
    /// Builds the policy from a loaded configuration stack.
    pub fn from_config(config: &ConfigStack) -> Result<Self> {
        let tool_match_text = config.get_str("tools.match")?;
        let tool_match = ToolMatch::parse(tool_match_text).ok_or_else(|| Error::ConfigType {
            key: "tools.match".to_string(),
            expected: "one of exact, minimum, compat".to_string(),
            found: tool_match_text.to_string(),
        })?;

        let stamp_text = config.get_str("versioning.stamp")?;
        let stamp = StampPolicy::parse(stamp_text).ok_or_else(|| Error::ConfigType {
            key: "versioning.stamp".to_string(),
            expected: "one of off, commit, tag".to_string(),
            found: stamp_text.to_string(),
        })?;

        let mut tools = BTreeMap::new();
        let mut installers = BTreeMap::new();
        for tool in Tool::ALL {
            if let Some(requirement) = ToolRequirement::from_config(config.get_str(&tool.version_key())?) {
                tools.insert(tool, requirement);
            }
            let installer = config.get_list(&tool.installer_key())?;
            if !installer.is_empty() {
                installers.insert(tool, installer.to_vec());
            }
        }

        let support = config.get_str("msg.support")?.trim();

        Ok(Self {
            remote: config.get_str("git.remote")?.to_string(),
            expected_branches: config.get_list("git.expectedbranch")?.to_vec(),
            autosync: config.get_bool("sync.autosync")?,
            force: false,
            autorebase: config.get_bool("sync.autorebase")?,
            fetch: config.get_bool("sync.fetch")?,
            tool_match,
            tools,
            installers,
            engine: EngineCommands {
                version: config.get_list("engine.versioncommand")?.to_vec(),
                switch: config.get_list("engine.switchcommand")?.to_vec(),
                regenerate: config.get_list("engine.regencommand")?.to_vec(),
            },
            always_regenerate: config.get_bool("engine.alwaysregen")?,
            stamp,
            support: (!support.is_empty()).then(|| support.to_string()),
        })
    }

    /// Sets the `--force` override.
    pub fn with_force(mut self, force: bool) -> Self {
        self.force = force;
        self
    }

    /// Whether `branch` is one of the expected branches.
    pub fn is_expected_branch(&self, branch: &str) -> bool {
        self.expected_branches.iter().any(|b| b == branch)
    }
}
