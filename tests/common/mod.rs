//! Shared test utilities for integration and E2E tests.
//!
//! This module provides common fixtures and helper functions to reduce
//! duplication across test files.
//!
//! ## Usage
//!
//! Add `mod common;` to your test file, then use the helpers:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//!
//! #[test]
//! fn test_example() {
//!     let fixture = TestFixture::new().with_minimal_config().with_project(None);
//!     // ... test code
//! }
//! ```

use assert_fs::prelude::*;
use std::env;
use std::path::Path;
use std::process::Command;

/// Re-export commonly used test dependencies for convenience.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    #[allow(unused_imports)]
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    #[allow(unused_imports)]
    pub use super::configs;
    #[allow(unused_imports)]
    pub use super::{git, init_git_repo, should_skip_git_tests};
    pub use super::TestFixture;
}

/// Common configuration YAML snippets for testing.
#[allow(dead_code)]
pub mod configs {
    /// Minimal valid configuration pointing at `Game.uproject`.
    pub const MINIMAL: &str = r#"
project:
  name: Game.uproject
"#;

    /// Configuration for a workspace without network access.
    pub const OFFLINE: &str = r#"
project:
  name: Game.uproject
sync:
  fetch: false
"#;

    /// Configuration with a managed tool that has no installer.
    pub const TOOL_WITHOUT_INSTALLER: &str = r#"
project:
  name: Game.uproject
tools:
  git-lfs:
    version: "3.4"
"#;

    /// Configuration with an unknown stamp policy.
    pub const BAD_STAMP: &str = r#"
project:
  name: Game.uproject
versioning:
  stamp: sometimes
"#;

    /// Invalid YAML for error testing.
    pub const INVALID_YAML: &str = "invalid: yaml: content:";

    /// Configuration without the required `project.name`.
    pub const MISSING_PROJECT: &str = r#"
git:
  remote: origin
"#;
}

/// Check if tests that need the `git` binary should be skipped.
///
/// Returns `true` if the `SKIP_GIT_TESTS` environment variable is set or
/// `git` cannot be run.
#[allow(dead_code)]
pub fn should_skip_git_tests() -> bool {
    if env::var("SKIP_GIT_TESTS").is_ok() {
        return true;
    }
    Command::new("git")
        .arg("--version")
        .output()
        .map(|output| !output.status.success())
        .unwrap_or(true)
}

/// Run git in `dir`, panicking with its stderr on failure, and return stdout.
#[allow(dead_code)]
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Initialize a git repository with `main` as the default branch and a test
/// identity, then commit everything already in `dir`.
#[allow(dead_code)]
pub fn init_git_repo(dir: &Path) {
    git(dir, &["init", "-q", "-b", "main"]);
    git(dir, &["config", "user.email", "test@example.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    // Disable commit signing for tests
    git(dir, &["config", "commit.gpgsign", "false"]);
    git(dir, &["add", "."]);
    git(dir, &["commit", "-q", "--allow-empty", "-m", "Initial commit"]);
}

/// A test fixture that provides a temporary directory with optional config.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new()
///     .with_config(configs::MINIMAL)
///     .with_project(Some("5.3"));
///
/// fixture.command().arg("validate").assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
}

#[allow(dead_code)]
impl TestFixture {
    /// Create a new test fixture with an empty temporary directory.
    pub fn new() -> Self {
        Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
        }
    }

    /// Add a `.worksync.yaml` configuration file with the given content.
    pub fn with_config(self, content: &str) -> Self {
        self.with_file(".worksync.yaml", content)
    }

    /// Add the minimal valid configuration.
    pub fn with_minimal_config(self) -> Self {
        self.with_config(configs::MINIMAL)
    }

    /// Add `Game.uproject`, declaring `engine` if given.
    pub fn with_project(self, engine: Option<&str>) -> Self {
        let descriptor = match engine {
            Some(version) => format!(
                "{{\n  \"FileVersion\": 3,\n  \"EngineAssociation\": \"{}\"\n}}\n",
                version
            ),
            None => "{\n  \"FileVersion\": 3\n}\n".to_string(),
        };
        self.with_file("Game.uproject", &descriptor)
    }

    /// Add a project settings file carrying `version`.
    pub fn with_project_version(self, version: &str) -> Self {
        let settings = format!(
            "[/Script/EngineSettings.GeneralProjectSettings]\nProjectID=0A1B2C\nProjectVersion={}\n",
            version
        );
        self.with_file("Config/DefaultGame.ini", &settings)
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join(".worksync.yaml")
    }

    /// Create a child path in the temp directory.
    pub fn child(&self, path: &str) -> assert_fs::fixture::ChildPath {
        self.temp_dir.child(path)
    }

    /// Create a command configured to run in this fixture's directory.
    ///
    /// `CI` is cleared so the host's CI environment does not leak into the
    /// run.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("worksync");
        cmd.current_dir(self.path()).env_remove("CI");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_with_config() {
        let fixture = TestFixture::new().with_minimal_config();
        assert!(fixture.config_path().exists());
    }

    #[test]
    fn test_fixture_with_project() {
        let fixture = TestFixture::new().with_project(Some("5.3"));
        let content = std::fs::read_to_string(fixture.path().join("Game.uproject")).unwrap();
        assert!(content.contains("\"EngineAssociation\": \"5.3\""));
    }

    #[test]
    fn test_configs_are_valid_yaml() {
        let configs = [
            configs::MINIMAL,
            configs::OFFLINE,
            configs::TOOL_WITHOUT_INSTALLER,
            configs::BAD_STAMP,
            configs::MISSING_PROJECT,
        ];

        for config in configs {
            serde_yaml::from_str::<serde_yaml::Value>(config).expect("Config should be valid YAML");
        }
    }

    #[test]
    fn test_invalid_yaml_is_actually_invalid() {
        let result = serde_yaml::from_str::<serde_yaml::Value>(configs::INVALID_YAML);
        assert!(result.is_err(), "INVALID_YAML should not parse");
    }
}
