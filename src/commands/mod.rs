//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `worksync`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`Context`] built from the global flags, and performs the command's logic.
//!
//! The `execute` function is the main entry point for the command and is
//! responsible for orchestrating the necessary operations, calling into the
//! `worksync` library to perform the core logic.

pub mod bump;
pub mod completions;
pub mod plan;
pub mod print_version;
pub mod sync;
pub mod validate;

use anyhow::{Context as _, Result};
use clap::ValueEnum;
use dialoguer::{theme::ColorfulTheme, Select};
use std::path::PathBuf;

use worksync::config::ConfigStack;
use worksync::error::Error;
use worksync::output::OutputConfig;
use worksync::workspace::WorkspaceLayout;
use worksync::SyncOptions;

/// Report formats for commands that print a plan or result.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum ReportFormat {
    /// Human readable text
    #[default]
    Text,
    /// Machine readable JSON on stdout
    Json,
}

/// State derived from the global flags, shared by every command.
#[derive(Debug, Clone)]
pub struct Context {
    pub config_path: PathBuf,
    pub ci: bool,
    pub project: Option<PathBuf>,
    pub out: OutputConfig,
}

impl Context {
    /// Loads the base document and its overlays.
    pub fn load_config(&self) -> Result<ConfigStack> {
        if !self.config_path.exists() {
            anyhow::bail!(
                "Configuration file not found: {}",
                self.config_path.display()
            );
        }
        ConfigStack::load(&self.config_path, self.ci).with_context(|| {
            format!(
                "Failed to load configuration from {}",
                self.config_path.display()
            )
        })
    }

    /// Resolves the project descriptor, prompting when several match and
    /// the terminal is interactive.
    pub fn resolve_layout(&self, config: &ConfigStack) -> Result<WorkspaceLayout> {
        let options = self.sync_options(false);
        match worksync::resolve_layout(config, &options) {
            Ok(layout) => Ok(layout),
            Err(Error::ProjectSelection { candidates }) if is_interactive() => {
                let labels: Vec<String> = candidates
                    .iter()
                    .map(|path| path.display().to_string())
                    .collect();
                let selection = Select::with_theme(&ColorfulTheme::default())
                    .with_prompt("Several projects found; which one should be used?")
                    .items(&labels)
                    .default(0)
                    .interact()?;
                Ok(WorkspaceLayout::with_descriptor(
                    config.root(),
                    candidates[selection].clone(),
                ))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Library options for this invocation.
    pub fn sync_options(&self, force: bool) -> SyncOptions {
        SyncOptions {
            force,
            descriptor: self.project.clone(),
        }
    }
}

fn is_interactive() -> bool {
    console::Term::stdout().is_term() && console::Term::stderr().is_term()
}
