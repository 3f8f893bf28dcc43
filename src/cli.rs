//! CLI argument parsing and command dispatch

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use crate::commands::{self, Context};
use worksync::defaults;
use worksync::output::OutputConfig;

/// Workspace Sync - Keep an engine project in step with its team
#[derive(Parser, Debug)]
#[command(name = "worksync")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the base configuration document
    #[arg(
        short,
        long,
        global = true,
        value_name = "FILE",
        env = "WORKSYNC_CONFIG",
        default_value = defaults::DEFAULT_CONFIG_FILE
    )]
    config: PathBuf,

    /// Run in CI mode and apply the CI overlay (also enabled by the CI
    /// environment variable)
    #[arg(long, global = true)]
    ci: bool,

    /// Project descriptor to use instead of `project.name`
    #[arg(long, global = true, value_name = "PATH")]
    project: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "info")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Bring the workspace in line with the configured policy
    Sync(commands::sync::SyncArgs),

    /// Show what a sync would do without changing anything
    Plan(commands::plan::PlanArgs),

    /// Print the engine or project version
    PrintVersion(commands::print_version::PrintVersionArgs),

    /// Increase the project version and write it back
    Bump(commands::bump::BumpArgs),

    /// Validate the configuration documents
    Validate(commands::validate::ValidateArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<()> {
        init_logging(&self.log_level);

        let context = Context {
            config_path: self.config,
            ci: self.ci || defaults::ci_mode_from_env(),
            project: self.project,
            out: OutputConfig::from_env_and_flag(&self.color),
        };

        match self.command {
            Commands::Sync(args) => commands::sync::execute(args, &context),
            Commands::Plan(args) => commands::plan::execute(args, &context),
            Commands::PrintVersion(args) => commands::print_version::execute(args, &context),
            Commands::Bump(args) => commands::bump::execute(args, &context),
            Commands::Validate(args) => commands::validate::execute(args, &context),
            Commands::Completions(args) => commands::completions::execute(args),
        }
    }
}

/// Initialises `env_logger` at `level`; `RUST_LOG` still wins when set.
fn init_logging(level: &str) {
    let filter = match level.to_ascii_lowercase().as_str() {
        "error" => log::LevelFilter::Error,
        "warn" => log::LevelFilter::Warn,
        "debug" => log::LevelFilter::Debug,
        "trace" => log::LevelFilter::Trace,
        "off" => log::LevelFilter::Off,
        _ => log::LevelFilter::Info,
    };

    let _ = env_logger::Builder::new()
        .filter_level(filter)
        .parse_default_env()
        .format_timestamp(None)
        .format_target(false)
        .try_init();
}
