//! # Sync Command Implementation
//!
//! This module implements the `sync` subcommand: probe the workspace, plan
//! the corrective actions, and execute them in order. The command exits
//! non-zero when the run ends in a fatal condition.

use anyhow::Result;
use clap::Args;

use super::{Context, ReportFormat};
use worksync::latch::ErrorState;
use worksync::output::{emoji, render_result};
use worksync::phases::SyncStatus;
use worksync::SyncOptions;

/// Bring the workspace in line with the configured policy
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Sync even when the current branch is not an expected branch
    #[arg(short, long)]
    pub force: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Execute the `sync` command.
pub fn execute(args: SyncArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let layout = context.resolve_layout(&config)?;

    if args.format == ReportFormat::Text {
        println!(
            "{} Syncing {}",
            emoji(&context.out, "🔄", "[SYNC]"),
            layout.descriptor.display()
        );
    }

    let options = SyncOptions {
        force: args.force,
        descriptor: Some(layout.descriptor),
    };
    let mut latch = ErrorState::new();
    let result = worksync::run_sync_with(&config, &options, &mut latch);

    match args.format {
        ReportFormat::Text => print!("{}", render_result(&context.out, &result)),
        ReportFormat::Json => {
            let report = serde_json::json!({
                "status": result.status(),
                "result": &result,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    if result.status() == SyncStatus::Failed {
        anyhow::bail!(
            "Sync failed: {}",
            result.fatal.as_deref().unwrap_or("unknown error")
        );
    }
    Ok(())
}
