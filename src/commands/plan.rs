//! # Plan Command Implementation
//!
//! Probes the workspace and prints the actions a sync would run, without
//! executing any of them. This command is a safe, read-only operation.

use anyhow::Result;
use clap::Args;

use super::{Context, ReportFormat};
use worksync::output::render_plan;
use worksync::phases::orchestrator::Orchestrator;
use worksync::policy::SyncPolicy;

/// Show what a sync would do without changing anything
#[derive(Args, Debug)]
pub struct PlanArgs {
    /// Plan as if `--force` were passed to sync
    #[arg(short, long)]
    pub force: bool,

    /// Output format
    #[arg(long, value_enum, default_value_t = ReportFormat::Text)]
    pub format: ReportFormat,
}

/// Execute the `plan` command.
pub fn execute(args: PlanArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let layout = context.resolve_layout(&config)?;
    let policy = SyncPolicy::from_config(&config)?.with_force(args.force);

    let (snapshot, plan) = Orchestrator::new(&layout, &policy).capture_and_plan(&policy)?;

    match args.format {
        ReportFormat::Text => print!("{}", render_plan(&context.out, &snapshot, &plan)),
        ReportFormat::Json => {
            let report = serde_json::json!({
                "snapshot": &snapshot,
                "plan": &plan,
            });
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }
    Ok(())
}
