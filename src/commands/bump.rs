//! # Bump Command Implementation
//!
//! Increases the patch, minor or major component of the project version
//! stored in the project settings file and writes it back. A project without
//! a version starts from `0.0.0`.

use anyhow::Result;
use clap::Args;

use super::Context;
use worksync::engine;
use worksync::output::emoji;
use worksync::version::{bump_version, BumpKind};

/// Increase the project version and write it back
#[derive(Args, Debug)]
pub struct BumpArgs {
    /// Component to increase
    #[arg(value_enum)]
    pub kind: BumpKind,

    /// Print the new version without writing it
    #[arg(short = 'n', long)]
    pub dry_run: bool,
}

/// Execute the `bump` command.
pub fn execute(args: BumpArgs, context: &Context) -> Result<()> {
    let config = context.load_config()?;
    let layout = context.resolve_layout(&config)?;
    let settings = engine::project_settings_path(&layout.descriptor);

    let current = engine::read_project_version(&settings)?.unwrap_or_else(|| {
        log::info!("No project version in {}, starting from 0.0.0", settings.display());
        "0.0.0".to_string()
    });
    let next = bump_version(&current, args.kind)?;

    if args.dry_run {
        println!("{} -> {}", current, next);
        return Ok(());
    }

    engine::write_project_version(&settings, &next)?;
    println!(
        "{} Project version {} -> {}",
        emoji(&context.out, "✅", "[OK]"),
        current,
        next
    );
    Ok(())
}
