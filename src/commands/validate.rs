//! # Validate Command Implementation
//!
//! This module implements the `validate` subcommand, which checks the
//! configuration documents without touching the workspace.
//!
//! ## Functionality
//!
//! - **Configuration Validation**: Loads the base document and its overlays
//!   and conforms them to the schema.
//! - **Policy Validation**: Checks enumerated values such as `tools.match`
//!   and `versioning.stamp`.
//! - **Project Validation**: Verifies that a project descriptor can be found
//!   and read.
//! - **Command Validation**: Warns about managed tools without an installer
//!   and a managed engine without engine commands.
//!
//! This command is a safe, read-only operation that does not modify any files.

use anyhow::Result;
use clap::Args;

use super::Context;
use worksync::engine;
use worksync::output::emoji;
use worksync::policy::SyncPolicy;

/// Validate the configuration documents
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Use strict validation (fail on warnings).
    #[arg(long)]
    pub strict: bool,
}

/// Execute the `validate` command.
pub fn execute(args: ValidateArgs, context: &Context) -> Result<()> {
    let out = &context.out;
    println!(
        "{} Validating configuration: {}",
        emoji(out, "🔍", "[SCAN]"),
        context.config_path.display()
    );

    let config = match context.load_config() {
        Ok(config) => {
            println!(
                "{} Configuration loaded successfully",
                emoji(out, "✅", "[OK]")
            );
            config
        }
        Err(e) => {
            println!(
                "{} Configuration loading failed: {:#}",
                emoji(out, "❌", "[ERR]"),
                e
            );
            return Err(e);
        }
    };

    println!("\n{} Configuration Summary:", emoji(out, "📊", "[INFO]"));
    for (layer, document) in config.layers() {
        println!(
            "   {} layer: {} ({} keys)",
            layer,
            document.path().display(),
            document.len()
        );
    }

    let mut has_warnings = false;

    let policy = match SyncPolicy::from_config(&config) {
        Ok(policy) => policy,
        Err(e) => {
            println!("{} Invalid policy: {}", emoji(out, "❌", "[ERR]"), e);
            return Err(e.into());
        }
    };

    println!("\n{} Checking project...", emoji(out, "🔍", "[SCAN]"));
    match context.resolve_layout(&config) {
        Ok(layout) => {
            println!(
                "{} Project descriptor: {}",
                emoji(out, "✅", "[OK]"),
                layout.descriptor.display()
            );
            match engine::declared_version(&layout.descriptor) {
                Ok(Some(version)) => {
                    println!("   Declared engine: {}", version);
                    if policy.engine.version.is_empty() || policy.engine.switch.is_empty() {
                        println!(
                            "{} The engine is managed but engine.versioncommand or engine.switchcommand is not set",
                            emoji(out, "⚠️", "[WARN]")
                        );
                        has_warnings = true;
                    }
                }
                Ok(None) => println!("   Declared engine: none (unmanaged)"),
                Err(e) => {
                    println!(
                        "{} Project descriptor is not readable: {}",
                        emoji(out, "❌", "[ERR]"),
                        e
                    );
                    return Err(e.into());
                }
            }
        }
        Err(e) => {
            println!("{} {:#}", emoji(out, "❌", "[ERR]"), e);
            return Err(e);
        }
    }

    println!("\n{} Checking tools...", emoji(out, "🔍", "[SCAN]"));
    if policy.tools.is_empty() {
        println!("   No managed tools");
    }
    for (tool, requirement) in &policy.tools {
        println!(
            "   {} ({} match): {}",
            tool,
            policy.tool_match,
            requirement.target().unwrap_or("any version")
        );
        if !policy.installers.contains_key(tool) {
            println!(
                "{} No installer configured for {}; TOOL_UPDATE would fail",
                emoji(out, "⚠️", "[WARN]"),
                tool
            );
            has_warnings = true;
        }
    }

    println!();
    if has_warnings && args.strict {
        println!(
            "{} Validation failed (strict mode)",
            emoji(out, "❌", "[ERR]")
        );
        anyhow::bail!("Validation produced warnings in strict mode");
    }
    if has_warnings {
        println!(
            "{} Configuration is valid, with warnings",
            emoji(out, "⚠️", "[WARN]")
        );
    } else {
        println!("{} Configuration is valid", emoji(out, "✅", "[OK]"));
    }
    Ok(())
}
