//! # Close Command Implementation
//!
//! This module implements the `close` subcommand. The module is removed from
//! the open modules, so the next build takes it from the upstream SDK again.
//! Its checkout is left alone.

use anyhow::Result;
use clap::Args;

use devsdk::output;
use devsdk::state::StateStore;

use crate::cli::Context;

/// Close development on a module
#[derive(Args, Debug)]
pub struct CloseArgs {
    /// Module to close
    pub module: String,
}

/// Execute the `close` command.
///
/// Fails if the module is not open, without touching the state file.
pub fn execute(args: CloseArgs, ctx: &Context) -> Result<()> {
    StateStore::for_config(&ctx.config).close(&args.module)?;
    println!(
        "{}",
        output::success(&ctx.output, &format!("Closed {}", args.module))
    );
    Ok(())
}
