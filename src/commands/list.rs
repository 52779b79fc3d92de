//! # List Command Implementation
//!
//! This module implements the `list` subcommand, which prints the modules
//! available for development in configured order. Open modules are marked
//! with `*`.

use anyhow::Result;
use clap::Args;

use devsdk::output;
use devsdk::state::StateStore;

use crate::cli::Context;

/// List the modules available for development
#[derive(Args, Debug)]
pub struct ListArgs {}

/// Execute the `list` command.
pub fn execute(_args: ListArgs, ctx: &Context) -> Result<()> {
    let open = StateStore::for_config(&ctx.config).load()?;
    for module in &ctx.config.modules {
        println!(
            "{}",
            output::module_line(&ctx.output, module, open.contains(module))
        );
    }
    Ok(())
}
