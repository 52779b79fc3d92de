//! # Clean Cache Command Implementation
//!
//! This module implements the `clean-cache` subcommand, which deletes
//! flatpak-builder's download and build cache from the workdir.

use std::fs;

use anyhow::{Context as _, Result};
use clap::Args;

use devsdk::output;

use crate::cli::Context;

/// Clean the flatpak-builder cache
#[derive(Args, Debug)]
pub struct CleanCacheArgs {}

/// Execute the `clean-cache` command.
pub fn execute(_args: CleanCacheArgs, ctx: &Context) -> Result<()> {
    let cache_dir = ctx.config.builder_cache_dir();
    if !cache_dir.is_dir() {
        println!("Nothing to clean in {}", cache_dir.display());
        return Ok(());
    }

    fs::remove_dir_all(&cache_dir)
        .with_context(|| format!("Failed to remove {}", cache_dir.display()))?;
    println!(
        "{}",
        output::success(&ctx.output, &format!("Removed {}", cache_dir.display()))
    );
    Ok(())
}
