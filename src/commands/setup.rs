//! # Setup Command Implementation
//!
//! This module implements the `setup` subcommand, run once before using
//! devsdk: it clones the upstream SDK repository that holds the manifest,
//! creates the local ostree repository, and installs the base SDK along with
//! any runtimes listed in `add_extensions`.
//!
//! Running it again switches the upstream checkout back to the configured
//! branch and updates the SDK.

use anyhow::Result;
use clap::Args;

use devsdk::checkout;
use devsdk::output;
use devsdk::tools::{self, Flatpak, Ostree};

use crate::cli::Context;

/// Get set up to use devsdk for the first time
#[derive(Args, Debug)]
pub struct SetupArgs {
    /// Only prepare the checkout and repository; do not install the base SDK
    /// or extensions.
    #[arg(long)]
    pub no_install: bool,
}

/// Execute the `setup` command.
pub fn execute(args: SetupArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let upstream = checkout::ensure_upstream_checkout(&ctx.git, config)?;
    println!("SDK manifest: {}", upstream.join(&config.sdk_manifest_json).display());

    Ostree::new(config.tools.ostree.as_str()).ensure_repo(&config.repo_dir())?;
    if !args.no_install {
        let flatpak = Flatpak::from_config(config);
        tools::ensure_base_sdk(&flatpak, config)?;
        tools::ensure_add_extensions(&flatpak, config)?;
    }

    println!(
        "{}",
        output::success(&ctx.output, &format!("Ready to develop {}", config.sdk_id))
    );
    Ok(())
}
