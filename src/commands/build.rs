//! # Build Command Implementation
//!
//! This module implements the `build` subcommand, which builds the
//! development runtime into the local ostree repository and installs it.
//!
//! ## Functionality
//!
//! - **Repository**: The local ostree repository is created on first use.
//! - **Build**: flatpak-builder runs over the development manifest with every
//!   open checkout on the working branch, exporting to the local repository.
//!   Nothing is exported when nothing changed.
//! - **Install**: After a successful build the local repository is registered
//!   as a flatpak remote and the development SDK and its debug extension are
//!   installed or updated from it.
//!
//! A failing build exits with flatpak-builder's own exit code.

use anyhow::Result;
use clap::Args;

use devsdk::builder::Builder;
use devsdk::output;
use devsdk::tools::{self, Flatpak, Ostree};

use crate::cli::Context;

/// Build the development runtime
#[derive(Args, Debug)]
pub struct BuildArgs {
    /// Only build; do not install the result with flatpak.
    #[arg(long)]
    pub no_install: bool,
}

/// Execute the `build` command.
pub fn execute(args: BuildArgs, ctx: &Context) -> Result<i32> {
    let config = &ctx.config;
    let repo = config.repo_dir();
    Ostree::new(config.tools.ostree.as_str()).ensure_repo(&repo)?;

    let extra_args = vec![
        "--require-changes".to_string(),
        "--repo".to_string(),
        repo.to_string_lossy().into_owned(),
    ];
    let code = Builder::new(config, &ctx.git).build(&extra_args, None)?;
    if code != 0 {
        log::warn!("flatpak-builder exited with code {}", code);
        return Ok(code);
    }

    if !args.no_install {
        tools::ensure_dev_sdk(&Flatpak::from_config(config), config)?;
    }
    println!(
        "{}",
        output::success(&ctx.output, &format!("Built {}", config.dev_sdk_id))
    );
    Ok(0)
}
