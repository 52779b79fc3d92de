//! # Update Command Implementation
//!
//! This module implements the `update` subcommand, which brings the base SDK
//! and every git checkout up to date.
//!
//! ## Functionality
//!
//! - **Base SDK**: The upstream SDK remote is registered if needed, and the
//!   SDK with its debug and locale extensions is installed or updated.
//! - **Checkouts**: Every git checkout in the checkout directory that has a
//!   remote is fetched. A failed fetch is reported and the loop moves on;
//!   the command fails at the end if any fetch failed.
//!
//! Checkouts are only fetched, never merged or rebased.

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};

use devsdk::checkout::{self, UpdateStatus};
use devsdk::output;
use devsdk::suggestions;
use devsdk::tools::{self, Flatpak};

use crate::cli::Context;

/// Update the base SDK and every git checkout
#[derive(Args, Debug)]
pub struct UpdateArgs {
    /// Only fetch the git checkouts; leave the installed SDK alone.
    #[arg(long)]
    pub checkouts_only: bool,
}

/// Execute the `update` command.
pub fn execute(args: UpdateArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    if !args.checkouts_only {
        tools::ensure_base_sdk(&Flatpak::from_config(config), config)?;
    }

    let checkouts = checkout::git_checkouts(&config.checkoutdir);
    let bar = ProgressBar::new(checkouts.len() as u64);
    if let Ok(style) = ProgressStyle::with_template("{spinner} [{pos}/{len}] Fetching {msg}") {
        bar.set_style(style);
    }

    let mut failed = Vec::new();
    for path in &checkouts {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        bar.set_message(name.clone());

        match checkout::update_checkout(&ctx.git, path) {
            UpdateStatus::Fetched => log::info!("Fetched {}", name),
            UpdateStatus::NoRemote => log::debug!("{} has no remote, skipping", name),
            UpdateStatus::Failed(reason) => {
                bar.suspend(|| {
                    println!(
                        "{}",
                        output::warning(&ctx.output, &format!("Error updating {}: {}", name, reason))
                    )
                });
                failed.push(name);
            }
        }
        bar.inc(1);
    }
    bar.finish_and_clear();

    if !failed.is_empty() {
        return Err(suggestions::update_failed(&failed));
    }
    println!(
        "{}",
        output::success(&ctx.output, &format!("Updated {} checkouts", checkouts.len()))
    );
    Ok(())
}
