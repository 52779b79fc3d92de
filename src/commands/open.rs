//! # Open Command Implementation
//!
//! This module implements the `open` subcommand, which puts a module under
//! development.
//!
//! ## Functionality
//!
//! - **Validation**: The module must be in the configured `modules` list and
//!   in the upstream SDK manifest.
//! - **Checkout**: A missing checkout is cloned into the checkout directory,
//!   from the module's `url` override or from its git source. An existing
//!   checkout is fetched; being offline is not an error.
//! - **State**: The module is added to the open modules, so the next build
//!   builds it from its checkout.
//!
//! Opening a module that is already open does nothing.

use anyhow::Result;
use clap::Args;

use devsdk::checkout::{self, CheckoutOutcome};
use devsdk::error::Error;
use devsdk::git::FetchOutcome;
use devsdk::manifest::Manifest;
use devsdk::output;
use devsdk::state::StateStore;
use devsdk::suggestions;

use crate::cli::Context;

/// Open a module for development
#[derive(Args, Debug)]
pub struct OpenArgs {
    /// Module to open
    pub module: String,
}

/// Execute the `open` command.
pub fn execute(args: OpenArgs, ctx: &Context) -> Result<()> {
    let config = &ctx.config;
    let name = args.module.as_str();

    if !config.is_allowed(name) {
        return Err(suggestions::unknown_module(name, &config.modules));
    }

    let store = StateStore::for_config(config);
    if store.load()?.contains(name) {
        println!("{} is already open for development", name);
        return Ok(());
    }

    let source_path = config.source_manifest_path();
    if !source_path.exists() {
        return Err(suggestions::source_manifest_missing(&source_path));
    }
    let source = Manifest::load(&source_path)?;
    let module = source.module(name).ok_or_else(|| Error::ModuleNotFound {
        module: name.to_string(),
        manifest: source_path.display().to_string(),
    })?;

    match checkout::ensure_checkout(&ctx.git, config, module)? {
        CheckoutOutcome::Cloned { url } => {
            println!("Cloned {} into {}", url, config.checkout_path(name).display());
        }
        CheckoutOutcome::Existing(FetchOutcome::Offline(_)) => {
            println!(
                "{}",
                output::warning(&ctx.output, &format!("Could not fetch {}, continuing offline", name))
            );
        }
        CheckoutOutcome::Existing(FetchOutcome::Fetched) => {}
    }

    store.open(name)?;
    println!(
        "{}",
        output::success(&ctx.output, &format!("Opened {} for development", name))
    );
    Ok(())
}
