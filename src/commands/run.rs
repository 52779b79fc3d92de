//! # Run Command Implementation
//!
//! This module implements the `run` subcommand, which runs an installed app
//! against the development runtime instead of its usual one.

use anyhow::Result;
use clap::Args;

use devsdk::config::Config;
use devsdk::tools::Flatpak;

use crate::cli::Context;

/// Run an app against the development runtime
#[derive(Args, Debug)]
pub struct RunArgs {
    /// ID of app to run
    pub app: String,

    /// Command-line options to pass to app
    #[arg(trailing_var_arg = true, allow_hyphen_values = true)]
    pub options: Vec<String>,
}

/// Arguments to `flatpak run` for `args`.
pub fn run_args(config: &Config, args: &RunArgs) -> Vec<String> {
    let mut full = vec!["--devel".to_string()];
    full.extend(config.shell_permissions.iter().cloned());
    full.push(format!("--runtime={}//master", config.dev_sdk_id));
    full.push(args.app.clone());
    full.extend(args.options.iter().cloned());
    full
}

/// Execute the `run` command and return the app's exit code.
pub fn execute(args: RunArgs, ctx: &Context) -> Result<i32> {
    let flatpak = Flatpak::from_config(&ctx.config);
    Ok(flatpak.status("run", &run_args(&ctx.config, &args))?)
}
