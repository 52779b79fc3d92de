//! # Shell Command Implementation
//!
//! This module implements the `shell` subcommand, which opens `bash` inside
//! the development runtime's sandbox with the workdir mounted.
//!
//! The prompt shows the configured `shell_prefix`. Users with their own `PS1`
//! can include `$DEVSDK_PROMPT_PREFIX` in it.

use anyhow::Result;
use clap::Args;

use devsdk::config::Config;
use devsdk::tools::Flatpak;

use crate::cli::Context;

/// Used as `$PS1` unless the user's bashrc sets its own.
const DEFAULT_PROMPT: &str = "[($DEVSDK_PROMPT_PREFIX) \\u@\\h \\W]\\$ ";

/// Open a shell in the development runtime's sandbox
#[derive(Args, Debug)]
pub struct ShellArgs {}

/// Arguments to `flatpak run` for the development shell.
pub fn shell_args(config: &Config) -> Vec<String> {
    let mut full = vec![
        "--devel".to_string(),
        "--command=bash".to_string(),
        format!("--filesystem={}", config.workdir.display()),
    ];
    full.extend(config.shell_permissions.iter().cloned());
    full.push(format!("--env=PS1={}", DEFAULT_PROMPT));
    full.push(format!("--env=DEVSDK_PROMPT_PREFIX={}", config.shell_prefix));
    full.push(config.dev_sdk_id.clone());
    full
}

/// Execute the `shell` command and return the shell's exit code.
pub fn execute(_args: ShellArgs, ctx: &Context) -> Result<i32> {
    let flatpak = Flatpak::from_config(&ctx.config);
    Ok(flatpak.status("run", &shell_args(&ctx.config))?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_shell_args() {
        let config = Config::parse("[Common]\nworkdir = /w\nshell_prefix = hack\n").unwrap();
        let args = shell_args(&config);

        assert_eq!(&args[..3], ["--devel", "--command=bash", "--filesystem=/w"]);
        assert!(args.contains(&"--env=DEVSDK_PROMPT_PREFIX=hack".to_string()));
        assert!(args.iter().any(|a| a.starts_with("--env=PS1=")));
        assert_eq!(args.last().map(String::as_str), Some("org.gnome.dev.Sdk"));
    }
}
