//! # Completions Command Implementation
//!
//! Generates shell completion scripts with `clap_complete`. The script covers
//! every subcommand and option, so module names still have to be typed out.
//!
//! ```bash
//! devsdk completions bash > ~/.local/share/bash-completion/completions/devsdk
//! devsdk completions zsh > ~/.zfunc/_devsdk
//! ```

use std::io;

use anyhow::Result;
use clap::{Args, CommandFactory};
use clap_complete::{generate, Shell};

use crate::cli::Cli;

/// Generate shell completion scripts
#[derive(Args, Debug)]
pub struct CompletionsArgs {
    /// The shell to generate completions for
    #[arg(value_enum)]
    pub shell: Shell,
}

/// Execute the `completions` command, writing the script to stdout.
pub fn execute(args: CompletionsArgs) -> Result<()> {
    let mut cmd = Cli::command();
    let name = cmd.get_name().to_string();
    generate(args.shell, &mut cmd, name, &mut io::stdout());
    Ok(())
}
