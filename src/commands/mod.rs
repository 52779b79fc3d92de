//! # CLI Command Implementations
//!
//! This module contains the implementation for each subcommand of the `devsdk`
//! command-line tool. Each subcommand is defined in its own file to keep the
//! logic separated and maintainable.
//!
//! ## Structure
//!
//! Each command module typically contains:
//! - An `Args` struct that defines the command-specific arguments and options,
//!   derived using `clap`.
//! - An `execute` function that takes the parsed `Args` and the shared
//!   [`crate::cli::Context`] and performs the command's logic.
//!
//! Commands that run flatpak tooling return its exit code; the others return
//! `()` and exit with 0 on success.

pub mod build;
pub mod clean_cache;
pub mod close;
pub mod completions;
pub mod list;
pub mod open;
pub mod run;
pub mod setup;
pub mod shell;
pub mod update;
