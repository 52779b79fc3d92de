//! CLI argument parsing and command dispatch

use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::Result;
use clap::{Parser, Subcommand};

use devsdk::config::Config;
use devsdk::defaults::default_config_path;
use devsdk::git::SystemGit;
use devsdk::output::OutputConfig;

use crate::commands;

/// devsdk - Develop flatpak SDK modules from local git checkouts
#[derive(Parser, Debug)]
#[command(name = "devsdk")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    command: Commands,

    /// Path to the configuration file [default: ~/.config/devsdk.ini]
    #[arg(short, long, global = true, value_name = "FILE", env = "DEVSDK_CONFIG")]
    config: Option<PathBuf>,

    /// Colorize output (always, never, auto)
    #[arg(long, global = true, value_name = "WHEN", default_value = "auto")]
    color: String,

    /// Set log level (error, warn, info, debug, trace)
    #[arg(long, global = true, value_name = "LEVEL", default_value = "warn")]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a module for development, putting it in the runtime
    Open(commands::open::OpenArgs),

    /// Close development on a module and remove it from the runtime
    Close(commands::close::CloseArgs),

    /// List the modules available for development
    List(commands::list::ListArgs),

    /// Build the development runtime
    Build(commands::build::BuildArgs),

    /// Build a module and run its tests
    Test(commands::test::TestArgs),

    /// Run an app against the development runtime
    Run(commands::run::RunArgs),

    /// Open a shell in the development runtime's sandbox
    Shell(commands::shell::ShellArgs),

    /// Update the base SDK and every git checkout
    Update(commands::update::UpdateArgs),

    /// Get set up to use devsdk for the first time
    Setup(commands::setup::SetupArgs),

    /// Clean the flatpak-builder cache
    CleanCache(commands::clean_cache::CleanCacheArgs),

    /// Generate shell completion scripts
    Completions(commands::completions::CompletionsArgs),
}

/// What every command except `completions` needs.
pub struct Context {
    pub config: Config,
    pub output: OutputConfig,
    pub git: SystemGit,
}

impl Context {
    /// Load the configuration and create the work directories.
    fn load(config_path: Option<&Path>, output: OutputConfig) -> Result<Self> {
        let config_path = config_path
            .map(Path::to_path_buf)
            .unwrap_or_else(default_config_path);
        log::debug!("Using configuration {}", config_path.display());

        let config = Config::load(&config_path)
            .map_err(|e| devsdk::suggestions::config_invalid(&config_path, &e))?;
        fs::create_dir_all(&config.workdir)?;
        fs::create_dir_all(&config.checkoutdir)?;

        Ok(Self {
            git: SystemGit::new(config.tools.git.as_str()),
            config,
            output,
        })
    }
}

impl Cli {
    /// Execute the CLI command
    pub fn execute(self) -> Result<ExitCode> {
        let Cli {
            command,
            config,
            color,
            log_level,
        } = self;
        init_logging(&log_level);
        let output = OutputConfig::from_env_and_flag(&color);

        let code = match command {
            Commands::Completions(args) => {
                commands::completions::execute(args)?;
                0
            }
            command => {
                let ctx = Context::load(config.as_deref(), output)?;
                dispatch(command, &ctx)?
            }
        };
        Ok(to_exit_code(code))
    }
}

fn dispatch(command: Commands, ctx: &Context) -> Result<i32> {
    match command {
        Commands::Open(args) => commands::open::execute(args, ctx).map(|()| 0),
        Commands::Close(args) => commands::close::execute(args, ctx).map(|()| 0),
        Commands::List(args) => commands::list::execute(args, ctx).map(|()| 0),
        Commands::Build(args) => commands::build::execute(args, ctx),
        Commands::Test(args) => commands::test::execute(args, ctx),
        Commands::Run(args) => commands::run::execute(args, ctx),
        Commands::Shell(args) => commands::shell::execute(args, ctx),
        Commands::Update(args) => commands::update::execute(args, ctx).map(|()| 0),
        Commands::Setup(args) => commands::setup::execute(args, ctx).map(|()| 0),
        Commands::CleanCache(args) => commands::clean_cache::execute(args, ctx).map(|()| 0),
        Commands::Completions(args) => commands::completions::execute(args).map(|()| 0),
    }
}

/// Initialize `env_logger` from `--log-level`; `RUST_LOG` takes precedence.
fn init_logging(level: &str) {
    let mut builder = env_logger::Builder::new();
    builder.parse_filters(level);
    if let Ok(filters) = std::env::var("RUST_LOG") {
        builder.parse_filters(&filters);
    }
    builder.format_timestamp(None);
    // Already initialized when running inside tests
    let _ = builder.try_init();
}

fn to_exit_code(code: i32) -> ExitCode {
    match u8::try_from(code) {
        Ok(code) => ExitCode::from(code),
        Err(_) => ExitCode::FAILURE,
    }
}
