//! # Error Handling
//!
//! This module defines the centralized error type for the `devsdk` library.
//! It uses `thiserror` to build one `Error` enum covering every failure mode,
//! grouped into four families:
//!
//! - **Precondition errors** (`NotOpen`, `NotAllowed`, `ModuleNotFound`,
//!   `StagedChanges`, `MergeInProgress`, `OnWorkingBranch`, `NonGitSource`,
//!   `RuntimeNotFound`): reported immediately,
//!   nothing has been mutated, and the message says what the user must do.
//! - **Restore errors** (`Restore`): one or more repositories could not be put
//!   back on their original ref after a guarded region. Every failure is kept.
//! - **Invocation errors** (`GitCommand`, `BuilderInvocation`): an external
//!   tool could not be run, or a git step failed. A builder that ran and
//!   returned a nonzero code is *not* an error; the code is passed through.
//! - **Input errors** (`Config`, `ManifestParse`, `State`, `Io`, `Json`).
//!
//! Best-effort network failures are deliberately absent: fetches report them
//! through [`crate::git::FetchOutcome`] instead.

use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

/// Main error type for devsdk operations
#[derive(Error, Debug)]
pub enum Error {
    /// `close` or `test` was asked about a module that is not open.
    #[error("{module} is not currently opened for development. Use \"devsdk open {module}\"")]
    NotOpen { module: String },

    /// The module is not in the configured list of developable modules.
    #[error("{module} is not one of the modules available for development (see \"devsdk list\")")]
    NotAllowed { module: String },

    /// A module name has no entry in the manifest being processed.
    #[error("Module {module} not found in {manifest}")]
    ModuleNotFound { module: String, manifest: String },

    /// The repository has staged changes that the guard would clobber.
    #[error("{} has staged changes. \"devsdk build\" would clobber them. Please either commit or unstage.", path.display())]
    StagedChanges { path: PathBuf },

    /// The repository is in the middle of a merge.
    #[error("{} is in the middle of a merge. Please finish it before building.", path.display())]
    MergeInProgress { path: PathBuf },

    /// The repository is already on the working branch, most likely left
    /// there by a build that was killed.
    #[error(
        "{} is already on the working branch \"{branch}\", probably left behind by an interrupted build.\n  \
         hint: if its last commit is \"{}\", run \"git reset HEAD^\" first,\n  \
         then check out the branch you were working on",
        path.display(),
        crate::defaults::TEMPORARY_COMMIT_MESSAGE
    )]
    OnWorkingBranch { path: PathBuf, branch: String },

    /// The module's first source is not a git source and no URL override exists.
    #[error(
        "Only sources of type \"git\" are supported, but {module} uses \"{source_type}\"\n  \
         hint: override it with a git repository in your config file:\n  \
         [{module}]\n  url = ..."
    )]
    NonGitSource { module: String, source_type: String },

    /// A git command failed or could not be started.
    #[error("Git command failed in {}: git {command} - {stderr}", path.display())]
    GitCommand {
        command: String,
        path: PathBuf,
        stderr: String,
    },

    /// The external builder (or the manifest it needs) could not be prepared
    /// or started.
    #[error("Could not invoke {tool}: {message}")]
    BuilderInvocation { tool: String, message: String },

    /// No configured flatpak remote provides a runtime.
    #[error("{runtime}//{branch} not found in any flatpak remote (checked: {})", remotes.join(", "))]
    RuntimeNotFound {
        runtime: String,
        branch: String,
        remotes: Vec<String>,
    },

    /// A termination signal arrived before the guarded action started.
    #[error("Interrupted by signal {signal}")]
    Interrupted { signal: i32 },

    /// One or more repositories could not be restored after a guarded region.
    ///
    /// `cause` holds the error of the protected action, if it failed too.
    #[error("{}", RestoreSummary { failures, cause: cause.as_deref() })]
    Restore {
        failures: Vec<RestoreFailure>,
        cause: Option<Box<Error>>,
    },

    /// The configuration file is malformed.
    #[error("Configuration error: {message}")]
    Config { message: String },

    /// A manifest could not be parsed.
    #[error("Failed to parse manifest {}: {message}", path.display())]
    ManifestParse { path: PathBuf, message: String },

    /// The persisted state file is unreadable.
    #[error("State file {} is corrupt: {message}", path.display())]
    State { path: PathBuf, message: String },

    /// An I/O error, wrapped from `std::io::Error`.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON error, wrapped from `serde_json::Error`.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// A repository that could not be put back on its original ref.
#[derive(Debug)]
pub struct RestoreFailure {
    /// Checkout that was left in the guard's working state.
    pub path: PathBuf,
    /// Ref the repository should have been restored to.
    pub original_ref: String,
    /// The temporary commit is still on top of the working branch.
    pub committed: bool,
    /// The git failure.
    pub error: Box<Error>,
}

impl fmt::Display for RestoreFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {} (recover with ", self.path.display(), self.error)?;
        if self.committed {
            write!(f, "\"git reset HEAD^\", then ")?;
        }
        write!(f, "\"git checkout {}\")", self.original_ref)
    }
}

struct RestoreSummary<'a> {
    failures: &'a [RestoreFailure],
    cause: Option<&'a Error>,
}

impl fmt::Display for RestoreSummary<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Failed to restore {} repositor{}",
            self.failures.len(),
            if self.failures.len() == 1 { "y" } else { "ies" }
        )?;
        for failure in self.failures {
            write!(f, "\n  {}", failure)?;
        }
        if let Some(cause) = self.cause {
            write!(f, "\n  while handling: {}", cause)?;
        }
        Ok(())
    }
}

/// A convenient type alias for `Result<T, Error>`.
pub type Result<T> = std::result::Result<T, Error>;
