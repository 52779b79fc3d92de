//! # Git Plumbing
//!
//! Every git interaction devsdk performs goes through the [`GitOperations`]
//! trait. The production implementation, [`SystemGit`], runs the system `git`
//! binary, which picks up the user's SSH keys, credential helpers and
//! `~/.gitconfig` for free. Tests swap in mocks to script failures at exact
//! steps of the branch guard.
//!
//! Commands come in three shapes:
//!
//! - **output**: the command must succeed and its stdout is returned.
//! - **check**: the command must succeed, output is discarded.
//! - **code**: the exit code is the answer (`diff --quiet` and friends).
//!
//! Network operations are best-effort: [`GitOperations::fetch`] never fails,
//! it reports a [`FetchOutcome`] instead.

use std::fs;
use std::path::Path;
use std::process::{Command, Output};

use crate::error::{Error, Result};

/// Result of a best-effort fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FetchOutcome {
    Fetched,
    /// The fetch failed, usually for lack of network. Holds git's message.
    Offline(String),
}

/// Trait for git operations - allows mocking in tests
pub trait GitOperations: Send + Sync {
    /// Whether the index differs from `HEAD`.
    fn has_staged_changes(&self, repo: &Path) -> Result<bool>;

    /// Whether a merge is in progress.
    fn merge_in_progress(&self, repo: &Path) -> Result<bool>;

    /// The checked-out branch name, or the commit hash on a detached `HEAD`.
    fn current_ref(&self, repo: &Path) -> Result<String>;

    /// Point `branch` at the current `HEAD` and switch to it, creating it if
    /// needed (`git checkout -B`).
    fn checkout_branch_reset(&self, repo: &Path, branch: &str) -> Result<()>;

    /// Whether the work tree has modified or untracked files.
    fn has_local_changes(&self, repo: &Path) -> Result<bool>;

    /// Stage everything in the work tree.
    fn add_all(&self, repo: &Path) -> Result<()>;

    /// Reset the index to `HEAD`, leaving the work tree alone.
    fn unstage_all(&self, repo: &Path) -> Result<()>;

    fn commit(&self, repo: &Path, message: &str) -> Result<()>;

    /// Undo the last commit, keeping its changes in the work tree.
    fn reset_one(&self, repo: &Path) -> Result<()>;

    fn checkout(&self, repo: &Path, rev: &str) -> Result<()>;

    /// Fetch from the default remote. Never fails.
    fn fetch(&self, repo: &Path) -> FetchOutcome;

    /// Whether the repository has at least one remote.
    fn has_remote(&self, repo: &Path) -> Result<bool>;

    /// Clone `url` into `target`, which must not exist yet.
    fn clone_repo(&self, url: &str, target: &Path) -> Result<()>;
}

/// [`GitOperations`] backed by the system `git` binary.
#[derive(Debug, Clone)]
pub struct SystemGit {
    program: String,
}

impl Default for SystemGit {
    fn default() -> Self {
        Self::new("git")
    }
}

impl SystemGit {
    /// Use `program` (a name looked up in `PATH`, or a path) as git.
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, repo: &Path, args: &[&str]) -> Result<Output> {
        log::debug!("Running {} {} in {}", self.program, args.join(" "), repo.display());
        Command::new(&self.program)
            .args(args)
            .current_dir(repo)
            .output()
            .map_err(|e| Error::GitCommand {
                command: args.join(" "),
                path: repo.to_path_buf(),
                stderr: e.to_string(),
            })
    }

    fn output(&self, repo: &Path, args: &[&str]) -> Result<String> {
        let output = self.run(repo, args)?;
        if !output.status.success() {
            return Err(failure(repo, args, &output));
        }
        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    fn check(&self, repo: &Path, args: &[&str]) -> Result<()> {
        self.output(repo, args).map(|_| ())
    }

    fn code(&self, repo: &Path, args: &[&str]) -> Result<i32> {
        let output = self.run(repo, args)?;
        output
            .status
            .code()
            .ok_or_else(|| failure(repo, args, &output))
    }
}

fn failure(repo: &Path, args: &[&str], output: &Output) -> Error {
    let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
    Error::GitCommand {
        command: args.join(" "),
        path: repo.to_path_buf(),
        stderr: if stderr.is_empty() {
            format!("exited with {}", output.status)
        } else {
            stderr
        },
    }
}

impl GitOperations for SystemGit {
    fn has_staged_changes(&self, repo: &Path) -> Result<bool> {
        let args = ["diff", "--quiet", "--cached", "--exit-code"];
        match self.code(repo, &args)? {
            0 => Ok(false),
            1 => Ok(true),
            code => Err(Error::GitCommand {
                command: args.join(" "),
                path: repo.to_path_buf(),
                stderr: format!("unexpected exit code {}", code),
            }),
        }
    }

    fn merge_in_progress(&self, repo: &Path) -> Result<bool> {
        // Resolves correctly for linked worktrees where .git is a file
        let merge_head = self.output(repo, &["rev-parse", "--git-path", "MERGE_HEAD"])?;
        Ok(repo.join(merge_head).exists())
    }

    fn current_ref(&self, repo: &Path) -> Result<String> {
        let name = self.output(repo, &["rev-parse", "--abbrev-ref", "HEAD"])?;
        if name == "HEAD" {
            return self.output(repo, &["rev-parse", "HEAD"]);
        }
        Ok(name)
    }

    fn checkout_branch_reset(&self, repo: &Path, branch: &str) -> Result<()> {
        self.check(repo, &["checkout", "-B", branch])
    }

    fn has_local_changes(&self, repo: &Path) -> Result<bool> {
        Ok(!self.output(repo, &["status", "--porcelain"])?.is_empty())
    }

    fn add_all(&self, repo: &Path) -> Result<()> {
        self.check(repo, &["add", "--all", "."])
    }

    fn unstage_all(&self, repo: &Path) -> Result<()> {
        self.check(repo, &["reset", "--quiet"])
    }

    fn commit(&self, repo: &Path, message: &str) -> Result<()> {
        self.check(repo, &["commit", "--message", message])
    }

    fn reset_one(&self, repo: &Path) -> Result<()> {
        self.check(repo, &["reset", "HEAD^"])
    }

    fn checkout(&self, repo: &Path, rev: &str) -> Result<()> {
        self.check(repo, &["checkout", rev])
    }

    fn fetch(&self, repo: &Path) -> FetchOutcome {
        match self.check(repo, &["fetch"]) {
            Ok(()) => FetchOutcome::Fetched,
            Err(Error::GitCommand { stderr, .. }) => FetchOutcome::Offline(stderr),
            Err(e) => FetchOutcome::Offline(e.to_string()),
        }
    }

    fn has_remote(&self, repo: &Path) -> Result<bool> {
        Ok(!self.output(repo, &["remote"])?.is_empty())
    }

    fn clone_repo(&self, url: &str, target: &Path) -> Result<()> {
        let parent = match target.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        fs::create_dir_all(parent)?;

        let name = target
            .file_name()
            .map(|n| n.to_string_lossy())
            .ok_or_else(|| Error::GitCommand {
                command: format!("clone {}", url),
                path: target.to_path_buf(),
                stderr: "target has no directory name".to_string(),
            })?;
        let args = ["clone", url, name.as_ref()];
        let output = self.run(parent, &args)?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            // Provide helpful error message for common auth failures
            let stderr = if stderr.contains("Authentication failed")
                || stderr.contains("Permission denied")
                || stderr.contains("Could not read from remote repository")
            {
                format!(
                    "Authentication failed. Make sure you have access to {}.\nError: {}",
                    url,
                    stderr.trim()
                )
            } else {
                stderr.trim().to_string()
            };
            return Err(Error::GitCommand {
                command: args.join(" "),
                path: parent.to_path_buf(),
                stderr,
            });
        }
        Ok(())
    }
}
