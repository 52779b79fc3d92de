//! # Branch Guards
//!
//! A build must see every open module's work tree exactly as the developer
//! left it, committed or not, while leaving each repository on its original
//! ref afterwards. [`BranchGuard`] does this for one repository:
//!
//! 1.  **Checks**: staged changes or an in-progress merge abort entry before
//!     anything is touched, since the steps below would clobber them.
//! 2.  **Branch**: the current ref is recorded and the working branch is reset
//!     to `HEAD` and checked out.
//! 3.  **Capture**: a dirty work tree is committed on the working branch with
//!     a temporary commit.
//! 4.  **Restore**: the temporary commit (if any) is undone with a mixed reset
//!     and the original ref is checked out again.
//!
//! Restoration runs on every exit path: explicitly through
//! [`BranchGuard::exit`], or from `Drop` if the guard is abandoned during a
//! panic or early return. [`run_guarded`] also holds `SIGINT`, `SIGTERM` and
//! `SIGHUP` off (see [`crate::signals`]), so Ctrl-C during a build stops the
//! builder and then restores. Only `SIGKILL` leaves a repository on the
//! working branch; `git reset HEAD^` (when the tip is the temporary commit)
//! followed by `git checkout <original>` recovers it, and the next entry
//! refuses to start from the working branch until then.
//!
//! [`GuardStack`] composes guards over several repositories: entry is all or
//! nothing, and unwinding happens in reverse order and never stops at the
//! first failure, whether it is driven by [`GuardStack::exit`] or by `Drop`.

use std::path::{Path, PathBuf};

use crate::defaults::TEMPORARY_COMMIT_MESSAGE;
use crate::error::{Error, RestoreFailure, Result};
use crate::git::GitOperations;
use crate::signals::DeferredSignals;

/// Where a [`BranchGuard`] is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GuardState {
    /// On the working branch, work tree was clean.
    Branched,
    /// On the working branch with a temporary commit on top.
    Committed,
    /// Back on the original ref.
    Restored,
    /// Restoration failed; the repository needs manual recovery.
    RestoreFailed,
}

/// Keeps one repository on the working branch for the guard's lifetime.
pub struct BranchGuard<'g> {
    git: &'g dyn GitOperations,
    path: PathBuf,
    original_ref: String,
    committed: bool,
    state: GuardState,
}

impl<'g> BranchGuard<'g> {
    /// Switch the repository at `path` to `branch`, capturing any local
    /// changes in a temporary commit.
    ///
    /// Precondition failures leave the repository untouched. A failure after
    /// the branch switch is rolled back before the error is returned.
    pub fn enter(git: &'g dyn GitOperations, path: impl Into<PathBuf>, branch: &str) -> Result<Self> {
        let path = path.into();

        if git.has_staged_changes(&path)? {
            return Err(Error::StagedChanges { path });
        }
        if git.merge_in_progress(&path)? {
            return Err(Error::MergeInProgress { path });
        }
        let original_ref = git.current_ref(&path)?;
        if original_ref == branch {
            return Err(Error::OnWorkingBranch {
                path,
                branch: branch.to_string(),
            });
        }

        git.checkout_branch_reset(&path, branch)?;
        let mut guard = Self {
            git,
            path,
            original_ref,
            committed: false,
            state: GuardState::Branched,
        };

        if let Err(e) = guard.capture_local_changes() {
            return Err(guard.abort(e));
        }
        log::debug!(
            "{}: switched from {} to {} ({:?})",
            guard.path.display(),
            guard.original_ref,
            branch,
            guard.state
        );
        Ok(guard)
    }

    /// Put the repository back on its original ref.
    pub fn exit(self) -> Result<()> {
        self.finish().map_err(|failure| Error::Restore {
            failures: vec![failure],
            cause: None,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The ref the repository was on before entry.
    pub fn original_ref(&self) -> &str {
        &self.original_ref
    }

    /// Whether entry made a temporary commit.
    pub fn committed(&self) -> bool {
        self.committed
    }

    pub fn state(&self) -> GuardState {
        self.state
    }

    fn capture_local_changes(&mut self) -> Result<()> {
        if !self.git.has_local_changes(&self.path)? {
            return Ok(());
        }
        self.git.add_all(&self.path)?;
        if let Err(e) = self.git.commit(&self.path, TEMPORARY_COMMIT_MESSAGE) {
            if let Err(unstage) = self.git.unstage_all(&self.path) {
                log::warn!("{}: could not unstage changes: {}", self.path.display(), unstage);
            }
            return Err(e);
        }
        self.committed = true;
        self.state = GuardState::Committed;
        Ok(())
    }

    /// Roll back a partially entered guard, folding a rollback failure into
    /// the returned error.
    fn abort(mut self, cause: Error) -> Error {
        match self.restore() {
            Ok(()) => cause,
            Err(failure) => Error::Restore {
                failures: vec![failure],
                cause: Some(Box::new(cause)),
            },
        }
    }

    /// Restore and consume the guard, handing back the failure details.
    pub(crate) fn finish(mut self) -> std::result::Result<(), RestoreFailure> {
        self.restore()
    }

    fn restore(&mut self) -> std::result::Result<(), RestoreFailure> {
        match self.undo() {
            Ok(()) => {
                self.state = GuardState::Restored;
                log::debug!("{}: restored {}", self.path.display(), self.original_ref);
                Ok(())
            }
            Err(e) => {
                self.state = GuardState::RestoreFailed;
                Err(RestoreFailure {
                    path: self.path.clone(),
                    original_ref: self.original_ref.clone(),
                    committed: self.committed,
                    error: Box::new(e),
                })
            }
        }
    }

    fn undo(&mut self) -> Result<()> {
        if self.committed {
            // The reset must succeed before leaving the branch, or the
            // uncommitted work stays behind in the temporary commit.
            self.git.reset_one(&self.path)?;
            self.committed = false;
        }
        self.git.checkout(&self.path, &self.original_ref)
    }

    fn is_active(&self) -> bool {
        matches!(self.state, GuardState::Branched | GuardState::Committed)
    }
}

impl Drop for BranchGuard<'_> {
    fn drop(&mut self) {
        if !self.is_active() {
            return;
        }
        log::warn!(
            "{}: guard dropped without exit, restoring {}",
            self.path.display(),
            self.original_ref
        );
        if let Err(failure) = self.restore() {
            log::error!("Failed to restore {}", failure);
        }
    }
}

impl std::fmt::Debug for BranchGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BranchGuard")
            .field("path", &self.path)
            .field("original_ref", &self.original_ref)
            .field("committed", &self.committed)
            .field("state", &self.state)
            .finish()
    }
}

/// Enter a guard on one repository, run `f`, and always restore.
pub fn with_branch_state<T>(
    git: &dyn GitOperations,
    path: impl Into<PathBuf>,
    branch: &str,
    f: impl FnOnce() -> Result<T>,
) -> Result<T> {
    let guard = BranchGuard::enter(git, path, branch)?;
    let outcome = f();
    let failures = guard.finish().err().into_iter().collect();
    combine(outcome, failures)
}

/// Branch guards over several repositories, unwound as a unit.
#[derive(Debug)]
pub struct GuardStack<'g> {
    guards: Vec<BranchGuard<'g>>,
}

impl<'g> GuardStack<'g> {
    /// Enter a guard on every repository in `paths`, in order.
    ///
    /// If any entry fails, the guards entered so far are unwound in reverse
    /// before the error is returned, so no repository is left branched.
    pub fn enter_all<I, P>(git: &'g dyn GitOperations, paths: I, branch: &str) -> Result<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        let mut stack = Self { guards: Vec::new() };
        for path in paths {
            match BranchGuard::enter(git, path, branch) {
                Ok(guard) => stack.guards.push(guard),
                Err(e) => {
                    let failures = stack.unwind();
                    if failures.is_empty() {
                        return Err(e);
                    }
                    return Err(Error::Restore {
                        failures,
                        cause: Some(Box::new(e)),
                    });
                }
            }
        }
        Ok(stack)
    }

    /// Restore every repository, last entered first.
    ///
    /// Keeps going after a failure and reports all of them together.
    pub fn exit(mut self) -> Result<()> {
        combine(Ok(()), self.unwind())
    }

    pub fn len(&self) -> usize {
        self.guards.len()
    }

    pub fn is_empty(&self) -> bool {
        self.guards.is_empty()
    }

    fn unwind(&mut self) -> Vec<RestoreFailure> {
        let mut failures = Vec::new();
        while let Some(guard) = self.guards.pop() {
            if let Err(failure) = guard.finish() {
                log::error!("Failed to restore {}", failure);
                failures.push(failure);
            }
        }
        failures
    }
}

impl Drop for GuardStack<'_> {
    fn drop(&mut self) {
        if !self.guards.is_empty() {
            log::warn!("Guard stack dropped without exit, restoring {} repositories", self.guards.len());
            self.unwind();
        }
    }
}

/// Run `action` with every repository in `paths` on `branch`.
///
/// Unwinding happens whatever `action` returns, and also when it panics.
/// Termination signals received meanwhile are held until every repository
/// is restored; one that arrives before `action` starts skips it with
/// [`Error::Interrupted`]. Restore failures take precedence in the result and
/// carry the action's own error as their cause.
pub fn run_guarded<T, I, P>(
    git: &dyn GitOperations,
    paths: I,
    branch: &str,
    action: impl FnOnce() -> Result<T>,
) -> Result<T>
where
    I: IntoIterator<Item = P>,
    P: Into<PathBuf>,
{
    let signals = DeferredSignals::install()?;
    let mut stack = GuardStack::enter_all(git, paths, branch)?;
    log::info!("Switched {} repositories to {}", stack.len(), branch);
    let outcome = match signals.received() {
        Some(signal) => Err(Error::Interrupted { signal }),
        None => action(),
    };
    let failures = stack.unwind();
    if let Some(signal) = signals.received() {
        log::warn!("Received signal {} during the build, repositories restored", signal);
    }
    combine(outcome, failures)
}

fn combine<T>(outcome: Result<T>, failures: Vec<RestoreFailure>) -> Result<T> {
    if failures.is_empty() {
        return outcome;
    }
    Err(Error::Restore {
        failures,
        cause: outcome.err().map(Box::new),
    })
}
