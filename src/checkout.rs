//! Local git checkouts of modules and of the upstream SDK.

use std::path::{Path, PathBuf};

use walkdir::WalkDir;

use crate::config::{Config, ModuleOverrides};
use crate::error::{Error, Result};
use crate::git::{FetchOutcome, GitOperations};
use crate::manifest::Module;

/// What [`ensure_checkout`] had to do.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CheckoutOutcome {
    Cloned { url: String },
    /// The checkout already existed; it was fetched if possible.
    Existing(FetchOutcome),
}

/// Where a module's checkout is cloned from.
///
/// A `url` override wins. Otherwise the module's first source must be a git
/// source with a URL.
pub fn clone_url(module: &Module, overrides: Option<&ModuleOverrides>) -> Result<String> {
    if let Some(url) = overrides.and_then(|o| o.url.as_ref()) {
        return Ok(url.clone());
    }
    let non_git = |source_type: &str| Error::NonGitSource {
        module: module.name.clone(),
        source_type: source_type.to_string(),
    };
    let source = module.primary_source().ok_or_else(|| non_git("none"))?;
    if !source.is_git() {
        return Err(non_git(&source.kind));
    }
    source.url.clone().ok_or_else(|| non_git("git without url"))
}

/// Make sure `module` has a checkout in the checkout directory.
///
/// A new checkout is cloned and switched to the branch its source names. An
/// existing one is fetched, and being offline is only worth a warning.
pub fn ensure_checkout(git: &dyn GitOperations, config: &Config, module: &Module) -> Result<CheckoutOutcome> {
    let path = config.checkout_path(&module.name);
    if path.exists() {
        let outcome = git.fetch(&path);
        if let FetchOutcome::Offline(reason) = &outcome {
            log::warn!("Could not fetch {}: {}", module.name, reason);
        }
        return Ok(CheckoutOutcome::Existing(outcome));
    }

    let overrides = config.module_overrides(&module.name);
    let url = clone_url(module, overrides)?;
    log::info!("Cloning {} into {}", url, path.display());
    git.clone_repo(&url, &path)?;

    // An overridden URL may not carry the manifest's branch
    let branch = match overrides.and_then(|o| o.url.as_ref()) {
        Some(_) => None,
        None => module.primary_source().and_then(|s| s.branch.as_deref()),
    };
    if let Some(branch) = branch {
        git.checkout(&path, branch)?;
    }
    Ok(CheckoutOutcome::Cloned { url })
}

/// Clone the upstream SDK repository, or switch an existing clone to the
/// configured branch.
pub fn ensure_upstream_checkout(git: &dyn GitOperations, config: &Config) -> Result<PathBuf> {
    let path = config.upstream_sdk_checkout();
    if !path.exists() {
        log::info!("Cloning {} into {}", config.sdk_upstream, path.display());
        git.clone_repo(&config.sdk_upstream, &path)?;
    }
    git.checkout(&path, &config.sdk_upstream_branch)?;
    Ok(path)
}

/// Git checkouts directly inside `checkoutdir`, sorted by name.
pub fn git_checkouts(checkoutdir: &Path) -> Vec<PathBuf> {
    WalkDir::new(checkoutdir)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name()
        .into_iter()
        .flatten()
        .filter(|entry| entry.file_type().is_dir())
        .map(|entry| entry.into_path())
        .filter(|path| path.join(".git").exists())
        .collect()
}

/// Result of updating one checkout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UpdateStatus {
    Fetched,
    /// Nothing to fetch from.
    NoRemote,
    Failed(String),
}

/// Fetch one checkout, never failing.
pub fn update_checkout(git: &dyn GitOperations, path: &Path) -> UpdateStatus {
    match git.has_remote(path) {
        Ok(false) => return UpdateStatus::NoRemote,
        Ok(true) => {}
        Err(e) => return UpdateStatus::Failed(e.to_string()),
    }
    match git.fetch(path) {
        FetchOutcome::Fetched => UpdateStatus::Fetched,
        FetchOutcome::Offline(reason) => {
            log::warn!("Error updating {}: {}", path.display(), reason);
            UpdateStatus::Failed(reason)
        }
    }
}
