//! # Build Orchestration
//!
//! Ties the pieces of a development build together:
//!
//! 1.  The development manifest is derived from the upstream SDK manifest,
//!     the open modules and the configured overrides.
//! 2.  For `test`, the module under test gets its test command injected and
//!     the build stops right after it.
//! 3.  The manifest is written to `<workdir>/<dev_sdk_id>.json`.
//! 4.  flatpak-builder runs while every open checkout sits on the working
//!     branch, and its exit code is handed back untouched.

use std::path::PathBuf;

use crate::config::Config;
use crate::error::{Error, Result};
use crate::git::GitOperations;
use crate::guard::run_guarded;
use crate::manifest::Manifest;
use crate::state::StateStore;
use crate::tools::FlatpakBuilder;
use crate::transform::ManifestTransformer;

/// A module whose tests should run as part of the build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestTarget {
    pub module: String,
    /// Run `make distcheck` instead of `make check` for autotools modules.
    pub distcheck: bool,
}

impl TestTarget {
    pub fn new(module: impl Into<String>, distcheck: bool) -> Self {
        Self {
            module: module.into(),
            distcheck,
        }
    }
}

/// Runs flatpak-builder over the development manifest.
pub struct Builder<'a> {
    config: &'a Config,
    git: &'a dyn GitOperations,
    tool: FlatpakBuilder,
}

impl<'a> Builder<'a> {
    pub fn new(config: &'a Config, git: &'a dyn GitOperations) -> Self {
        Self {
            config,
            git,
            tool: FlatpakBuilder::new(config.tools.flatpak_builder.as_str()),
        }
    }

    /// The development manifest for the currently open modules, with tests
    /// injected for `test`. Also returns the module to stop at, if any.
    pub fn development_manifest(
        &self,
        open: &[String],
        test: Option<&TestTarget>,
    ) -> Result<(Manifest, Option<String>)> {
        let source = Manifest::load(&self.config.source_manifest_path())?;
        let dev_tools = match &self.config.dev_tools_manifest {
            Some(path) => Manifest::load_module_list(path)?,
            None => Vec::new(),
        };

        let mut manifest = ManifestTransformer::from_config(self.config, dev_tools)
            .transform(&source, open)?;

        let stop_at = match test {
            Some(target) => {
                let extra_test_args = self
                    .config
                    .module_overrides(&target.module)
                    .map(|o| o.extra_test_args.as_slice())
                    .unwrap_or_default();
                inject_test(
                    &mut manifest,
                    target,
                    &self.config.test_permissions,
                    extra_test_args,
                )?
            }
            None => None,
        };
        Ok((manifest, stop_at))
    }

    /// Build the development runtime and return the builder's exit code.
    ///
    /// `extra_args` go to flatpak-builder before the positional arguments.
    pub fn build(&self, extra_args: &[String], test: Option<&TestTarget>) -> Result<i32> {
        let open = StateStore::for_config(self.config).list()?;
        let (manifest, stop_at) = self.development_manifest(&open, test)?;

        let manifest_path = self.config.manifest_path();
        manifest
            .save(&manifest_path)
            .map_err(|e| Error::BuilderInvocation {
                tool: self.tool.program().to_string(),
                message: format!("could not write {}: {}", manifest_path.display(), e),
            })?;
        log::info!("Wrote development manifest to {}", manifest_path.display());

        let mut args: Vec<String> = vec!["--force-clean".to_string()];
        args.extend(extra_args.iter().cloned());
        if let Some(next) = &stop_at {
            args.push(format!("--stop-at={}", next));
        }
        args.push(self.config.build_dir().to_string_lossy().into_owned());
        args.push(manifest_path.to_string_lossy().into_owned());

        let checkouts: Vec<PathBuf> = open.iter().map(|m| self.config.checkout_path(m)).collect();
        run_guarded(self.git, checkouts, &self.config.working_branch, || {
            self.tool.run(&args, &self.config.workdir)
        })
    }
}

/// The shell command that runs a module's test suite.
pub fn test_command(buildsystem: Option<&str>, distcheck: bool, extra_args: &[String]) -> String {
    let base = match (buildsystem, distcheck) {
        (Some("meson"), _) => "ninja test",
        (_, true) => "make distcheck",
        (_, false) => "make check",
    };
    std::iter::once(base)
        .chain(extra_args.iter().map(String::as_str))
        .collect::<Vec<_>>()
        .join(" ")
}

/// Make `target.module` run its tests and return the module the build
/// should stop at, which is the one after it.
///
/// The test command runs before the module's own build commands, with
/// `test_permissions` ahead of any existing build arguments.
pub fn inject_test(
    manifest: &mut Manifest,
    target: &TestTarget,
    test_permissions: &[String],
    extra_test_args: &[String],
) -> Result<Option<String>> {
    let index = manifest
        .position(&target.module)
        .ok_or_else(|| Error::ModuleNotFound {
            module: target.module.clone(),
            manifest: "the development manifest".to_string(),
        })?;

    let module = &mut manifest.modules[index];
    let command = test_command(module.buildsystem.as_deref(), target.distcheck, extra_test_args);
    module.build_commands.get_or_insert_with(Vec::new).insert(0, command);

    let options = module.build_options_mut();
    let existing = options.build_args.take().unwrap_or_default();
    options.build_args = Some(test_permissions.iter().cloned().chain(existing).collect());

    Ok(manifest.modules.get(index + 1).map(|m| m.name.clone()))
}
