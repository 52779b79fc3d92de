//! Common test utilities for devsdk integration tests.
//!
//! This module provides shared helpers, fixtures, and configuration constants
//! to reduce boilerplate across test files.
//!
//! # Usage
//!
//! In your integration test file:
//!
//! ```rust,ignore
//! mod common;
//! use common::prelude::*;
//! ```

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_fs::prelude::*;

/// Commonly used imports for integration tests.
pub mod prelude {
    pub use assert_cmd::cargo::cargo_bin_cmd;
    pub use assert_fs::prelude::*;
    pub use assert_fs::TempDir;
    pub use predicates::prelude::*;

    pub use super::{git, git_output, init_repo, TestFixture};
}

/// Upstream SDK manifests used by the fixtures.
pub mod manifests {
    /// Three modules with git sources; `{upstream}` is replaced with the
    /// directory holding the upstream repositories.
    pub const THREE_MODULES: &str = r#"{
    "id": "org.gnome.Sdk",
    "runtime": "org.gnome.Platform",
    "sdk": "org.gnome.Sdk",
    "runtime-version": "3.38",
    "sdk-extensions": ["org.freedesktop.Sdk.Extension.rust-stable"],
    "build-options": {"cflags": "-O2 -g", "strip": true},
    "finish-args": ["--sdk=org.gnome.Sdk//3.38", "--env=GI_TYPELIB_PATH=/app/lib/girepository-1.0"],
    "modules": [
        {
            "name": "glib",
            "buildsystem": "meson",
            "sources": [{"type": "git", "url": "{upstream}/glib", "branch": "main"}]
        },
        {
            "name": "pango",
            "buildsystem": "meson",
            "sources": [{"type": "git", "url": "{upstream}/pango", "branch": "main"}]
        },
        {
            "name": "gtk3",
            "sources": [{"type": "git", "url": "{upstream}/gtk3", "branch": "main"}]
        }
    ]
}"#;
}

/// Environment that makes git ignore the user's own configuration.
const GIT_ENV: &[(&str, &str)] = &[
    ("GIT_CONFIG_GLOBAL", "/dev/null"),
    ("GIT_CONFIG_NOSYSTEM", "1"),
    ("GIT_AUTHOR_NAME", "devsdk tests"),
    ("GIT_AUTHOR_EMAIL", "tests@example.com"),
    ("GIT_COMMITTER_NAME", "devsdk tests"),
    ("GIT_COMMITTER_EMAIL", "tests@example.com"),
];

/// Run git in `dir`, panicking if it fails.
pub fn git(dir: &Path, args: &[&str]) {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .envs(GIT_ENV.iter().copied())
        .output()
        .expect("Failed to run git");
    assert!(
        output.status.success(),
        "git {:?} failed in {}: {}",
        args,
        dir.display(),
        String::from_utf8_lossy(&output.stderr)
    );
}

/// Run git in `dir` and return its trimmed stdout.
pub fn git_output(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .envs(GIT_ENV.iter().copied())
        .output()
        .expect("Failed to run git");
    assert!(output.status.success(), "git {:?} failed", args);
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

/// Create a repository at `dir` on branch `main` with one commit.
pub fn init_repo(dir: &Path) {
    fs::create_dir_all(dir).expect("Failed to create repository directory");
    git(dir, &["init", "-q"]);
    git(dir, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    fs::write(dir.join("README"), "upstream\n").expect("Failed to write README");
    git(dir, &["add", "README"]);
    git(dir, &["commit", "-q", "-m", "Initial commit"]);
}

/// A test fixture laid out the way devsdk expects to find things.
///
/// ```text
/// <tmp>/devsdk.ini              configuration
/// <tmp>/fake-builder.sh         stands in for flatpak-builder
/// <tmp>/upstream/<module>       upstream git repositories
/// <tmp>/work                    workdir
/// <tmp>/work/checkout/sdk-images/org.gnome.Sdk.json.in
/// ```
///
/// `flatpak` and `ostree` are configured as `true`, so every flatpak call
/// succeeds without doing anything. The fake builder writes its arguments,
/// one per line, to `builder-args.txt`, and the branch of every checkout
/// to `builder-branches.txt`. With `$FAKE_BUILDER_SIGNAL` set it then sends
/// that signal to devsdk, the way Ctrl-C reaches the whole process group. It
/// exits with `$FAKE_BUILDER_EXIT`, or 0.
///
/// # Example
///
/// ```rust,ignore
/// let fixture = TestFixture::new().with_upstream_modules();
/// fixture.command().args(["open", "glib"]).assert().success();
/// ```
pub struct TestFixture {
    temp_dir: assert_fs::TempDir,
    flatpak: String,
    common_keys: String,
    sections: String,
}

impl TestFixture {
    /// Create a fixture with a configuration, the upstream SDK manifest and
    /// the fake builder, but no upstream repositories.
    pub fn new() -> Self {
        let fixture = Self {
            temp_dir: assert_fs::TempDir::new().expect("Failed to create temp directory"),
            flatpak: "true".to_string(),
            common_keys: String::new(),
            sections: String::new(),
        };
        fixture.write_config();
        fixture.write_manifest(manifests::THREE_MODULES);
        fixture.write_fake_builder();
        fixture
    }

    /// Create the upstream repositories of every module in the manifest.
    pub fn with_upstream_modules(self) -> Self {
        for module in ["glib", "pango", "gtk3"] {
            init_repo(&self.upstream_path(module));
        }
        self
    }

    /// Add per-module sections to the configuration.
    pub fn with_config_sections(mut self, sections: &str) -> Self {
        self.sections = sections.to_string();
        self.write_config();
        self
    }

    /// Append lines to the `[Common]` section of the configuration.
    pub fn with_common_keys(mut self, keys: &str) -> Self {
        self.common_keys = keys.to_string();
        self.write_config();
        self
    }

    /// Use the fake builder for `flatpak` too, so its arguments are recorded.
    pub fn with_recording_flatpak(mut self) -> Self {
        self.flatpak = self.builder_path().to_string_lossy().into_owned();
        self.write_config();
        self
    }

    /// Replace the pre-written SDK checkout with an upstream repository
    /// holding the manifest on `master`, for `setup` to clone.
    pub fn with_upstream_sdk(self) -> Self {
        let checkout = self.checkoutdir().join("sdk-images");
        fs::remove_dir_all(&checkout).expect("Failed to remove SDK checkout");

        let upstream = self.upstream_path("sdk-images");
        init_repo(&upstream);
        let manifest = manifests::THREE_MODULES
            .replace("{upstream}", &self.path().join("upstream").to_string_lossy());
        fs::write(upstream.join("org.gnome.Sdk.json.in"), manifest)
            .expect("Failed to write manifest");
        git(&upstream, &["add", "org.gnome.Sdk.json.in"]);
        git(&upstream, &["commit", "-q", "-m", "Add manifest"]);
        git(&upstream, &["branch", "master"]);
        self
    }

    /// Add a file with the given path and content.
    pub fn with_file(self, path: &str, content: &str) -> Self {
        self.temp_dir
            .child(path)
            .write_str(content)
            .expect("Failed to write file");
        self
    }

    fn write_config(&self) {
        let content = format!(
            "[Common]\n\
             workdir = {work}\n\
             sdk_upstream = {root}/upstream/sdk-images\n\
             modules = glib pango gtk3\n\
             test_permissions = --share=network\n\
             flatpak = {flatpak}\n\
             ostree = true\n\
             flatpak_builder = {builder}\n\
             {common_keys}\
             \n\
             {sections}",
            work = self.workdir().display(),
            root = self.path().display(),
            flatpak = self.flatpak,
            builder = self.builder_path().display(),
            common_keys = self.common_keys,
            sections = self.sections,
        );
        fs::write(self.config_path(), content).expect("Failed to write config file");
    }

    fn write_manifest(&self, template: &str) {
        let upstream = self.path().join("upstream");
        let manifest = template.replace("{upstream}", &upstream.to_string_lossy());
        let path = self.source_manifest_path();
        fs::create_dir_all(path.parent().expect("manifest has a parent"))
            .expect("Failed to create SDK checkout");
        fs::write(path, manifest).expect("Failed to write manifest");
    }

    #[cfg(unix)]
    fn write_fake_builder(&self) {
        use std::os::unix::fs::PermissionsExt;

        let script = format!(
            "#!/bin/sh\n\
             printf '%s\\n' \"$@\" > '{args}'\n\
             : > '{branches}'\n\
             for dir in '{checkouts}'/*/; do\n\
             \x20 if [ -d \"$dir/.git\" ]; then\n\
             \x20   printf '%s %s\\n' \"$(basename \"$dir\")\" \"$(git -C \"$dir\" rev-parse --abbrev-ref HEAD)\" >> '{branches}'\n\
             \x20 fi\n\
             done\n\
             if [ -n \"$FAKE_BUILDER_SIGNAL\" ]; then\n\
             \x20 kill -\"$FAKE_BUILDER_SIGNAL\" \"$PPID\"\n\
             \x20 sleep 1\n\
             fi\n\
             exit ${{FAKE_BUILDER_EXIT:-0}}\n",
            args = self.builder_args_path().display(),
            branches = self.builder_branches_path().display(),
            checkouts = self.checkoutdir().display(),
        );
        let path = self.builder_path();
        fs::write(&path, script).expect("Failed to write fake builder");
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755))
            .expect("Failed to make fake builder executable");
    }

    #[cfg(not(unix))]
    fn write_fake_builder(&self) {}

    /// Get the path to the temporary directory.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Get the path to the config file.
    pub fn config_path(&self) -> PathBuf {
        self.path().join("devsdk.ini")
    }

    pub fn workdir(&self) -> PathBuf {
        self.path().join("work")
    }

    pub fn checkoutdir(&self) -> PathBuf {
        self.workdir().join("checkout")
    }

    /// Checkout of a module under development.
    pub fn checkout_path(&self, module: &str) -> PathBuf {
        self.checkoutdir().join(module)
    }

    /// Upstream repository a module is cloned from.
    pub fn upstream_path(&self, module: &str) -> PathBuf {
        self.path().join("upstream").join(module)
    }

    pub fn source_manifest_path(&self) -> PathBuf {
        self.checkoutdir().join("sdk-images").join("org.gnome.Sdk.json.in")
    }

    /// The development manifest written by `build` and `test`.
    pub fn dev_manifest_path(&self) -> PathBuf {
        self.workdir().join("org.gnome.dev.Sdk.json")
    }

    pub fn state_path(&self) -> PathBuf {
        self.workdir().join("state.json")
    }

    fn builder_path(&self) -> PathBuf {
        self.path().join("fake-builder.sh")
    }

    fn builder_args_path(&self) -> PathBuf {
        self.path().join("builder-args.txt")
    }

    fn builder_branches_path(&self) -> PathBuf {
        self.path().join("builder-branches.txt")
    }

    /// Arguments of the last fake builder run.
    pub fn builder_args(&self) -> Vec<String> {
        fs::read_to_string(self.builder_args_path())
            .expect("fake builder did not run")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Whether the fake builder has run at all.
    pub fn builder_ran(&self) -> bool {
        self.builder_args_path().exists()
    }

    /// `<module> <branch>` for every checkout, as seen by the last builder run.
    pub fn builder_branches(&self) -> Vec<String> {
        fs::read_to_string(self.builder_branches_path())
            .expect("fake builder did not run")
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Mark modules as open by writing the state file directly.
    pub fn with_open_modules(self, modules: &[&str]) -> Self {
        fs::create_dir_all(self.workdir()).expect("Failed to create workdir");
        let state = serde_json::json!({ "open_modules": modules });
        fs::write(self.state_path(), state.to_string()).expect("Failed to write state");
        self
    }

    /// Create a checkout of `module` cloned from its upstream repository.
    pub fn with_checkout(self, module: &str) -> Self {
        fs::create_dir_all(self.checkoutdir()).expect("Failed to create checkoutdir");
        let upstream = self.upstream_path(module);
        git(
            &self.checkoutdir(),
            &["clone", "-q", &upstream.to_string_lossy(), module],
        );
        self
    }

    /// Create a command running devsdk against this fixture's configuration.
    pub fn command(&self) -> assert_cmd::Command {
        let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("devsdk");
        cmd.current_dir(self.path())
            .envs(GIT_ENV.iter().copied())
            .env_remove("RUST_LOG")
            .env_remove("FAKE_BUILDER_EXIT")
            .env_remove("FAKE_BUILDER_SIGNAL")
            .arg("--config")
            .arg(self.config_path())
            .arg("--color")
            .arg("never");
        cmd
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}
