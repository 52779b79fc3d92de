//! Default values for devsdk configuration.
//!
//! This module provides centralized default values used across commands,
//! ensuring consistency and avoiding duplication.

use std::path::PathBuf;

/// Name of the configuration file looked up in the user's config directory.
pub const DEFAULT_CONFIG_FILENAME: &str = "devsdk.ini";

/// Section of the configuration file holding the global settings.
pub const COMMON_SECTION: &str = "Common";

/// File in the workdir holding the persisted open-module set.
pub const STATE_FILENAME: &str = "state.json";

/// Directory in the workdir where the builder assembles the runtime.
pub const BUILD_DIRNAME: &str = "runtime-build";

/// Directory in the workdir holding the local ostree repository.
pub const REPO_DIRNAME: &str = "repo";

/// The builder's download and build cache, relative to the workdir.
pub const BUILDER_CACHE_DIRNAME: &str = ".flatpak-builder";

/// Name under which the local ostree repository is registered as a remote.
pub const LOCAL_REMOTE_NAME: &str = "devsdk";

/// Message of the commit the branch guard makes to capture a dirty tree.
pub const TEMPORARY_COMMIT_MESSAGE: &str = "Temporary commit for devsdk";

/// Built-in values for every `[Common]` key.
///
/// Values may reference other keys with `${key}` and are interpolated the
/// same way as values from the configuration file. The default module list
/// is the core of the GNOME development platform.
pub const COMMON_DEFAULTS: &[(&str, &str)] = &[
    ("workdir", "~/devsdk"),
    ("checkoutdir", "${workdir}/checkout"),
    ("user_installation", "no"),
    ("sdk_upstream", "https://gitlab.gnome.org/GNOME/gnome-sdk-images"),
    ("sdk_upstream_branch", "master"),
    ("sdk_id", "org.gnome.Sdk"),
    ("sdk_branch", "master"),
    ("sdk_manifest_json", "${sdk_id}.json.in"),
    ("sdk_repo_name", "devsdk-source"),
    (
        "sdk_repo_definition",
        "https://sdk.gnome.org/gnome-nightly.flatpakrepo",
    ),
    ("dev_sdk_id", "org.gnome.dev.Sdk"),
    ("dev_tools_manifest", ""),
    ("modules", "glib pango atk at-spi2-core at-spi2-atk gtk3"),
    ("test_permissions", ""),
    ("shell_permissions", ""),
    ("shell_prefix", "devsdk"),
    ("add_extensions", ""),
    ("working_branch", "devsdk"),
    ("git", "git"),
    ("flatpak", "flatpak"),
    ("flatpak_builder", "flatpak-builder"),
    ("ostree", "ostree"),
];

/// Look up the built-in value of a `[Common]` key.
pub fn common_default(key: &str) -> Option<&'static str> {
    COMMON_DEFAULTS
        .iter()
        .find(|(name, _)| *name == key)
        .map(|(_, value)| *value)
}

/// Returns the default configuration file path.
///
/// Uses the platform-appropriate config directory:
/// - Linux: `~/.config/devsdk.ini` (XDG Base Directory)
/// - macOS: `~/Library/Application Support/devsdk.ini`
///
/// Falls back to `.config/devsdk.ini` relative to the current directory if
/// the platform config directory cannot be determined.
///
/// This can be overridden by the `--config` CLI flag or the `DEVSDK_CONFIG`
/// environment variable.
pub fn default_config_path() -> PathBuf {
    dirs::config_dir()
        .unwrap_or_else(|| PathBuf::from(".config"))
        .join(DEFAULT_CONFIG_FILENAME)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_path_returns_path() {
        let path = default_config_path();
        assert!(path.ends_with(DEFAULT_CONFIG_FILENAME));
    }

    #[test]
    fn test_common_default_lookup() {
        assert_eq!(common_default("sdk_id"), Some("org.gnome.Sdk"));
        assert_eq!(common_default("working_branch"), Some("devsdk"));
        assert_eq!(common_default("no_such_key"), None);
    }

    #[test]
    fn test_common_defaults_have_unique_keys() {
        let mut keys: Vec<&str> = COMMON_DEFAULTS.iter().map(|(k, _)| *k).collect();
        let before = keys.len();
        keys.sort_unstable();
        keys.dedup();
        assert_eq!(keys.len(), before);
    }
}
