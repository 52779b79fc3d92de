//! # Configuration Loading
//!
//! devsdk reads an INI file (by default `~/.config/devsdk.ini`) with a
//! `[Common]` section for global settings and one optional section per module
//! for local overrides:
//!
//! ```ini
//! [Common]
//! workdir = ~/devsdk
//! sdk_id = org.gnome.Sdk
//! modules = glib gtk3
//! test_permissions = --socket=x11 --socket=wayland
//!
//! [glib]
//! url = https://gitlab.gnome.org/me/glib.git
//! extra_cflags = -g -O0
//! extra_config_opts = -Dgtk_doc=true
//! extra_env = G_DEBUG=fatal-warnings
//! ```
//!
//! Every `[Common]` key has a built-in default (see
//! [`crate::defaults::COMMON_DEFAULTS`]); a missing file means "all
//! defaults". Values may reference other keys with `${key}`, which resolves
//! against the current section, then `[Common]`, then the defaults, or with
//! `${section:key}` to name the section explicitly. `$$` is a literal `$`.
//! Backslashes are kept as written. A leading `~` in path values expands to
//! the home directory. List values are whitespace separated.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use ini::{Ini, ParseOption, Properties};
use regex::Regex;

use crate::defaults::{self, COMMON_SECTION};
use crate::error::{Error, Result};

/// Maximum nesting of `${key}` references before giving up.
const MAX_INTERPOLATION_DEPTH: usize = 16;

/// A family of compiler or linker flags a module override can extend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlagFamily {
    CFlags,
    CppFlags,
    CxxFlags,
    LdFlags,
}

impl FlagFamily {
    /// All flag families, in the order they are applied.
    pub const ALL: [FlagFamily; 4] = [
        FlagFamily::CFlags,
        FlagFamily::CppFlags,
        FlagFamily::CxxFlags,
        FlagFamily::LdFlags,
    ];

    fn config_key(self) -> &'static str {
        match self {
            FlagFamily::CFlags => "extra_cflags",
            FlagFamily::CppFlags => "extra_cppflags",
            FlagFamily::CxxFlags => "extra_cxxflags",
            FlagFamily::LdFlags => "extra_ldflags",
        }
    }
}

/// Local overrides for one module, from its own config section.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModuleOverrides {
    /// Git URL to clone instead of the manifest's source URL.
    pub url: Option<String>,
    pub extra_cflags: Option<String>,
    pub extra_cppflags: Option<String>,
    pub extra_cxxflags: Option<String>,
    pub extra_ldflags: Option<String>,
    pub extra_config_opts: Vec<String>,
    pub extra_build_args: Vec<String>,
    pub extra_make_args: Vec<String>,
    pub extra_test_args: Vec<String>,
    pub extra_make_install_args: Vec<String>,
    pub extra_env: BTreeMap<String, String>,
}

impl ModuleOverrides {
    /// Extra flags configured for a flag family, if any.
    pub fn extra_flags(&self, family: FlagFamily) -> Option<&str> {
        let flags = match family {
            FlagFamily::CFlags => &self.extra_cflags,
            FlagFamily::CppFlags => &self.extra_cppflags,
            FlagFamily::CxxFlags => &self.extra_cxxflags,
            FlagFamily::LdFlags => &self.extra_ldflags,
        };
        flags.as_deref().filter(|f| !f.is_empty())
    }

    fn flags_mut(&mut self, family: FlagFamily) -> &mut Option<String> {
        match family {
            FlagFamily::CFlags => &mut self.extra_cflags,
            FlagFamily::CppFlags => &mut self.extra_cppflags,
            FlagFamily::CxxFlags => &mut self.extra_cxxflags,
            FlagFamily::LdFlags => &mut self.extra_ldflags,
        }
    }
}

/// Paths or names of the external programs devsdk drives.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolPaths {
    pub git: String,
    pub flatpak: String,
    pub flatpak_builder: String,
    pub ostree: String,
}

/// Fully resolved devsdk configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Directory where devsdk does all its work.
    pub workdir: PathBuf,
    /// Directory holding the git checkouts of modules under development.
    pub checkoutdir: PathBuf,
    /// Use flatpak's per-user installation instead of the system one.
    pub user_installation: bool,
    /// Git URL of the repository containing the upstream SDK manifest.
    pub sdk_upstream: String,
    pub sdk_upstream_branch: String,
    /// ID of the SDK being developed against.
    pub sdk_id: String,
    pub sdk_branch: String,
    /// Manifest filename inside the upstream SDK checkout.
    pub sdk_manifest_json: String,
    pub sdk_repo_name: String,
    pub sdk_repo_definition: String,
    /// ID of the development SDK this tool produces.
    pub dev_sdk_id: String,
    /// Optional JSON file listing extra modules to build first.
    pub dev_tools_manifest: Option<PathBuf>,
    /// Modules that may be opened for development, in configured order.
    pub modules: Vec<String>,
    pub test_permissions: Vec<String>,
    pub shell_permissions: Vec<String>,
    pub shell_prefix: String,
    /// Extra runtimes to install on `setup`, as `id[/arch]/branch[:subpath]`
    /// or a bare `id` for the `master` branch.
    pub add_extensions: Vec<String>,
    /// Branch the build guard switches checkouts to.
    pub working_branch: String,
    pub tools: ToolPaths,
    overrides: BTreeMap<String, ModuleOverrides>,
}

impl Config {
    /// Load the configuration from `path`.
    ///
    /// A missing file is not an error: every key takes its default.
    pub fn load(path: &Path) -> Result<Self> {
        match std::fs::read_to_string(path) {
            Ok(content) => Self::parse(&content).map_err(|e| match e {
                Error::Config { message } => Error::Config {
                    message: format!("{}: {}", path.display(), message),
                },
                other => other,
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::debug!("No config file at {}, using defaults", path.display());
                Self::parse("")
            }
            Err(e) => Err(Error::Io(e)),
        }
    }

    /// Parse configuration from INI text.
    pub fn parse(content: &str) -> Result<Self> {
        let options = ParseOption {
            enabled_escape: false,
            ..ParseOption::default()
        };
        let ini = Ini::load_from_str_opt(content, options).map_err(|e| Error::Config {
            message: e.to_string(),
        })?;
        let resolver = Resolver::new(&ini)?;

        let common = |key: &str| resolver.common(key);
        let list = |key: &str| -> Result<Vec<String>> { Ok(split_list(&common(key)?)) };

        let dev_tools_manifest = common("dev_tools_manifest")?;
        let dev_tools_manifest =
            (!dev_tools_manifest.trim().is_empty()).then(|| expand_tilde(dev_tools_manifest.trim()));

        let mut overrides = BTreeMap::new();
        for (section, props) in ini.iter() {
            let Some(section) = section else { continue };
            if section == COMMON_SECTION {
                continue;
            }
            overrides.insert(
                section.to_string(),
                parse_overrides(&resolver, section, props)?,
            );
        }

        Ok(Self {
            workdir: expand_tilde(&common("workdir")?),
            checkoutdir: expand_tilde(&common("checkoutdir")?),
            user_installation: parse_bool("user_installation", &common("user_installation")?)?,
            sdk_upstream: common("sdk_upstream")?,
            sdk_upstream_branch: common("sdk_upstream_branch")?,
            sdk_id: common("sdk_id")?,
            sdk_branch: common("sdk_branch")?,
            sdk_manifest_json: common("sdk_manifest_json")?,
            sdk_repo_name: common("sdk_repo_name")?,
            sdk_repo_definition: common("sdk_repo_definition")?,
            dev_sdk_id: common("dev_sdk_id")?,
            dev_tools_manifest,
            modules: list("modules")?,
            test_permissions: list("test_permissions")?,
            shell_permissions: list("shell_permissions")?,
            shell_prefix: common("shell_prefix")?,
            add_extensions: list("add_extensions")?,
            working_branch: common("working_branch")?,
            tools: ToolPaths {
                git: common("git")?,
                flatpak: common("flatpak")?,
                flatpak_builder: common("flatpak_builder")?,
                ostree: common("ostree")?,
            },
            overrides,
        })
    }

    /// Overrides configured for `module`, if it has a section.
    pub fn module_overrides(&self, module: &str) -> Option<&ModuleOverrides> {
        self.overrides.get(module)
    }

    /// All per-module overrides, keyed by module name.
    pub fn overrides(&self) -> &BTreeMap<String, ModuleOverrides> {
        &self.overrides
    }

    /// Whether `module` may be opened for development.
    pub fn is_allowed(&self, module: &str) -> bool {
        self.modules.iter().any(|m| m == module)
    }

    /// Path of the generated development manifest.
    pub fn manifest_path(&self) -> PathBuf {
        self.workdir.join(format!("{}.json", self.dev_sdk_id))
    }

    /// Path of the persisted open-module state.
    pub fn state_path(&self) -> PathBuf {
        self.workdir.join(defaults::STATE_FILENAME)
    }

    /// The local ostree repository the builder exports to.
    pub fn repo_dir(&self) -> PathBuf {
        self.workdir.join(defaults::REPO_DIRNAME)
    }

    /// The builder's scratch directory.
    pub fn build_dir(&self) -> PathBuf {
        self.workdir.join(defaults::BUILD_DIRNAME)
    }

    /// The builder's download and build cache.
    pub fn builder_cache_dir(&self) -> PathBuf {
        self.workdir.join(defaults::BUILDER_CACHE_DIRNAME)
    }

    /// Checkout directory of a module under development.
    pub fn checkout_path(&self, module: &str) -> PathBuf {
        self.checkoutdir.join(module)
    }

    /// Where the upstream SDK repository is cloned.
    ///
    /// Named after the last path component of `sdk_upstream`, without a
    /// `.git` suffix, matching what `git clone` creates.
    pub fn upstream_sdk_checkout(&self) -> PathBuf {
        self.checkoutdir.join(repository_dir_name(&self.sdk_upstream))
    }

    /// Path to the manifest of the upstream SDK being developed.
    pub fn source_manifest_path(&self) -> PathBuf {
        self.upstream_sdk_checkout().join(&self.sdk_manifest_json)
    }
}

/// Resolves `[Common]` and module keys with `${key}` and `${section:key}`
/// interpolation.
struct Resolver<'a> {
    ini: &'a Ini,
    common: Option<&'a Properties>,
    pattern: Regex,
}

impl<'a> Resolver<'a> {
    fn new(ini: &'a Ini) -> Result<Self> {
        let pattern = Regex::new(r"\$(?:\$|\{([A-Za-z0-9_.-]+)(?::([A-Za-z0-9_.-]+))?\})")
            .map_err(|e| Error::Config {
                message: e.to_string(),
            })?;
        Ok(Self {
            ini,
            common: ini.section(Some(COMMON_SECTION)),
            pattern,
        })
    }

    fn raw(&self, section: Option<&Properties>, key: &str) -> Option<String> {
        section
            .and_then(|props| props.get(key))
            .or_else(|| self.common.and_then(|props| props.get(key)))
            .or_else(|| defaults::common_default(key))
            .map(str::to_string)
    }

    fn common(&self, key: &str) -> Result<String> {
        let raw = self.raw(None, key).ok_or_else(|| Error::Config {
            message: format!("missing value for '{}'", key),
        })?;
        self.interpolate(None, &raw, 0)
    }

    /// Value of `key` in the named section, interpolated in that section.
    fn qualified(&self, section_name: &str, key: &str, depth: usize) -> Result<String> {
        let unknown = || Error::Config {
            message: format!("reference to unknown key '{}:{}'", section_name, key),
        };
        if section_name == COMMON_SECTION {
            let raw = self.raw(None, key).ok_or_else(unknown)?;
            return self.interpolate(None, &raw, depth + 1);
        }
        let props = self.ini.section(Some(section_name)).ok_or_else(unknown)?;
        let raw = props.get(key).ok_or_else(unknown)?;
        self.interpolate(Some(props), raw, depth + 1)
    }

    fn interpolate(&self, section: Option<&Properties>, value: &str, depth: usize) -> Result<String> {
        if depth > MAX_INTERPOLATION_DEPTH {
            return Err(Error::Config {
                message: format!("interpolation of '{}' nests too deeply", value),
            });
        }

        let mut result = String::with_capacity(value.len());
        let mut last = 0;
        for captures in self.pattern.captures_iter(value) {
            let Some(whole) = captures.get(0) else {
                continue;
            };
            result.push_str(&value[last..whole.start()]);
            last = whole.end();
            let replacement = match (captures.get(1), captures.get(2)) {
                (None, _) => "$".to_string(),
                (Some(section_name), Some(key)) => {
                    self.qualified(section_name.as_str(), key.as_str(), depth)?
                }
                (Some(name), None) => {
                    let referenced = self.raw(section, name.as_str()).ok_or_else(|| Error::Config {
                        message: format!("'{}' references unknown key '{}'", value, name.as_str()),
                    })?;
                    self.interpolate(section, &referenced, depth + 1)?
                }
            };
            result.push_str(&replacement);
        }
        result.push_str(&value[last..]);
        Ok(result)
    }
}

fn parse_overrides(resolver: &Resolver<'_>, module: &str, props: &Properties) -> Result<ModuleOverrides> {
    let value = |key: &str| -> Result<Option<String>> {
        props
            .get(key)
            .map(|raw| resolver.interpolate(Some(props), raw, 0))
            .transpose()
    };
    let list = |key: &str| -> Result<Vec<String>> {
        Ok(value(key)?.map(|v| split_list(&v)).unwrap_or_default())
    };

    let mut overrides = ModuleOverrides {
        url: value("url")?.filter(|u| !u.trim().is_empty()),
        extra_config_opts: list("extra_config_opts")?,
        extra_build_args: list("extra_build_args")?,
        extra_make_args: list("extra_make_args")?,
        extra_test_args: list("extra_test_args")?,
        extra_make_install_args: list("extra_make_install_args")?,
        ..Default::default()
    };
    for family in FlagFamily::ALL {
        *overrides.flags_mut(family) = value(family.config_key())?;
    }
    for pair in list("extra_env")? {
        let (name, val) = pair.split_once('=').ok_or_else(|| Error::Config {
            message: format!(
                "[{}] extra_env entry '{}' is not of the form NAME=VALUE",
                module, pair
            ),
        })?;
        overrides.extra_env.insert(name.to_string(), val.to_string());
    }
    Ok(overrides)
}

fn split_list(value: &str) -> Vec<String> {
    value.split_whitespace().map(str::to_string).collect()
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "1" | "yes" | "true" | "on" => Ok(true),
        "0" | "no" | "false" | "off" => Ok(false),
        other => Err(Error::Config {
            message: format!("'{}' is not a boolean value for '{}'", other, key),
        }),
    }
}

fn expand_tilde(value: &str) -> PathBuf {
    if value == "~" {
        if let Some(home) = dirs::home_dir() {
            return home;
        }
    } else if let Some(rest) = value.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(rest);
        }
    }
    PathBuf::from(value)
}

/// Directory name `git clone` picks for a repository URL.
fn repository_dir_name(upstream: &str) -> String {
    let last = match url::Url::parse(upstream) {
        Ok(parsed) => parsed
            .path_segments()
            .and_then(|segments| segments.filter(|s| !s.is_empty()).last())
            .map(str::to_string),
        Err(_) => None,
    };
    let last = last.unwrap_or_else(|| {
        upstream
            .trim_end_matches('/')
            .rsplit(['/', ':'])
            .next()
            .unwrap_or(upstream)
            .to_string()
    });
    last.strip_suffix(".git").unwrap_or(&last).to_string()
}
