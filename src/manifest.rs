//! # Build Manifest Model
//!
//! A typed view of a flatpak-builder manifest. Only the parts devsdk reads or
//! rewrites are typed: the module list, each module's sources and build
//! settings, and the top-level `build-options` and `finish-args`. Everything
//! else is kept verbatim in `extra` maps, in its original order, and written
//! back unchanged.
//!
//! Presence is explicit. A field that was absent is `None` and stays absent
//! on output; a field that was present but empty round-trips as empty.
//!
//! Upstream SDK manifests are JSON with C-style comments, so JSON input is
//! run through [`strip_json_comments`] first. Files ending in `.yaml` or
//! `.yml` are read as YAML.

use std::fs;
use std::path::Path;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::config::FlagFamily;
use crate::error::{Error, Result};

/// A flatpak-builder manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Manifest {
    /// Top-level keys devsdk does not interpret (`id`, `runtime`, ...).
    #[serde(flatten)]
    pub extra: Map<String, Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_options: Option<BuildOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub finish_args: Option<Vec<String>>,
    #[serde(default)]
    pub modules: Vec<Module>,
}

/// One module of a manifest.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct Module {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub buildsystem: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub config_opts: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub make_install_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_options: Option<BuildOptions>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_commands: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<Source>>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One source of a module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Source {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub branch: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// `build-options` of a manifest or module.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub struct BuildOptions {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cflags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cppflags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cxxflags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ldflags: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub build_args: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub env: Option<Map<String, Value>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strip: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub no_debuginfo: Option<bool>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl Source {
    /// A git source tracking `branch` of `url`.
    pub fn git(url: impl Into<String>, branch: impl Into<String>) -> Self {
        Self {
            kind: "git".to_string(),
            url: Some(url.into()),
            branch: Some(branch.into()),
            extra: Map::new(),
        }
    }

    pub fn is_git(&self) -> bool {
        self.kind == "git"
    }
}

impl BuildOptions {
    /// Flags of `family`, if set.
    pub fn flags(&self, family: FlagFamily) -> Option<&str> {
        match family {
            FlagFamily::CFlags => self.cflags.as_deref(),
            FlagFamily::CppFlags => self.cppflags.as_deref(),
            FlagFamily::CxxFlags => self.cxxflags.as_deref(),
            FlagFamily::LdFlags => self.ldflags.as_deref(),
        }
    }

    /// Append `flags` to `family`, separated from any existing flags by one
    /// space.
    pub fn append_flags(&mut self, family: FlagFamily, flags: &str) {
        let slot = match family {
            FlagFamily::CFlags => &mut self.cflags,
            FlagFamily::CppFlags => &mut self.cppflags,
            FlagFamily::CxxFlags => &mut self.cxxflags,
            FlagFamily::LdFlags => &mut self.ldflags,
        };
        *slot = Some(match slot.as_deref() {
            Some(existing) if !existing.is_empty() => format!("{} {}", existing, flags),
            _ => flags.to_string(),
        });
    }
}

impl Module {
    /// A module with only a name; used by tests and dev-tools snippets.
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Default::default()
        }
    }

    /// The module's build options, created empty if absent.
    pub fn build_options_mut(&mut self) -> &mut BuildOptions {
        self.build_options.get_or_insert_with(BuildOptions::default)
    }

    /// The first declared source, which is the one a checkout is cloned from.
    pub fn primary_source(&self) -> Option<&Source> {
        self.sources.as_ref().and_then(|sources| sources.first())
    }
}

impl Manifest {
    /// Read a manifest from `path`, as YAML or commented JSON depending on
    /// the extension.
    pub fn load(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)?;
        parse_document(path, &content)
    }

    /// Read a bare JSON list of modules, the format of a dev-tools manifest.
    pub fn load_module_list(path: &Path) -> Result<Vec<Module>> {
        let content = fs::read_to_string(path)?;
        parse_document(path, &content)
    }

    /// Write the manifest to `path` as JSON indented by four spaces,
    /// replacing any existing file.
    pub fn save(&self, path: &Path) -> Result<()> {
        fs::write(path, self.to_json()?)?;
        Ok(())
    }

    /// Serialize the manifest the way [`Manifest::save`] writes it.
    pub fn to_json(&self) -> Result<String> {
        let mut buffer = Vec::new();
        let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
        let mut serializer = serde_json::Serializer::with_formatter(&mut buffer, formatter);
        self.serialize(&mut serializer)?;
        buffer.push(b'\n');
        // serde_json only ever emits UTF-8
        Ok(String::from_utf8_lossy(&buffer).into_owned())
    }

    /// Value of an uninterpreted top-level key.
    pub fn get(&self, key: &str) -> Option<&Value> {
        self.extra.get(key)
    }

    /// Set an uninterpreted top-level key, keeping its position if present.
    pub fn set(&mut self, key: &str, value: impl Into<Value>) {
        self.extra.insert(key.to_string(), value.into());
    }

    /// Remove an uninterpreted top-level key.
    pub fn remove(&mut self, key: &str) -> Option<Value> {
        self.extra.shift_remove(key)
    }

    /// The module called `name`.
    pub fn module(&self, name: &str) -> Option<&Module> {
        self.modules.iter().find(|m| m.name == name)
    }

    /// Index of the module called `name` in build order.
    pub fn position(&self, name: &str) -> Option<usize> {
        self.modules.iter().position(|m| m.name == name)
    }

    /// The top-level build options, created empty if absent.
    pub fn build_options_mut(&mut self) -> &mut BuildOptions {
        self.build_options.get_or_insert_with(BuildOptions::default)
    }
}

fn parse_document<T: serde::de::DeserializeOwned>(path: &Path, content: &str) -> Result<T> {
    let is_yaml = matches!(
        path.extension().and_then(|e| e.to_str()),
        Some("yaml") | Some("yml")
    );
    let parsed = if is_yaml {
        serde_yaml::from_str(content).map_err(|e| e.to_string())
    } else {
        serde_json::from_str(&strip_json_comments(content)).map_err(|e| e.to_string())
    };
    parsed.map_err(|message| Error::ManifestParse {
        path: path.to_path_buf(),
        message,
    })
}

/// Remove `//` and `/* */` comments from JSON text.
///
/// String literals are left untouched. Newlines inside comments are kept so
/// parser error positions still match the original file.
pub fn strip_json_comments(input: &str) -> String {
    let mut output = String::with_capacity(input.len());
    let mut chars = input.chars().peekable();
    let mut in_string = false;

    while let Some(c) = chars.next() {
        if in_string {
            output.push(c);
            match c {
                '\\' => {
                    if let Some(escaped) = chars.next() {
                        output.push(escaped);
                    }
                }
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }

        match (c, chars.peek().copied()) {
            ('"', _) => {
                in_string = true;
                output.push(c);
            }
            ('/', Some('/')) => {
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        output.push('\n');
                        break;
                    }
                }
            }
            ('/', Some('*')) => {
                chars.next();
                let mut previous = '\0';
                for skipped in chars.by_ref() {
                    if skipped == '\n' {
                        output.push('\n');
                    }
                    if previous == '*' && skipped == '/' {
                        break;
                    }
                    previous = skipped;
                }
            }
            _ => output.push(c),
        }
    }

    output
}
