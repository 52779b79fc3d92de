//! # Development Manifest Transformation
//!
//! Derives the manifest actually fed to the builder from the upstream SDK
//! manifest. The transformation is a pure function of its inputs: the source
//! manifest is only borrowed, and the same inputs always give the same output.
//!
//! ## Rules
//!
//! 1.  **Identity**: the result is a development SDK (`id`, `branch`,
//!     `runtime`, `sdk`, `runtime-version`, `sdk-extensions`) built on top of
//!     the upstream SDK. Keys that only make sense for the upstream runtime
//!     (platform ids, metadata, inherited and added extensions, platform
//!     cleanup) are removed, and `finish-args` loses its `--sdk`/`--runtime`
//!     entries.
//! 2.  **Debuggability**: top-level `build-options` force `strip: false` and
//!     `no-debuginfo: true`.
//! 3.  **Module selection**: the module list is the dev-tools modules followed
//!     by every source module that is both open and developable, in the
//!     source manifest's order. The order matters: `--stop-at` is computed
//!     from it.
//! 4.  **Local sources**: each selected module builds from the working branch
//!     of its local checkout.
//! 5.  **Overrides**: per-module overrides only ever extend what the source
//!     module declares.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde_json::Value;

use crate::config::{Config, FlagFamily, ModuleOverrides};
use crate::error::{Error, Result};
use crate::manifest::{Manifest, Module, Source};

/// Top-level keys removed from the development manifest.
const UPSTREAM_ONLY_KEYS: &[&str] = &[
    "id-platform",
    "metadata",
    "metadata-platform",
    "platform-extensions",
    "inherit-extensions",
    "add-extensions",
    "cleanup-platform",
    "cleanup-platform-commands",
];

/// Identity of the development SDK and where its module sources live.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DevTarget {
    pub dev_sdk_id: String,
    pub sdk_id: String,
    pub sdk_branch: String,
    pub checkoutdir: PathBuf,
    pub working_branch: String,
}

impl DevTarget {
    pub fn from_config(config: &Config) -> Self {
        Self {
            dev_sdk_id: config.dev_sdk_id.clone(),
            sdk_id: config.sdk_id.clone(),
            sdk_branch: config.sdk_branch.clone(),
            checkoutdir: config.checkoutdir.clone(),
            working_branch: config.working_branch.clone(),
        }
    }
}

/// Turns an upstream manifest into a development manifest.
#[derive(Debug, Clone)]
pub struct ManifestTransformer {
    target: DevTarget,
    allowed: Vec<String>,
    dev_tools: Vec<Module>,
    overrides: BTreeMap<String, ModuleOverrides>,
}

impl ManifestTransformer {
    pub fn new(
        target: DevTarget,
        allowed: Vec<String>,
        dev_tools: Vec<Module>,
        overrides: BTreeMap<String, ModuleOverrides>,
    ) -> Self {
        Self {
            target,
            allowed,
            dev_tools,
            overrides,
        }
    }

    /// A transformer for the configured SDK, allow-list and overrides.
    pub fn from_config(config: &Config, dev_tools: Vec<Module>) -> Self {
        Self::new(
            DevTarget::from_config(config),
            config.modules.clone(),
            dev_tools,
            config.overrides().clone(),
        )
    }

    /// Derive the development manifest for the `open` modules.
    ///
    /// Fails with [`Error::ModuleNotFound`] if an open module is missing from
    /// `source`, which means the persisted state no longer matches the
    /// upstream manifest.
    pub fn transform(&self, source: &Manifest, open: &[String]) -> Result<Manifest> {
        if let Some(missing) = open.iter().find(|name| source.module(name).is_none()) {
            return Err(Error::ModuleNotFound {
                module: missing.clone(),
                manifest: describe(source),
            });
        }

        let mut manifest = source.clone();
        self.rewrite_identity(&mut manifest);

        let developed: Vec<Module> = source
            .modules
            .iter()
            .filter(|m| open.contains(&m.name) && self.allowed.contains(&m.name))
            .map(|m| self.develop(m.clone()))
            .collect();

        manifest.modules = self.dev_tools.iter().cloned().chain(developed).collect();
        Ok(manifest)
    }

    fn rewrite_identity(&self, manifest: &mut Manifest) {
        let target = &self.target;
        manifest.set("separate-locales", false);
        manifest.set("id", target.dev_sdk_id.as_str());
        manifest.set("branch", "master");
        manifest.set("runtime", target.sdk_id.as_str());
        manifest.set("sdk", target.sdk_id.as_str());
        manifest.set("runtime-version", target.sdk_branch.as_str());
        manifest.set(
            "sdk-extensions",
            vec![
                Value::from(format!("{}.Debug", target.sdk_id)),
                Value::from(format!("{}.Locale", target.sdk_id)),
            ],
        );
        for key in UPSTREAM_ONLY_KEYS {
            manifest.remove(key);
        }

        let build_options = manifest.build_options_mut();
        build_options.strip = Some(false);
        build_options.no_debuginfo = Some(true);

        let finish_args = manifest.finish_args.take().unwrap_or_default();
        manifest.finish_args = Some(
            finish_args
                .into_iter()
                .filter(|arg| !arg.starts_with("--sdk") && !arg.starts_with("--runtime"))
                .collect(),
        );
    }

    fn develop(&self, mut module: Module) -> Module {
        let checkout = self.target.checkoutdir.join(&module.name);
        module.sources = Some(vec![Source::git(
            checkout.to_string_lossy(),
            self.target.working_branch.as_str(),
        )]);

        let Some(overrides) = self.overrides.get(&module.name) else {
            return module;
        };

        for family in FlagFamily::ALL {
            if let Some(flags) = overrides.extra_flags(family) {
                module.build_options_mut().append_flags(family, flags);
            }
        }
        extend(&mut module.config_opts, &overrides.extra_config_opts);
        extend(&mut module.make_args, &overrides.extra_make_args);
        extend(
            &mut module.make_install_args,
            &overrides.extra_make_install_args,
        );
        if !overrides.extra_build_args.is_empty() {
            extend(
                &mut module.build_options_mut().build_args,
                &overrides.extra_build_args,
            );
        }
        if !overrides.extra_env.is_empty() {
            let env = module.build_options_mut().env.get_or_insert_with(Default::default);
            for (name, value) in &overrides.extra_env {
                env.insert(name.clone(), Value::from(value.as_str()));
            }
        }
        module
    }
}

fn extend(list: &mut Option<Vec<String>>, extra: &[String]) {
    if extra.is_empty() {
        return;
    }
    list.get_or_insert_with(Vec::new).extend(extra.iter().cloned());
}

fn describe(manifest: &Manifest) -> String {
    match manifest.get("id").and_then(Value::as_str) {
        Some(id) => format!("the {} manifest", id),
        None => "the source manifest".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    fn target() -> DevTarget {
        DevTarget {
            dev_sdk_id: "org.gnome.dev.Sdk".to_string(),
            sdk_id: "org.gnome.Sdk".to_string(),
            sdk_branch: "45".to_string(),
            checkoutdir: PathBuf::from("/w/checkout"),
            working_branch: "devsdk".to_string(),
        }
    }

    fn names(names: &[&str]) -> Vec<String> {
        names.iter().map(|n| n.to_string()).collect()
    }

    fn source(modules: &[&str]) -> Manifest {
        let modules: Vec<Value> = modules
            .iter()
            .map(|name| {
                json!({
                    "name": name,
                    "sources": [{"type": "archive", "url": format!("https://x/{}.tar.xz", name)}]
                })
            })
            .collect();
        serde_json::from_value(json!({
            "id": "org.gnome.Sdk",
            "id-platform": "org.gnome.Platform",
            "branch": "45",
            "runtime": "org.freedesktop.Platform",
            "metadata": "metadata.sdk",
            "inherit-extensions": ["org.freedesktop.GL"],
            "add-extensions": {"org.gnome.Sdk.Docs": {}},
            "cleanup-platform": ["/include"],
            "finish-args": ["--sdk=org.gnome.Sdk//45", "--env=A=1", "--runtime=org.gnome.Platform//45"],
            "build-options": {"cflags": "-O2", "strip": true},
            "modules": modules
        }))
        .unwrap()
    }

    fn transformer(allowed: &[&str]) -> ManifestTransformer {
        ManifestTransformer::new(target(), names(allowed), Vec::new(), BTreeMap::new())
    }

    fn module_names(manifest: &Manifest) -> Vec<&str> {
        manifest.modules.iter().map(|m| m.name.as_str()).collect()
    }

    #[test]
    fn test_module_order_follows_source() {
        let source = source(&["A", "B", "C", "D"]);
        let result = transformer(&["A", "B", "C", "D"])
            .transform(&source, &names(&["D", "B"]))
            .unwrap();
        assert_eq!(module_names(&result), vec!["B", "D"]);
    }

    #[test]
    fn test_open_but_not_allowed_is_skipped() {
        let source = source(&["A", "B", "C"]);
        let result = transformer(&["A", "C"])
            .transform(&source, &names(&["A", "B", "C"]))
            .unwrap();
        assert_eq!(module_names(&result), vec!["A", "C"]);
    }

    #[test]
    fn test_open_module_missing_from_source() {
        let source = source(&["A", "B"]);
        let err = transformer(&["A", "B", "Z"])
            .transform(&source, &names(&["A", "Z"]))
            .unwrap_err();
        match err {
            Error::ModuleNotFound { module, manifest } => {
                assert_eq!(module, "Z");
                assert!(manifest.contains("org.gnome.Sdk"));
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_dev_tools_come_first() {
        let source = source(&["A", "B"]);
        let transformer = ManifestTransformer::new(
            target(),
            names(&["A", "B"]),
            vec![Module::named("gdb"), Module::named("strace")],
            BTreeMap::new(),
        );
        let result = transformer.transform(&source, &names(&["B"])).unwrap();
        assert_eq!(module_names(&result), vec!["gdb", "strace", "B"]);
    }

    #[test]
    fn test_identity_rewritten() {
        let result = transformer(&[]).transform(&source(&["A"]), &[]).unwrap();

        assert_eq!(result.get("id"), Some(&json!("org.gnome.dev.Sdk")));
        assert_eq!(result.get("branch"), Some(&json!("master")));
        assert_eq!(result.get("runtime"), Some(&json!("org.gnome.Sdk")));
        assert_eq!(result.get("sdk"), Some(&json!("org.gnome.Sdk")));
        assert_eq!(result.get("runtime-version"), Some(&json!("45")));
        assert_eq!(result.get("separate-locales"), Some(&json!(false)));
        assert_eq!(
            result.get("sdk-extensions"),
            Some(&json!(["org.gnome.Sdk.Debug", "org.gnome.Sdk.Locale"]))
        );
        for key in UPSTREAM_ONLY_KEYS {
            assert!(result.get(key).is_none(), "{key} should be removed");
        }
        assert_eq!(result.finish_args, Some(vec!["--env=A=1".to_string()]));

        let options = result.build_options.unwrap();
        assert_eq!(options.strip, Some(false));
        assert_eq!(options.no_debuginfo, Some(true));
        assert_eq!(options.cflags.as_deref(), Some("-O2"));
        assert!(result.modules.is_empty());
    }

    #[test]
    fn test_source_is_not_mutated() {
        let source = source(&["A", "B"]);
        let before = source.clone();
        transformer(&["A"]).transform(&source, &names(&["A"])).unwrap();
        assert_eq!(source, before);
    }

    #[test]
    fn test_sources_point_at_checkout() {
        let result = transformer(&["A"])
            .transform(&source(&["A"]), &names(&["A"]))
            .unwrap();
        let sources = result.modules[0].sources.as_ref().unwrap();
        assert_eq!(sources.len(), 1);
        assert_eq!(sources[0], Source::git("/w/checkout/A", "devsdk"));
    }

    #[test]
    fn test_overrides_are_additive() {
        let mut source = source(&["glib"]);
        source.modules[0].build_options_mut().cflags = Some("-O2".to_string());
        source.modules[0].config_opts = Some(names(&["-Dman=false"]));

        let mut extra_env = BTreeMap::new();
        extra_env.insert("G_DEBUG".to_string(), "fatal-warnings".to_string());
        let overrides = ModuleOverrides {
            extra_cflags: Some("-g".to_string()),
            extra_ldflags: Some("-Wl,-O1".to_string()),
            extra_config_opts: names(&["-Dgtk_doc=true"]),
            extra_build_args: names(&["--share=network"]),
            extra_make_args: names(&["V=1"]),
            extra_env,
            ..Default::default()
        };
        let transformer = ManifestTransformer::new(
            target(),
            names(&["glib"]),
            Vec::new(),
            BTreeMap::from([("glib".to_string(), overrides)]),
        );

        let result = transformer.transform(&source, &names(&["glib"])).unwrap();
        let glib = &result.modules[0];
        let options = glib.build_options.as_ref().unwrap();
        assert_eq!(options.cflags.as_deref(), Some("-O2 -g"));
        assert_eq!(options.ldflags.as_deref(), Some("-Wl,-O1"));
        assert_eq!(options.build_args, Some(names(&["--share=network"])));
        assert_eq!(
            options.env.as_ref().unwrap().get("G_DEBUG"),
            Some(&json!("fatal-warnings"))
        );
        assert_eq!(
            glib.config_opts,
            Some(names(&["-Dman=false", "-Dgtk_doc=true"]))
        );
        assert_eq!(glib.make_args, Some(names(&["V=1"])));
        assert_eq!(glib.make_install_args, None);
    }

    #[test]
    fn test_no_overrides_adds_nothing() {
        let result = transformer(&["A"])
            .transform(&source(&["A"]), &names(&["A"]))
            .unwrap();
        let module = &result.modules[0];
        assert!(module.build_options.is_none());
        assert!(module.config_opts.is_none());
    }

    #[test]
    fn test_transform_is_deterministic() {
        let source = source(&["A", "B", "C"]);
        let transformer = transformer(&["A", "C"]);
        let open = names(&["C", "A"]);
        assert_eq!(
            transformer.transform(&source, &open).unwrap(),
            transformer.transform(&source, &open).unwrap()
        );
    }

    proptest! {
        /// Property: selected modules appear in source order whatever the open order
        #[test]
        fn selection_is_a_stable_filter(
            open_mask in prop::collection::vec(any::<bool>(), 6),
            shuffle in any::<usize>(),
        ) {
            let all = ["m0", "m1", "m2", "m3", "m4", "m5"];
            let mut open: Vec<String> = all
                .iter()
                .zip(&open_mask)
                .filter(|(_, open)| **open)
                .map(|(name, _)| name.to_string())
                .collect();
            if !open.is_empty() {
                let len = open.len();
                open.rotate_left(shuffle % len);
            }

            let result = transformer(&all).transform(&source(&all), &open).unwrap();
            let expected: Vec<&str> = all
                .iter()
                .zip(&open_mask)
                .filter(|(_, open)| **open)
                .map(|(name, _)| *name)
                .collect();
            prop_assert_eq!(module_names(&result), expected);
        }
    }
}
