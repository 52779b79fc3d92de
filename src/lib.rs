//! # devsdk
//!
//! Develop the modules of a flatpak SDK in place. A developer picks modules of
//! an upstream SDK (glib, gtk3, ...) to work on; devsdk keeps git checkouts of
//! them, derives a development runtime manifest that builds those modules from
//! the checkouts, and drives `flatpak-builder` while keeping every checkout on
//! a scratch branch that captures uncommitted work.
//!
//! ## Quick Example
//!
//! ```
//! use devsdk::state::OpenModules;
//!
//! let mut open = OpenModules::new();
//! assert!(open.open("gtk3"));
//! assert!(!open.open("gtk3"));
//! open.close("gtk3").unwrap();
//! assert!(open.is_empty());
//! ```
//!
//! ## Core Concepts
//!
//! - **Configuration (`config`, `defaults`)**: the INI file describing the
//!   workdir, the upstream SDK and per-module overrides.
//! - **Open modules (`state`)**: the persisted set of modules under
//!   development.
//! - **Manifests (`manifest`, `transform`)**: the typed manifest model and the
//!   pure transformation from the upstream manifest to the development one.
//! - **Branch guards (`git`, `guard`, `signals`)**: all git plumbing, and the
//!   guards that hold checkouts on the working branch for the duration of a
//!   build, with Ctrl-C held off until they are restored.
//! - **Building (`builder`, `tools`, `checkout`)**: flatpak tooling, local
//!   checkouts and the build orchestration tying it all together.
//!
//! ## Execution Flow
//!
//! A build runs these steps:
//!
//! 1.  **Load**: read the open modules and the upstream SDK manifest.
//! 2.  **Transform**: derive the development manifest.
//! 3.  **Inject**: for `test`, add the test command and the stop point.
//! 4.  **Write**: save the manifest into the workdir.
//! 5.  **Guard**: switch every open checkout to the working branch.
//! 6.  **Build**: run flatpak-builder and wait for it.
//! 7.  **Restore**: put every checkout back where it was, in reverse order.

pub mod builder;
pub mod checkout;
pub mod config;
pub mod defaults;
pub mod error;
pub mod git;
pub mod guard;
pub mod manifest;
pub mod output;
pub mod signals;
pub mod state;
pub mod suggestions;
pub mod tools;
pub mod transform;
