//! # Persisted Open-Module State
//!
//! devsdk keeps the list of modules currently open for development in a
//! small JSON record inside the workdir (not in a global cache directory), so
//! several workdirs hacking on different runtimes can coexist.
//!
//! - **`OpenModules`**: the in-memory ordered set. Insertion order is kept,
//!   duplicates never occur.
//! - **`StateStore`**: a handle on the state file. Every mutation is a full
//!   read-modify-write of the record, and every write goes to a temporary
//!   sibling file that is renamed over the real one, so a crash leaves either
//!   the old or the new record on disk, never a torn one.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::config::Config;
use crate::error::{Error, Result};

/// Ordered set of module names open for development.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OpenModules {
    names: Vec<String>,
}

impl OpenModules {
    /// Create an empty set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `name` at the end. Returns `false` if it was already open.
    pub fn open(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    /// Remove `name`, failing with [`Error::NotOpen`] if it is absent.
    pub fn close(&mut self, name: &str) -> Result<()> {
        let index = self
            .names
            .iter()
            .position(|n| n == name)
            .ok_or_else(|| Error::NotOpen {
                module: name.to_string(),
            })?;
        self.names.remove(index);
        Ok(())
    }

    /// Whether `name` is open.
    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    /// A copy of the open names, in the order they were opened.
    pub fn list(&self) -> Vec<String> {
        self.names.clone()
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

impl FromIterator<String> for OpenModules {
    fn from_iter<I: IntoIterator<Item = String>>(iter: I) -> Self {
        let mut set = OpenModules::new();
        for name in iter {
            set.open(&name);
        }
        set
    }
}

/// On-disk representation of the state file.
#[derive(Debug, Default, Serialize, Deserialize)]
struct StateRecord {
    #[serde(default)]
    open_modules: Vec<String>,
}

/// Handle on the persisted state of one workdir.
#[derive(Debug, Clone)]
pub struct StateStore {
    path: PathBuf,
}

impl StateStore {
    /// Use the state file at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Use the state file of the configured workdir.
    pub fn for_config(config: &Config) -> Self {
        Self::new(config.state_path())
    }

    /// Path of the state file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Read the open-module set.
    ///
    /// The first read in a fresh workdir creates the record.
    pub fn load(&self) -> Result<OpenModules> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let empty = OpenModules::new();
                self.save(&empty)?;
                return Ok(empty);
            }
            Err(e) => return Err(Error::Io(e)),
        };
        let record: StateRecord = serde_json::from_str(&content).map_err(|e| Error::State {
            path: self.path.clone(),
            message: e.to_string(),
        })?;
        Ok(record.open_modules.into_iter().collect())
    }

    /// Replace the persisted set with `modules`.
    pub fn save(&self, modules: &OpenModules) -> Result<()> {
        let record = StateRecord {
            open_modules: modules.list(),
        };
        let content = serde_json::to_string_pretty(&record)?;

        if let Some(dir) = self.path.parent() {
            fs::create_dir_all(dir)?;
        }
        // Write atomically: write to temp file, then rename
        let temp_path = self.path.with_extension("json.tmp");
        fs::write(&temp_path, content)?;
        fs::rename(&temp_path, &self.path)?;
        log::debug!("Saved open modules {:?} to {}", record.open_modules, self.path.display());
        Ok(())
    }

    /// Open `name`, persisting the change. Returns `false` if it was already
    /// open, in which case nothing is written.
    pub fn open(&self, name: &str) -> Result<bool> {
        let mut modules = self.load()?;
        if !modules.open(name) {
            return Ok(false);
        }
        self.save(&modules)?;
        Ok(true)
    }

    /// Close `name`, persisting the change. Fails with [`Error::NotOpen`]
    /// without writing if it was not open.
    pub fn close(&self, name: &str) -> Result<()> {
        let mut modules = self.load()?;
        modules.close(name)?;
        self.save(&modules)
    }

    /// The open modules, in opening order.
    pub fn list(&self) -> Result<Vec<String>> {
        Ok(self.load()?.list())
    }
}
