//! Wrappers for the external flatpak tooling.
//!
//! A tool that runs and exits nonzero is not an error here: its exit code is
//! returned for the caller to pass through. Only a tool that cannot be
//! started at all becomes [`Error::BuilderInvocation`].

use std::ffi::OsStr;
use std::path::Path;
use std::process::{Command, ExitStatus};

use crate::config::Config;
use crate::defaults::LOCAL_REMOTE_NAME;
use crate::error::{Error, Result};

/// flatpak subcommands that accept `--user`.
const USER_SUBCOMMANDS: &[&str] = &[
    "install",
    "update",
    "uninstall",
    "list",
    "info",
    "remote-add",
    "remote-modify",
    "remote-delete",
    "remote-ls",
    "remotes",
    "make-current",
];

/// Map a finished process to the exit code devsdk reports for it.
///
/// Death by signal maps to `128 + signal`, like a shell does.
pub fn exit_code(status: ExitStatus) -> i32 {
    if let Some(code) = status.code() {
        return code;
    }
    #[cfg(unix)]
    {
        use std::os::unix::process::ExitStatusExt;
        if let Some(signal) = status.signal() {
            return 128 + signal;
        }
    }
    1
}

fn run_status(tool: &str, command: &mut Command) -> Result<i32> {
    log::debug!("Running {:?}", command);
    let status = command.status().map_err(|e| Error::BuilderInvocation {
        tool: tool.to_string(),
        message: e.to_string(),
    })?;
    Ok(exit_code(status))
}

/// The `flatpak` command line tool.
#[derive(Debug, Clone)]
pub struct Flatpak {
    program: String,
    user_installation: bool,
}

impl Flatpak {
    pub fn new(program: impl Into<String>, user_installation: bool) -> Self {
        Self {
            program: program.into(),
            user_installation,
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.tools.flatpak.as_str(), config.user_installation)
    }

    /// Arguments for `flatpak <subcommand> ...`, with `--user` added when
    /// the subcommand takes it and a per-user installation is configured.
    pub fn args_for<S: AsRef<str>>(&self, subcommand: &str, args: &[S]) -> Vec<String> {
        let mut full = vec![subcommand.to_string()];
        if self.user_installation && USER_SUBCOMMANDS.contains(&subcommand) {
            full.push("--user".to_string());
        }
        full.extend(args.iter().map(|a| a.as_ref().to_string()));
        full
    }

    /// Run a subcommand and return its exit code.
    pub fn status<S: AsRef<str>>(&self, subcommand: &str, args: &[S]) -> Result<i32> {
        let mut command = Command::new(&self.program);
        command.args(self.args_for(subcommand, args));
        run_status(&self.program, &mut command)
    }

    /// Run a subcommand that must succeed.
    pub fn check<S: AsRef<str>>(&self, subcommand: &str, args: &[S]) -> Result<()> {
        match self.status(subcommand, args)? {
            0 => Ok(()),
            code => Err(Error::BuilderInvocation {
                tool: self.program.clone(),
                message: format!("\"{} {}\" exited with code {}", self.program, subcommand, code),
            }),
        }
    }

    /// Run a subcommand that must succeed and return its standard output.
    pub fn output<S: AsRef<str>>(&self, subcommand: &str, args: &[S]) -> Result<String> {
        let mut command = Command::new(&self.program);
        command.args(self.args_for(subcommand, args));
        log::debug!("Running {:?}", command);
        let output = command.output().map_err(|e| Error::BuilderInvocation {
            tool: self.program.clone(),
            message: e.to_string(),
        })?;
        if !output.status.success() {
            return Err(Error::BuilderInvocation {
                tool: self.program.clone(),
                message: format!(
                    "\"{} {}\" exited with code {}: {}",
                    self.program,
                    subcommand,
                    exit_code(output.status),
                    String::from_utf8_lossy(&output.stderr).trim()
                ),
            });
        }
        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }

    /// Install `id//branch` unless it is installed, then update it.
    ///
    /// With no `remote`, every configured remote is searched for the runtime
    /// and the install asks for confirmation, since the remote was guessed.
    /// `all_subpaths` also pulls every subpath, which locale extensions need.
    pub fn ensure_runtime(&self, remote: Option<&str>, id: &str, branch: &str, all_subpaths: bool) -> Result<()> {
        if self.status("info", &["--show-commit", id, branch])? != 0 {
            match remote {
                Some(remote) => self.check("install", &["--assumeyes", remote, id, branch])?,
                None => {
                    let remote = self.find_remote(id, branch)?;
                    log::info!("Installing {}//{} from {}", id, branch, remote);
                    self.check("install", &[remote.as_str(), id, branch])?;
                }
            }
        }
        if all_subpaths {
            self.check("update", &["--assumeyes", "--subpath=", id, branch])
        } else {
            self.check("update", &["--assumeyes", id, branch])
        }
    }

    /// The first configured remote that offers runtime `id//branch`.
    pub fn find_remote(&self, id: &str, branch: &str) -> Result<String> {
        let remotes = remote_names(&self.output("remotes", &[] as &[&str])?);
        for remote in &remotes {
            let listing = self.output("remote-ls", &[remote.as_str(), "--runtime", "-d"])?;
            if lists_runtime(&listing, id, branch) {
                return Ok(remote.clone());
            }
        }
        Err(Error::RuntimeNotFound {
            runtime: id.to_string(),
            branch: branch.to_string(),
            remotes,
        })
    }
}

/// First column of `flatpak remotes`, without a header line.
fn remote_names(listing: &str) -> Vec<String> {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .filter(|name| *name != "Name")
        .map(str::to_string)
        .collect()
}

/// Whether `flatpak remote-ls -d` output lists `id//branch`.
///
/// Refs appear as `runtime/<id>/<arch>/<branch>` or, on newer flatpak,
/// `<id>/<arch>/<branch>`.
fn lists_runtime(listing: &str, id: &str, branch: &str) -> bool {
    listing
        .lines()
        .filter_map(|line| line.split_whitespace().next())
        .any(|flatpak_ref| {
            let parts: Vec<&str> = flatpak_ref.split('/').collect();
            match parts.as_slice() {
                [_, candidate, _, candidate_branch] | [candidate, _, candidate_branch] => {
                    *candidate == id && *candidate_branch == branch
                }
                _ => false,
            }
        })
}

/// An entry of the `add_extensions` configuration key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtensionRef {
    pub id: String,
    pub branch: String,
}

impl ExtensionRef {
    /// Parse `id`, `id/branch` or `id/arch/branch`, each with an optional
    /// `:subpath` suffix that is ignored. The branch defaults to `master`.
    pub fn parse(entry: &str) -> Result<Self> {
        let flatpak_ref = entry.split_once(':').map_or(entry, |(r, _)| r);
        let parts: Vec<&str> = flatpak_ref.split('/').collect();
        let (id, branch) = match parts.as_slice() {
            [id] => (*id, "master"),
            [id, branch] | [id, _, branch] => (*id, *branch),
            _ => ("", ""),
        };
        if id.is_empty() || branch.is_empty() {
            return Err(Error::Config {
                message: format!(
                    "add_extensions entry '{}' is not of the form ID[/ARCH]/BRANCH[:SUBPATH]",
                    entry
                ),
            });
        }
        Ok(Self {
            id: id.to_string(),
            branch: branch.to_string(),
        })
    }
}

/// Register the upstream SDK remote and install or update the base SDK with
/// its debug and locale extensions.
pub fn ensure_base_sdk(flatpak: &Flatpak, config: &Config) -> Result<()> {
    flatpak.check(
        "remote-add",
        &[
            "--if-not-exists",
            "--from",
            config.sdk_repo_name.as_str(),
            config.sdk_repo_definition.as_str(),
        ],
    )?;
    let remote = Some(config.sdk_repo_name.as_str());
    let branch = config.sdk_branch.as_str();
    flatpak.ensure_runtime(remote, &config.sdk_id, branch, false)?;
    flatpak.ensure_runtime(remote, &format!("{}.Debug", config.sdk_id), branch, false)?;
    flatpak.ensure_runtime(remote, &format!("{}.Locale", config.sdk_id), branch, true)
}

/// Register the local repository as a remote and install or update the
/// freshly built development SDK from it.
pub fn ensure_dev_sdk(flatpak: &Flatpak, config: &Config) -> Result<()> {
    let repo = config.repo_dir();
    let repo = repo.to_string_lossy();
    flatpak.check(
        "remote-add",
        &["--if-not-exists", "--no-gpg-verify", LOCAL_REMOTE_NAME, repo.as_ref()],
    )?;
    let remote = Some(LOCAL_REMOTE_NAME);
    flatpak.ensure_runtime(remote, &config.dev_sdk_id, "master", false)?;
    flatpak.ensure_runtime(
        remote,
        &format!("{}.Debug", config.dev_sdk_id),
        "master",
        false,
    )
}

/// Install or update every runtime listed in `add_extensions`, finding a
/// remote for each one that is not installed yet.
pub fn ensure_add_extensions(flatpak: &Flatpak, config: &Config) -> Result<()> {
    let extensions = config
        .add_extensions
        .iter()
        .map(|entry| ExtensionRef::parse(entry))
        .collect::<Result<Vec<_>>>()?;
    for extension in extensions {
        flatpak.ensure_runtime(None, &extension.id, &extension.branch, false)?;
    }
    Ok(())
}

/// The `flatpak-builder` tool.
#[derive(Debug, Clone)]
pub struct FlatpakBuilder {
    program: String,
}

impl FlatpakBuilder {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Run the builder in `cwd` and wait for it.
    pub fn run<I, S>(&self, args: I, cwd: &Path) -> Result<i32>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        let mut command = Command::new(&self.program);
        command.args(args).current_dir(cwd);
        run_status(&self.program, &mut command)
    }
}

/// The `ostree` tool, used only to create the local repository.
#[derive(Debug, Clone)]
pub struct Ostree {
    program: String,
}

impl Ostree {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Create a `bare-user` repository at `repo` unless one exists.
    pub fn ensure_repo(&self, repo: &Path) -> Result<()> {
        if repo.join("config").is_file() {
            return Ok(());
        }
        std::fs::create_dir_all(repo)?;
        let mut command = Command::new(&self.program);
        command.arg("init").arg("--repo").arg(repo).arg("--mode=bare-user");
        match run_status(&self.program, &mut command)? {
            0 => Ok(()),
            code => Err(Error::BuilderInvocation {
                tool: self.program.clone(),
                message: format!("init of {} exited with code {}", repo.display(), code),
            }),
        }
    }
}
