//! Gateway to the external borg binary
//!
//! One method per borg capability the domain needs. Every blocking
//! operation follows the same path: assemble argv, run, classify. The
//! long-running `create` goes through the streamed executor instead so
//! its progress is observable while it runs.
//!
//! Borg's own repository lock is the only mutual-exclusion mechanism
//! for concurrent operations against one repository; a "lock" failure
//! comes back as a normal structured error and is never retried here.

pub mod output;
pub mod types;

use crate::command::BackupCommand;
use crate::error::{Error, Result};
use crate::exec::{self, CommandOutput, LineSink, StreamOptions, StreamedRun};

use types::{ArchiveInfo, ArchiveInfoResponse, ListEntry, ListResponse, RepoInfoResponse};

/// Result-set limit for `info` and `list` invocations.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Limit {
    #[default]
    None,
    First(u32),
    Last(u32),
}

impl Limit {
    fn push_args(self, argv: &mut Vec<String>) {
        match self {
            Limit::None => {}
            Limit::First(n) => {
                argv.push("--first".to_string());
                argv.push(n.to_string());
            }
            Limit::Last(n) => {
                argv.push("--last".to_string());
                argv.push(n.to_string());
            }
        }
    }
}

/// Runner for borg subcommands.
///
/// The binary path is configurable so tests can substitute a fake
/// archiver script.
#[derive(Debug, Clone)]
pub struct BorgRunner {
    binary: String,
}

impl Default for BorgRunner {
    fn default() -> Self {
        Self::new("borg")
    }
}

impl BorgRunner {
    pub fn new(binary: impl Into<String>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    #[must_use]
    pub fn binary(&self) -> &str {
        &self.binary
    }

    /// `borg init --encryption=MODE PATH`
    ///
    /// # Errors
    /// `Repository.AlreadyExists` and `Repository.ParentPathDoesNotExist`
    /// are the common structured failures here.
    pub fn init_repository(&self, path: &str, encryption: &str) -> Result<()> {
        let mut argv = self.base();
        argv.push("init".to_string());
        argv.push(format!("--encryption={encryption}"));
        argv.push(path.to_string());
        self.run(&argv).map(|_| ())
    }

    /// `borg info --json PATH` - repository statistics.
    ///
    /// # Errors
    /// Fails when borg cannot read the repository or the payload does
    /// not match the expected schema.
    pub fn repository_info(&self, path: &str) -> Result<RepoInfoResponse> {
        let mut argv = self.base();
        argv.push("info".to_string());
        argv.push("--json".to_string());
        argv.push(path.to_string());
        let out = self.run(&argv)?;
        output::decode(&out.stdout)
    }

    /// `borg info --json [--first N | --last N] PATH[::ARCHIVE]` -
    /// detailed stats for one or several archives.
    ///
    /// # Errors
    /// Fails when the repository or archive is unknown to borg.
    pub fn archive_info(
        &self,
        path: &str,
        archive: Option<&str>,
        limit: Limit,
    ) -> Result<ArchiveInfoResponse> {
        let mut argv = self.base();
        argv.push("info".to_string());
        argv.push("--json".to_string());
        limit.push_args(&mut argv);
        argv.push(match archive {
            Some(name) => format!("{path}::{name}"),
            None => path.to_string(),
        });
        let out = self.run(&argv)?;
        output::decode(&out.stdout)
    }

    /// The repository's most recent archive.
    ///
    /// # Errors
    /// [`Error::NoArchives`] when the repository is empty.
    pub fn latest_archive(&self, path: &str) -> Result<ArchiveInfo> {
        let mut response = self.archive_info(path, None, Limit::Last(1))?;
        response.archives.pop().ok_or(Error::NoArchives)
    }

    /// `borg list --json [--first N | --last N] PATH`
    ///
    /// # Errors
    /// Fails when borg cannot enumerate the repository.
    pub fn list_archives(&self, path: &str, limit: Limit) -> Result<Vec<ListEntry>> {
        let mut argv = self.base();
        argv.push("list".to_string());
        argv.push("--json".to_string());
        limit.push_args(&mut argv);
        argv.push(path.to_string());
        let out = self.run(&argv)?;
        let response: ListResponse = output::decode(&out.stdout)?;
        Ok(response.archives)
    }

    /// `borg delete --force PATH::ARCHIVE`
    ///
    /// # Errors
    /// Fails when borg no longer knows the archive.
    pub fn delete_archive(&self, path: &str, name: &str) -> Result<()> {
        self.delete(&format!("{path}::{name}"))
    }

    /// `borg delete --force PATH` - destroys the whole repository.
    ///
    /// # Errors
    /// `Repository.DoesNotExist` when the path holds no repository.
    pub fn delete_repository(&self, path: &str) -> Result<()> {
        self.delete(path)
    }

    /// `borg check [--repository-only] PATH` - integrity verification.
    ///
    /// # Errors
    /// Fails when the check finds problems or cannot run.
    pub fn check_repository(&self, path: &str, repository_only: bool) -> Result<()> {
        let mut argv = self.base();
        argv.push("check".to_string());
        if repository_only {
            argv.push("--repository-only".to_string());
        }
        argv.push(path.to_string());
        self.run(&argv).map(|_| ())
    }

    /// Run a bundle's `create` command to completion, capturing output.
    ///
    /// # Errors
    /// Classified from stderr on a non-zero exit.
    pub fn create_blocking(&self, command: &BackupCommand) -> Result<()> {
        let argv = self.create_argv(command);
        let out = exec::run_blocking(&argv)?;
        if out.success() {
            Ok(())
        } else {
            Err(output::classify_failure(&out.stderr))
        }
    }

    /// Spawn a bundle's `create` command, relaying progress lines to
    /// `sink`. Returns as soon as the child is spawned; the caller
    /// decides when to wait.
    ///
    /// # Errors
    /// Fails only when the process cannot be spawned.
    pub fn create_streamed(
        &self,
        command: &BackupCommand,
        sink: LineSink,
        options: StreamOptions,
    ) -> Result<StreamedRun> {
        let argv = self.create_argv(command);
        Ok(exec::run_streamed(&argv, sink, options)?)
    }

    fn delete(&self, target: &str) -> Result<()> {
        let mut argv = self.base();
        argv.push("delete".to_string());
        argv.push("--force".to_string());
        argv.push(target.to_string());
        self.run(&argv).map(|_| ())
    }

    /// The canonical argv says `borg` and carries no logging flag;
    /// execution substitutes this runner's actual binary and turns on
    /// `--log-json` so failures come back structured.
    fn create_argv(&self, command: &BackupCommand) -> Vec<String> {
        let mut argv = command.to_argv();
        argv[0] = self.binary.clone();
        argv.insert(1, "--log-json".to_string());
        argv
    }

    fn base(&self) -> Vec<String> {
        vec![self.binary.clone(), "--log-json".to_string()]
    }

    fn run(&self, argv: &[String]) -> Result<CommandOutput> {
        let out = exec::run_blocking(argv)?;
        if out.success() {
            Ok(out)
        } else {
            Err(output::classify_failure(&out.stderr))
        }
    }
}
