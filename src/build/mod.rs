//! Collaborators used to build a product from its git repository
//!
//! The git-revision source drives three phases, each behind a trait so
//! toolchains can be swapped or mocked:
//! - `PreCloneCheck` verifies prerequisites before anything is fetched
//! - `Cloner` fetches the repository at a reference
//! - `Builder` turns the checkout into an executable

#[cfg(test)]
use mockall::automock;

use std::path::{Path, PathBuf};
use std::process::Output;
use std::sync::Arc;
use std::time::Duration;

use tokio::process::Command;

use crate::error::Error;

pub mod git;
pub mod go;

pub use git::GitCli;
pub use go::{GoBuild, GoInstalled};

/// Reference cloned when none is requested
pub const DEFAULT_REF: &str = "HEAD";

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait PreCloneCheck: Send + Sync {
    async fn check(&self) -> Result<(), Error>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Cloner: Send + Sync {
    /// Shallow-clone `url` at `reference` into the existing, empty `dest`
    async fn clone_repo(&self, url: &str, reference: &str, dest: &Path) -> std::io::Result<()>;
}

#[cfg_attr(test, automock)]
#[async_trait::async_trait]
pub trait Builder: Send + Sync {
    /// Build `binary_name` from `repo_dir` into `target_dir`, returning the executable path
    async fn build(
        &self,
        repo_dir: &Path,
        target_dir: &Path,
        binary_name: &str,
    ) -> Result<PathBuf, Error>;

    /// Release anything the builder provisioned for itself
    async fn remove(&self) -> Result<(), Error> {
        Ok(())
    }
}

/// How to obtain a product from source
#[derive(Clone)]
pub struct BuildInstructions {
    pub git_repo_url: String,
    pub pre_clone_check: Option<Arc<dyn PreCloneCheck>>,
    /// Overrides the default pre-clone check timeout
    pub pre_clone_check_timeout: Option<Duration>,
    pub clone_timeout: Option<Duration>,
    pub build_timeout: Option<Duration>,
    pub builder: Arc<dyn Builder>,
}

impl BuildInstructions {
    pub fn new(git_repo_url: impl Into<String>, builder: Arc<dyn Builder>) -> Self {
        Self {
            git_repo_url: git_repo_url.into(),
            pre_clone_check: None,
            pre_clone_check_timeout: None,
            clone_timeout: None,
            build_timeout: None,
            builder,
        }
    }

    pub fn with_pre_clone_check(mut self, check: Arc<dyn PreCloneCheck>) -> Self {
        self.pre_clone_check = Some(check);
        self
    }
}

impl std::fmt::Debug for BuildInstructions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuildInstructions")
            .field("git_repo_url", &self.git_repo_url)
            .field("pre_clone_check", &self.pre_clone_check.is_some())
            .field("pre_clone_check_timeout", &self.pre_clone_check_timeout)
            .field("clone_timeout", &self.clone_timeout)
            .field("build_timeout", &self.build_timeout)
            .finish_non_exhaustive()
    }
}

/// Run `cmd` to completion, killing the child if the future is dropped
pub(crate) async fn run_command(mut cmd: Command) -> std::io::Result<Output> {
    cmd.kill_on_drop(true);
    cmd.output().await
}

/// Combined stdout/stderr of a failed command, for error messages
pub(crate) fn command_failure(program: &str, output: &Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!(
        "{} exited with {}: {}{}",
        program,
        output.status,
        stdout.trim(),
        stderr.trim()
    )
}
