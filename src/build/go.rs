//! Go toolchain collaborators

use std::path::{Path, PathBuf};

use tokio::process::Command;
use tracing::debug;

use crate::build::{Builder, PreCloneCheck, command_failure, run_command};
use crate::error::Error;

/// Builds with `go build` from the repository root
#[derive(Debug, Clone, Default)]
pub struct GoBuild {
    /// Extra `-ldflags`, e.g. to stamp a version
    pub ldflags: Option<String>,
}

impl GoBuild {
    fn build_args(&self, repo_dir: &Path, target: &Path) -> Vec<String> {
        let mut args = vec!["build".to_string()];
        if repo_dir.join("vendor").is_dir() {
            args.push("-mod".to_string());
            args.push("vendor".to_string());
        }
        if let Some(ldflags) = &self.ldflags {
            args.push("-ldflags".to_string());
            args.push(ldflags.clone());
        }
        args.push("-o".to_string());
        args.push(target.to_string_lossy().into_owned());
        args.push(".".to_string());
        args
    }
}

#[async_trait::async_trait]
impl Builder for GoBuild {
    async fn build(
        &self,
        repo_dir: &Path,
        target_dir: &Path,
        binary_name: &str,
    ) -> Result<PathBuf, Error> {
        let target = target_dir.join(binary_name);
        let args = self.build_args(repo_dir, &target);
        debug!("running go {} in {}", args.join(" "), repo_dir.display());

        let mut cmd = Command::new("go");
        cmd.args(&args).current_dir(repo_dir);
        let output = run_command(cmd)
            .await
            .map_err(|e| Error::Build(format!("unable to run go: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Build(command_failure("go", &output)));
        }
        Ok(target)
    }
}

/// Requires a working `go` executable on `PATH`
#[derive(Debug, Clone, Default)]
pub struct GoInstalled;

#[async_trait::async_trait]
impl PreCloneCheck for GoInstalled {
    async fn check(&self) -> Result<(), Error> {
        let mut cmd = Command::new("go");
        cmd.arg("version");
        let output = run_command(cmd)
            .await
            .map_err(|e| Error::Build(format!("go is not available: {}", e)))?;

        if !output.status.success() {
            return Err(Error::Build(command_failure("go", &output)));
        }
        debug!(
            "found {}",
            String::from_utf8_lossy(&output.stdout).trim()
        );
        Ok(())
    }
}
