use std::path::Path;

use tokio::process::Command;
use tracing::debug;

use crate::build::{Cloner, DEFAULT_REF, command_failure, run_command};

/// Clones with the `git` executable found on `PATH`
#[derive(Debug, Clone, Default)]
pub struct GitCli;

impl GitCli {
    fn clone_args(url: &str, reference: &str, dest: &Path) -> Vec<String> {
        let mut args = vec!["clone".to_string(), "--depth".to_string(), "1".to_string()];
        if !reference.is_empty() && reference != DEFAULT_REF {
            args.push("--branch".to_string());
            args.push(reference.to_string());
        }
        args.push(url.to_string());
        args.push(dest.to_string_lossy().into_owned());
        args
    }
}

#[async_trait::async_trait]
impl Cloner for GitCli {
    async fn clone_repo(&self, url: &str, reference: &str, dest: &Path) -> std::io::Result<()> {
        let args = Self::clone_args(url, reference, dest);
        debug!("running git {}", args.join(" "));

        let mut cmd = Command::new("git");
        cmd.args(&args).env("GIT_TERMINAL_PROMPT", "0");
        let output = run_command(cmd).await?;

        if !output.status.success() {
            return Err(std::io::Error::other(command_failure("git", &output)));
        }
        Ok(())
    }
}
