use async_trait::async_trait;
use std::path::Path;
use std::time::Duration;
use tokio::process::Command as AsyncCommand;
use tokio::time::timeout;
use tracing::debug;

use crate::config::Config;

/// External version-control operations used to realize clone and update
///
/// Both operations report failure as a human-readable reason; the executor
/// records it against the repository and moves on.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait VcsTool: Send + Sync {
    /// Clone `url` into the not-yet-existing directory `dest`
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), String>;

    /// Bring the existing working copy at `dir` up to date
    async fn pull(&self, dir: &Path) -> Result<(), String>;
}

/// [`VcsTool`] backed by the `git` executable
#[derive(Debug, Clone)]
pub struct GitCli {
    program: String,
    fast_forward_only: bool,
    timeout: Duration,
}

impl GitCli {
    pub fn new(config: &Config) -> Self {
        Self {
            program: config.sync.git_binary.clone(),
            fast_forward_only: config.sync.fast_forward_only,
            timeout: Duration::from_secs(config.sync.timeout),
        }
    }

    /// Run git with `args`, optionally inside `dir`, under the timeout watchdog
    async fn run(&self, dir: Option<&Path>, args: &[&str], target: &Path) -> Result<(), String> {
        let mut command = AsyncCommand::new(&self.program);
        command.args(args).kill_on_drop(true);
        if let Some(dir) = dir {
            command.current_dir(dir);
        } else {
            command.arg(target);
        }

        debug!("Running {} {} for {}", self.program, args.join(" "), target.display());

        let output = match timeout(self.timeout, command.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(format!("failed to execute {}: {}", self.program, e)),
            Err(_) => {
                return Err(format!(
                    "git {} timed out after {}s",
                    args[0],
                    self.timeout.as_secs()
                ))
            }
        };

        if output.status.success() {
            Ok(())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let stderr = stderr.trim();
            Err(if stderr.is_empty() {
                format!("git {} exited with {}", args[0], output.status)
            } else {
                format!("git {} exited with {}: {}", args[0], output.status, stderr)
            })
        }
    }
}

#[async_trait]
impl VcsTool for GitCli {
    async fn clone_repo(&self, url: &str, dest: &Path) -> Result<(), String> {
        self.run(None, &["clone", url], dest).await
    }

    async fn pull(&self, dir: &Path) -> Result<(), String> {
        let mut args = vec!["pull"];
        if self.fast_forward_only {
            args.push("--ff-only");
        }
        self.run(Some(dir), &args, dir).await
    }
}
