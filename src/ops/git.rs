#![allow(async_fn_in_trait)]

use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

#[cfg(test)]
use mockall::automock;
use tokio::process::Command;
use tracing::debug;

use crate::error::SyncError;

// -----------------------------------------------------------------------------
// Types

/// A single `git` invocation.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitCommand {
    pub cwd: Option<PathBuf>,
    pub args: Vec<String>,
    pub env: Vec<(String, String)>,
}

/// What a finished `git` process left behind.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GitOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

impl GitCommand {
    pub fn new<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            cwd: None,
            args: args.into_iter().map(Into::into).collect(),
            env: Vec::new(),
        }
    }

    pub fn current_dir(mut self, dir: &Path) -> Self {
        self.cwd = Some(dir.to_path_buf());
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.push((key.into(), value.into()));
        self
    }

    /// Look up an environment override set on this command.
    pub fn env_value(&self, key: &str) -> Option<&str> {
        self.env
            .iter()
            .find(|(k, _)| k == key)
            .map(|(_, v)| v.as_str())
    }
}

impl GitOutput {
    pub fn ok(stdout: impl Into<String>) -> Self {
        Self {
            success: true,
            stdout: stdout.into(),
            stderr: String::new(),
        }
    }

    pub fn failed(stderr: impl Into<String>) -> Self {
        Self {
            success: false,
            stdout: String::new(),
            stderr: stderr.into(),
        }
    }
}

// -----------------------------------------------------------------------------
// GitRunner trait

/// Spawns git processes.
///
/// A non-zero exit status is reported through [`GitOutput::success`], not as
/// an error; only a failure to run git at all is an `Err`.
#[cfg_attr(test, automock)]
pub trait GitRunner {
    async fn run(&self, command: GitCommand) -> Result<GitOutput, SyncError>;
}

// -----------------------------------------------------------------------------
// RealGit

/// Real implementation that calls the git CLI
#[derive(Debug, Clone, Default)]
pub struct RealGit {
    extra_env: Vec<(String, String)>,
}

impl RealGit {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an environment variable to every git process this runner spawns.
    pub fn with_env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.extra_env.push((key.into(), value.into()));
        self
    }
}

impl GitRunner for RealGit {
    async fn run(&self, command: GitCommand) -> Result<GitOutput, SyncError> {
        let mut cmd = Command::new("git");
        if let Some(dir) = &command.cwd {
            cmd.current_dir(dir);
        }
        cmd.args(&command.args);

        // Never block on a credential prompt
        cmd.env("GIT_TERMINAL_PROMPT", "0");
        for (k, v) in self.extra_env.iter().chain(command.env.iter()) {
            cmd.env(k, v);
        }

        cmd.stdin(Stdio::null());
        cmd.stdout(Stdio::piped());
        cmd.stderr(Stdio::piped());

        debug!(args = ?command.args, cwd = ?command.cwd, "spawning git");

        let output = cmd.output().await.map_err(SyncError::Spawn)?;

        debug!(status = %output.status, "git exited");

        Ok(GitOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
