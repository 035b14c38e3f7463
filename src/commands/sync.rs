use std::path::PathBuf;

use anyhow::Result;
use colored::Colorize;
use tracing::info;
use tracing::warn;

use crate::App;
use crate::clients::git::Cloner;
use crate::clients::git::DEFAULT_UPSTREAM_REMOTE;
use crate::clients::git::validate_protocol;
use crate::config::RunContext;
use crate::ops::git::GitRunner;

/// Outcome of a successful sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub work_dir: PathBuf,
    pub is_tmp_dir: bool,
    pub branch: String,
    pub pushed: bool,
}

impl<G: GitRunner> App<G> {
    /// Bring the fork up to date with upstream.
    ///
    /// 1. Resolve the working directory (a fresh temporary one if none is configured).
    /// 2. Clone the fork over SSH and check out the configured branch.
    /// 3. Add upstream as a remote, fetch it and merge its branch.
    /// 4. Push, if asked to.
    ///
    /// The first failure aborts the run and whatever git left in the working
    /// directory stays there. A non-SSH fork URL is rejected before anything
    /// is created or printed.
    pub async fn cmd_sync(&self, stdout: &mut impl std::io::Write) -> Result<SyncReport> {
        validate_protocol(&self.config.fork_url)?;

        let context = RunContext::resolve(&self.config).await?;
        let config = &context.config;
        if context.is_tmp_dir {
            writeln!(
                stdout,
                "Using temporary directory: {}",
                context.work_dir.display()
            )?;
        }

        writeln!(
            stdout,
            "Cloning {} to {}",
            config.fork_url.cyan(),
            context.work_dir.display()
        )?;
        let repo = Cloner::new(config.ssh_key_path.clone(), &self.git)
            .clone_repo(&config.fork_url, &context.work_dir)
            .await?;

        if let Some((username, email)) = config.identity() {
            repo.set_identity(username, email).await?;
        }

        writeln!(stdout, "Checking out branch {}", config.git_branch.cyan())?;
        repo.checkout(&config.git_branch).await?;

        repo.add_remote(&config.upstream_url, DEFAULT_UPSTREAM_REMOTE)
            .await?;
        repo.fetch_remote(DEFAULT_UPSTREAM_REMOTE).await?;

        let merge_target = format!("{}/{}", DEFAULT_UPSTREAM_REMOTE, config.upstream_branch);
        writeln!(stdout, "Merging {} into current branch", merge_target.cyan())?;
        repo.merge_remote_branch(DEFAULT_UPSTREAM_REMOTE, &config.upstream_branch)
            .await?;

        if config.push_to_github {
            if config.push_branch != config.git_branch {
                warn!(
                    checked_out = %config.git_branch,
                    push_branch = %config.push_branch,
                    "push target differs from the checked-out branch; the merge result is not what gets pushed"
                );
            }
            let push_target = format!("{}/{}", config.push_remote, config.push_branch);
            writeln!(stdout, "Pushing current branch to {}", push_target.cyan())?;
            repo.push(&config.push_remote, &config.push_branch).await?;
        } else {
            writeln!(stdout, "{}", "Not pushing; merge applied locally only".dimmed())?;
        }

        info!(work_dir = %context.work_dir.display(), "sync complete");

        Ok(SyncReport {
            work_dir: context.work_dir.clone(),
            is_tmp_dir: context.is_tmp_dir,
            branch: config.git_branch.clone(),
            pushed: config.push_to_github,
        })
    }
}
