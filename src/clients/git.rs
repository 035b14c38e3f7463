use std::path::Path;
use std::path::PathBuf;

use tracing::info;
use tracing::instrument;

use crate::error::GitOperation;
use crate::error::SyncError;
use crate::error::classify;
use crate::ops::git::GitCommand;
use crate::ops::git::GitOutput;
use crate::ops::git::GitRunner;

pub const DEFAULT_UPSTREAM_REMOTE: &str = "upstream";
pub const DEFAULT_MERGE_BRANCH: &str = "master";
pub const DEFAULT_PUSH_REMOTE: &str = "origin";
pub const DEFAULT_PUSH_BRANCH: &str = "master";

/// Scheme marker every clone URL must carry, since authentication is by SSH key only.
const SSH_URL_PREFIX: &str = "git@";

// -----------------------------------------------------------------------------
// Types

/// A repository that has not been cloned yet.
///
/// Cloning is the only thing it can do; it yields a [`Repository`] on success.
pub struct Cloner<'a, R> {
    ssh_key_path: PathBuf,
    runner: &'a R,
}

/// A cloned working copy.
///
/// Every operation runs inside the clone's directory. Network operations carry
/// the SSH key the repository was cloned with.
pub struct Repository<'a, R> {
    path: PathBuf,
    ssh_key_path: PathBuf,
    runner: &'a R,
}

// -----------------------------------------------------------------------------
// Cloner impl

impl<'a, R: GitRunner> Cloner<'a, R> {
    pub fn new(ssh_key_path: impl Into<PathBuf>, runner: &'a R) -> Self {
        Self {
            ssh_key_path: ssh_key_path.into(),
            runner,
        }
    }

    /// Clone `repo_url` into `target_dir` using the SSH key for authentication.
    ///
    /// Fails without running git when the URL is not an SSH URL.
    #[instrument(skip(self, target_dir), fields(target_dir = %target_dir.display()))]
    pub async fn clone_repo(
        self,
        repo_url: &str,
        target_dir: &Path,
    ) -> Result<Repository<'a, R>, SyncError> {
        validate_protocol(repo_url)?;

        let command = GitCommand::new([
            "clone".to_string(),
            repo_url.to_string(),
            target_dir.to_string_lossy().into_owned(),
        ])
        .env("GIT_SSH_COMMAND", ssh_command(&self.ssh_key_path));

        let output = self.runner.run(command).await?;
        if !output.success {
            return Err(classify(GitOperation::Clone, &output));
        }

        info!("clone complete");

        Ok(Repository {
            path: target_dir.to_path_buf(),
            ssh_key_path: self.ssh_key_path,
            runner: self.runner,
        })
    }
}

/// Reject clone URLs that cannot be authenticated with an SSH key.
pub fn validate_protocol(repo_url: &str) -> Result<(), SyncError> {
    if !repo_url.starts_with(SSH_URL_PREFIX) {
        return Err(SyncError::Configuration(
            "SSH key provided, but repo URL is not SSH".to_string(),
        ));
    }
    Ok(())
}

/// Build the `GIT_SSH_COMMAND` value selecting `key` as the identity file.
pub fn ssh_command(key: &Path) -> String {
    let key = key.to_string_lossy();
    let plain = key
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || "/._-~+:@,=".contains(c));
    if plain {
        format!("ssh -i {}", key)
    } else {
        format!("ssh -i '{}'", key.replace('\'', r"'\''"))
    }
}

// -----------------------------------------------------------------------------
// Repository impl

impl<R: GitRunner> Repository<'_, R> {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub async fn set_username(&self, username: &str) -> Result<(), SyncError> {
        self.git(GitOperation::Config, ["config", "user.name", username])
            .await?;
        Ok(())
    }

    pub async fn set_email(&self, email: &str) -> Result<(), SyncError> {
        self.git(GitOperation::Config, ["config", "user.email", email])
            .await?;
        Ok(())
    }

    /// Set the committer identity in the repository's local config.
    #[instrument(skip(self))]
    pub async fn set_identity(&self, username: &str, email: &str) -> Result<(), SyncError> {
        self.set_username(username).await?;
        self.set_email(email).await
    }

    #[instrument(skip(self))]
    pub async fn checkout(&self, branch: &str) -> Result<(), SyncError> {
        self.git(GitOperation::Checkout, ["checkout", branch]).await?;
        Ok(())
    }

    /// Register a new remote. Fails if `name` is already taken.
    #[instrument(skip(self))]
    pub async fn add_remote(&self, url: &str, name: &str) -> Result<(), SyncError> {
        self.git(GitOperation::AddRemote, ["remote", "add", name, url])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn fetch_remote(&self, name: &str) -> Result<(), SyncError> {
        self.network(GitOperation::Fetch, ["fetch", name]).await?;
        info!("fetch complete");
        Ok(())
    }

    /// Merge `remote/branch` into the checked-out branch.
    ///
    /// A conflicting merge is left in place for inspection.
    #[instrument(skip(self))]
    pub async fn merge_remote_branch(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        let target = format!("{}/{}", remote, branch);
        self.git(GitOperation::Merge, ["merge", "--no-edit", target.as_str()])
            .await?;
        Ok(())
    }

    #[instrument(skip(self))]
    pub async fn push(&self, remote: &str, branch: &str) -> Result<(), SyncError> {
        self.network(GitOperation::Push, ["push", remote, branch])
            .await?;
        info!("push complete");
        Ok(())
    }

    /// Name of the checked-out branch (`HEAD` when detached).
    pub async fn current_branch(&self) -> Result<String, SyncError> {
        let output = self
            .git(GitOperation::Inspect, ["rev-parse", "--abbrev-ref", "HEAD"])
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    pub async fn remote_url(&self, name: &str) -> Result<String, SyncError> {
        let output = self
            .git(GitOperation::Inspect, ["remote", "get-url", name])
            .await?;
        Ok(output.stdout.trim().to_string())
    }

    async fn git<const N: usize>(
        &self,
        operation: GitOperation,
        args: [&str; N],
    ) -> Result<GitOutput, SyncError> {
        self.run(operation, GitCommand::new(args).current_dir(&self.path))
            .await
    }

    async fn network<const N: usize>(
        &self,
        operation: GitOperation,
        args: [&str; N],
    ) -> Result<GitOutput, SyncError> {
        let command = GitCommand::new(args)
            .current_dir(&self.path)
            .env("GIT_SSH_COMMAND", ssh_command(&self.ssh_key_path));
        self.run(operation, command).await
    }

    async fn run(
        &self,
        operation: GitOperation,
        command: GitCommand,
    ) -> Result<GitOutput, SyncError> {
        let output = self.runner.run(command).await?;
        if !output.success {
            return Err(classify(operation, &output));
        }
        Ok(output)
    }
}
