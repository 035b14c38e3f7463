//! Error kinds surfaced by repository operations.
//!
//! Git reports nearly everything through a non-zero exit status and a line on
//! stderr, so each failed invocation is classified by matching its output
//! against patterns for the operation that produced it.

use std::fmt;
use std::path::PathBuf;
use std::sync::LazyLock;

use regex::Regex;
use thiserror::Error;

use crate::ops::git::GitOutput;

#[derive(Debug, Error)]
pub enum SyncError {
    /// The run was configured in a way that cannot work, e.g. an SSH key with
    /// a non-SSH fork URL.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// Network or authentication failure while talking to a remote.
    #[error("git {operation} failed to reach the remote: {stderr}")]
    Transport {
        operation: GitOperation,
        stderr: String,
    },

    /// A branch, remote or ref that does not exist.
    #[error("git {operation} could not resolve a reference: {stderr}")]
    Reference {
        operation: GitOperation,
        stderr: String,
    },

    /// Git stopped the merge and left conflict markers in the working tree.
    #[error("merge could not be completed automatically: {stderr}")]
    MergeConflict { stderr: String },

    /// Any other failure, passed through as git reported it.
    #[error("git {operation} failed: {stderr}")]
    Git {
        operation: GitOperation,
        stderr: String,
    },

    #[error("failed to execute git: {0}")]
    Spawn(#[source] std::io::Error),

    #[error("I/O error on {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// The repository operation a git invocation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GitOperation {
    Clone,
    Config,
    Checkout,
    AddRemote,
    Fetch,
    Merge,
    Push,
    Inspect,
}

impl fmt::Display for GitOperation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            GitOperation::Clone => "clone",
            GitOperation::Config => "config",
            GitOperation::Checkout => "checkout",
            GitOperation::AddRemote => "remote add",
            GitOperation::Fetch => "fetch",
            GitOperation::Merge => "merge",
            GitOperation::Push => "push",
            GitOperation::Inspect => "rev-parse",
        };
        f.write_str(name)
    }
}

static TRANSPORT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)could not read from remote repository|permission denied|could not resolve host|connection (refused|timed out|closed)|authentication failed|host key verification failed|unable to access|repository not found|\[(remote )?rejected\]|failed to push some refs",
    )
    .unwrap()
});

static REFERENCE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?i)did not match any file\(s\) known to git|not something we can merge|invalid reference|no such remote|couldn't find remote ref|does not appear to be a git repository|src refspec .* does not match any",
    )
    .unwrap()
});

static CONFLICT: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"(?im)^CONFLICT|automatic merge failed|would be overwritten by merge|refusing to merge unrelated histories",
    )
    .unwrap()
});

/// Turn a failed git invocation into the error kind callers can act on.
///
/// Merge conflicts are reported on stdout, so both streams are inspected.
pub fn classify(operation: GitOperation, output: &GitOutput) -> SyncError {
    let combined = format!("{}\n{}", output.stdout, output.stderr);
    let stderr = failure_message(output);

    match operation {
        GitOperation::Merge if CONFLICT.is_match(&combined) => SyncError::MergeConflict { stderr },
        GitOperation::Merge | GitOperation::Checkout if REFERENCE.is_match(&combined) => {
            SyncError::Reference { operation, stderr }
        }
        // An unknown remote name is tried as a path and then fails to "read
        // from remote repository", so references are checked first.
        GitOperation::Fetch | GitOperation::Push if REFERENCE.is_match(&combined) => {
            SyncError::Reference { operation, stderr }
        }
        GitOperation::Clone | GitOperation::Fetch | GitOperation::Push
            if TRANSPORT.is_match(&combined) =>
        {
            SyncError::Transport { operation, stderr }
        }
        _ => SyncError::Git { operation, stderr },
    }
}

fn failure_message(output: &GitOutput) -> String {
    let stderr = output.stderr.trim();
    if stderr.is_empty() {
        output.stdout.trim().to_string()
    } else {
        stderr.to_string()
    }
}
