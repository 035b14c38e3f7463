use std::path::Path;
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;
use tracing::debug;

use crate::clients::git::DEFAULT_MERGE_BRANCH;
use crate::clients::git::DEFAULT_PUSH_BRANCH;
use crate::clients::git::DEFAULT_PUSH_REMOTE;
use crate::error::SyncError;

/// The maintained fork, cloned over SSH.
pub const DEFAULT_FORK_URL: &str = "git@github.com:stfc/k8s-image-builder.git";

/// The public repository the fork tracks.
pub const DEFAULT_UPSTREAM_URL: &str = "https://github.com/kubernetes-sigs/image-builder.git";

const TEMP_DIR_PREFIX: &str = "k8s-image-builder-";

/// Settings for one sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Config {
    /// Where to clone the fork. A temporary directory is used when unset.
    pub target_dir: Option<PathBuf>,
    pub ssh_key_path: PathBuf,
    pub git_branch: String,
    pub push_to_github: bool,
    pub fork_url: String,
    pub upstream_url: String,
    pub upstream_branch: String,
    pub push_remote: String,
    pub push_branch: String,
    pub git_username: Option<String>,
    pub git_email: Option<String>,
}

/// A partial configuration, as read from a config file or the command line.
///
/// Layers are merged field by field; later layers win.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ConfigLayer {
    pub target_dir: Option<PathBuf>,
    pub ssh_key_path: Option<PathBuf>,
    pub git_branch: Option<String>,
    pub push_to_github: Option<bool>,
    pub fork_url: Option<String>,
    pub upstream_url: Option<String>,
    pub upstream_branch: Option<String>,
    pub push_remote: Option<String>,
    pub push_branch: Option<String>,
    pub git_username: Option<String>,
    pub git_email: Option<String>,
}

/// A config whose working directory exists on disk.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunContext {
    pub config: Config,
    pub work_dir: PathBuf,
    /// Whether `work_dir` was generated for this run. It is left on disk either way.
    pub is_tmp_dir: bool,
}

impl Config {
    /// Create a config with explicit values and default endpoints
    pub fn new(ssh_key_path: impl Into<PathBuf>, git_branch: impl Into<String>) -> Self {
        Self {
            target_dir: None,
            ssh_key_path: ssh_key_path.into(),
            git_branch: git_branch.into(),
            push_to_github: false,
            fork_url: DEFAULT_FORK_URL.to_string(),
            upstream_url: DEFAULT_UPSTREAM_URL.to_string(),
            upstream_branch: DEFAULT_MERGE_BRANCH.to_string(),
            push_remote: DEFAULT_PUSH_REMOTE.to_string(),
            push_branch: DEFAULT_PUSH_BRANCH.to_string(),
            git_username: None,
            git_email: None,
        }
    }

    /// Merge layers over the defaults. The SSH key and branch have no default.
    pub fn from_layers<I>(layers: I) -> Result<Self, SyncError>
    where
        I: IntoIterator<Item = ConfigLayer>,
    {
        let merged = layers
            .into_iter()
            .fold(ConfigLayer::default(), |acc, layer| acc.merge(layer));

        let ssh_key_path = merged
            .ssh_key_path
            .ok_or_else(|| SyncError::Configuration("an SSH key path is required".to_string()))?;
        let git_branch = merged
            .git_branch
            .ok_or_else(|| SyncError::Configuration("a git branch is required".to_string()))?;

        let mut config = Self::new(ssh_key_path, git_branch);
        config.target_dir = merged.target_dir;
        config.push_to_github = merged.push_to_github.unwrap_or(false);
        config.git_username = merged.git_username;
        config.git_email = merged.git_email;
        if let Some(url) = merged.fork_url {
            config.fork_url = url;
        }
        if let Some(url) = merged.upstream_url {
            config.upstream_url = url;
        }
        if let Some(branch) = merged.upstream_branch {
            config.upstream_branch = branch;
        }
        if let Some(remote) = merged.push_remote {
            config.push_remote = remote;
        }
        if let Some(branch) = merged.push_branch {
            config.push_branch = branch;
        }
        Ok(config)
    }

    /// Committer identity, if both halves are configured.
    pub fn identity(&self) -> Option<(&str, &str)> {
        match (&self.git_username, &self.git_email) {
            (Some(name), Some(email)) => Some((name.as_str(), email.as_str())),
            _ => None,
        }
    }
}

impl ConfigLayer {
    /// Load a layer from a JSON file
    pub fn load(path: &Path) -> Result<Self, SyncError> {
        let contents = std::fs::read_to_string(path).map_err(|source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        serde_json::from_str(&contents).map_err(|e| {
            SyncError::Configuration(format!("invalid config file {}: {}", path.display(), e))
        })
    }

    fn merge(self, over: ConfigLayer) -> Self {
        Self {
            target_dir: over.target_dir.or(self.target_dir),
            ssh_key_path: over.ssh_key_path.or(self.ssh_key_path),
            git_branch: over.git_branch.or(self.git_branch),
            push_to_github: over.push_to_github.or(self.push_to_github),
            fork_url: over.fork_url.or(self.fork_url),
            upstream_url: over.upstream_url.or(self.upstream_url),
            upstream_branch: over.upstream_branch.or(self.upstream_branch),
            push_remote: over.push_remote.or(self.push_remote),
            push_branch: over.push_branch.or(self.push_branch),
            git_username: over.git_username.or(self.git_username),
            git_email: over.git_email.or(self.git_email),
        }
    }
}

impl RunContext {
    /// Settle where the run happens.
    ///
    /// Without a target directory a fresh temporary directory is created.
    /// Otherwise the target is reused, and created (with parents) if missing.
    pub async fn resolve(config: &Config) -> Result<Self, SyncError> {
        let (work_dir, is_tmp_dir) = match &config.target_dir {
            None => {
                let dir = tempfile::Builder::new()
                    .prefix(TEMP_DIR_PREFIX)
                    .tempdir()
                    .map_err(|source| SyncError::Io {
                        path: std::env::temp_dir(),
                        source,
                    })?;
                (dir.keep(), true)
            }
            Some(dir) => {
                debug!(dir = %dir.display(), "ensuring target directory exists");
                tokio::fs::create_dir_all(dir)
                    .await
                    .map_err(|source| SyncError::Io {
                        path: dir.clone(),
                        source,
                    })?;
                (dir.clone(), false)
            }
        };

        Ok(Self {
            config: config.clone(),
            work_dir,
            is_tmp_dir,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn layer(ssh_key_path: &str, git_branch: &str) -> ConfigLayer {
        ConfigLayer {
            ssh_key_path: Some(ssh_key_path.into()),
            git_branch: Some(git_branch.to_string()),
            ..Default::default()
        }
    }

    #[test]
    fn test_new_uses_default_endpoints() {
        let config = Config::new("/k/id_rsa", "main");
        assert_eq!(config.fork_url, DEFAULT_FORK_URL);
        assert_eq!(config.upstream_url, DEFAULT_UPSTREAM_URL);
        assert_eq!(config.upstream_branch, "master");
        assert_eq!(config.push_remote, "origin");
        assert_eq!(config.push_branch, "master");
        assert!(!config.push_to_github);
        assert_eq!(config.target_dir, None);
    }

    #[test]
    fn test_later_layers_win() {
        let file = ConfigLayer {
            push_to_github: Some(true),
            upstream_url: Some("https://example.com/upstream.git".to_string()),
            ..layer("/file/key", "file-branch")
        };
        let cli = ConfigLayer {
            git_branch: Some("cli-branch".to_string()),
            ..Default::default()
        };

        let config = Config::from_layers([file, cli]).unwrap();
        assert_eq!(config.ssh_key_path, PathBuf::from("/file/key"));
        assert_eq!(config.git_branch, "cli-branch");
        assert!(config.push_to_github);
        assert_eq!(config.upstream_url, "https://example.com/upstream.git");
        assert_eq!(config.fork_url, DEFAULT_FORK_URL);
    }

    #[test]
    fn test_missing_required_fields() {
        let err = Config::from_layers([ConfigLayer {
            git_branch: Some("main".to_string()),
            ..Default::default()
        }])
        .unwrap_err();
        assert_eq!(
            err.to_string(),
            "configuration error: an SSH key path is required"
        );

        let err = Config::from_layers([ConfigLayer {
            ssh_key_path: Some("/k/id_rsa".into()),
            ..Default::default()
        }])
        .unwrap_err();
        assert_eq!(err.to_string(), "configuration error: a git branch is required");
    }

    #[test]
    fn test_identity_requires_both_fields() {
        let mut config = Config::new("/k/id_rsa", "main");
        config.git_username = Some("Cloud Team".to_string());
        assert_eq!(config.identity(), None);

        config.git_email = Some("cloud@example.com".to_string());
        assert_eq!(config.identity(), Some(("Cloud Team", "cloud@example.com")));
    }

    #[test]
    fn test_load_json_layer() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forksync.json");
        std::fs::write(
            &path,
            r#"{"ssh_key_path": "/k/id_rsa", "git_branch": "feature-x", "push_to_github": true}"#,
        )
        .unwrap();

        let loaded = ConfigLayer::load(&path).unwrap();
        assert_eq!(
            loaded,
            ConfigLayer {
                push_to_github: Some(true),
                ..layer("/k/id_rsa", "feature-x")
            }
        );
    }

    #[test]
    fn test_load_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("forksync.json");
        std::fs::write(&path, r#"{"git_brnch": "typo"}"#).unwrap();

        let err = ConfigLayer::load(&path).unwrap_err();
        assert!(matches!(err, SyncError::Configuration(_)));
        assert!(err.to_string().contains("git_brnch"));
    }

    #[test]
    fn test_load_missing_file() {
        let err = ConfigLayer::load(Path::new("/nonexistent/forksync.json")).unwrap_err();
        assert!(matches!(err, SyncError::Io { .. }));
    }

    #[tokio::test]
    async fn test_resolve_without_target_creates_temp_dir() {
        let config = Config::new("/k/id_rsa", "feature-x");

        let first = RunContext::resolve(&config).await.unwrap();
        let second = RunContext::resolve(&config).await.unwrap();

        assert!(first.is_tmp_dir);
        assert!(first.work_dir.is_dir());
        assert_ne!(first.work_dir, second.work_dir);
        assert_eq!(std::fs::read_dir(&first.work_dir).unwrap().count(), 0);
        // Caller's config is left untouched
        assert_eq!(first.config.target_dir, None);

        std::fs::remove_dir(&first.work_dir).unwrap();
        std::fs::remove_dir(&second.work_dir).unwrap();
    }

    #[tokio::test]
    async fn test_resolve_reuses_existing_target() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("marker"), "keep me").unwrap();
        let mut config = Config::new("/k/id_rsa", "feature-x");
        config.target_dir = Some(dir.path().to_path_buf());

        let context = RunContext::resolve(&config).await.unwrap();

        assert!(!context.is_tmp_dir);
        assert_eq!(context.work_dir, dir.path());
        assert!(dir.path().join("marker").exists());
        assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[tokio::test]
    async fn test_resolve_target_that_is_a_file() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("not-a-dir");
        std::fs::write(&target, "").unwrap();
        let mut config = Config::new("/k/id_rsa", "feature-x");
        config.target_dir = Some(target.clone());

        let err = RunContext::resolve(&config).await.unwrap_err();
        assert!(matches!(err, SyncError::Io { path, .. } if path == target));
    }

    #[test]
    fn test_cli_layer_can_turn_push_off() {
        let file = ConfigLayer {
            push_to_github: Some(true),
            ..layer("/k/id_rsa", "feature-x")
        };
        let cli = ConfigLayer {
            push_to_github: Some(false),
            ..Default::default()
        };

        let config = Config::from_layers([file, cli]).unwrap();
        assert!(!config.push_to_github);
    }

    #[tokio::test]
    async fn test_resolve_creates_missing_target() {
        let dir = tempfile::tempdir().unwrap();
        let target = dir.path().join("nested").join("clone");
        let mut config = Config::new("/k/id_rsa", "feature-x");
        config.target_dir = Some(target.clone());

        let context = RunContext::resolve(&config).await.unwrap();

        assert!(!context.is_tmp_dir);
        assert_eq!(context.work_dir, target);
        assert!(target.is_dir());
    }
}
