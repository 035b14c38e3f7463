use std::path::Path;
use std::path::PathBuf;
use std::process::Stdio;

use forksync::ops::git::RealGit;
use tokio::process::Command;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer as _;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

/// SSH URL the fork is cloned from; rewritten to a local path by [`runner_for`].
pub const FORK_SSH_URL: &str = "git@example.com:stfc/k8s-image-builder.git";

/// Runs git in `dir` with a fixed identity, returning trimmed stdout.
pub async fn git(dir: &Path, args: &[&str]) -> anyhow::Result<String> {
    let output = Command::new("git")
        .args([
            "-c",
            "user.name=Test User",
            "-c",
            "user.email=test@example.com",
            "-c",
            "commit.gpgsign=false",
        ])
        .args(args)
        .current_dir(dir)
        .env("GIT_CONFIG_NOSYSTEM", "1")
        .stdin(Stdio::null())
        .output()
        .await?;
    anyhow::ensure!(
        output.status.success(),
        "git {:?} failed: {}",
        args,
        String::from_utf8_lossy(&output.stderr)
    );

    Ok(String::from_utf8(output.stdout)?.trim().to_string())
}

/// Creates a non-bare repository on `master` with a single commit.
pub async fn create_upstream(dir: &Path) -> anyhow::Result<()> {
    tokio::fs::create_dir_all(dir).await?;
    git(dir, &["init", "--quiet", "-b", "master"]).await?;
    commit_file(dir, "README.md", "image-builder\n", "Initial commit").await?;

    Ok(())
}

/// Writes a file and commits it on the current branch.
pub async fn commit_file(
    dir: &Path,
    filename: &str,
    contents: &str,
    message: &str,
) -> anyhow::Result<()> {
    tokio::fs::write(dir.join(filename), contents).await?;
    git(dir, &["add", filename]).await?;
    git(dir, &["commit", "--quiet", "-m", message]).await?;

    Ok(())
}

/// Creates the fork as a bare clone of `upstream`, carrying all its branches.
pub async fn create_fork(upstream: &Path, fork: &Path) -> anyhow::Result<()> {
    let parent = fork.parent().expect("fork path has a parent");
    git(
        parent,
        &[
            "clone",
            "--quiet",
            "--bare",
            &upstream.display().to_string(),
            &fork.display().to_string(),
        ],
    )
    .await?;

    Ok(())
}

pub fn file_url(path: &Path) -> String {
    format!("file://{}", path.display())
}

/// A runner that resolves [`FORK_SSH_URL`] to the local `fork` and ignores
/// system and user git config.
pub fn runner_for(fork: &Path) -> RealGit {
    RealGit::new()
        .with_env("GIT_CONFIG_NOSYSTEM", "1")
        .with_env("GIT_CONFIG_GLOBAL", "/dev/null")
        .with_env("GIT_CONFIG_COUNT", "1")
        .with_env("GIT_CONFIG_KEY_0", format!("url.{}.insteadOf", file_url(fork)))
        .with_env("GIT_CONFIG_VALUE_0", FORK_SSH_URL)
}

pub fn setup_logging() -> anyhow::Result<()> {
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let format = tracing_subscriber::fmt::format().with_timer(timer);
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env()?;
    let subscriber = tracing_subscriber::fmt::layer()
        .event_format(format)
        .with_span_events(FmtSpan::NEW | FmtSpan::CLOSE)
        .with_test_writer()
        .with_filter(filter);
    tracing_subscriber::registry().with(subscriber).init();
    Ok(())
}

pub enum TestDir {
    Temp(tempfile::TempDir),
    Kept(PathBuf),
}

impl TestDir {
    pub fn new() -> std::io::Result<Self> {
        let temp_dir = tempfile::tempdir()?;

        if std::env::var("DEBUG_TESTS").is_ok() {
            let path = temp_dir.keep();
            eprintln!("Test directory kept at: {}", path.display());
            Ok(TestDir::Kept(path))
        } else {
            Ok(TestDir::Temp(temp_dir))
        }
    }

    pub fn path(&self) -> &Path {
        match self {
            TestDir::Temp(t) => t.path(),
            TestDir::Kept(p) => p.as_path(),
        }
    }
}
