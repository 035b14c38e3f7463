use std::io::IsTerminal as _;
use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use clap::Parser;
use clap::Subcommand;
use forksync::App;
use forksync::Config;
use forksync::config::ConfigLayer;
use forksync::ops::git::RealGit;
use tracing::level_filters::LevelFilter;

#[derive(Parser)]
#[command(name = "forksync")]
#[command(about = "Sync a fork of the Kubernetes image-builder repository with upstream", long_about = None)]
#[command(arg_required_else_help = true)]
pub struct Cli {
    /// Increase log verbosity (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Clone the fork, merge upstream into a branch and optionally push
    Sync {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Print the effective configuration as JSON
    Config {
        #[command(flatten)]
        config: ConfigArgs,
    },
}

#[derive(Args)]
pub struct ConfigArgs {
    /// JSON config file; command-line flags take precedence over it
    #[arg(long)]
    pub config: Option<PathBuf>,
    /// Directory to clone into (defaults to a new temporary directory)
    #[arg(short, long)]
    pub target_dir: Option<PathBuf>,
    /// SSH private key used to clone, fetch and push
    #[arg(short = 'k', long)]
    pub ssh_key: Option<PathBuf>,
    /// Branch of the fork to check out and merge into
    #[arg(short, long)]
    pub branch: Option<String>,
    /// Push the result after merging
    #[arg(long, overrides_with = "no_push")]
    pub push: bool,
    /// Do not push, even if the config file asks for it
    #[arg(long, overrides_with = "push")]
    pub no_push: bool,
    /// SSH URL of the fork
    #[arg(long)]
    pub fork_url: Option<String>,
    /// URL of the upstream repository
    #[arg(long)]
    pub upstream_url: Option<String>,
    /// Upstream branch to merge (defaults to master)
    #[arg(long)]
    pub upstream_branch: Option<String>,
    /// Remote to push to (defaults to origin)
    #[arg(long)]
    pub push_remote: Option<String>,
    /// Branch to push (defaults to master)
    #[arg(long)]
    pub push_branch: Option<String>,
    /// Committer name written to the clone's git config
    #[arg(long)]
    pub git_username: Option<String>,
    /// Committer email written to the clone's git config
    #[arg(long)]
    pub git_email: Option<String>,
}

impl ConfigArgs {
    fn load(self) -> Result<Config> {
        let file = match &self.config {
            Some(path) => ConfigLayer::load(path)?,
            None => ConfigLayer::default(),
        };
        let cli = ConfigLayer {
            target_dir: self.target_dir,
            ssh_key_path: self.ssh_key,
            git_branch: self.branch,
            push_to_github: push_override(self.push, self.no_push),
            fork_url: self.fork_url,
            upstream_url: self.upstream_url,
            upstream_branch: self.upstream_branch,
            push_remote: self.push_remote,
            push_branch: self.push_branch,
            git_username: self.git_username,
            git_email: self.git_email,
        };
        Ok(Config::from_layers([file, cli])?)
    }
}

/// Whichever of `--push` / `--no-push` came last, if either was given.
fn push_override(push: bool, no_push: bool) -> Option<bool> {
    match (push, no_push) {
        (true, _) => Some(true),
        (_, true) => Some(false),
        _ => None,
    }
}

fn setup_logging(verbose: u8) -> Result<()> {
    let default_level = match verbose {
        0 => LevelFilter::WARN,
        1 => LevelFilter::INFO,
        _ => LevelFilter::DEBUG,
    };
    let timer = tracing_subscriber::fmt::time::ChronoLocal::new("%H:%M:%S%.3f".into());
    let filter = tracing_subscriber::EnvFilter::builder()
        .with_default_directive(default_level.into())
        .from_env()?;
    tracing_subscriber::fmt()
        .with_timer(timer)
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
    Ok(())
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_logging(cli.verbose)?;

    if !std::io::stdout().is_terminal() {
        colored::control::set_override(false);
    }

    match cli.command {
        Commands::Sync { config } => {
            let app = App::new(config.load()?, RealGit::new());
            app.cmd_sync(&mut std::io::stdout()).await?;
        }
        Commands::Config { config } => {
            let app = App::new(config.load()?, RealGit::new());
            app.cmd_config(&mut std::io::stdout())?;
        }
    }

    Ok(())
}
