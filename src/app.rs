use crate::config::Config;
use crate::ops::git::GitRunner;

pub struct App<G: GitRunner> {
    pub config: Config,
    pub git: G,
}

impl<G: GitRunner> App<G> {
    pub fn new(config: Config, git: G) -> Self {
        Self { config, git }
    }
}
