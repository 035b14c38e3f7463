use anyhow::Result;

use crate::App;
use crate::ops::git::GitRunner;

impl<G: GitRunner> App<G> {
    /// Print the effective configuration as JSON. Touches neither the
    /// filesystem nor the network.
    pub fn cmd_config(&self, stdout: &mut impl std::io::Write) -> Result<()> {
        let json = serde_json::to_string_pretty(&self.config)?;
        writeln!(stdout, "{}", json)?;
        Ok(())
    }
}
