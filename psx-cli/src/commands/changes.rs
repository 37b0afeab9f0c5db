//! `psx changes`

use anyhow::{Context, Result};
use clap::Args;

use psx_sync::changelog;

use super::data_root;

/// Arguments for `psx changes`.
#[derive(Args, Debug)]
pub struct ChangesArgs {
    /// Number of most recent entries to print.
    #[arg(long, short = 'n', default_value_t = 5)]
    pub entries: usize,
}

impl ChangesArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let entries =
            changelog::tail_entries_at(&root, self.entries).context("failed to read change log")?;

        if entries.is_empty() {
            println!("No changes recorded yet.");
            return Ok(());
        }
        for entry in entries {
            println!("{entry}\n");
        }
        Ok(())
    }
}
