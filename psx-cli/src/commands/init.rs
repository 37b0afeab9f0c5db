//! `psx init`

use anyhow::{Context, Result};
use clap::Args;

use psx_core::{config, paths};

use super::data_root;

/// Write the default configuration file.
#[derive(Args, Debug)]
pub struct InitArgs {}

impl InitArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let (config, created) = config::init_at(&root)
            .with_context(|| format!("failed to initialise {}", root.display()))?;

        let path = paths::config_path(&root);
        if created {
            println!("✓ Wrote default config to {}", path.display());
        } else {
            println!("✓ Config already present at {}", path.display());
        }
        let sources: Vec<&str> = config.sources.iter().map(|s| s.label()).collect();
        println!("  Sources: {}", sources.join(" → "));
        Ok(())
    }
}
