pub mod changes;
pub mod enrich;
pub mod init;
pub mod prices;
pub mod slugs;
pub mod status;
pub mod sync;

use std::path::PathBuf;

use anyhow::{Context, Result};

use psx_core::paths;

/// `~/.psx`
pub fn data_root() -> Result<PathBuf> {
    let home = dirs::home_dir().context("could not determine home directory")?;
    Ok(paths::psx_root(&home))
}
