//! On-disk layout under the data root.
//!
//! ```text
//! ~/.psx/
//!   config.yaml
//!   metadata/
//!     all_tickers.csv       (canonical snapshot, replaced atomically)
//!     ticker_changes.log    (append-only change log)
//!   snapshots/
//!     tickers_<stamp>.csv   (immutable archive, pruned to `snapshots.keep`)
//!   cache/
//!     investing_slugs.json
//!   data/
//!     <SYMBOL>.csv          (daily price history, one file per symbol)
//! ```

use std::path::{Path, PathBuf};

use crate::error::StoreError;
use crate::types::Symbol;

pub const ROOT_DIR: &str = ".psx";
pub const CONFIG_FILE: &str = "config.yaml";
pub const TICKERS_CSV: &str = "all_tickers.csv";
pub const CHANGES_LOG: &str = "ticker_changes.log";
pub const SLUG_CACHE_FILE: &str = "investing_slugs.json";
pub const SNAPSHOT_PREFIX: &str = "tickers_";

/// `<home>/.psx`
pub fn psx_root(home: &Path) -> PathBuf {
    home.join(ROOT_DIR)
}

/// Data root derived from `dirs::home_dir()`.
pub fn default_root() -> Result<PathBuf, StoreError> {
    dirs::home_dir()
        .map(|home| psx_root(&home))
        .ok_or(StoreError::HomeNotFound)
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join(CONFIG_FILE)
}

pub fn metadata_dir(root: &Path) -> PathBuf {
    root.join("metadata")
}

pub fn tickers_csv_path(root: &Path) -> PathBuf {
    metadata_dir(root).join(TICKERS_CSV)
}

pub fn changes_log_path(root: &Path) -> PathBuf {
    metadata_dir(root).join(CHANGES_LOG)
}

pub fn snapshots_dir(root: &Path) -> PathBuf {
    root.join("snapshots")
}

pub fn cache_dir(root: &Path) -> PathBuf {
    root.join("cache")
}

pub fn slug_cache_path(root: &Path) -> PathBuf {
    cache_dir(root).join(SLUG_CACHE_FILE)
}

pub fn prices_dir(root: &Path) -> PathBuf {
    root.join("data")
}

pub fn price_history_path(root: &Path, symbol: &Symbol) -> PathBuf {
    prices_dir(root).join(format!("{symbol}.csv"))
}
