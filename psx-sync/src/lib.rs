//! # psx-sync
//!
//! Ticker synchronisation and change detection.
//!
//! [`Synchronizer::run`] fetches the current listing, compares it with the
//! stored snapshot, appends a change-log block and persists the new
//! snapshot. [`sync_with_config`] wires it to the configured live sources.
//! [`download_prices_at`] saves daily price histories per symbol.

pub mod changelog;
pub mod diff;
pub mod enrich;
pub mod error;
pub mod pipeline;
pub mod prices;

pub use diff::{detect_changes, ChangeSet, Rename};
pub use enrich::{enrich, enrich_latest_at, EnrichStats};
pub use error::SyncError;
pub use prices::{download_history, download_prices_at, PriceStats};
pub use pipeline::{
    live_fetcher, sync_with_config, StageOutcome, StageRecord, SyncOptions, SyncReport, SyncStage,
    Synchronizer,
};
