//! `psx enrich`: fill in names and sectors for the stored snapshot.

use anyhow::{Context, Result};
use clap::Args;

use psx_core::config::{self, EnrichSettings};
use psx_fetch::source::build_details;
use psx_sync::{enrich_latest_at, live_fetcher};

use super::data_root;

/// Arguments for `psx enrich`.
#[derive(Args, Debug)]
pub struct EnrichArgs {
    /// Concurrent lookups (overrides `enrich.workers`).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=EnrichSettings::MAX_WORKERS as i64))]
    pub workers: Option<u16>,
}

impl EnrichArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let config = config::load_at(&root).context("failed to load config")?;
        let workers = self
            .workers
            .map(usize::from)
            .unwrap_or_else(|| config.enrich.effective_workers());

        let details = build_details(&config, &live_fetcher(&config));
        let (saved, stats) =
            enrich_latest_at(&root, details.as_ref(), workers, config.snapshots.keep)
                .context("enrichment failed")?;

        println!(
            "✓ Enriched {} tickers with {workers} workers",
            stats.total
        );
        println!(
            "  {} names, {} sectors, {} urls updated; {} unchanged; {} failed",
            stats.updated_names,
            stats.updated_sectors,
            stats.updated_urls,
            stats.no_change,
            stats.failed
        );
        println!("  Snapshot: {}", saved.path.display());
        Ok(())
    }
}
