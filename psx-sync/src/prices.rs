//! Bulk price-history download.
//!
//! Slugs are resolved up front through the [`SlugCache`] (derived slugs are
//! recorded there), then each symbol is fetched on a bounded rayon pool and
//! written to its own CSV. One symbol failing never stops the others.

use std::collections::BTreeMap;
use std::path::Path;

use psx_core::{history, paths, store, SlugCache, Symbol, Ticker};
use psx_fetch::{DateRange, PriceSource};
use rayon::prelude::*;
use serde::Serialize;

use crate::enrich::worker_pool;
use crate::error::SyncError;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct PriceStats {
    pub total: usize,
    pub saved: usize,
    /// Source answered with no bars in the window.
    pub empty: usize,
    pub failed: usize,
    /// Bars written across all saved files.
    pub bars: usize,
    /// Symbols that failed, with the reason.
    pub failures: Vec<(Symbol, String)>,
}

enum Outcome {
    Saved(usize),
    Empty,
    Failed(String),
}

/// Download and save histories for `tickers`.
pub fn download_history(
    root: &Path,
    tickers: &[Ticker],
    source: &dyn PriceSource,
    slugs: &mut SlugCache,
    range: &DateRange,
    workers: usize,
) -> Result<PriceStats, SyncError> {
    let jobs: Vec<(&Symbol, String)> = tickers
        .iter()
        .map(|ticker| (&ticker.symbol, slugs.resolve(ticker).0))
        .collect();
    tracing::info!(
        "downloading {} price histories from {} ({} to {}) with {} workers",
        jobs.len(),
        source.name(),
        range.from,
        range.to,
        workers.max(1)
    );

    let pool = worker_pool(workers, "prices")?;
    let outcomes: Vec<(&Symbol, Outcome)> = pool.install(|| {
        jobs.par_iter()
            .map(|(symbol, slug)| {
                let outcome = match source.fetch_history(symbol, slug, range) {
                    Ok(bars) if bars.is_empty() => {
                        tracing::warn!("no price history for {symbol} ({slug})");
                        Outcome::Empty
                    }
                    Ok(bars) => match history::save_history_at(root, symbol, &bars) {
                        Ok(_) => Outcome::Saved(bars.len()),
                        Err(e) => Outcome::Failed(e.to_string()),
                    },
                    Err(e) => Outcome::Failed(e.to_string()),
                };
                if let Outcome::Failed(reason) = &outcome {
                    tracing::warn!("price history for {symbol} failed: {reason}");
                }
                (*symbol, outcome)
            })
            .collect()
    });

    let mut stats = PriceStats {
        total: outcomes.len(),
        ..PriceStats::default()
    };
    for (symbol, outcome) in outcomes {
        match outcome {
            Outcome::Saved(n) => {
                stats.saved += 1;
                stats.bars += n;
            }
            Outcome::Empty => stats.empty += 1,
            Outcome::Failed(reason) => {
                stats.failed += 1;
                stats.failures.push((symbol.clone(), reason));
            }
        }
    }
    tracing::info!(
        "price download done: {}/{} saved, {} empty, {} failed",
        stats.saved,
        stats.total,
        stats.empty,
        stats.failed
    );
    Ok(stats)
}

/// Download histories for `symbols`, or for every stored ticker when empty,
/// and persist any slugs derived along the way.
///
/// Requested symbols missing from the snapshot are still fetched; their
/// slug derives from the symbol unless the cache knows it.
pub fn download_prices_at(
    root: &Path,
    source: &dyn PriceSource,
    slug_seed: &BTreeMap<String, String>,
    symbols: &[Symbol],
    range: &DateRange,
    workers: usize,
) -> Result<PriceStats, SyncError> {
    let snapshot = store::load_at(root)?;
    let tickers: Vec<Ticker> = if symbols.is_empty() {
        if snapshot.is_empty() {
            return Err(SyncError::NoSnapshot {
                path: paths::tickers_csv_path(root),
            });
        }
        snapshot.into_tickers()
    } else {
        symbols
            .iter()
            .map(|symbol| {
                snapshot
                    .get(symbol)
                    .cloned()
                    .unwrap_or_else(|| Ticker::unresolved(symbol.clone(), ""))
            })
            .collect()
    };

    let mut slugs = SlugCache::load_at(root, slug_seed)?;
    let stats = download_history(root, &tickers, source, &mut slugs, range, workers)?;
    if slugs.save_at(root)? {
        tracing::debug!("slug cache updated ({} entries)", slugs.len());
    }
    Ok(stats)
}
