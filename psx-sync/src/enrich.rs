//! Concurrent per-ticker detail enrichment.
//!
//! Each ticker is looked up through a [`DetailSource`] on a bounded rayon
//! pool. Output order matches input order. A failed lookup keeps the ticker
//! as it was and is counted, it never aborts the batch.

use std::path::Path;

use chrono::Utc;
use psx_core::store::{self, SavedSnapshot};
use psx_core::{paths, Snapshot, Ticker, NO_RECORD_NAME, UNKNOWN_SECTOR};
use psx_fetch::{DetailSource, TickerDetails};
use rayon::prelude::*;
use serde::Serialize;

use crate::error::SyncError;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct EnrichStats {
    pub total: usize,
    pub updated_names: usize,
    pub updated_sectors: usize,
    pub updated_urls: usize,
    pub no_change: usize,
    pub failed: usize,
}

/// What a single lookup changed.
#[derive(Debug, Clone, Copy, Default)]
struct Applied {
    name: bool,
    sector: bool,
    url: bool,
    failed: bool,
}

/// Enrich `tickers` using at most `workers` concurrent lookups.
pub fn enrich(
    tickers: &[Ticker],
    source: &dyn DetailSource,
    workers: usize,
) -> Result<(Vec<Ticker>, EnrichStats), SyncError> {
    let workers = workers.max(1);
    tracing::info!(
        "enriching {} tickers via {} with {workers} workers",
        tickers.len(),
        source.name()
    );

    let pool = worker_pool(workers, "enrich")?;

    let results: Vec<(Ticker, Applied)> = pool.install(|| {
        tickers
            .par_iter()
            .map(|ticker| match source.fetch_details(ticker) {
                Ok(details) => apply(ticker, details),
                Err(e) => {
                    tracing::warn!("details for {} failed: {e}", ticker.symbol);
                    (
                        ticker.clone(),
                        Applied {
                            failed: true,
                            ..Applied::default()
                        },
                    )
                }
            })
            .collect()
    });

    let mut stats = EnrichStats {
        total: tickers.len(),
        ..EnrichStats::default()
    };
    let mut enriched = Vec::with_capacity(results.len());
    for (ticker, applied) in results {
        if applied.failed {
            stats.failed += 1;
        } else if !(applied.name || applied.sector || applied.url) {
            stats.no_change += 1;
        }
        stats.updated_names += usize::from(applied.name);
        stats.updated_sectors += usize::from(applied.sector);
        stats.updated_urls += usize::from(applied.url);
        enriched.push(ticker);
    }

    tracing::info!(
        "enrichment done: {} names, {} sectors, {} urls updated, {} unchanged, {} failed",
        stats.updated_names,
        stats.updated_sectors,
        stats.updated_urls,
        stats.no_change,
        stats.failed
    );
    Ok((enriched, stats))
}

/// A bounded pool whose threads are named `psx-<label>-<i>`.
pub(crate) fn worker_pool(workers: usize, label: &'static str) -> Result<rayon::ThreadPool, SyncError> {
    Ok(rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .thread_name(move |i| format!("psx-{label}-{i}"))
        .build()?)
}

/// Enrich the stored snapshot and save the result as a new snapshot.
pub fn enrich_latest_at(
    root: &Path,
    source: &dyn DetailSource,
    workers: usize,
    keep: usize,
) -> Result<(SavedSnapshot, EnrichStats), SyncError> {
    let latest = store::load_at(root)?;
    if latest.is_empty() {
        return Err(SyncError::NoSnapshot {
            path: paths::tickers_csv_path(root),
        });
    }
    let (tickers, stats) = enrich(latest.tickers(), source, workers)?;
    let saved = store::save_at(root, &Snapshot::from_listing(Utc::now(), tickers), keep)?;
    Ok((saved, stats))
}

/// Merge looked-up details into a copy of `ticker`. Sentinel values never
/// overwrite what is already there.
fn apply(ticker: &Ticker, details: TickerDetails) -> (Ticker, Applied) {
    let mut out = ticker.clone();
    let mut applied = Applied::default();

    let name = details.name.trim();
    if !name.is_empty()
        && name != ticker.symbol.as_str()
        && name != NO_RECORD_NAME
        && name != ticker.name
    {
        out.name = name.to_owned();
        applied.name = true;
    }

    let sector = details.sector.trim();
    if !sector.is_empty() && sector != UNKNOWN_SECTOR && sector != ticker.sector {
        out.sector = sector.to_owned();
        applied.sector = true;
    }

    let url = details.url.trim();
    if !url.is_empty() && url != ticker.url {
        out.url = url.to_owned();
        applied.url = true;
    }

    (out, applied)
}
