//! The sync run: fetch, compare, log, persist.
//!
//! Stages run strictly in order:
//!
//! ```text
//! START → FETCH_CURRENT → LOAD_PREVIOUS → ENRICH → DETECT_CHANGES
//!       → LOG_CHANGES → PERSIST_CURRENT → DONE
//! ```
//!
//! Only `FETCH_CURRENT` may abort the run. Once current data is in hand,
//! later failures are recorded as [`StageOutcome::Degraded`] and the run
//! continues to `DONE`.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{Local, Utc};
use serde::Serialize;

use psx_core::{store, Config, Snapshot, Symbol, Ticker};
use psx_fetch::source::{build_details, build_sources};
use psx_fetch::{DetailSource, Fetcher, RetryConfig, TickerSource, UreqClient};

use crate::changelog;
use crate::diff::{detect_changes, ChangeSet};
use crate::enrich::{enrich, EnrichStats};
use crate::error::SyncError;

// ---------------------------------------------------------------------------
// Report types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SyncStage {
    Start,
    FetchCurrent,
    LoadPrevious,
    Enrich,
    DetectChanges,
    LogChanges,
    PersistCurrent,
    Done,
    Failed,
}

impl fmt::Display for SyncStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            SyncStage::Start => "START",
            SyncStage::FetchCurrent => "FETCH_CURRENT",
            SyncStage::LoadPrevious => "LOAD_PREVIOUS",
            SyncStage::Enrich => "ENRICH",
            SyncStage::DetectChanges => "DETECT_CHANGES",
            SyncStage::LogChanges => "LOG_CHANGES",
            SyncStage::PersistCurrent => "PERSIST_CURRENT",
            SyncStage::Done => "DONE",
            SyncStage::Failed => "FAILED",
        };
        f.write_str(s)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", content = "reason", rename_all = "snake_case")]
pub enum StageOutcome {
    Completed,
    Skipped,
    /// The stage failed but the run carried on.
    Degraded(String),
}

impl fmt::Display for StageOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StageOutcome::Completed => f.write_str("completed"),
            StageOutcome::Skipped => f.write_str("skipped"),
            StageOutcome::Degraded(reason) => write!(f, "degraded ({reason})"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StageRecord {
    pub stage: SyncStage,
    pub outcome: StageOutcome,
}

/// Summary of one completed run.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncReport {
    pub stages: Vec<StageRecord>,
    /// Tickers in the fetched listing after normalisation and dedup.
    pub fetched: usize,
    /// Tickers in the previous snapshot (0 on a first run).
    pub previous: usize,
    pub first_run: bool,
    /// `None` when detection was skipped.
    pub changes: Option<ChangeSet>,
    /// Set when a change-log block was written.
    pub change_log: Option<PathBuf>,
    pub snapshot: Option<PathBuf>,
    pub archive: Option<PathBuf>,
    pub enrich: Option<EnrichStats>,
    pub warnings: Vec<String>,
}

impl SyncReport {
    /// `true` once the run reached `DONE`, degraded stages included.
    pub fn success(&self) -> bool {
        self.stages
            .last()
            .is_some_and(|r| r.stage == SyncStage::Done)
    }

    pub fn outcome(&self, stage: SyncStage) -> Option<&StageOutcome> {
        self.stages
            .iter()
            .find(|r| r.stage == stage)
            .map(|r| &r.outcome)
    }

    pub fn is_degraded(&self) -> bool {
        self.stages
            .iter()
            .any(|r| matches!(r.outcome, StageOutcome::Degraded(_)))
    }

    fn record(&mut self, stage: SyncStage, outcome: StageOutcome) {
        match &outcome {
            StageOutcome::Degraded(reason) => {
                tracing::warn!("stage {stage}: {outcome}");
                self.warnings.push(format!("{stage}: {reason}"));
            }
            _ => tracing::info!("stage {stage}: {outcome}"),
        }
        self.stages.push(StageRecord { stage, outcome });
    }
}

// ---------------------------------------------------------------------------
// Synchronizer
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncOptions {
    /// Run detail enrichment on the fetched listing.
    pub enrich: bool,
    pub workers: usize,
    /// Archived snapshots to retain.
    pub keep: usize,
}

impl Default for SyncOptions {
    fn default() -> Self {
        Self {
            enrich: false,
            workers: 8,
            keep: 30,
        }
    }
}

impl SyncOptions {
    pub fn from_config(config: &Config, enrich: bool) -> Self {
        Self {
            enrich: enrich || config.enrich.on_sync,
            workers: config.enrich.effective_workers(),
            keep: config.snapshots.keep,
        }
    }
}

pub struct Synchronizer {
    root: PathBuf,
    source: Box<dyn TickerSource>,
    details: Option<Arc<dyn DetailSource>>,
    options: SyncOptions,
}

impl Synchronizer {
    pub fn new(root: impl Into<PathBuf>, source: Box<dyn TickerSource>) -> Self {
        Self {
            root: root.into(),
            source,
            details: None,
            options: SyncOptions::default(),
        }
    }

    pub fn with_details(mut self, details: Arc<dyn DetailSource>) -> Self {
        self.details = Some(details);
        self
    }

    pub fn with_options(mut self, options: SyncOptions) -> Self {
        self.options = options;
        self
    }

    /// Run every stage once.
    ///
    /// Returns `Err` only when the current listing cannot be obtained or is
    /// empty; persisted state is untouched in that case.
    pub fn run(&self) -> Result<SyncReport, SyncError> {
        let mut report = SyncReport::default();
        let started_at = Utc::now();
        report.record(SyncStage::Start, StageOutcome::Completed);

        // FETCH_CURRENT
        let listing = match self.source.fetch_listing() {
            Ok(listing) => listing,
            Err(err) => {
                tracing::error!("stage {}: fetch from {} failed: {err}", SyncStage::Failed, self.source.name());
                return Err(err.into());
            }
        };
        let listing = normalize_symbols(listing, self.source.name());
        let mut current = Snapshot::from_listing(started_at, listing);
        if current.is_empty() {
            let err = SyncError::EmptyResult {
                sources: self.source.name().to_owned(),
            };
            tracing::error!("stage {}: {err}", SyncStage::Failed);
            return Err(err);
        }
        report.fetched = current.len();
        report.record(SyncStage::FetchCurrent, StageOutcome::Completed);

        // LOAD_PREVIOUS
        let previous = match store::load_at(&self.root) {
            Ok(previous) => {
                report.record(SyncStage::LoadPrevious, StageOutcome::Completed);
                previous
            }
            Err(err) => {
                report.record(
                    SyncStage::LoadPrevious,
                    StageOutcome::Degraded(format!("treating as first run: {err}")),
                );
                Snapshot::empty()
            }
        };
        report.previous = previous.len();
        report.first_run = previous.is_empty();
        current = current.with_details_from(&previous);

        // ENRICH
        match (&self.details, self.options.enrich) {
            (Some(details), true) => {
                match enrich(current.tickers(), details.as_ref(), self.options.workers) {
                    Ok((tickers, stats)) => {
                        current = Snapshot::from_listing(started_at, tickers);
                        report.enrich = Some(stats);
                        report.record(SyncStage::Enrich, StageOutcome::Completed);
                    }
                    Err(err) => {
                        report.record(SyncStage::Enrich, StageOutcome::Degraded(err.to_string()));
                    }
                }
            }
            (None, true) => report.record(
                SyncStage::Enrich,
                StageOutcome::Degraded("no detail source configured".to_owned()),
            ),
            (_, false) => report.record(SyncStage::Enrich, StageOutcome::Skipped),
        }

        // DETECT_CHANGES
        if report.first_run {
            tracing::info!("no previous snapshot, all {} tickers are new", current.len());
            report.record(SyncStage::DetectChanges, StageOutcome::Skipped);
        } else {
            let changes = detect_changes(&current, &previous);
            tracing::info!(
                "{} added, {} deleted, {} renamed",
                changes.added.len(),
                changes.deleted.len(),
                changes.renamed.len()
            );
            report.changes = Some(changes);
            report.record(SyncStage::DetectChanges, StageOutcome::Completed);
        }

        // LOG_CHANGES
        match report.changes.as_ref().filter(|c| !c.is_empty()) {
            None => report.record(SyncStage::LogChanges, StageOutcome::Skipped),
            Some(changes) => {
                let at = started_at.with_timezone(&Local).naive_local();
                match changelog::append_at(&self.root, changes, at) {
                    Ok(path) => {
                        report.change_log = path;
                        report.record(SyncStage::LogChanges, StageOutcome::Completed);
                    }
                    Err(err) => {
                        tracing::error!("change log write failed: {err}");
                        report.record(SyncStage::LogChanges, StageOutcome::Degraded(err.to_string()));
                    }
                }
            }
        }

        // PERSIST_CURRENT
        match store::save_at(&self.root, &current, self.options.keep) {
            Ok(saved) => {
                report.snapshot = Some(saved.path);
                report.archive = Some(saved.archive);
                report.record(SyncStage::PersistCurrent, StageOutcome::Completed);
            }
            Err(err) => {
                tracing::error!("snapshot not saved, stored tickers are now stale: {err}");
                report.record(SyncStage::PersistCurrent, StageOutcome::Degraded(err.to_string()));
            }
        }

        report.record(SyncStage::Done, StageOutcome::Completed);
        Ok(report)
    }
}

/// Bring every fetched symbol into stored form; drop those that cannot be.
fn normalize_symbols(listing: Vec<Ticker>, source: &str) -> Vec<Ticker> {
    let mut dropped = Vec::new();
    let kept: Vec<Ticker> = listing
        .into_iter()
        .filter_map(|mut ticker| match Symbol::normalize(ticker.symbol.as_str()) {
            Some(symbol) => {
                ticker.symbol = symbol;
                Some(ticker)
            }
            None => {
                dropped.push(ticker.symbol.0);
                None
            }
        })
        .collect();
    if !dropped.is_empty() {
        tracing::warn!(
            "dropped {} invalid symbols from {source}: {}",
            dropped.len(),
            dropped.join(", ")
        );
    }
    kept
}

// ---------------------------------------------------------------------------
// Live wiring
// ---------------------------------------------------------------------------

/// Build a [`Fetcher`] over `ureq` from the config's http and retry settings.
pub fn live_fetcher(config: &Config) -> Fetcher {
    let client = Arc::new(UreqClient::new(&config.http));
    Fetcher::new(client, RetryConfig::from(&config.retry))
}

/// Run a sync against the configured sources and detail lookup.
pub fn sync_with_config(root: &Path, config: &Config, enrich: bool) -> Result<SyncReport, SyncError> {
    let fetcher = live_fetcher(config);
    let sources = build_sources(config, &fetcher);
    tracing::info!("ticker sources: {}", sources.names().join(", "));

    Synchronizer::new(root, Box::new(sources))
        .with_details(build_details(config, &fetcher))
        .with_options(SyncOptions::from_config(config, enrich))
        .run()
}
