//! `psx prices`: download daily price histories into `~/.psx/data/`.

use anyhow::{bail, Context, Result};
use chrono::{Local, NaiveDate};
use clap::Args;
use colored::Colorize;

use psx_core::config::{self, EnrichSettings};
use psx_core::{paths, Symbol};
use psx_fetch::{DateRange, InvestingHistory};
use psx_sync::{download_prices_at, live_fetcher};

use super::data_root;

/// Arguments for `psx prices`.
#[derive(Args, Debug)]
pub struct PricesArgs {
    /// Symbols to download; every stored ticker when omitted.
    pub symbols: Vec<String>,

    /// First day to keep (YYYY-MM-DD). Defaults to `prices.lookback_days` before `--to`.
    #[arg(long)]
    pub from: Option<NaiveDate>,

    /// Last day to keep (YYYY-MM-DD). Defaults to today.
    #[arg(long)]
    pub to: Option<NaiveDate>,

    /// Concurrent downloads (overrides `prices.workers`).
    #[arg(long, value_parser = clap::value_parser!(u16).range(1..=EnrichSettings::MAX_WORKERS as i64))]
    pub workers: Option<u16>,

    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl PricesArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let config = config::load_at(&root).context("failed to load config")?;

        let to = self.to.unwrap_or_else(|| Local::now().date_naive());
        let range = match self.from {
            Some(from) => DateRange::new(from, to)
                .with_context(|| format!("--from {from} is after --to {to}"))?,
            None => DateRange::ending(to, config.prices.lookback_days),
        };

        let mut symbols = Vec::with_capacity(self.symbols.len());
        for raw in &self.symbols {
            match Symbol::normalize(raw) {
                Some(symbol) => symbols.push(symbol),
                None => bail!("invalid symbol '{raw}'"),
            }
        }
        let workers = self
            .workers
            .map(usize::from)
            .unwrap_or_else(|| config.prices.effective_workers());

        let source = InvestingHistory::from_config(&config, &live_fetcher(&config));
        let stats = download_prices_at(
            &root,
            &source,
            &config.investing_slugs,
            &symbols,
            &range,
            workers,
        )
        .context("price download failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&stats).context("failed to serialize stats")?
            );
            return Ok(());
        }

        println!(
            "✓ Saved {} of {} price histories ({} to {}, {} bars)",
            stats.saved, stats.total, range.from, range.to, stats.bars
        );
        if stats.empty > 0 {
            println!("  {} returned no data", stats.empty);
        }
        for (symbol, reason) in &stats.failures {
            println!("  {} {symbol}: {reason}", "✗".red());
        }
        println!("  Files: {}", paths::prices_dir(&root).display());
        Ok(())
    }
}
