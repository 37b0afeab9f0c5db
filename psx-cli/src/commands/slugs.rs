//! `psx slugs`: investing.com slug per stored ticker.

use anyhow::{Context, Result};
use clap::Args;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use psx_core::slug_cache::SlugOrigin;
use psx_core::{config, store, SlugCache};

use super::data_root;

/// Arguments for `psx slugs`.
#[derive(Args, Debug)]
pub struct SlugsArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

#[derive(Serialize, Tabled)]
struct SlugRow {
    #[tabled(rename = "symbol")]
    symbol: String,
    #[tabled(rename = "slug")]
    slug: String,
    #[tabled(rename = "origin", display_with = "origin_label")]
    origin: SlugOrigin,
}

fn origin_label(origin: &SlugOrigin) -> String {
    match origin {
        SlugOrigin::Cached => "cached".to_string(),
        SlugOrigin::Derived => "derived".to_string(),
    }
}

impl SlugsArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let config = config::load_at(&root).context("failed to load config")?;
        let snapshot = store::load_at(&root).context("failed to load ticker snapshot")?;
        let mut cache = SlugCache::load_at(&root, &config.investing_slugs)
            .context("failed to load slug cache")?;

        let rows: Vec<SlugRow> = snapshot
            .tickers()
            .iter()
            .map(|ticker| {
                let (slug, origin) = cache.resolve(ticker);
                SlugRow {
                    symbol: ticker.symbol.to_string(),
                    slug,
                    origin,
                }
            })
            .collect();
        let saved = cache.save_at(&root).context("failed to save slug cache")?;
        tracing::debug!("slug cache holds {} entries (written: {saved})", cache.len());

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&rows).context("failed to serialize slugs")?
            );
            return Ok(());
        }

        if rows.is_empty() {
            println!("No tickers stored. Run `psx sync` first.");
            return Ok(());
        }
        let derived = rows
            .iter()
            .filter(|r| r.origin == SlugOrigin::Derived)
            .count();
        let mut table = Table::new(rows);
        table.with(Style::rounded());
        println!("{table}");
        println!("{derived} derived from company names");
        Ok(())
    }
}
