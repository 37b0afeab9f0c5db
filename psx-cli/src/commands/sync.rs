//! `psx sync`: fetch, diff, log, persist.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;

use psx_core::config;
use psx_sync::{sync_with_config, SyncReport};

use super::data_root;

/// Arguments for `psx sync`.
#[derive(Args, Debug)]
pub struct SyncArgs {
    /// Look up names and sectors for the fetched tickers before comparing.
    #[arg(long)]
    pub enrich: bool,

    /// Emit the sync report as JSON.
    #[arg(long)]
    pub json: bool,
}

impl SyncArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let config = config::load_at(&root).context("failed to load config")?;

        // A failed fetch is the only hard failure; it maps to exit status 1.
        let report = sync_with_config(&root, &config, self.enrich).context("sync failed")?;

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize sync report")?
            );
            return Ok(());
        }
        print_report(&report);
        Ok(())
    }
}

fn print_report(report: &SyncReport) {
    let headline = if report.first_run {
        format!("✓ Synced {} tickers (first run)", report.fetched)
    } else {
        format!(
            "✓ Synced {} tickers (previously {})",
            report.fetched, report.previous
        )
    };
    println!("{}", headline.green());

    match &report.changes {
        Some(changes) if changes.is_empty() => println!("  No changes"),
        Some(changes) => {
            for symbol in &changes.added {
                println!("  {} {symbol}", "+".green());
            }
            for symbol in &changes.deleted {
                println!("  {} {symbol}", "-".red());
            }
            for rename in &changes.renamed {
                println!("  {} {} → {}", "*".yellow(), rename.from, rename.to);
            }
        }
        None => {}
    }

    if let Some(stats) = &report.enrich {
        println!(
            "  Enriched: {} names, {} sectors, {} failed",
            stats.updated_names, stats.updated_sectors, stats.failed
        );
    }
    if let Some(path) = &report.snapshot {
        println!("  Snapshot: {}", path.display());
    }
    if let Some(path) = &report.change_log {
        println!("  Change log: {}", path.display());
    }
    for warning in &report.warnings {
        println!("  {} {warning}", "!".yellow().bold());
    }
}
