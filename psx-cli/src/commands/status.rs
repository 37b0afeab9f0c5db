//! `psx status`: summary of the stored snapshot.

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use serde::Serialize;
use tabled::{settings::Style, Table, Tabled};

use psx_core::{paths, store};

use super::data_root;

/// Arguments for `psx status`.
#[derive(Args, Debug)]
pub struct StatusArgs {
    /// Emit machine-readable JSON.
    #[arg(long)]
    pub json: bool,
}

impl StatusArgs {
    pub fn run(self) -> Result<()> {
        let root = data_root()?;
        let snapshot = store::load_at(&root).context("failed to load ticker snapshot")?;
        let archives = store::list_archived_at(&root)
            .context("failed to list archived snapshots")?
            .len();

        let report = StatusReport {
            snapshot: paths::tickers_csv_path(&root).display().to_string(),
            captured_at: (!snapshot.is_empty()).then(|| snapshot.captured_at().to_rfc3339()),
            tickers: snapshot.len(),
            incomplete: snapshot.incomplete_count(),
            archives,
            sectors: snapshot
                .sector_counts()
                .into_iter()
                .map(|(sector, tickers)| SectorRow {
                    sector: sector.to_owned(),
                    tickers,
                })
                .collect(),
        };

        if self.json {
            println!(
                "{}",
                serde_json::to_string_pretty(&report).context("failed to serialize status JSON")?
            );
            return Ok(());
        }
        print_table(report);
        Ok(())
    }
}

#[derive(Serialize)]
struct StatusReport {
    snapshot: String,
    captured_at: Option<String>,
    tickers: usize,
    incomplete: usize,
    archives: usize,
    sectors: Vec<SectorRow>,
}

#[derive(Serialize, Tabled)]
struct SectorRow {
    #[tabled(rename = "sector")]
    sector: String,
    #[tabled(rename = "tickers")]
    tickers: usize,
}

fn print_table(report: StatusReport) {
    println!(
        "psx v{} | {} tickers | {} incomplete | {} archived snapshots",
        env!("CARGO_PKG_VERSION"),
        report.tickers,
        report.incomplete,
        report.archives,
    );

    if report.tickers == 0 {
        println!("No tickers stored. Run `psx sync` first.");
        return;
    }

    if let Some(at) = &report.captured_at {
        println!("Last saved: {at}");
    }
    let mut table = Table::new(report.sectors);
    table.with(Style::rounded());
    println!("{table}");

    if report.incomplete > 0 {
        println!(
            "{}",
            format!(
                "{} tickers lack a name or sector. Run `psx enrich` to look them up.",
                report.incomplete
            )
            .yellow()
        );
    }
}
