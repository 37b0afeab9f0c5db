//! psx: PSX ticker list sync and change tracking.
//!
//! # Usage
//!
//! ```text
//! psx init
//! psx sync [--enrich] [--json]
//! psx enrich [--workers N]
//! psx status [--json]
//! psx changes [--entries N]
//! psx slugs [--json]
//! psx prices [SYMBOL...] [--from DATE] [--to DATE] [--workers N] [--json]
//! ```
//!
//! Logs go to stderr (`RUST_LOG`, default `info`); stdout carries command
//! output only.

mod commands;

use anyhow::Result;
use clap::{Parser, Subcommand};

use commands::{
    changes::ChangesArgs, enrich::EnrichArgs, init::InitArgs, prices::PricesArgs,
    slugs::SlugsArgs, status::StatusArgs, sync::SyncArgs,
};

// ---------------------------------------------------------------------------
// CLI entry point
// ---------------------------------------------------------------------------

#[derive(Parser, Debug)]
#[command(
    name = "psx",
    version,
    about = "Keep a local, change-tracked list of PSX-listed tickers",
    long_about = None,
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Write the default config to ~/.psx/config.yaml.
    Init(InitArgs),

    /// Fetch the current ticker list, log changes and save a new snapshot.
    Sync(SyncArgs),

    /// Look up names and sectors for the stored tickers.
    Enrich(EnrichArgs),

    /// Summarise the stored snapshot.
    Status(StatusArgs),

    /// Print recent change-log entries.
    Changes(ChangesArgs),

    /// Resolve investing.com slugs for the stored tickers.
    Slugs(SlugsArgs),

    /// Download daily price histories into ~/.psx/data/.
    Prices(PricesArgs),
}

// ---------------------------------------------------------------------------
// Main
// ---------------------------------------------------------------------------

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();
    match cli.command {
        Commands::Init(args) => args.run(),
        Commands::Sync(args) => args.run(),
        Commands::Enrich(args) => args.run(),
        Commands::Status(args) => args.run(),
        Commands::Changes(args) => args.run(),
        Commands::Slugs(args) => args.run(),
        Commands::Prices(args) => args.run(),
    }
}

fn init_tracing() {
    use std::io::IsTerminal;
    use tracing_subscriber::{fmt, EnvFilter};

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_ansi(std::io::stderr().is_terminal())
        .with_writer(std::io::stderr)
        .try_init();
}
