//! End-to-end `psx` runs with HOME in a temp dir and a local CSV source.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use assert_cmd::prelude::*;
use predicates::prelude::*;
use predicates::str::contains;
use tempfile::TempDir;

fn psx_cmd(home: &Path) -> Command {
    let mut cmd = Command::new(assert_cmd::cargo::cargo_bin!("psx"));
    cmd.env("HOME", home)
        .env("USERPROFILE", home)
        .env("RUST_LOG", "info")
        .env("NO_COLOR", "1");
    cmd
}

/// Point the config at `<home>/listing.csv` and bundled details.
fn configure(home: &TempDir) -> PathBuf {
    let root = home.path().join(".psx");
    fs::create_dir_all(&root).expect("mkdir root");
    let listing = home.path().join("listing.csv");
    fs::write(
        root.join("config.yaml"),
        format!(
            "sources:\n  - kind: file\n    path: {}\ndetails:\n  kind: bundled\n",
            listing.display()
        ),
    )
    .expect("write config");
    listing
}

fn write_listing(path: &Path, rows: &[&str]) {
    let mut csv = String::from("symbol,name,sector\n");
    for row in rows {
        csv.push_str(row);
        csv.push('\n');
    }
    fs::write(path, csv).expect("write listing");
}

#[test]
fn init_is_idempotent() {
    let home = TempDir::new().expect("home");
    psx_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("Wrote default config"))
        .stdout(contains("market_watch → listed_companies"));
    psx_cmd(home.path())
        .arg("init")
        .assert()
        .success()
        .stdout(contains("already present"));
    assert!(home.path().join(".psx/config.yaml").exists());
}

#[test]
fn sync_twice_then_inspect() {
    let home = TempDir::new().expect("home");
    let listing = configure(&home);

    write_listing(
        &listing,
        &[
            "HBL,Habib Bank Limited,Commercial Banks",
            "OLDCO,Alpha Bank,Commercial Banks",
            "LUCK,Lucky Cement Limited,Cement",
        ],
    );
    psx_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("Synced 3 tickers (first run)"))
        .stderr(contains("stage DONE"));
    assert!(!home.path().join(".psx/metadata/ticker_changes.log").exists());

    write_listing(
        &listing,
        &[
            "HBL,Habib Bank Limited,Commercial Banks",
            "NEWCO,Alpha Bank Ltd,Commercial Banks",
            "LUCK,Lucky Cement Limited,Cement",
            "KEL,K-Electric Limited,Power",
        ],
    );
    psx_cmd(home.path())
        .arg("sync")
        .assert()
        .success()
        .stdout(contains("+ KEL"))
        .stdout(contains("OLDCO → NEWCO"))
        .stderr(contains("Added 1 tickers: KEL"));

    psx_cmd(home.path())
        .args(["changes", "--entries", "1"])
        .assert()
        .success()
        .stdout(contains("ADDED (1):\n+ KEL"))
        .stdout(contains("RENAMED (1):\n* OLDCO → NEWCO"));

    let assert = psx_cmd(home.path())
        .args(["status", "--json"])
        .assert()
        .success();
    let status: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("status json");
    assert_eq!(status["tickers"], 4);
    assert_eq!(status["incomplete"], 0);
    assert_eq!(status["archives"], 2);

    let assert = psx_cmd(home.path())
        .args(["slugs", "--json"])
        .assert()
        .success();
    let slugs: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("slugs json");
    let hbl = slugs
        .as_array()
        .expect("array")
        .iter()
        .find(|row| row["symbol"] == "HBL")
        .expect("HBL row");
    assert_eq!(hbl["slug"], "habib-bank-limited");
    assert_eq!(hbl["origin"], "cached");
    assert!(home.path().join(".psx/cache/investing_slugs.json").exists());
}

#[test]
fn sync_json_report() {
    let home = TempDir::new().expect("home");
    let listing = configure(&home);
    write_listing(&listing, &["HBL,Habib Bank Limited,Commercial Banks"]);

    let assert = psx_cmd(home.path())
        .args(["sync", "--json"])
        .assert()
        .success();
    let report: serde_json::Value =
        serde_json::from_slice(&assert.get_output().stdout).expect("report json");
    assert_eq!(report["fetched"], 1);
    assert_eq!(report["first_run"], true);
    let stages: Vec<&str> = report["stages"]
        .as_array()
        .expect("stages")
        .iter()
        .filter_map(|s| s["stage"].as_str())
        .collect();
    assert_eq!(
        stages,
        vec![
            "START",
            "FETCH_CURRENT",
            "LOAD_PREVIOUS",
            "ENRICH",
            "DETECT_CHANGES",
            "LOG_CHANGES",
            "PERSIST_CURRENT",
            "DONE"
        ]
    );
}

#[test]
fn failed_fetch_exits_non_zero_and_keeps_snapshot() {
    let home = TempDir::new().expect("home");
    let listing = configure(&home);
    write_listing(&listing, &["HBL,Habib Bank Limited,Commercial Banks"]);
    psx_cmd(home.path()).arg("sync").assert().success();

    let snapshot = home.path().join(".psx/metadata/all_tickers.csv");
    let before = fs::read(&snapshot).expect("snapshot");

    fs::remove_file(&listing).expect("remove listing");
    psx_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .code(1)
        .stderr(contains("sync failed"));

    write_listing(&listing, &[]);
    psx_cmd(home.path())
        .arg("sync")
        .assert()
        .failure()
        .stderr(contains("returned no tickers"));

    assert_eq!(fs::read(&snapshot).expect("snapshot"), before);
}

#[test]
fn enrich_fills_unresolved_tickers_from_bundled_details() {
    let home = TempDir::new().expect("home");
    let listing = configure(&home);
    fs::write(&listing, "symbol\nLUCK\nHBL\n").expect("write listing");
    psx_cmd(home.path()).arg("sync").assert().success();

    psx_cmd(home.path())
        .args(["enrich", "--workers", "2"])
        .assert()
        .success()
        .stdout(contains("Enriched 2 tickers with 2 workers"))
        .stdout(contains("2 names"));

    psx_cmd(home.path())
        .arg("status")
        .assert()
        .success()
        .stdout(contains("0 incomplete"))
        .stdout(contains("Cement"));
}

#[test]
fn changes_without_log() {
    let home = TempDir::new().expect("home");
    psx_cmd(home.path())
        .arg("changes")
        .assert()
        .success()
        .stdout(contains("No changes recorded yet.").and(contains("===").not()));
}

#[test]
fn prices_without_snapshot_asks_for_sync() {
    let home = TempDir::new().expect("home");
    configure(&home);
    psx_cmd(home.path())
        .arg("prices")
        .assert()
        .failure()
        .stderr(contains("run `psx sync` first"));
    assert!(!home.path().join(".psx/data").exists());
}

#[test]
fn prices_rejects_inverted_range() {
    let home = TempDir::new().expect("home");
    configure(&home);
    psx_cmd(home.path())
        .args(["prices", "LUCK", "--from", "2024-02-01", "--to", "2024-01-01"])
        .assert()
        .failure()
        .stderr(contains("--from 2024-02-01 is after --to 2024-01-01"));
}

#[test]
fn prices_rejects_invalid_symbol() {
    let home = TempDir::new().expect("home");
    configure(&home);
    psx_cmd(home.path())
        .args(["prices", "..."])
        .assert()
        .failure()
        .stderr(contains("invalid symbol '...'"));
}
