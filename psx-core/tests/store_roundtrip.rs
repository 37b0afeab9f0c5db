//! Snapshot store and config integration tests against a temp data root.

use assert_fs::prelude::*;
use chrono::Utc;
use predicates::prelude::predicate;
use psx_core::{config, paths, store, Snapshot, StoreError, Symbol, Ticker, UNKNOWN_SECTOR};
use rstest::rstest;
use std::collections::BTreeMap;
use std::fs;

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn complete() -> Vec<Ticker> {
    vec![
        Ticker::new("LUCK", "Lucky Cement Limited", "Cement", "https://dps.psx.com.pk/company/LUCK"),
        Ticker::new("ENGRO", "Engro Corporation Limited", "Fertilizer", ""),
        Ticker::new("OGDC", "Oil & Gas Development Company Limited", "Oil & Gas Exploration Companies", ""),
    ]
}

fn unresolved() -> Vec<Ticker> {
    vec![
        Ticker::unresolved(Symbol::from("KEL"), ""),
        Ticker::new("XYZ", "No record found", UNKNOWN_SECTOR, ""),
    ]
}

fn awkward_text() -> Vec<Ticker> {
    vec![
        Ticker::new("AKBL", "Askari Bank, Limited", "Commercial \"Banks\"", ""),
        Ticker::new("BOP", "The Bank of Punjab\nLahore", "Commercial Banks", "https://x/?a=1,b=2"),
    ]
}

fn padded() -> Vec<Ticker> {
    vec![
        Ticker::new("ALPHA", " Alpha Bank ", "Banks ", " http://x "),
        Ticker::new("BETA", "\tBeta Textiles", "  ", ""),
    ]
}

fn by_symbol(snapshot: &Snapshot) -> BTreeMap<String, (String, String, String)> {
    snapshot
        .tickers()
        .iter()
        .map(|t| (t.symbol.0.clone(), (t.name.clone(), t.sector.clone(), t.url.clone())))
        .collect()
}

// ---------------------------------------------------------------------------
// Save → load → save reproduces content
// ---------------------------------------------------------------------------

#[rstest]
#[case("complete", complete())]
#[case("unresolved", unresolved())]
#[case("quoting", awkward_text())]
#[case("padded", padded())]
#[case("empty", vec![])]
fn save_load_save_reproduces_content(#[case] label: &str, #[case] tickers: Vec<Ticker>) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let original = Snapshot::try_new(Utc::now(), tickers).expect("unique symbols");

    store::save_at(root.path(), &original, 10).unwrap_or_else(|e| panic!("[{label}] save: {e}"));
    let first = store::load_at(root.path()).unwrap_or_else(|e| panic!("[{label}] load: {e}"));
    store::save_at(root.path(), &first, 10).unwrap_or_else(|e| panic!("[{label}] resave: {e}"));
    let second = store::load_at(root.path()).unwrap_or_else(|e| panic!("[{label}] reload: {e}"));

    assert_eq!(by_symbol(&original), by_symbol(&second), "[{label}] content");
    assert_eq!(first.tickers(), second.tickers(), "[{label}] stable order");
}

#[test]
fn save_creates_layout_under_root() {
    let home = assert_fs::TempDir::new().expect("tempdir");
    let root = paths::psx_root(home.path());
    let snapshot = Snapshot::try_new(Utc::now(), complete()).unwrap();

    let saved = store::save_at(&root, &snapshot, 10).expect("save");

    home.child(".psx/metadata/all_tickers.csv")
        .assert(predicate::path::exists());
    home.child(".psx/metadata/all_tickers.csv")
        .assert(predicate::str::starts_with("symbol,name,sector,url\n"));
    assert!(saved.archive.starts_with(paths::snapshots_dir(&root)));
    assert_eq!(saved.pruned, 0);
}

#[test]
fn archived_snapshot_is_readable() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let snapshot = Snapshot::try_new(Utc::now(), complete()).unwrap();
    let saved = store::save_at(root.path(), &snapshot, 10).unwrap();

    let archived = store::read_snapshot_file(&saved.archive).unwrap();
    assert_eq!(archived.tickers(), snapshot.tickers());
}

#[test]
fn invalid_symbol_reports_line() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("metadata/all_tickers.csv")
        .write_str("symbol,name,sector,url\nHBL,Habib,Banks,\nbad sym,x,y,\n")
        .unwrap();

    let err = store::load_at(root.path()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidSnapshot { .. }), "got: {err}");
    let msg = err.to_string();
    assert!(msg.contains("line 3"), "got: {msg}");
    assert!(msg.contains("all_tickers.csv"), "got: {msg}");
}

#[test]
fn save_refuses_symbols_load_would_reject() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let good = Snapshot::try_new(Utc::now(), complete()).unwrap();
    store::save_at(root.path(), &good, 10).unwrap();
    let before = fs::read(paths::tickers_csv_path(root.path())).unwrap();

    let bad = Snapshot::try_new(
        Utc::now(),
        vec![Ticker::new("HUBC-R", "Hub Power Right", "Power", "")],
    )
    .unwrap();
    let err = store::save_at(root.path(), &bad, 10).unwrap_err();
    assert!(matches!(err, StoreError::InvalidSnapshot { .. }), "got: {err}");
    assert!(err.to_string().contains("HUBC-R"), "got: {err}");

    assert_eq!(fs::read(paths::tickers_csv_path(root.path())).unwrap(), before);
    assert_eq!(store::list_archived_at(root.path()).unwrap().len(), 1);
    assert_eq!(store::load_at(root.path()).unwrap().len(), 3);
}

// ---------------------------------------------------------------------------
// Config
// ---------------------------------------------------------------------------

#[rstest]
#[case("retry:\n  max_attempts: 0\n")]
#[case("retry:\n  backoff_multiplier: 0.5\n")]
#[case("retry:\n  initial_delay_ms: 5000\n  max_delay_ms: 1000\n")]
#[case("http:\n  timeout_secs: 0\n")]
#[case("sources: []\n")]
#[case("details:\n  kind: company_page\n  url_template: https://example.com/\n")]
fn invalid_config_is_rejected(#[case] yaml: &str) {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("config.yaml").write_str(yaml).unwrap();
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig(_)), "{yaml:?} got: {err}");
}

#[test]
fn corrupt_config_reports_path() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    root.child("config.yaml").write_str("retry: [unclosed").unwrap();
    let err = config::load_at(root.path()).unwrap_err();
    assert!(matches!(err, StoreError::Parse { .. }), "got: {err}");
    assert!(err.to_string().contains("config.yaml"));
}

#[test]
fn init_writes_loadable_defaults() {
    let root = assert_fs::TempDir::new().expect("tempdir");
    let (written, created) = config::init_at(root.path()).unwrap();
    assert!(created);
    root.child("config.yaml").assert(predicate::str::contains("max_attempts: 3"));
    assert_eq!(config::load_at(root.path()).unwrap(), written);

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let mode = fs::metadata(root.child("config.yaml").path())
            .unwrap()
            .permissions()
            .mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
