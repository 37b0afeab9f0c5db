//! Daily price histories, one CSV per symbol under `<root>/data/`.
//!
//! Files carry the header `date,open,high,low,close,volume`, newest day
//! first, and are replaced whole with the same `.tmp` + rename write the
//! snapshot store uses.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::store::{csv_err, write_atomic};
use crate::types::Symbol;

pub const HISTORY_COLUMNS: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

/// One trading day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

/// Sort newest first and keep one bar per date (the first seen).
pub fn normalize_bars(mut bars: Vec<PriceBar>) -> Vec<PriceBar> {
    bars.sort_by(|a, b| b.date.cmp(&a.date));
    bars.dedup_by_key(|bar| bar.date);
    bars
}

/// Replace the history file for `symbol` with `bars`.
pub fn save_history_at(
    root: &Path,
    symbol: &Symbol,
    bars: &[PriceBar],
) -> Result<PathBuf, StoreError> {
    let path = paths::price_history_path(root, symbol);
    if !Symbol::is_valid(symbol.as_str()) {
        return Err(StoreError::InvalidSnapshot {
            path,
            reason: format!("refusing to write history for invalid symbol '{symbol}'"),
        });
    }

    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer
        .write_record(HISTORY_COLUMNS)
        .map_err(|e| csv_err(&path, e))?;
    for bar in normalize_bars(bars.to_vec()) {
        writer.serialize(&bar).map_err(|e| csv_err(&path, e))?;
    }
    let bytes = writer
        .into_inner()
        .map_err(|e| io_err(&path, e.into_error()))?;

    write_atomic(&path, &bytes, false)?;
    tracing::debug!("saved {} bars to {}", bars.len(), path.display());
    Ok(path)
}

/// Read the history for `symbol`; empty when none was downloaded yet.
pub fn load_history_at(root: &Path, symbol: &Symbol) -> Result<Vec<PriceBar>, StoreError> {
    let path = paths::price_history_path(root, symbol);
    if !path.exists() {
        return Ok(vec![]);
    }
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .from_path(&path)
        .map_err(|e| csv_err(&path, e))?;
    reader
        .deserialize()
        .collect::<Result<Vec<PriceBar>, _>>()
        .map_err(|e| csv_err(&path, e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn bar(date: &str, close: f64) -> PriceBar {
        PriceBar {
            date: date.parse().unwrap(),
            open: close - 1.0,
            high: close + 2.0,
            low: close - 2.5,
            close,
            volume: 1_250_000,
        }
    }

    #[test]
    fn saved_history_is_newest_first_and_reloads() {
        let root = TempDir::new().unwrap();
        let symbol = Symbol::from("LUCK");
        let path = save_history_at(
            root.path(),
            &symbol,
            &[bar("2024-01-02", 700.5), bar("2024-01-04", 712.25), bar("2024-01-03", 705.0)],
        )
        .unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        let mut lines = text.lines();
        assert_eq!(lines.next(), Some("date,open,high,low,close,volume"));
        assert!(lines.next().unwrap().starts_with("2024-01-04,"));

        let loaded = load_history_at(root.path(), &symbol).unwrap();
        let dates: Vec<String> = loaded.iter().map(|b| b.date.to_string()).collect();
        assert_eq!(dates, vec!["2024-01-04", "2024-01-03", "2024-01-02"]);
        assert_eq!(loaded[0], bar("2024-01-04", 712.25));
    }

    #[test]
    fn duplicate_dates_keep_one_bar() {
        let bars = normalize_bars(vec![bar("2024-01-02", 1.0), bar("2024-01-02", 2.0)]);
        assert_eq!(bars.len(), 1);
    }

    #[test]
    fn missing_history_is_empty() {
        let root = TempDir::new().unwrap();
        assert!(load_history_at(root.path(), &Symbol::from("HBL")).unwrap().is_empty());
    }

    #[test]
    fn invalid_symbol_never_becomes_a_path() {
        let root = TempDir::new().unwrap();
        let err = save_history_at(root.path(), &Symbol::from("../x"), &[]).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSnapshot { .. }), "got: {err}");
    }
}
