//! Ticker snapshot store.
//!
//! The canonical snapshot lives at `<root>/metadata/all_tickers.csv` with the
//! fixed column order `symbol,name,sector,url` and a header row. Every save
//! also drops an immutable copy under `<root>/snapshots/`, pruned to the
//! configured retention.
//!
//! # Write protocol
//!
//! 1. Serialize the whole snapshot to memory.
//! 2. Write `<file>.tmp` next to the target (same filesystem).
//! 3. Rename over the target. A crash before the rename leaves the previous
//!    snapshot intact; a failed rename removes the `.tmp`.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use csv::StringRecord;

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::types::{Snapshot, Symbol, Ticker};

/// On-disk column order. Significant.
pub const COLUMNS: [&str; 4] = ["symbol", "name", "sector", "url"];

/// Result of a successful [`save_at`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SavedSnapshot {
    /// Canonical snapshot path.
    pub path: PathBuf,
    /// Immutable archive copy.
    pub archive: PathBuf,
    /// Archive files removed by retention.
    pub pruned: usize,
}

// ---------------------------------------------------------------------------
// Load
// ---------------------------------------------------------------------------

/// Load the most recently written snapshot.
///
/// Returns [`Snapshot::empty`] when nothing has been saved yet; a missing
/// file is the first-run state, not an error.
pub fn load_at(root: &Path) -> Result<Snapshot, StoreError> {
    let path = paths::tickers_csv_path(root);
    if !path.exists() {
        tracing::info!("no existing ticker list at {}", path.display());
        return Ok(Snapshot::empty());
    }
    let snapshot = read_snapshot_file(&path)?;
    tracing::info!("loaded {} tickers from {}", snapshot.len(), path.display());
    Ok(snapshot)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Snapshot, StoreError> {
    load_at(&paths::default_root()?)
}

/// Read and validate one snapshot CSV (canonical or archived).
///
/// The header must be `symbol,name,sector,url`; the three-column form
/// without `url` written by older versions is also accepted. Symbols must be
/// valid and unique. Only headers are trimmed: field text is returned exactly
/// as [`save_at`] wrote it. `captured_at` is taken from the file's mtime.
pub fn read_snapshot_file(path: &Path) -> Result<Snapshot, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::Headers)
        .flexible(false)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let headers = reader.headers().map_err(|e| csv_err(path, e))?.clone();
    let has_url = check_snapshot_header(path, &headers)?;

    let mut tickers = Vec::new();
    for record in reader.records() {
        let record = record.map_err(|e| csv_err(path, e))?;
        let line = record.position().map(|p| p.line()).unwrap_or_default();
        let raw_symbol = record.get(0).unwrap_or_default();
        if !Symbol::is_valid(raw_symbol) {
            return Err(StoreError::InvalidSnapshot {
                path: path.to_path_buf(),
                reason: format!("line {line}: invalid symbol '{raw_symbol}'"),
            });
        }
        tickers.push(Ticker {
            symbol: Symbol::from(raw_symbol),
            name: record.get(1).unwrap_or_default().to_owned(),
            sector: record.get(2).unwrap_or_default().to_owned(),
            url: if has_url {
                record.get(3).unwrap_or_default().to_owned()
            } else {
                String::new()
            },
        });
    }

    let captured_at = modified_at(path)?;
    Snapshot::try_new(captured_at, tickers).map_err(|dup| StoreError::InvalidSnapshot {
        path: path.to_path_buf(),
        reason: format!("duplicate symbol '{dup}'"),
    })
}

/// Returns whether the `url` column is present.
fn check_snapshot_header(path: &Path, headers: &StringRecord) -> Result<bool, StoreError> {
    let cols: Vec<String> = headers.iter().map(|h| h.to_ascii_lowercase()).collect();
    if cols == COLUMNS {
        Ok(true)
    } else if cols == COLUMNS[..3] {
        Ok(false)
    } else {
        Err(StoreError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason: format!(
                "expected header '{}', found '{}'",
                COLUMNS.join(","),
                cols.join(",")
            ),
        })
    }
}

/// Read a loosely-shaped ticker CSV supplied by the user.
///
/// Only a `symbol` column is required (any position, case-insensitive).
/// Symbols are normalised; rows without a usable symbol are skipped.
/// Missing names default to the symbol and missing sectors to `Unknown`.
pub fn read_listing_csv(path: &Path) -> Result<Vec<Ticker>, StoreError> {
    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .flexible(true)
        .from_path(path)
        .map_err(|e| csv_err(path, e))?;

    let headers = reader.headers().map_err(|e| csv_err(path, e))?.clone();
    let find = |name: &str| headers.iter().position(|h| h.eq_ignore_ascii_case(name));
    let Some(symbol_col) = find("symbol") else {
        return Err(StoreError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason: "no `symbol` column".into(),
        });
    };
    let (name_col, sector_col, url_col) = (find("name"), find("sector"), find("url"));

    let field = |record: &StringRecord, col: Option<usize>| -> String {
        col.and_then(|c| record.get(c))
            .map(str::to_owned)
            .unwrap_or_default()
    };

    let mut tickers = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record = record.map_err(|e| csv_err(path, e))?;
        let Some(symbol) = record.get(symbol_col).and_then(Symbol::normalize) else {
            skipped += 1;
            continue;
        };
        let mut ticker = Ticker::unresolved(symbol, field(&record, url_col));
        let name = field(&record, name_col);
        if !name.is_empty() {
            ticker.name = name;
        }
        let sector = field(&record, sector_col);
        if !sector.is_empty() {
            ticker.sector = sector;
        }
        tickers.push(ticker);
    }
    if skipped > 0 {
        tracing::debug!("skipped {skipped} rows without a symbol in {}", path.display());
    }
    Ok(tickers)
}

// ---------------------------------------------------------------------------
// Save
// ---------------------------------------------------------------------------

/// Persist `snapshot` as the new canonical ticker list.
///
/// Refuses snapshots holding a symbol [`load_at`] would reject, so a bad
/// save can never make the stored list unreadable. Writes the archive copy first, then atomically replaces the canonical
/// file, then prunes archives beyond `keep` (at least one is always kept).
/// Pruning failures are logged, not returned.
pub fn save_at(root: &Path, snapshot: &Snapshot, keep: usize) -> Result<SavedSnapshot, StoreError> {
    let path = paths::tickers_csv_path(root);
    let bytes = encode_csv(&path, snapshot)?;

    let archive = next_archive_path(root, snapshot.captured_at());
    write_atomic(&archive, &bytes, false)?;
    write_atomic(&path, &bytes, false)?;
    tracing::info!("saved {} tickers to {}", snapshot.len(), path.display());

    let pruned = match prune_archive_at(root, keep) {
        Ok(n) => n,
        Err(err) => {
            tracing::warn!("snapshot archive pruning failed: {err}");
            0
        }
    };

    Ok(SavedSnapshot {
        path,
        archive,
        pruned,
    })
}

/// `save_at` convenience wrapper.
pub fn save(snapshot: &Snapshot, keep: usize) -> Result<SavedSnapshot, StoreError> {
    save_at(&paths::default_root()?, snapshot, keep)
}

fn encode_csv(path: &Path, snapshot: &Snapshot) -> Result<Vec<u8>, StoreError> {
    if let Some(bad) = snapshot
        .tickers()
        .iter()
        .find(|t| !Symbol::is_valid(t.symbol.as_str()))
    {
        return Err(StoreError::InvalidSnapshot {
            path: path.to_path_buf(),
            reason: format!("refusing to save invalid symbol '{}'", bad.symbol),
        });
    }
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_writer(Vec::new());
    writer.write_record(COLUMNS).map_err(|e| csv_err(path, e))?;
    for ticker in snapshot.tickers() {
        writer.serialize(ticker).map_err(|e| csv_err(path, e))?;
    }
    writer
        .into_inner()
        .map_err(|e| io_err(path, e.into_error()))
}

/// Write `contents` to `path` via a `.tmp` sibling and rename.
///
/// Creates the parent directory if needed. `private` restricts the file to
/// mode `0600` on unix.
pub fn write_atomic(path: &Path, contents: &[u8], private: bool) -> Result<(), StoreError> {
    let Some(dir) = path.parent() else {
        return Err(io_err(
            path,
            std::io::Error::other("path has no parent directory"),
        ));
    };
    fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    let tmp = path.with_file_name(format!("{file_name}.tmp"));

    fs::write(&tmp, contents).map_err(|e| io_err(&tmp, e))?;
    if private {
        set_file_permissions(&tmp)?;
    }
    if let Err(e) = fs::rename(&tmp, path) {
        let _ = fs::remove_file(&tmp);
        return Err(io_err(path, e));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Archive
// ---------------------------------------------------------------------------

/// Archived snapshot files, newest first.
pub fn list_archived_at(root: &Path) -> Result<Vec<PathBuf>, StoreError> {
    let dir = paths::snapshots_dir(root);
    if !dir.exists() {
        return Ok(vec![]);
    }
    let mut files: Vec<PathBuf> = fs::read_dir(&dir)
        .map_err(|e| io_err(&dir, e))?
        .filter_map(|e| e.ok())
        .filter(|e| e.file_type().map(|t| t.is_file()).unwrap_or(false))
        .filter(|e| {
            let name = e.file_name();
            let name = name.to_string_lossy();
            name.starts_with(paths::SNAPSHOT_PREFIX) && name.ends_with(".csv")
        })
        .map(|e| e.path())
        .collect();
    files.sort();
    files.reverse();
    Ok(files)
}

/// Delete archived snapshots beyond the newest `keep` (minimum 1).
pub fn prune_archive_at(root: &Path, keep: usize) -> Result<usize, StoreError> {
    let files = list_archived_at(root)?;
    let mut removed = 0;
    for stale in files.iter().skip(keep.max(1)) {
        fs::remove_file(stale).map_err(|e| io_err(stale, e))?;
        tracing::debug!("pruned archived snapshot {}", stale.display());
        removed += 1;
    }
    Ok(removed)
}

fn next_archive_path(root: &Path, captured_at: DateTime<Utc>) -> PathBuf {
    let dir = paths::snapshots_dir(root);
    let stamp = captured_at.format("%Y%m%dT%H%M%S%3f");
    let base = dir.join(format!("{}{stamp}.csv", paths::SNAPSHOT_PREFIX));
    if !base.exists() {
        return base;
    }
    (1..)
        .map(|n| dir.join(format!("{}{stamp}_{n}.csv", paths::SNAPSHOT_PREFIX)))
        .find(|p| !p.exists())
        .unwrap_or(base)
}

// ---------------------------------------------------------------------------
// Private helpers
// ---------------------------------------------------------------------------

pub(crate) fn csv_err(path: &Path, source: csv::Error) -> StoreError {
    StoreError::Csv {
        path: path.to_path_buf(),
        source,
    }
}

fn modified_at(path: &Path) -> Result<DateTime<Utc>, StoreError> {
    let modified = fs::metadata(path)
        .and_then(|m| m.modified())
        .map_err(|e| io_err(path, e))?;
    Ok(DateTime::<Utc>::from(modified))
}

#[cfg(unix)]
fn set_file_permissions(path: &Path) -> Result<(), StoreError> {
    use std::os::unix::fs::PermissionsExt;
    fs::set_permissions(path, fs::Permissions::from_mode(0o600)).map_err(|e| io_err(path, e))
}
#[cfg(not(unix))]
fn set_file_permissions(_path: &Path) -> Result<(), StoreError> {
    Ok(())
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::UNKNOWN_SECTOR;
    use tempfile::TempDir;

    fn sample() -> Snapshot {
        Snapshot::try_new(
            Utc::now(),
            vec![
                Ticker::new("HBL", "Habib Bank Limited", "Commercial Banks", "https://dps.psx.com.pk/company/HBL"),
                Ticker::new("PSO", "Pakistan State Oil Company Limited", "Oil & Gas Marketing Companies", ""),
                Ticker::unresolved(Symbol::from("KEL"), ""),
            ],
        )
        .unwrap()
    }

    #[test]
    fn load_missing_returns_empty_snapshot() {
        let root = TempDir::new().unwrap();
        let snap = load_at(root.path()).unwrap();
        assert!(snap.is_empty());
    }

    #[test]
    fn save_writes_header_in_column_order() {
        let root = TempDir::new().unwrap();
        save_at(root.path(), &sample(), 5).unwrap();
        let text = fs::read_to_string(paths::tickers_csv_path(root.path())).unwrap();
        assert_eq!(text.lines().next(), Some("symbol,name,sector,url"));
        assert!(text.contains("Oil & Gas Marketing Companies"));
    }

    #[test]
    fn empty_snapshot_still_has_header() {
        let root = TempDir::new().unwrap();
        save_at(root.path(), &Snapshot::empty(), 5).unwrap();
        let text = fs::read_to_string(paths::tickers_csv_path(root.path())).unwrap();
        assert_eq!(text.trim_end(), "symbol,name,sector,url");
        assert!(load_at(root.path()).unwrap().is_empty());
    }

    #[test]
    fn roundtrip_preserves_fields() {
        let root = TempDir::new().unwrap();
        let original = sample();
        save_at(root.path(), &original, 5).unwrap();
        let loaded = load_at(root.path()).unwrap();
        assert_eq!(loaded.tickers(), original.tickers());
    }

    #[test]
    fn tmp_file_removed_after_save() {
        let root = TempDir::new().unwrap();
        save_at(root.path(), &sample(), 5).unwrap();
        let tmp = paths::metadata_dir(root.path()).join("all_tickers.csv.tmp");
        assert!(!tmp.exists(), ".tmp must be gone after a successful save");
    }

    #[test]
    fn legacy_three_column_file_loads_with_empty_urls() {
        let root = TempDir::new().unwrap();
        let path = paths::tickers_csv_path(root.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "symbol,name,sector\nHBL,Habib Bank Limited,Commercial Banks\n").unwrap();

        let snap = load_at(root.path()).unwrap();
        assert_eq!(snap.len(), 1);
        assert_eq!(snap.tickers()[0].url, "");
    }

    #[test]
    fn wrong_header_is_rejected() {
        let root = TempDir::new().unwrap();
        let path = paths::tickers_csv_path(root.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "name,symbol,sector,url\nHabib,HBL,Banks,\n").unwrap();

        let err = load_at(root.path()).unwrap_err();
        assert!(matches!(err, StoreError::InvalidSnapshot { .. }), "got: {err}");
    }

    #[test]
    fn duplicate_symbols_are_rejected_at_load() {
        let root = TempDir::new().unwrap();
        let path = paths::tickers_csv_path(root.path());
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(&path, "symbol,name,sector,url\nHBL,a,b,\nHBL,c,d,\n").unwrap();

        let err = load_at(root.path()).unwrap_err();
        assert!(err.to_string().contains("duplicate symbol 'HBL'"), "got: {err}");
    }

    #[test]
    fn archive_is_pruned_to_keep() {
        let root = TempDir::new().unwrap();
        for _ in 0..4 {
            save_at(root.path(), &sample(), 2).unwrap();
        }
        assert_eq!(list_archived_at(root.path()).unwrap().len(), 2);
    }

    #[test]
    fn listing_csv_is_tolerant() {
        let root = TempDir::new().unwrap();
        let path = root.path().join("list.csv");
        fs::write(&path, "Sector,Symbol\nCement,luck\n,ogdc.ka\nBanks,\n").unwrap();

        let tickers = read_listing_csv(&path).unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].symbol, Symbol::from("LUCK"));
        assert_eq!(tickers[0].sector, "Cement");
        assert_eq!(tickers[1].symbol, Symbol::from("OGDC"));
        assert_eq!(tickers[1].name, "OGDC");
        assert_eq!(tickers[1].sector, UNKNOWN_SECTOR);
    }
}
