//! Append-only change log at `<root>/metadata/ticker_changes.log`.
//!
//! Entry format:
//!
//! ```text
//!
//! === 2025-03-01 09:30:00 ===
//! ADDED (1):
//! + NEWCO
//! DELETED (1):
//! - OLDCO
//! RENAMED (1):
//! * AAA → BBB
//!
//! ```
//!
//! Each block is present only when non-empty. The file starts with a
//! `# PSX Ticker Changes Log` header written when it is created.

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::NaiveDateTime;

use psx_core::paths;

use crate::diff::ChangeSet;
use crate::error::{io_err, SyncError};

pub const HEADER: &str = "# PSX Ticker Changes Log\n\n";
const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Render one entry. Empty change sets render as an empty string.
pub fn render_entry(changes: &ChangeSet, at: NaiveDateTime) -> String {
    if changes.is_empty() {
        return String::new();
    }
    let mut out = format!("\n=== {} ===\n", at.format(TIMESTAMP_FORMAT));
    if !changes.added.is_empty() {
        out.push_str(&format!("ADDED ({}):\n", changes.added.len()));
        for symbol in &changes.added {
            out.push_str(&format!("+ {symbol}\n"));
        }
    }
    if !changes.deleted.is_empty() {
        out.push_str(&format!("DELETED ({}):\n", changes.deleted.len()));
        for symbol in &changes.deleted {
            out.push_str(&format!("- {symbol}\n"));
        }
    }
    if !changes.renamed.is_empty() {
        out.push_str(&format!("RENAMED ({}):\n", changes.renamed.len()));
        for r in &changes.renamed {
            out.push_str(&format!("* {} → {}\n", r.from, r.to));
        }
    }
    out.push('\n');
    out
}

/// Mirror a change set onto the operational log.
pub fn emit(changes: &ChangeSet) {
    let join = |symbols: &[psx_core::Symbol]| {
        symbols
            .iter()
            .map(|s| s.as_str())
            .collect::<Vec<_>>()
            .join(", ")
    };
    if !changes.added.is_empty() {
        tracing::info!("Added {} tickers: {}", changes.added.len(), join(&changes.added));
    }
    if !changes.deleted.is_empty() {
        tracing::info!("Deleted {} tickers: {}", changes.deleted.len(), join(&changes.deleted));
    }
    if !changes.renamed.is_empty() {
        let pairs: Vec<String> = changes
            .renamed
            .iter()
            .map(|r| format!("{} → {}", r.from, r.to))
            .collect();
        tracing::info!("Renamed {} tickers: {}", pairs.len(), pairs.join(", "));
    }
}

/// Append an entry for `changes`.
///
/// No-op returning `Ok(None)` when the change set is empty. The log stream
/// receives the summary before the file is touched, so it is reported even
/// when the write fails.
pub fn append_at(
    root: &Path,
    changes: &ChangeSet,
    at: NaiveDateTime,
) -> Result<Option<PathBuf>, SyncError> {
    if changes.is_empty() {
        return Ok(None);
    }
    emit(changes);

    let path = paths::changes_log_path(root);
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir).map_err(|e| io_err(dir, e))?;
    }
    let is_new = !path.exists();
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(&path)
        .map_err(|e| io_err(&path, e))?;

    let mut text = String::new();
    if is_new {
        text.push_str(HEADER);
    }
    text.push_str(&render_entry(changes, at));
    file.write_all(text.as_bytes())
        .map_err(|e| io_err(&path, e))?;

    tracing::info!("changes logged to {}", path.display());
    Ok(Some(path))
}

/// Every entry in the log, oldest first, each starting at its `===` line.
pub fn read_entries_at(root: &Path) -> Result<Vec<String>, SyncError> {
    let path = paths::changes_log_path(root);
    if !path.exists() {
        return Ok(vec![]);
    }
    let text = fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;

    let mut entries = Vec::new();
    let mut current: Option<String> = None;
    for line in text.lines() {
        if line.starts_with("=== ") && line.ends_with(" ===") {
            if let Some(done) = current.take() {
                entries.push(done.trim_end().to_owned());
            }
            current = Some(format!("{line}\n"));
        } else if let Some(entry) = current.as_mut() {
            entry.push_str(line);
            entry.push('\n');
        }
    }
    if let Some(done) = current {
        entries.push(done.trim_end().to_owned());
    }
    Ok(entries)
}

/// The newest `n` entries, oldest first.
pub fn tail_entries_at(root: &Path, n: usize) -> Result<Vec<String>, SyncError> {
    let mut entries = read_entries_at(root)?;
    let skip = entries.len().saturating_sub(n);
    Ok(entries.split_off(skip))
}
