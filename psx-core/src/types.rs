//! Domain types for PSX ticker snapshots.
//!
//! Tickers are fixed-field records validated at the snapshot-load boundary.
//! A [`Snapshot`] never changes after construction; merging or enrichment
//! always produces a new value.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Sector value used when the classification is not known yet.
pub const UNKNOWN_SECTOR: &str = "Unknown";

/// Name value the PSX company page returns for unknown symbols.
pub const NO_RECORD_NAME: &str = "No record found";

// ---------------------------------------------------------------------------
// Symbol
// ---------------------------------------------------------------------------

/// A PSX ticker symbol: short, uppercase, alphanumeric.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Symbol(pub String);

impl Symbol {
    /// Normalise raw scraped text into PSX form.
    ///
    /// Trims whitespace, uppercases, and drops any `.XX` exchange suffix.
    /// Returns `None` when nothing alphanumeric remains.
    pub fn normalize(raw: &str) -> Option<Self> {
        let upper = raw.trim().to_ascii_uppercase();
        let base = upper.split('.').next().unwrap_or_default().trim();
        if base.is_empty() || !Self::is_valid(base) {
            return None;
        }
        Some(Self(base.to_owned()))
    }

    /// `true` when `s` is non-empty and made of uppercase ASCII letters and digits.
    pub fn is_valid(s: &str) -> bool {
        !s.is_empty()
            && s
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.0.fmt(f)
    }
}

impl From<String> for Symbol {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl From<&str> for Symbol {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ---------------------------------------------------------------------------
// Ticker
// ---------------------------------------------------------------------------

/// One listed security. Field order is the on-disk column order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ticker {
    pub symbol: Symbol,
    pub name: String,
    pub sector: String,
    #[serde(default)]
    pub url: String,
}

impl Ticker {
    /// A bare ticker as produced by symbol-only listings.
    pub fn unresolved(symbol: Symbol, url: impl Into<String>) -> Self {
        Self {
            name: symbol.0.clone(),
            symbol,
            sector: UNKNOWN_SECTOR.to_owned(),
            url: url.into(),
        }
    }

    pub fn new(
        symbol: impl Into<Symbol>,
        name: impl Into<String>,
        sector: impl Into<String>,
        url: impl Into<String>,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            sector: sector.into(),
            url: url.into(),
        }
    }

    /// `false` when the name is empty, equals the symbol, or is the
    /// "No record found" placeholder.
    pub fn has_resolved_name(&self) -> bool {
        is_resolved_name(&self.symbol, &self.name)
    }

    pub fn has_resolved_sector(&self) -> bool {
        is_resolved_sector(&self.sector)
    }

    pub fn is_complete(&self) -> bool {
        self.has_resolved_name() && self.has_resolved_sector()
    }
}

pub fn is_resolved_name(symbol: &Symbol, name: &str) -> bool {
    let name = name.trim();
    !name.is_empty() && name != symbol.0 && name != NO_RECORD_NAME
}

pub fn is_resolved_sector(sector: &str) -> bool {
    let sector = sector.trim();
    !sector.is_empty() && sector != UNKNOWN_SECTOR
}

/// Drop later duplicates of a symbol, keeping the first occurrence.
///
/// Returns the surviving tickers in their original order and the number dropped.
pub fn dedup_by_symbol(tickers: Vec<Ticker>) -> (Vec<Ticker>, usize) {
    let mut seen = BTreeSet::new();
    let before = tickers.len();
    let kept: Vec<Ticker> = tickers
        .into_iter()
        .filter(|t| seen.insert(t.symbol.clone()))
        .collect();
    let dropped = before - kept.len();
    (kept, dropped)
}

// ---------------------------------------------------------------------------
// Snapshot
// ---------------------------------------------------------------------------

/// An ordered ticker list captured at one point in time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    captured_at: DateTime<Utc>,
    tickers: Vec<Ticker>,
}

impl Snapshot {
    /// Build a snapshot, rejecting duplicate symbols.
    ///
    /// On failure the first duplicated symbol is returned.
    pub fn try_new(captured_at: DateTime<Utc>, tickers: Vec<Ticker>) -> Result<Self, Symbol> {
        let mut seen = BTreeSet::new();
        for t in &tickers {
            if !seen.insert(&t.symbol) {
                return Err(t.symbol.clone());
            }
        }
        Ok(Self {
            captured_at,
            tickers,
        })
    }

    /// Build a snapshot from an untrusted list, keeping the first of any duplicates.
    pub fn from_listing(captured_at: DateTime<Utc>, tickers: Vec<Ticker>) -> Self {
        let (tickers, _) = dedup_by_symbol(tickers);
        Self {
            captured_at,
            tickers,
        }
    }

    /// The "no prior snapshot" state.
    pub fn empty() -> Self {
        Self {
            captured_at: DateTime::<Utc>::UNIX_EPOCH,
            tickers: Vec::new(),
        }
    }

    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    pub fn tickers(&self) -> &[Ticker] {
        &self.tickers
    }

    pub fn into_tickers(self) -> Vec<Ticker> {
        self.tickers
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }

    pub fn symbols(&self) -> BTreeSet<&Symbol> {
        self.tickers.iter().map(|t| &t.symbol).collect()
    }

    pub fn get(&self, symbol: &Symbol) -> Option<&Ticker> {
        self.tickers.iter().find(|t| &t.symbol == symbol)
    }

    /// Number of tickers whose name or sector is still unresolved.
    pub fn incomplete_count(&self) -> usize {
        self.tickers.iter().filter(|t| !t.is_complete()).count()
    }

    /// Ticker count per sector, sorted by sector name.
    pub fn sector_counts(&self) -> BTreeMap<&str, usize> {
        let mut counts = BTreeMap::new();
        for t in &self.tickers {
            *counts.entry(t.sector.as_str()).or_insert(0) += 1;
        }
        counts
    }

    /// Return a new snapshot where unresolved names, sectors and empty urls
    /// inherit the resolved values `previous` holds for the same symbol.
    pub fn with_details_from(self, previous: &Snapshot) -> Snapshot {
        let known: HashMap<&Symbol, &Ticker> =
            previous.tickers.iter().map(|t| (&t.symbol, t)).collect();

        let tickers = self
            .tickers
            .into_iter()
            .map(|mut t| {
                if let Some(old) = known.get(&t.symbol) {
                    if !t.has_resolved_name() && old.has_resolved_name() {
                        t.name = old.name.clone();
                    }
                    if !t.has_resolved_sector() && old.has_resolved_sector() {
                        t.sector = old.sector.clone();
                    }
                    if t.url.trim().is_empty() && !old.url.trim().is_empty() {
                        t.url = old.url.clone();
                    }
                }
                t
            })
            .collect();

        Snapshot {
            captured_at: self.captured_at,
            tickers,
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
