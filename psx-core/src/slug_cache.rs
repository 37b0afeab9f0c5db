//! PSX symbol → investing.com slug mapping.
//!
//! An explicit cache object with its own load/persist lifecycle. Callers get
//! a `SlugCache` from [`SlugCache::load_at`], resolve through it, and decide
//! when to [`SlugCache::save_at`]. Persisted at
//! `<root>/cache/investing_slugs.json` with the atomic `.tmp` + rename write.

use std::collections::BTreeMap;
use std::path::Path;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::store::write_atomic;
use crate::types::Ticker;

/// On-disk payload.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
struct SlugCacheFile {
    updated_at: DateTime<Utc>,
    slugs: BTreeMap<String, String>,
}

/// Where a resolved slug came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SlugOrigin {
    Cached,
    Derived,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlugCache {
    slugs: BTreeMap<String, String>,
    dirty: bool,
}

impl SlugCache {
    /// An in-memory cache holding only `seed`.
    pub fn with_seed(seed: &BTreeMap<String, String>) -> Self {
        Self {
            slugs: seed.clone(),
            dirty: false,
        }
    }

    /// Load the persisted cache layered over `seed`; persisted entries win.
    pub fn load_at(root: &Path, seed: &BTreeMap<String, String>) -> Result<Self, StoreError> {
        let mut cache = Self::with_seed(seed);
        let path = paths::slug_cache_path(root);
        if !path.exists() {
            return Ok(cache);
        }
        let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
        let file: SlugCacheFile = serde_json::from_str(&contents)?;
        cache.slugs.extend(file.slugs);
        Ok(cache)
    }

    /// Persist the cache if anything changed since load. Returns whether a write happened.
    pub fn save_at(&mut self, root: &Path) -> Result<bool, StoreError> {
        if !self.dirty {
            return Ok(false);
        }
        let payload = SlugCacheFile {
            updated_at: Utc::now(),
            slugs: self.slugs.clone(),
        };
        let json = serde_json::to_string_pretty(&payload)?;
        write_atomic(&paths::slug_cache_path(root), json.as_bytes(), false)?;
        self.dirty = false;
        Ok(true)
    }

    pub fn get(&self, symbol: &str) -> Option<&str> {
        self.slugs.get(symbol).map(String::as_str)
    }

    pub fn insert(&mut self, symbol: impl Into<String>, slug: impl Into<String>) {
        let symbol = symbol.into();
        let slug = slug.into();
        if self.slugs.get(&symbol) != Some(&slug) {
            self.slugs.insert(symbol, slug);
            self.dirty = true;
        }
    }

    /// Cached slug for the ticker, or one derived from its company name
    /// (recorded for next time). Unresolved names derive from the symbol.
    pub fn resolve(&mut self, ticker: &Ticker) -> (String, SlugOrigin) {
        if let Some(slug) = self.get(ticker.symbol.as_str()) {
            return (slug.to_owned(), SlugOrigin::Cached);
        }
        let source = if ticker.has_resolved_name() {
            ticker.name.as_str()
        } else {
            ticker.symbol.as_str()
        };
        let slug = slugify(source);
        self.insert(ticker.symbol.0.clone(), slug.clone());
        (slug, SlugOrigin::Derived)
    }

    pub fn len(&self) -> usize {
        self.slugs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.slugs.is_empty()
    }
}

/// Lowercase, with each run of non-alphanumerics collapsed to a single `-`.
pub fn slugify(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.chars() {
        if c.is_ascii_alphanumeric() {
            slug.push(c.to_ascii_lowercase());
        } else if !slug.is_empty() && !slug.ends_with('-') {
            slug.push('-');
        }
    }
    while slug.ends_with('-') {
        slug.pop();
    }
    slug
}
