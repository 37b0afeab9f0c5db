//! `config.yaml`: tunables for retries, HTTP, sources and enrichment.
//!
//! The file is optional. A missing file yields [`Config::default`]; a present
//! file only needs the keys it wants to override.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{io_err, StoreError};
use crate::paths;
use crate::store::write_atomic;

pub const MARKET_WATCH_URL: &str = "https://dps.psx.com.pk/market-watch";
pub const LISTED_COMPANIES_URL: &str = "https://dps.psx.com.pk/listing/listed-companies";
pub const COMPANY_URL_TEMPLATE: &str = "https://dps.psx.com.pk/company/{symbol}";
pub const INVESTING_HISTORY_URL_TEMPLATE: &str =
    "https://www.investing.com/equities/{slug}-historical-data";

const DEFAULT_USER_AGENT: &str =
    "Mozilla/5.0 (X11; Linux x86_64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/124.0 Safari/537.36";

// ---------------------------------------------------------------------------
// Sections
// ---------------------------------------------------------------------------

/// Retry/backoff settings for every network call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub initial_delay_ms: u64,
    pub backoff_multiplier: f64,
    pub max_delay_ms: u64,
    pub jitter: bool,
    /// Treat HTTP 429 as transient.
    pub retry_rate_limited: bool,
}

impl RetrySettings {
    /// Upper bound on any single wait between attempts: one hour.
    pub const MAX_DELAY_CEILING_MS: u64 = 3_600_000;
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 2_000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
            jitter: true,
            retry_rate_limited: true,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct HttpSettings {
    pub timeout_secs: u64,
    pub user_agent: String,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            timeout_secs: 30,
            user_agent: DEFAULT_USER_AGENT.to_owned(),
        }
    }
}

/// One entry of the ordered ticker-list source chain.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SourceSpec {
    /// PSX data portal market-watch table (symbols only).
    MarketWatch { url: String },
    /// PSX listed-companies table (symbol, name, sector).
    ListedCompanies { url: String },
    /// A local CSV with at least a `symbol` column.
    File { path: PathBuf },
    /// Built-in reference list of well-known PSX tickers.
    Bundled,
}

impl SourceSpec {
    pub fn label(&self) -> &'static str {
        match self {
            SourceSpec::MarketWatch { .. } => "market_watch",
            SourceSpec::ListedCompanies { .. } => "listed_companies",
            SourceSpec::File { .. } => "file",
            SourceSpec::Bundled => "bundled",
        }
    }
}

/// Where per-ticker name/sector details come from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DetailSpec {
    /// Company page, `{symbol}` substituted into the template.
    CompanyPage { url_template: String },
    Bundled,
}

impl Default for DetailSpec {
    fn default() -> Self {
        DetailSpec::CompanyPage {
            url_template: COMPANY_URL_TEMPLATE.to_owned(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnrichSettings {
    pub workers: usize,
    /// Enrich the fetched listing during every sync.
    pub on_sync: bool,
}

impl Default for EnrichSettings {
    fn default() -> Self {
        Self {
            workers: 8,
            on_sync: false,
        }
    }
}

impl EnrichSettings {
    pub const MAX_WORKERS: usize = 32;

    /// Worker count clamped to `1..=MAX_WORKERS`.
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, Self::MAX_WORKERS)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SnapshotSettings {
    /// Archived snapshots retained under `snapshots/`.
    pub keep: usize,
}

impl Default for SnapshotSettings {
    fn default() -> Self {
        Self { keep: 30 }
    }
}

/// Daily price-history downloads.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PriceSettings {
    /// History page, `{slug}` substituted with the investing.com slug.
    pub url_template: String,
    /// Default window when no start date is given.
    pub lookback_days: u32,
    pub workers: usize,
}

impl Default for PriceSettings {
    fn default() -> Self {
        Self {
            url_template: INVESTING_HISTORY_URL_TEMPLATE.to_owned(),
            lookback_days: 3650,
            workers: 4,
        }
    }
}

impl PriceSettings {
    pub fn effective_workers(&self) -> usize {
        self.workers.clamp(1, EnrichSettings::MAX_WORKERS)
    }
}

// ---------------------------------------------------------------------------
// Root
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub retry: RetrySettings,
    pub http: HttpSettings,
    pub sources: Vec<SourceSpec>,
    pub details: DetailSpec,
    pub enrich: EnrichSettings,
    pub snapshots: SnapshotSettings,
    pub prices: PriceSettings,
    /// Seed for the investing.com slug cache: PSX symbol → slug.
    pub investing_slugs: BTreeMap<String, String>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            retry: RetrySettings::default(),
            http: HttpSettings::default(),
            sources: vec![
                SourceSpec::MarketWatch {
                    url: MARKET_WATCH_URL.to_owned(),
                },
                SourceSpec::ListedCompanies {
                    url: LISTED_COMPANIES_URL.to_owned(),
                },
            ],
            details: DetailSpec::default(),
            enrich: EnrichSettings::default(),
            snapshots: SnapshotSettings::default(),
            prices: PriceSettings::default(),
            investing_slugs: default_investing_slugs(),
        }
    }
}

impl Config {
    /// Reject values the fetcher cannot honour.
    pub fn validate(&self) -> Result<(), StoreError> {
        let r = &self.retry;
        if r.max_attempts < 1 {
            return Err(StoreError::InvalidConfig(
                "retry.max_attempts must be at least 1".into(),
            ));
        }
        if !r.backoff_multiplier.is_finite() || r.backoff_multiplier <= 1.0 {
            return Err(StoreError::InvalidConfig(format!(
                "retry.backoff_multiplier must be a finite number > 1 (got {})",
                r.backoff_multiplier
            )));
        }
        if r.max_delay_ms > RetrySettings::MAX_DELAY_CEILING_MS {
            return Err(StoreError::InvalidConfig(format!(
                "retry.max_delay_ms ({}) exceeds {} ms",
                r.max_delay_ms,
                RetrySettings::MAX_DELAY_CEILING_MS
            )));
        }
        if r.max_delay_ms < r.initial_delay_ms {
            return Err(StoreError::InvalidConfig(format!(
                "retry.max_delay_ms ({}) is below retry.initial_delay_ms ({})",
                r.max_delay_ms, r.initial_delay_ms
            )));
        }
        if self.http.timeout_secs == 0 {
            return Err(StoreError::InvalidConfig(
                "http.timeout_secs must be positive".into(),
            ));
        }
        if self.sources.is_empty() {
            return Err(StoreError::InvalidConfig(
                "sources must list at least one ticker source".into(),
            ));
        }
        if let DetailSpec::CompanyPage { url_template } = &self.details {
            if !url_template.contains("{symbol}") {
                return Err(StoreError::InvalidConfig(
                    "details.url_template must contain `{symbol}`".into(),
                ));
            }
        }
        if !self.prices.url_template.contains("{slug}") {
            return Err(StoreError::InvalidConfig(
                "prices.url_template must contain `{slug}`".into(),
            ));
        }
        if self.prices.lookback_days == 0 {
            return Err(StoreError::InvalidConfig(
                "prices.lookback_days must be positive".into(),
            ));
        }
        Ok(())
    }
}

fn default_investing_slugs() -> BTreeMap<String, String> {
    [
        ("LUCK", "lucky-cement"),
        ("ENGRO", "engro-corporation-limited"),
        ("HBL", "habib-bank-limited"),
        ("PSO", "pakistan-state-oil-co"),
        ("OGDC", "oil-and-gas-development-company-limited"),
        ("UBL", "united-bank-limited"),
        ("EFERT", "engro-fertilizer-ltd"),
        ("MARI", "mari-petroleum-co-limited"),
        ("MCB", "mcb-bank-limited"),
        ("PPL", "pakistan-petroleum-limited"),
        ("FFC", "fauji-fertilizer-company-limited"),
        ("HUBC", "hub-power-company-limited"),
        ("BAFL", "bank-alfalah-limited"),
        ("MEBL", "meezan-bank-limited"),
        ("POL", "pakistan-oilfields-limited"),
    ]
    .into_iter()
    .map(|(k, v)| (k.to_owned(), v.to_owned()))
    .collect()
}

// ---------------------------------------------------------------------------
// Load / save
// ---------------------------------------------------------------------------

/// Load `<root>/config.yaml`, falling back to defaults when absent.
pub fn load_at(root: &Path) -> Result<Config, StoreError> {
    let path = paths::config_path(root);
    if !path.exists() {
        tracing::debug!("no config at {}, using defaults", path.display());
        return Ok(Config::default());
    }
    let contents = std::fs::read_to_string(&path).map_err(|e| io_err(&path, e))?;
    let config: Config =
        serde_yaml::from_str(&contents).map_err(|e| StoreError::Parse { path, source: e })?;
    config.validate()?;
    Ok(config)
}

/// `load_at` convenience wrapper.
pub fn load() -> Result<Config, StoreError> {
    load_at(&paths::default_root()?)
}

/// Atomically write `config` to `<root>/config.yaml`.
pub fn save_at(root: &Path, config: &Config) -> Result<PathBuf, StoreError> {
    config.validate()?;
    let path = paths::config_path(root);
    let yaml = serde_yaml::to_string(config)?;
    write_atomic(&path, yaml.as_bytes(), true)?;
    Ok(path)
}

/// Write the default config if none exists.
///
/// Idempotent: an existing file is loaded and returned unchanged. The flag
/// reports whether a new file was created.
pub fn init_at(root: &Path) -> Result<(Config, bool), StoreError> {
    if paths::config_path(root).exists() {
        return Ok((load_at(root)?, false));
    }
    let config = Config::default();
    save_at(root, &config)?;
    Ok((config, true))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
