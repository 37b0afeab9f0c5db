//! Ticker-list sources.
//!
//! Each [`TickerSource`] returns the current listing as normalised,
//! de-duplicated [`Ticker`]s. [`SourceChain`] tries the configured sources
//! in order and keeps the first non-empty listing.

use std::path::PathBuf;
use std::sync::Arc;

use psx_core::config::{Config, DetailSpec, SourceSpec, COMPANY_URL_TEMPLATE};
use psx_core::types::dedup_by_symbol;
use psx_core::{store, Symbol, Ticker};

use crate::bundled::{BundledDetails, BundledSource};
use crate::details::{company_url, CompanyPageSource, DetailSource};
use crate::error::{FetchError, RequestError};
use crate::html;
use crate::http::Fetcher;

pub trait TickerSource: Send + Sync {
    fn name(&self) -> &str;
    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError>;
}

/// Normalise a scraped symbol; `None` for placeholders and one-letter noise.
pub fn listing_symbol(raw: &str) -> Option<Symbol> {
    Symbol::normalize(raw).filter(|s| s.as_str().len() > 1 && !s.as_str().contains("SELECT"))
}

fn finish_listing(source: &str, tickers: Vec<Ticker>) -> Vec<Ticker> {
    let (tickers, dropped) = dedup_by_symbol(tickers);
    if dropped > 0 {
        tracing::debug!("{source}: dropped {dropped} duplicate symbols");
    }
    tickers
}

// ---------------------------------------------------------------------------
// PSX market watch
// ---------------------------------------------------------------------------

/// Symbols from the PSX market-watch table. Names and sectors are left
/// unresolved; urls point at the company page.
#[derive(Debug, Clone)]
pub struct MarketWatchSource {
    fetcher: Fetcher,
    url: String,
    url_template: String,
}

impl MarketWatchSource {
    pub fn new(fetcher: Fetcher, url: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            url_template: url_template.into(),
        }
    }
}

impl TickerSource for MarketWatchSource {
    fn name(&self) -> &str {
        "market_watch"
    }

    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
        let tickers = self
            .fetcher
            .get_parsed(&self.url, |page| parse_market_watch(page, &self.url_template))?;
        Ok(finish_listing(self.name(), tickers))
    }
}

pub fn parse_market_watch(page: &str, url_template: &str) -> Result<Vec<Ticker>, RequestError> {
    let table = html::find_table(page, "SYMBOL")
        .ok_or_else(|| RequestError::malformed("market watch: no table with a SYMBOL column"))?;
    let symbol_col = table.column("SYMBOL").unwrap_or(0);
    let sector_col = table.column("SECTOR");

    Ok(table
        .rows
        .iter()
        .filter(|row| row.len() >= 2)
        .filter_map(|row| {
            let symbol = listing_symbol(row.get(symbol_col)?)?;
            let url = company_url(url_template, symbol.as_str());
            let mut ticker = Ticker::unresolved(symbol, url);
            if let Some(sector) = sector_col.and_then(|c| row.get(c)).filter(|s| !s.is_empty()) {
                ticker.sector = sector.clone();
            }
            Some(ticker)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// PSX listed companies
// ---------------------------------------------------------------------------

/// Symbol, name and sector from the listed-companies table.
#[derive(Debug, Clone)]
pub struct ListedCompaniesSource {
    fetcher: Fetcher,
    url: String,
    url_template: String,
}

impl ListedCompaniesSource {
    pub fn new(fetcher: Fetcher, url: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            fetcher,
            url: url.into(),
            url_template: url_template.into(),
        }
    }
}

impl TickerSource for ListedCompaniesSource {
    fn name(&self) -> &str {
        "listed_companies"
    }

    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
        let tickers = self
            .fetcher
            .get_parsed(&self.url, |page| parse_listed_companies(page, &self.url_template))?;
        Ok(finish_listing(self.name(), tickers))
    }
}

pub fn parse_listed_companies(page: &str, url_template: &str) -> Result<Vec<Ticker>, RequestError> {
    let table = html::find_table(page, "SYMBOL")
        .ok_or_else(|| RequestError::malformed("listed companies: no table with a SYMBOL column"))?;
    let symbol_col = table.column("SYMBOL").unwrap_or(0);
    let name_col = table.column("NAME").or_else(|| table.column("COMPANY"));
    let sector_col = table.column("SECTOR");

    let cell = |row: &[String], col: Option<usize>| -> Option<String> {
        col.and_then(|c| row.get(c))
            .filter(|s| !s.is_empty())
            .cloned()
    };

    Ok(table
        .rows
        .iter()
        .filter_map(|row| {
            let symbol = listing_symbol(row.get(symbol_col)?)?;
            let url = company_url(url_template, symbol.as_str());
            let mut ticker = Ticker::unresolved(symbol, url);
            if let Some(name) = cell(row.as_slice(), name_col) {
                ticker.name = name;
            }
            if let Some(sector) = cell(row.as_slice(), sector_col) {
                ticker.sector = sector;
            }
            Some(ticker)
        })
        .collect())
}

// ---------------------------------------------------------------------------
// Local file
// ---------------------------------------------------------------------------

/// A user-supplied CSV with at least a `symbol` column.
#[derive(Debug, Clone)]
pub struct FileSource {
    path: PathBuf,
}

impl FileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl TickerSource for FileSource {
    fn name(&self) -> &str {
        "file"
    }

    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
        let tickers = store::read_listing_csv(&self.path)?
            .into_iter()
            .filter(|t| listing_symbol(t.symbol.as_str()).is_some())
            .collect();
        Ok(finish_listing(self.name(), tickers))
    }
}

// ---------------------------------------------------------------------------
// Chain
// ---------------------------------------------------------------------------

pub struct SourceChain {
    sources: Vec<Box<dyn TickerSource>>,
}

impl SourceChain {
    pub fn new(sources: Vec<Box<dyn TickerSource>>) -> Self {
        Self { sources }
    }

    pub fn len(&self) -> usize {
        self.sources.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sources.is_empty()
    }

    pub fn names(&self) -> Vec<&str> {
        self.sources.iter().map(|s| s.name()).collect()
    }
}

impl TickerSource for SourceChain {
    fn name(&self) -> &str {
        "chain"
    }

    /// First non-empty listing wins. When nothing succeeds with data: an
    /// empty list if any source answered empty, otherwise the last error.
    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
        let mut last_err = None;
        let mut answered_empty = false;
        for source in &self.sources {
            tracing::info!("fetching ticker list from {}", source.name());
            match source.fetch_listing() {
                Ok(tickers) if !tickers.is_empty() => {
                    tracing::info!("{} returned {} tickers", source.name(), tickers.len());
                    return Ok(tickers);
                }
                Ok(_) => {
                    tracing::warn!("{} returned no tickers", source.name());
                    answered_empty = true;
                }
                Err(err) => {
                    tracing::warn!("{} failed: {err}", source.name());
                    last_err = Some(err);
                }
            }
        }
        match last_err {
            Some(err) if !answered_empty => Err(err),
            _ => Ok(Vec::new()),
        }
    }
}

// ---------------------------------------------------------------------------
// Construction from config
// ---------------------------------------------------------------------------

fn url_template(config: &Config) -> &str {
    match &config.details {
        DetailSpec::CompanyPage { url_template } => url_template.as_str(),
        DetailSpec::Bundled => COMPANY_URL_TEMPLATE,
    }
}

/// The configured ticker sources, in order.
pub fn build_sources(config: &Config, fetcher: &Fetcher) -> SourceChain {
    let template = url_template(config);
    let sources = config
        .sources
        .iter()
        .map(|spec| -> Box<dyn TickerSource> {
            match spec {
                SourceSpec::MarketWatch { url } => {
                    Box::new(MarketWatchSource::new(fetcher.clone(), url, template))
                }
                SourceSpec::ListedCompanies { url } => {
                    Box::new(ListedCompaniesSource::new(fetcher.clone(), url, template))
                }
                SourceSpec::File { path } => Box::new(FileSource::new(path)),
                SourceSpec::Bundled => Box::new(BundledSource::new(template)),
            }
        })
        .collect();
    SourceChain::new(sources)
}

/// The configured detail source.
pub fn build_details(config: &Config, fetcher: &Fetcher) -> Arc<dyn DetailSource> {
    match &config.details {
        DetailSpec::CompanyPage { url_template } => {
            Arc::new(CompanyPageSource::new(fetcher.clone(), url_template))
        }
        DetailSpec::Bundled => Arc::new(BundledDetails::new(COMPANY_URL_TEMPLATE)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;
    use psx_core::UNKNOWN_SECTOR;

    const TEMPLATE: &str = "https://dps.psx.com.pk/company/{symbol}";

    struct Fixed(&'static str, Result<Vec<Ticker>, ErrorKind>);

    impl TickerSource for Fixed {
        fn name(&self) -> &str {
            self.0
        }
        fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
            self.1
                .clone()
                .map_err(|kind| FetchError::rejected(RequestError::new(kind, "boom")))
        }
    }

    fn one() -> Vec<Ticker> {
        vec![Ticker::new("HBL", "Habib Bank Limited", "Commercial Banks", "")]
    }

    #[test]
    fn listing_symbol_filters_noise() {
        assert_eq!(listing_symbol(" hbl "), Some(Symbol::from("HBL")));
        assert_eq!(listing_symbol("X"), None);
        assert_eq!(listing_symbol("Select..."), None);
        assert_eq!(listing_symbol("ENGRO.KA"), Some(Symbol::from("ENGRO")));
    }

    #[test]
    fn market_watch_rows() {
        let page = r#"<table><thead><tr><th>SYMBOL</th><th>SECTOR</th><th>LDCP</th></tr></thead>
            <tbody>
              <tr><td>Select...</td><td></td><td></td></tr>
              <tr><td>hbl</td><td>Commercial Banks</td><td>101</td></tr>
              <tr><td>KEL</td><td></td><td>4</td></tr>
              <tr><td>HBL</td><td>dup</td><td>1</td></tr>
              <tr><td>X</td></tr>
            </tbody></table>"#;
        let tickers = finish_listing("test", parse_market_watch(page, TEMPLATE).unwrap());
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].symbol, Symbol::from("HBL"));
        assert_eq!(tickers[0].sector, "Commercial Banks");
        assert_eq!(tickers[0].url, "https://dps.psx.com.pk/company/HBL");
        assert_eq!(tickers[1].name, "KEL");
        assert_eq!(tickers[1].sector, UNKNOWN_SECTOR);
    }

    #[test]
    fn market_watch_without_table_is_malformed() {
        let err = parse_market_watch("<html>maintenance</html>", TEMPLATE).unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }

    #[test]
    fn listed_companies_rows() {
        let page = r#"<table><tr><th>Symbol</th><th>Company Name</th><th>Sector Name</th></tr>
            <tr><td>LUCK</td><td>Lucky Cement Limited</td><td>Cement</td></tr>
            <tr><td>OGDC</td><td></td><td></td></tr></table>"#;
        let tickers = parse_listed_companies(page, TEMPLATE).unwrap();
        assert_eq!(tickers.len(), 2);
        assert_eq!(tickers[0].name, "Lucky Cement Limited");
        assert_eq!(tickers[0].sector, "Cement");
        assert_eq!(tickers[1].name, "OGDC");
    }

    #[test]
    fn chain_returns_first_non_empty() {
        let chain = SourceChain::new(vec![
            Box::new(Fixed("down", Err(ErrorKind::Server))),
            Box::new(Fixed("empty", Ok(vec![]))),
            Box::new(Fixed("good", Ok(one()))),
            Box::new(Fixed("unused", Err(ErrorKind::Client))),
        ]);
        assert_eq!(chain.fetch_listing().unwrap(), one());
    }

    #[test]
    fn chain_all_failed_returns_last_error() {
        let chain = SourceChain::new(vec![
            Box::new(Fixed("a", Err(ErrorKind::Server))),
            Box::new(Fixed("b", Err(ErrorKind::Client))),
        ]);
        let err = chain.fetch_listing().unwrap_err();
        assert_eq!(err.kind(), Some(ErrorKind::Client));
    }

    #[test]
    fn chain_empty_answer_beats_errors() {
        let chain = SourceChain::new(vec![
            Box::new(Fixed("a", Err(ErrorKind::Server))),
            Box::new(Fixed("b", Ok(vec![]))),
        ]);
        assert!(chain.fetch_listing().unwrap().is_empty());
    }

    #[test]
    fn build_sources_follows_config_order() {
        let config = Config::default();
        let fetcher = Fetcher::new(
            Arc::new(crate::http::UreqClient::new(&config.http)),
            crate::retry::RetryConfig::no_retry(),
        );
        let chain = build_sources(&config, &fetcher);
        assert_eq!(chain.names(), vec!["market_watch", "listed_companies"]);
    }
}
