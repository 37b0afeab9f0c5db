//! Built-in reference list of well-known PSX tickers.
//!
//! Last-resort ticker source and offline detail source.

use psx_core::Ticker;

use crate::details::{company_url, DetailSource, TickerDetails};
use crate::error::{ErrorKind, FetchError, RequestError};
use crate::source::TickerSource;

/// `(symbol, name, sector)`
const REFERENCE: &[(&str, &str, &str)] = &[
    ("HBL", "Habib Bank Limited", "Commercial Banks"),
    ("ENGRO", "Engro Corporation Limited", "Fertilizer"),
    ("PSO", "Pakistan State Oil Company Limited", "Oil & Gas Marketing Companies"),
    ("LUCK", "Lucky Cement Limited", "Cement"),
    ("OGDC", "Oil & Gas Development Company Limited", "Oil & Gas Exploration Companies"),
    ("PPL", "Pakistan Petroleum Limited", "Oil & Gas Exploration Companies"),
    ("UBL", "United Bank Limited", "Commercial Banks"),
    ("MCB", "MCB Bank Limited", "Commercial Banks"),
    ("FFC", "Fauji Fertilizer Company Limited", "Fertilizer"),
    ("EFERT", "Engro Fertilizers Limited", "Fertilizer"),
    ("BAHL", "Bank Al Habib Limited", "Commercial Banks"),
    ("MEBL", "Meezan Bank Limited", "Commercial Banks"),
    ("CNERGY", "Cnergyico PK Limited", "Refinery"),
    ("KEL", "K-Electric Limited", "Power Generation & Distribution"),
    ("SSGC", "Sui Southern Gas Company Limited", "Oil & Gas Marketing Companies"),
    ("PIBTL", "Pakistan International Bulk Terminal Limited", "Transportation"),
    ("MLCF", "Maple Leaf Cement Factory Limited", "Cement"),
    ("PAEL", "Pak Elektron Limited", "Electrical Goods"),
    ("FCCL", "Fauji Cement Company Limited", "Cement"),
    ("WTL", "WorldCall Telecom Limited", "Technology & Communication"),
    ("CPHL", "CPL Holdings", "Pharmaceuticals"),
    ("SNGP", "Sui Northern Gas Pipelines Limited", "Oil & Gas Marketing Companies"),
];

/// The reference list with company-page urls filled in.
pub fn reference_tickers(url_template: &str) -> Vec<Ticker> {
    REFERENCE
        .iter()
        .map(|&(symbol, name, sector)| {
            Ticker::new(symbol, name, sector, company_url(url_template, symbol))
        })
        .collect()
}

#[derive(Debug, Clone)]
pub struct BundledSource {
    url_template: String,
}

impl BundledSource {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }
}

impl TickerSource for BundledSource {
    fn name(&self) -> &str {
        "bundled"
    }

    fn fetch_listing(&self) -> Result<Vec<Ticker>, FetchError> {
        Ok(reference_tickers(&self.url_template))
    }
}

#[derive(Debug, Clone)]
pub struct BundledDetails {
    url_template: String,
}

impl BundledDetails {
    pub fn new(url_template: impl Into<String>) -> Self {
        Self {
            url_template: url_template.into(),
        }
    }
}

impl DetailSource for BundledDetails {
    fn name(&self) -> &str {
        "bundled"
    }

    fn fetch_details(&self, ticker: &Ticker) -> Result<TickerDetails, FetchError> {
        let symbol = ticker.symbol.as_str();
        REFERENCE
            .iter()
            .find(|(s, _, _)| *s == symbol)
            .map(|&(s, name, sector)| TickerDetails {
                name: name.to_owned(),
                sector: sector.to_owned(),
                url: company_url(&self.url_template, s),
            })
            .ok_or_else(|| {
                FetchError::rejected(RequestError::new(
                    ErrorKind::Client,
                    format!("no bundled details for {symbol}"),
                ))
            })
    }
}
