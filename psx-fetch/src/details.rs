//! Per-ticker detail lookups (company name, sector, page url).

use psx_core::{Ticker, NO_RECORD_NAME, UNKNOWN_SECTOR};

use crate::error::FetchError;
use crate::html;
use crate::http::Fetcher;

/// Details resolved for one ticker. Unresolved fields hold the usual
/// sentinels (symbol as name, `Unknown` sector).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickerDetails {
    pub name: String,
    pub sector: String,
    pub url: String,
}

pub trait DetailSource: Send + Sync {
    fn name(&self) -> &str;
    fn fetch_details(&self, ticker: &Ticker) -> Result<TickerDetails, FetchError>;
}

/// Substitute `{symbol}` into a company-page url template.
pub fn company_url(template: &str, symbol: &str) -> String {
    template.replace("{symbol}", symbol)
}

// ---------------------------------------------------------------------------
// Company page
// ---------------------------------------------------------------------------

const NAME_TAGS: &[&str] = &["h1", "h2", "h3"];
const NAME_CLASSES: &[&str] = &["company-name", "profile-title", "quote__name"];
const SECTOR_CLASSES: &[&str] = &[
    "sector",
    "industry",
    "category",
    "profile-sector",
    "company-sector",
    "quote__sector",
];
const SECTOR_HINT_TAGS: &[&str] = &["strong", "b", "h4", "h5", "p"];
const SECTOR_KEYWORDS: &[&str] = &[
    "REFINERY",
    "CEMENT",
    "COMMERCIAL BANKS",
    "FERTILIZER",
    "OIL & GAS",
    "POWER",
    "TEXTILE",
    "PHARMACEUTICALS",
    "TECHNOLOGY",
];
const DESCRIPTION_CLASSES: &[&str] = &["business-description", "about-company"];
const DESCRIPTION_SECTORS: &[(&str, &str)] = &[
    ("bank", "Commercial Banks"),
    ("cement", "Cement"),
    ("oil", "Oil & Gas"),
    ("gas", "Oil & Gas Marketing Companies"),
    ("pharma", "Pharmaceuticals"),
    ("fertilizer", "Fertilizer"),
    ("textile", "Textile"),
    ("power", "Power Generation & Distribution"),
    ("refinery", "Refinery"),
    ("insurance", "Insurance"),
    ("investment", "Investment"),
    ("automobile", "Automobile"),
    ("chemical", "Chemical"),
    ("technology", "Technology & Communication"),
    ("food", "Food & Personal Care Products"),
];

/// Scrapes the PSX company page.
#[derive(Debug, Clone)]
pub struct CompanyPageSource {
    fetcher: Fetcher,
    url_template: String,
}

impl CompanyPageSource {
    pub fn new(fetcher: Fetcher, url_template: impl Into<String>) -> Self {
        Self {
            fetcher,
            url_template: url_template.into(),
        }
    }
}

impl DetailSource for CompanyPageSource {
    fn name(&self) -> &str {
        "company_page"
    }

    fn fetch_details(&self, ticker: &Ticker) -> Result<TickerDetails, FetchError> {
        let url = if ticker.url.trim().is_empty() {
            company_url(&self.url_template, ticker.symbol.as_str())
        } else {
            ticker.url.clone()
        };
        let page = self.fetcher.get_text(&url)?;
        Ok(parse_company_page(ticker.symbol.as_str(), &url, &page))
    }
}

/// Extract name and sector from a company page.
///
/// Heuristic and page-layout tolerant: headings and known classes first,
/// then sector keywords in short emphasised text, then the `<title>`, then
/// keywords in the business description.
pub fn parse_company_page(symbol: &str, url: &str, page: &str) -> TickerDetails {
    let mut details = TickerDetails {
        name: symbol.to_owned(),
        sector: UNKNOWN_SECTOR.to_owned(),
        url: url.to_owned(),
    };

    if html::page_text(page)
        .to_ascii_lowercase()
        .contains("no record found")
    {
        details.name = NO_RECORD_NAME.to_owned();
        return details;
    }

    let usable_name = |name: &str| !name.is_empty() && name != symbol && name.len() > symbol.len();

    let candidates = NAME_TAGS
        .iter()
        .filter_map(|tag| html::first_text(page, tag))
        .chain(
            NAME_CLASSES
                .iter()
                .filter_map(|class| html::text_by_class(page, class)),
        );
    for name in candidates {
        if usable_name(&name) {
            details.name = name;
            break;
        }
    }

    if let Some(sector) = SECTOR_CLASSES
        .iter()
        .find_map(|class| html::text_by_class(page, class))
    {
        details.sector = sector;
    }

    if details.sector == UNKNOWN_SECTOR {
        let hinted = SECTOR_HINT_TAGS
            .iter()
            .flat_map(|tag| html::element_texts(page, tag))
            .find(|text| {
                let upper = text.to_ascii_uppercase();
                text.len() < 50 && SECTOR_KEYWORDS.iter().any(|k| upper.contains(k))
            });
        if let Some(sector) = hinted {
            details.sector = sector;
        }
    }

    if details.name == symbol {
        let from_title = html::first_text(page, "title")
            .and_then(|title| title.split(" - ").next().map(|s| s.trim().to_owned()))
            .filter(|name| !name.is_empty() && name != symbol);
        if let Some(name) = from_title {
            details.name = name;
        }
    }

    if details.sector == UNKNOWN_SECTOR {
        let description = DESCRIPTION_CLASSES
            .iter()
            .find_map(|class| html::text_by_class(page, class))
            .map(|d| d.to_ascii_lowercase());
        if let Some(text) = description {
            if let Some((_, sector)) = DESCRIPTION_SECTORS.iter().find(|(k, _)| text.contains(k)) {
                details.sector = (*sector).to_owned();
            }
        }
    }

    tracing::debug!("details for {symbol}: {} / {}", details.name, details.sector);
    details
}
