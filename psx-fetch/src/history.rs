//! Daily price histories.
//!
//! [`InvestingHistory`] reads the investing.com historical-data table for a
//! ticker's slug through [`Fetcher`], so every download goes through the
//! retry wrapper. A page without a recognisable price table is
//! [`ErrorKind::Malformed`](crate::ErrorKind::Malformed) and is not retried.

use chrono::{Duration, NaiveDate};

use psx_core::config::Config;
use psx_core::history::normalize_bars;
use psx_core::{PriceBar, Symbol};

use crate::error::{FetchError, RequestError};
use crate::html;
use crate::http::Fetcher;

/// Inclusive date window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateRange {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

impl DateRange {
    /// `None` when `from` is after `to`.
    pub fn new(from: NaiveDate, to: NaiveDate) -> Option<Self> {
        (from <= to).then_some(Self { from, to })
    }

    /// The `days` days ending at `to`.
    pub fn ending(to: NaiveDate, days: u32) -> Self {
        let from = to
            .checked_sub_signed(Duration::days(i64::from(days)))
            .unwrap_or(NaiveDate::MIN);
        Self { from, to }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        self.from <= date && date <= self.to
    }
}

pub trait PriceSource: Send + Sync {
    fn name(&self) -> &str;

    /// Bars for `symbol` inside `range`, newest first. An empty list means
    /// the source answered but had nothing for the window.
    fn fetch_history(
        &self,
        symbol: &Symbol,
        slug: &str,
        range: &DateRange,
    ) -> Result<Vec<PriceBar>, FetchError>;
}

// ---------------------------------------------------------------------------
// investing.com
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct InvestingHistory {
    fetcher: Fetcher,
    url_template: String,
}

impl InvestingHistory {
    pub fn new(fetcher: Fetcher, url_template: impl Into<String>) -> Self {
        Self {
            fetcher,
            url_template: url_template.into(),
        }
    }

    pub fn from_config(config: &Config, fetcher: &Fetcher) -> Self {
        Self::new(fetcher.clone(), &config.prices.url_template)
    }
}

impl PriceSource for InvestingHistory {
    fn name(&self) -> &str {
        "investing"
    }

    fn fetch_history(
        &self,
        symbol: &Symbol,
        slug: &str,
        range: &DateRange,
    ) -> Result<Vec<PriceBar>, FetchError> {
        let url = history_url(&self.url_template, slug);
        tracing::debug!("price history for {symbol} from {url}");
        let bars = self.fetcher.get_parsed(&url, parse_history_page)?;
        Ok(bars.into_iter().filter(|b| range.contains(b.date)).collect())
    }
}

pub fn history_url(template: &str, slug: &str) -> String {
    template.replace("{slug}", slug)
}

/// Bars from the first table with a date column and a price or close column.
///
/// Rows whose date or close cannot be read are skipped. Missing open, high
/// or low columns fall back to the close.
pub fn parse_history_page(page: &str) -> Result<Vec<PriceBar>, RequestError> {
    let table = html::tables(page)
        .into_iter()
        .find(|t| t.column("DATE").is_some() && close_column(t).is_some())
        .ok_or_else(|| RequestError::malformed("history: no table with DATE and PRICE columns"))?;

    let columns = Columns {
        date: table.column("DATE").unwrap_or(0),
        close: close_column(&table).unwrap_or(1),
        open: table.column("OPEN"),
        high: table.column("HIGH"),
        low: table.column("LOW"),
        volume: table.column("VOL"),
    };

    let bars: Vec<PriceBar> = table
        .rows
        .iter()
        .filter_map(|row| columns.bar(row))
        .collect();
    let skipped = table.rows.len() - bars.len();
    if skipped > 0 {
        tracing::debug!("history: skipped {skipped} unreadable rows");
    }
    Ok(normalize_bars(bars))
}

struct Columns {
    date: usize,
    close: usize,
    open: Option<usize>,
    high: Option<usize>,
    low: Option<usize>,
    volume: Option<usize>,
}

impl Columns {
    fn bar(&self, row: &[String]) -> Option<PriceBar> {
        let date = parse_date(row.get(self.date)?)?;
        let close = parse_price(row.get(self.close)?)?;
        let cell = |col: Option<usize>| col.and_then(|c| row.get(c));
        let or_close = |col: Option<usize>| cell(col).and_then(|s| parse_price(s)).unwrap_or(close);
        Some(PriceBar {
            date,
            open: or_close(self.open),
            high: or_close(self.high),
            low: or_close(self.low),
            close,
            volume: cell(self.volume).map_or(0, |s| parse_volume(s)),
        })
    }
}

fn close_column(table: &html::Table) -> Option<usize> {
    table.column("PRICE").or_else(|| table.column("CLOSE"))
}

const DATE_FORMATS: [&str; 5] = ["%m/%d/%Y", "%b %d, %Y", "%Y-%m-%d", "%d-%b-%Y", "%d %b %Y"];

fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    DATE_FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(raw, fmt).ok())
}

fn parse_price(raw: &str) -> Option<f64> {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// `"1.5M"` → 1 500 000. Unreadable or placeholder (`-`) volumes are 0.
pub fn parse_volume(raw: &str) -> u64 {
    let cleaned: String = raw.trim().chars().filter(|c| *c != ',').collect();
    let (digits, scale) = match cleaned.chars().last() {
        Some('K' | 'k') => (&cleaned[..cleaned.len() - 1], 1e3),
        Some('M' | 'm') => (&cleaned[..cleaned.len() - 1], 1e6),
        Some('B' | 'b') => (&cleaned[..cleaned.len() - 1], 1e9),
        _ => (cleaned.as_str(), 1.0),
    };
    digits
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite() && *v >= 0.0)
        .map(|v| (v * scale).round() as u64)
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ErrorKind;

    const PAGE: &str = r#"<table class="freeze-column-w-1">
<thead><tr><th>Date</th><th>Price</th><th>Open</th><th>High</th><th>Low</th><th>Vol.</th><th>Change %</th></tr></thead>
<tbody>
<tr><td>01/03/2024</td><td>1,205.50</td><td>1,190.00</td><td>1,210.00</td><td>1,185.25</td><td>1.52M</td><td>1.30%</td></tr>
<tr><td>01/04/2024</td><td>1,210.00</td><td>1,205.50</td><td>1,220.00</td><td>1,200.00</td><td>980.10K</td><td>0.37%</td></tr>
<tr><td>Highest: 1,220.00</td><td></td></tr>
</tbody></table>"#;

    fn date(s: &str) -> NaiveDate {
        s.parse().unwrap()
    }

    #[test]
    fn parses_investing_table_newest_first() {
        let bars = parse_history_page(PAGE).unwrap();
        assert_eq!(bars.len(), 2, "summary row is skipped");
        assert_eq!(bars[0].date, date("2024-01-04"));
        assert_eq!(bars[0].close, 1210.0);
        assert_eq!(bars[0].volume, 980_100);
        assert_eq!(bars[1].open, 1190.0);
        assert_eq!(bars[1].low, 1185.25);
        assert_eq!(bars[1].volume, 1_520_000);
    }

    #[test]
    fn close_only_table_fills_ohl_from_close() {
        let page = "<table><tr><th>Date</th><th>Close</th></tr>\
                    <tr><td>2024-02-01</td><td>88.4</td></tr></table>";
        let bars = parse_history_page(page).unwrap();
        assert_eq!(bars[0].open, 88.4);
        assert_eq!(bars[0].high, 88.4);
        assert_eq!(bars[0].volume, 0);
    }

    #[test]
    fn page_without_price_table_is_malformed() {
        let err = parse_history_page("<table><tr><th>Symbol</th></tr></table>").unwrap_err();
        assert_eq!(err.kind, ErrorKind::Malformed);
    }

    #[test]
    fn volume_suffixes() {
        assert_eq!(parse_volume("1.5M"), 1_500_000);
        assert_eq!(parse_volume("250K"), 250_000);
        assert_eq!(parse_volume("2B"), 2_000_000_000);
        assert_eq!(parse_volume("12,345"), 12_345);
        assert_eq!(parse_volume("-"), 0);
    }

    #[test]
    fn date_range_bounds() {
        let range = DateRange::ending(date("2024-01-10"), 7);
        assert_eq!(range.from, date("2024-01-03"));
        assert!(range.contains(date("2024-01-03")));
        assert!(!range.contains(date("2024-01-11")));
        assert!(DateRange::new(date("2024-01-10"), date("2024-01-01")).is_none());
    }
}
