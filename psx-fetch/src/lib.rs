//! Network side of the PSX pipeline.
//!
//! - [`retry`]: `fetch_with_retry`, the retry/backoff wrapper every network call goes through
//! - [`cancel`]: [`CancelToken`] for cancellation and deadlines
//! - [`error`]: [`RequestError`] (one failed call) and [`FetchError`] (what the wrapper surfaces)
//! - [`http`]: the blocking [`HttpClient`] seam and its `ureq` implementation
//! - [`html`]: tolerant table/element scanning
//! - [`source`]: ticker-list sources and the fallback chain
//! - [`details`]: per-ticker name/sector lookups
//! - [`history`]: daily price histories by investing.com slug

pub mod bundled;
pub mod cancel;
pub mod details;
pub mod error;
pub mod history;
pub mod html;
pub mod http;
pub mod retry;
pub mod source;

pub use cancel::CancelToken;
pub use details::{DetailSource, TickerDetails};
pub use error::{ErrorKind, FetchError, RequestError};
pub use history::{DateRange, InvestingHistory, PriceSource};
pub use http::{Fetcher, HttpClient, UreqClient};
pub use retry::{fetch_with_retry, Pause, RetryConfig};
pub use source::{SourceChain, TickerSource};
