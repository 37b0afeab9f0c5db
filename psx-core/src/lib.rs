//! PSX core library: ticker domain types, data-root layout, configuration,
//! snapshot persistence and the investing.com slug cache.
//!
//! - [`types`]: `Symbol`, `Ticker`, `Snapshot`
//! - [`error`]: [`StoreError`]
//! - [`paths`]: on-disk layout under the data root
//! - [`config`]: `config.yaml` load / save / defaults
//! - [`store`]: ticker snapshot load / save / archive
//! - [`slug_cache`]: symbol → investing.com slug mapping
//! - [`history`]: per-symbol daily price files

pub mod config;
pub mod error;
pub mod history;
pub mod paths;
pub mod slug_cache;
pub mod store;
pub mod types;

pub use config::Config;
pub use error::StoreError;
pub use history::PriceBar;
pub use slug_cache::SlugCache;
pub use types::{Snapshot, Symbol, Ticker, NO_RECORD_NAME, UNKNOWN_SECTOR};
