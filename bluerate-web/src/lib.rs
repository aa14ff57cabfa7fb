//! Acquisition of the blue-dollar rate and its one-year history.
//!
//! - Current quote over plain HTTP plus DOM extraction (`rates`)
//! - Chart history through a headless browser session (`chart`)
//! - Normalisation of the chart's raw data provider records (`series`)
//!
//! Both acquisition paths sit behind traits ([`rates::RateSource`] and
//! [`chart::ChartExtractor`]) so the presentation layer can be driven by
//! fakes in tests.

pub mod chart;
pub mod rates;
pub mod series;

pub use chart::{BrowserChartExtractor, ChartExtractor, ChartSettings, FantocciniLauncher};
pub use rates::{RateFetcher, RateSelectors, RateSource, extract_quote};
pub use series::normalize_records;
