//! Common types and utilities shared across bluerate crates.
//!
//! This crate defines the exchange-rate domain model, the error taxonomy and
//! the observability helpers used throughout the workspace. It stays
//! dependency‑light so that every crate can depend on it.
//!
//! # Overview
//!
//! - [`ExchangeQuote`] and [`ConversionResult`]: the current informal rate
//! - [`HistoricalSeries`], [`ChartSnapshot`] and [`ChartHistory`]: one year of
//!   chart history, either as data points or as a rendered image
//! - [`ChartMode`]: which of the two history representations to extract
//! - [`observability`]: centralised tracing/logging initialisation
//! - [`BlueRateError`] and [`Result`]: shared error handling
//!
//! # Examples
//!
//! Converting dollars at the buy rate:
//!
//! ```rust
//! use bluerate_common::{ConversionResult, ExchangeQuote};
//!
//! let quote = ExchangeQuote::new(350.5, 370.0);
//! let conversion = ConversionResult::compute(100.0, &quote);
//! assert_eq!(conversion.pesos_display(), "35050.00");
//! ```
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub mod observability;

/// Buy and sell prices quoted by the informal market, in pesos per dollar.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ExchangeQuote {
    /// Price at which the market buys dollars from you.
    pub buy_rate: f64,
    /// Price at which the market sells dollars to you.
    pub sell_rate: f64,
}

impl ExchangeQuote {
    pub fn new(buy_rate: f64, sell_rate: f64) -> Self {
        Self {
            buy_rate,
            sell_rate,
        }
    }
}

/// Pesos obtained by selling `dollar_amount` at the quote's buy rate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ConversionResult {
    pub dollar_amount: f64,
    pub pesos_received: f64,
}

impl ConversionResult {
    pub fn compute(dollar_amount: f64, quote: &ExchangeQuote) -> Self {
        Self {
            dollar_amount,
            pesos_received: dollar_amount * quote.buy_rate,
        }
    }

    /// Pesos formatted with two decimals, as shown to the user.
    pub fn pesos_display(&self) -> String {
        format!("{:.2}", self.pesos_received)
    }
}

/// One sample of the historical chart.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HistoryPoint {
    pub date: NaiveDate,
    pub value: f64,
}

/// Chart samples in the order the remote widget emitted them.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HistoricalSeries {
    pub points: Vec<HistoryPoint>,
}

impl HistoricalSeries {
    pub fn new(points: Vec<HistoryPoint>) -> Self {
        Self { points }
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Earliest and latest date in the series, regardless of emission order.
    pub fn date_span(&self) -> Option<(NaiveDate, NaiveDate)> {
        let first = self.points.iter().map(|p| p.date).min()?;
        let last = self.points.iter().map(|p| p.date).max()?;
        Some((first, last))
    }

    /// Smallest and largest value in the series.
    pub fn value_span(&self) -> Option<(f64, f64)> {
        self.points.iter().map(|p| p.value).fold(None, |acc, v| match acc {
            None => Some((v, v)),
            Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
        })
    }
}

/// Rendered chart region, decoded in memory.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartSnapshot {
    pub image: image::RgbaImage,
}

impl ChartSnapshot {
    /// Decode PNG (or any format enabled on the `image` crate) bytes.
    pub fn from_encoded(bytes: &[u8]) -> Result<Self> {
        let decoded = image::load_from_memory(bytes)
            .map_err(|e| BlueRateError::Driver(format!("screenshot decode failed: {e}")))?;
        Ok(Self {
            image: decoded.to_rgba8(),
        })
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// Either representation of one year of chart history.
#[derive(Debug, Clone, PartialEq)]
pub enum ChartHistory {
    Series(HistoricalSeries),
    Snapshot(ChartSnapshot),
}

/// How the chart extractor returns history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChartMode {
    /// Pull the chart library's data provider out of the page.
    #[default]
    #[serde(alias = "data")]
    Structured,
    /// Capture a picture of the rendered chart.
    #[serde(alias = "image")]
    Screenshot,
}

impl fmt::Display for ChartMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ChartMode::Structured => f.write_str("structured"),
            ChartMode::Screenshot => f.write_str("screenshot"),
        }
    }
}

impl FromStr for ChartMode {
    type Err = BlueRateError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "structured" | "data" => Ok(ChartMode::Structured),
            "screenshot" | "image" => Ok(ChartMode::Screenshot),
            other => Err(BlueRateError::Config(format!(
                "unknown chart mode '{other}' (expected structured or screenshot)"
            ))),
        }
    }
}

/// Error types used across the bluerate system.
#[derive(thiserror::Error, Debug, Clone, PartialEq)]
pub enum BlueRateError {
    /// The request could not be sent or the server answered with a failure status.
    #[error("Network error: {0}")]
    Network(String),

    /// An expected DOM node was missing from the page.
    #[error("Failed to find the {0} rate element")]
    Extraction(String),

    /// Text where a number was expected.
    #[error("Could not parse {field} rate from '{text}'")]
    Parse { field: String, text: String },

    /// The chart never rendered within the bound.
    #[error("Timed out after {:.1}s waiting for {}", .after.as_secs_f32(), .what)]
    Timeout { what: String, after: Duration },

    /// The chart data provider was empty.
    #[error("No chart data found")]
    NoData,

    /// Chart records lack the expected fields or hold unusable values.
    #[error("Data format incorrect: {detail}. Available columns: {}", .available.join(", "))]
    Format {
        detail: String,
        available: Vec<String>,
    },

    /// A browser session or command failed.
    #[error("Browser error: {0}")]
    Driver(String),

    /// Configuration was incomplete or invalid.
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Convenient alias for results that use [`BlueRateError`].
pub type Result<T> = std::result::Result<T, BlueRateError>;
