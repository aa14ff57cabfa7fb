//! Driver layer for browser automation.
//!
//! This crate wraps a WebDriver session (Chromedriver by default) with the
//! handful of page and element helpers the chart extractor needs.
//!
//! - [`browser::driver::BrowserDriver`]: session lifecycle (launch/close)
//! - [`browser::page::BrowserPage`]: navigation, bounded waits, scripts
//! - [`browser::options`]: Chrome arguments for an isolated headless session
pub mod browser;
