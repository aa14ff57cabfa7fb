pub mod driver;
pub mod options;
pub mod page;

use std::time::Duration;

/// Failures reported by the WebDriver layer.
#[derive(Debug, thiserror::Error)]
pub enum DriverError {
    /// No session could be created (endpoint down, bad capabilities).
    #[error("could not start a WebDriver session at {endpoint}: {message}")]
    Session { endpoint: String, message: String },

    /// A bounded wait elapsed without the condition holding.
    #[error("timed out after {after:?} waiting for {what}")]
    Timeout { what: String, after: Duration },

    /// A locator matched nothing.
    #[error("element not found: {0}")]
    NotFound(String),

    /// Page script threw or returned something unserialisable.
    #[error("script failed: {0}")]
    Script(String),

    /// Any other WebDriver command failure.
    #[error("webdriver command failed: {0}")]
    Command(String),
}
