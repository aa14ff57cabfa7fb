use async_trait::async_trait;
use bluerate_common::{BlueRateError, ExchangeQuote, Result};
use bluerate_http::{HttpClient, HttpError, RequestOpts};
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::{debug, info};
use url::Url;

/// Anything that can produce the current informal quote.
#[async_trait]
pub trait RateSource: Send + Sync {
    async fn fetch_rates(&self, source_url: &Url) -> Result<ExchangeQuote>;
}

/// Where the two price nodes live in the page and which label prefixes
/// their text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RateSelectors {
    pub buy_selector: String,
    pub sell_selector: String,
    pub buy_label: String,
    pub sell_label: String,
}

impl Default for RateSelectors {
    fn default() -> Self {
        Self {
            buy_selector: "div.buy.buy-sell-blue".into(),
            sell_selector: "div.sell.buy-sell-blue".into(),
            buy_label: "Buy".into(),
            sell_label: "Sell".into(),
        }
    }
}

/// Scrapes the quote from an HTML page fetched with a single GET.
#[derive(Clone)]
pub struct RateFetcher {
    http: HttpClient,
    selectors: RateSelectors,
}

impl RateFetcher {
    pub fn new(http: HttpClient, selectors: RateSelectors) -> Self {
        Self { http, selectors }
    }

    /// Build with a fresh client whose requests give up after `timeout`.
    pub fn with_timeout(selectors: RateSelectors, timeout: Duration) -> Result<Self> {
        let http = HttpClient::new()
            .map_err(http_error)?
            .with_timeout(timeout);
        Ok(Self::new(http, selectors))
    }
}

#[async_trait]
impl RateSource for RateFetcher {
    async fn fetch_rates(&self, source_url: &Url) -> Result<ExchangeQuote> {
        let html = self
            .http
            .get_text(source_url.as_str(), RequestOpts::default())
            .await
            .map_err(http_error)?;
        debug!(target: "rates", url = %source_url, bytes = html.len(), "page fetched");

        let quote = extract_quote(&html, &self.selectors)?;
        info!(
            target: "rates",
            buy = quote.buy_rate,
            sell = quote.sell_rate,
            "quote extracted"
        );
        Ok(quote)
    }
}

fn http_error(e: HttpError) -> BlueRateError {
    BlueRateError::Network(e.to_string())
}

/// Pull buy and sell prices out of a rate page.
///
/// The first node matching each selector wins. Its stripped text has the
/// label and thousands separators removed before parsing.
///
/// ```
/// use bluerate_web::{RateSelectors, extract_quote};
///
/// let html = r#"<div class="buy buy-sell-blue">Buy 1,180.00</div>
///               <div class="sell buy-sell-blue">Sell 1,200.00</div>"#;
/// let quote = extract_quote(html, &RateSelectors::default()).unwrap();
/// assert_eq!(quote.buy_rate, 1180.0);
/// assert_eq!(quote.sell_rate, 1200.0);
/// ```
pub fn extract_quote(html: &str, selectors: &RateSelectors) -> Result<ExchangeQuote> {
    let doc = Html::parse_document(html);
    let buy = read_rate(&doc, &selectors.buy_selector, &selectors.buy_label, "buy")?;
    let sell = read_rate(&doc, &selectors.sell_selector, &selectors.sell_label, "sell")?;
    Ok(ExchangeQuote::new(buy, sell))
}

fn read_rate(doc: &Html, selector: &str, label: &str, field: &str) -> Result<f64> {
    let sel = Selector::parse(selector)
        .map_err(|e| BlueRateError::Config(format!("bad {field} selector '{selector}': {e}")))?;
    let node = doc
        .select(&sel)
        .next()
        .ok_or_else(|| BlueRateError::Extraction(field.to_string()))?;
    parse_rate_text(&stripped_text(node), label, field)
}

/// Concatenate the node's text fragments with surrounding whitespace removed.
fn stripped_text(node: ElementRef<'_>) -> String {
    node.text().map(str::trim).collect()
}

fn parse_rate_text(text: &str, label: &str, field: &str) -> Result<f64> {
    let cleaned: String = text.replace(label, "").trim().replace(',', "");
    let parse_err = || BlueRateError::Parse {
        field: field.to_string(),
        text: text.to_string(),
    };
    let value: f64 = cleaned.parse().map_err(|_| parse_err())?;
    if !value.is_finite() || value <= 0.0 {
        return Err(parse_err());
    }
    Ok(value)
}
