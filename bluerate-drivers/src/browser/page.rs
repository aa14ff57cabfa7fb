use crate::browser::DriverError;
use fantoccini::{elements::Element, error::CmdError, Client, Locator};
use std::time::Duration;
use tracing::debug;

const WAIT_POLL: Duration = Duration::from_millis(200);

/// Map a WebDriver command error onto [`DriverError`].
pub(crate) fn cmd_error(e: CmdError) -> DriverError {
    if e.is_no_such_element() {
        return DriverError::NotFound(e.to_string());
    }
    DriverError::Command(e.to_string())
}

/// Page wrapper providing navigation, bounded waits and script evaluation.
pub struct BrowserPage {
    pub(crate) client: Client,
}

impl BrowserPage {
    /// Construct a page wrapper around an existing WebDriver client.
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    /// Navigate to `url`.
    pub async fn goto(&mut self, url: &str) -> Result<(), DriverError> {
        debug!(target: "browser.page", %url, "navigating");
        self.client.goto(url).await.map_err(cmd_error)
    }

    /// Return the current page URL.
    pub async fn get_url(&self) -> Result<String, DriverError> {
        self.client
            .current_url()
            .await
            .map(|url| url.to_string())
            .map_err(cmd_error)
    }

    /// Block until an element matching `selector` exists, for at most `timeout`.
    pub async fn wait_for_css(
        &self,
        selector: &str,
        timeout: Duration,
    ) -> Result<BrowserElement, DriverError> {
        let element = self
            .client
            .wait()
            .at_most(timeout)
            .every(WAIT_POLL)
            .for_element(Locator::Css(selector))
            .await
            .map_err(|e| match e {
                CmdError::WaitTimeout => DriverError::Timeout {
                    what: format!("element `{selector}`"),
                    after: timeout,
                },
                other => cmd_error(other),
            })?;
        Ok(BrowserElement::new(element))
    }

    /// Find a single element by CSS selector without waiting.
    pub async fn find_css(&self, selector: &str) -> Result<BrowserElement, DriverError> {
        let element = self
            .client
            .find(Locator::Css(selector))
            .await
            .map_err(cmd_error)?;
        Ok(BrowserElement::new(element))
    }

    /// Find a single element by XPath without waiting.
    pub async fn find_xpath(&self, xpath: &str) -> Result<BrowserElement, DriverError> {
        let element = self
            .client
            .find(Locator::XPath(xpath))
            .await
            .map_err(cmd_error)?;
        Ok(BrowserElement::new(element))
    }

    /// Run `script` (a function body; use `return`) in the page and return its JSON result.
    pub async fn execute(&self, script: &str) -> Result<serde_json::Value, DriverError> {
        self.client
            .execute(script, vec![])
            .await
            .map_err(|e| match e {
                e if e.is_no_such_element() => DriverError::NotFound(e.to_string()),
                other => DriverError::Script(other.to_string()),
            })
    }
}

/// Wrapper for DOM elements consistent with [`BrowserPage`].
#[derive(Clone)]
pub struct BrowserElement {
    pub element: Element,
}

impl BrowserElement {
    pub fn new(element: Element) -> Self {
        Self { element }
    }

    /// Click the element.
    pub async fn click(&self) -> Result<(), DriverError> {
        self.element.click().await.map_err(cmd_error)
    }

    /// PNG screenshot of the element's bounding box.
    pub async fn screenshot(&self) -> Result<Vec<u8>, DriverError> {
        self.element.screenshot().await.map_err(cmd_error)
    }
}
