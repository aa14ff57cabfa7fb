use crate::browser::{
    options::{build_chrome_arguments, DriverOptions},
    page::{cmd_error, BrowserPage},
    DriverError,
};
use fantoccini::{Client, ClientBuilder};
use serde_json::json;
use tracing::{debug, info};
use webdriver::capabilities::Capabilities;

/// Thin wrapper around a `fantoccini` WebDriver client owning one browser
/// session. Call [`BrowserDriver::close`] on every exit path; the remote
/// browser process outlives a dropped client.
pub struct BrowserDriver {
    pub client: Client,
    endpoint: String,
}

impl BrowserDriver {
    /// Start a new Chrome session on the WebDriver service named in `opts`.
    pub async fn launch(opts: &DriverOptions) -> Result<Self, DriverError> {
        let mut caps = Capabilities::new();
        let args = build_chrome_arguments(opts);
        debug!(target: "browser.session", ?args, "chrome arguments");
        caps.insert("goog:chromeOptions".to_string(), json!({ "args": args }));

        let client = ClientBuilder::native()
            .capabilities(caps)
            .connect(&opts.webdriver_url)
            .await
            .map_err(|e| DriverError::Session {
                endpoint: opts.webdriver_url.clone(),
                message: e.to_string(),
            })?;

        info!(
            target: "browser.session",
            endpoint = %opts.webdriver_url,
            headless = opts.headless,
            "session started"
        );

        Ok(Self {
            client,
            endpoint: opts.webdriver_url.clone(),
        })
    }

    /// Navigate to `url` and return a [`BrowserPage`] for it.
    pub async fn goto(&mut self, url: &str) -> Result<BrowserPage, DriverError> {
        let mut page = BrowserPage::new(self.client.clone());
        page.goto(url).await?;
        Ok(page)
    }

    /// Close the underlying browser session.
    pub async fn close(self) -> Result<(), DriverError> {
        self.client.close().await.map_err(cmd_error)?;
        info!(target: "browser.session", endpoint = %self.endpoint, "session closed");
        Ok(())
    }
}
