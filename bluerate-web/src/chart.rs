//! One-year chart history through a WebDriver-controlled browser.
//!
//! The flow per request is fixed: open the page, wait (bounded) for the chart
//! container, click the one-year range control, wait for the chart data to
//! stop changing, then either read the data provider or screenshot the chart.
//! Every launched session is closed before [`ChartExtractor::fetch_history`]
//! returns, whatever the outcome, including cancellation through the
//! extractor's [`CancellationToken`].
//!
//! Browser access goes through [`ChartBrowser`] so the flow can be exercised
//! without a real browser.

use crate::series::normalize_records;
use async_trait::async_trait;
use bluerate_common::{BlueRateError, ChartHistory, ChartMode, ChartSnapshot, Result};
use bluerate_drivers::browser::{
    DriverError, driver::BrowserDriver, options::DriverOptions, page::BrowserPage,
};
use serde_json::Value;
use std::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use url::Url;

/// Produces chart history for a page.
#[async_trait]
pub trait ChartExtractor: Send + Sync {
    async fn fetch_history(&self, source_url: &Url, mode: ChartMode) -> Result<ChartHistory>;
}

/// The browser operations the chart flow needs, on a single open session.
#[async_trait]
pub trait ChartBrowser: Send {
    async fn open(&mut self, url: &str) -> Result<()>;
    /// Fails with [`BlueRateError::Timeout`] when nothing matches within `timeout`.
    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<()>;
    async fn click(&mut self, xpath: &str) -> Result<()>;
    async fn evaluate(&mut self, script: &str) -> Result<Value>;
    /// PNG bytes of the first element matching `css`.
    async fn capture(&mut self, css: &str) -> Result<Vec<u8>>;
    async fn close(&mut self) -> Result<()>;
}

/// Starts fresh, isolated browser sessions.
#[async_trait]
pub trait BrowserLauncher: Send + Sync {
    async fn launch(&self) -> Result<Box<dyn ChartBrowser>>;
}

/// When the chart counts as re-rendered after the range click.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SettlePolicy {
    pub poll_interval: Duration,
    /// Consecutive identical, non-negative length readings required.
    pub stable_polls: u32,
    pub max_wait: Duration,
}

impl Default for SettlePolicy {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(250),
            stable_polls: 3,
            max_wait: Duration::from_secs(3),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SettleOutcome {
    Stable { length: i64, waited: Duration },
    TimedOut { last: Option<i64> },
}

/// Page-specific knobs for the chart flow.
#[derive(Debug, Clone)]
pub struct ChartSettings {
    pub chart_selector: String,
    pub range_xpath: String,
    pub data_script: String,
    pub length_script: String,
    pub chart_wait: Duration,
    pub settle: SettlePolicy,
}

impl Default for ChartSettings {
    fn default() -> Self {
        Self {
            chart_selector: ".amcharts-chart-div".into(),
            range_xpath: "//input[@value='1Y']".into(),
            data_script: "return AmCharts.charts[0].dataProvider || [];".into(),
            length_script: "var c = window.AmCharts && AmCharts.charts && AmCharts.charts[0]; \
                            return (c && c.dataProvider) ? c.dataProvider.length : -1;"
                .into(),
            chart_wait: Duration::from_secs(10),
            settle: SettlePolicy::default(),
        }
    }
}

/// Poll `length_script` until it reports the same non-negative length
/// `stable_polls` times in a row, or `max_wait` elapses.
///
/// Script failures and non-numeric results count as "not ready" and reset
/// the streak.
pub async fn wait_for_settle(
    browser: &mut dyn ChartBrowser,
    length_script: &str,
    policy: SettlePolicy,
) -> SettleOutcome {
    let started = Instant::now();
    let needed = policy.stable_polls.max(1);
    let mut last: Option<i64> = None;
    let mut streak = 0u32;

    loop {
        let reading = match browser.evaluate(length_script).await {
            Ok(v) => v.as_i64().or_else(|| v.as_f64().map(|f| f as i64)),
            Err(e) => {
                debug!(target: "chart.settle", error = %e, "length probe failed");
                None
            }
        };
        match reading {
            Some(n) if n >= 0 => {
                if last == Some(n) {
                    streak += 1;
                } else {
                    last = Some(n);
                    streak = 1;
                }
                if streak >= needed {
                    return SettleOutcome::Stable {
                        length: n,
                        waited: started.elapsed(),
                    };
                }
            }
            _ => streak = 0,
        }
        if started.elapsed() >= policy.max_wait {
            return SettleOutcome::TimedOut { last };
        }
        tokio::time::sleep(policy.poll_interval).await;
    }
}

/// [`ChartExtractor`] that drives a browser obtained from `L`.
pub struct BrowserChartExtractor<L> {
    launcher: L,
    settings: ChartSettings,
    cancel: CancellationToken,
}

impl<L: BrowserLauncher> BrowserChartExtractor<L> {
    pub fn new(launcher: L, settings: ChartSettings) -> Self {
        Self {
            launcher,
            settings,
            cancel: CancellationToken::new(),
        }
    }

    /// Stop in-flight extractions when `cancel` fires; the session is still closed.
    pub fn with_cancel(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    async fn drive(
        &self,
        browser: &mut dyn ChartBrowser,
        source_url: &Url,
        mode: ChartMode,
    ) -> Result<ChartHistory> {
        let s = &self.settings;
        browser.open(source_url.as_str()).await?;
        browser.wait_for(&s.chart_selector, s.chart_wait).await?;
        browser.click(&s.range_xpath).await?;

        match wait_for_settle(browser, &s.length_script, s.settle).await {
            SettleOutcome::Stable { length, waited } => {
                debug!(
                    target: "chart",
                    length,
                    waited_ms = waited.as_millis() as u64,
                    "chart settled"
                );
            }
            SettleOutcome::TimedOut { last } => {
                warn!(
                    target: "chart",
                    ?last,
                    max_wait_ms = s.settle.max_wait.as_millis() as u64,
                    "chart did not settle, reading it anyway"
                );
            }
        }

        match mode {
            ChartMode::Structured => {
                let raw = browser.evaluate(&s.data_script).await?;
                let series = normalize_records(&raw)?;
                info!(target: "chart", points = series.len(), "chart data extracted");
                Ok(ChartHistory::Series(series))
            }
            ChartMode::Screenshot => {
                let png = browser.capture(&s.chart_selector).await?;
                let snapshot = ChartSnapshot::from_encoded(&png)?;
                info!(
                    target: "chart",
                    width = snapshot.width(),
                    height = snapshot.height(),
                    "chart captured"
                );
                Ok(ChartHistory::Snapshot(snapshot))
            }
        }
    }
}

#[async_trait]
impl<L: BrowserLauncher> ChartExtractor for BrowserChartExtractor<L> {
    async fn fetch_history(&self, source_url: &Url, mode: ChartMode) -> Result<ChartHistory> {
        if self.cancel.is_cancelled() {
            return Err(cancelled());
        }
        let mut browser = self.launcher.launch().await?;
        let result = tokio::select! {
            r = self.drive(browser.as_mut(), source_url, mode) => r,
            _ = self.cancel.cancelled() => {
                info!(target: "chart", "extraction cancelled, closing session");
                Err(cancelled())
            }
        };
        if let Err(e) = browser.close().await {
            warn!(target: "chart", error = %e, "failed to close browser session");
        }
        result
    }
}

fn cancelled() -> BlueRateError {
    BlueRateError::Driver("chart extraction cancelled".into())
}

/// Map a driver failure onto the shared taxonomy.
pub fn driver_error(e: DriverError) -> BlueRateError {
    match e {
        DriverError::Timeout { what, after } => BlueRateError::Timeout { what, after },
        other => BlueRateError::Driver(other.to_string()),
    }
}

/// Launches Chrome sessions through a WebDriver endpoint.
#[derive(Debug, Clone, Default)]
pub struct FantocciniLauncher {
    options: DriverOptions,
}

impl FantocciniLauncher {
    pub fn new(options: DriverOptions) -> Self {
        Self { options }
    }
}

#[async_trait]
impl BrowserLauncher for FantocciniLauncher {
    async fn launch(&self) -> Result<Box<dyn ChartBrowser>> {
        let driver = BrowserDriver::launch(&self.options)
            .await
            .map_err(driver_error)?;
        Ok(Box::new(FantocciniSession {
            driver: Some(driver),
            page: None,
        }))
    }
}

struct FantocciniSession {
    driver: Option<BrowserDriver>,
    page: Option<BrowserPage>,
}

impl FantocciniSession {
    fn page(&self) -> Result<&BrowserPage> {
        self.page
            .as_ref()
            .ok_or_else(|| BlueRateError::Driver("no page open".into()))
    }
}

#[async_trait]
impl ChartBrowser for FantocciniSession {
    async fn open(&mut self, url: &str) -> Result<()> {
        let driver = self
            .driver
            .as_mut()
            .ok_or_else(|| BlueRateError::Driver("session already closed".into()))?;
        self.page = Some(driver.goto(url).await.map_err(driver_error)?);
        Ok(())
    }

    async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<()> {
        let page = self.page()?;
        match page.wait_for_css(css, timeout).await {
            Ok(_) => Ok(()),
            Err(e) => {
                if let Ok(at) = page.get_url().await {
                    warn!(
                        target: "chart",
                        url = %at,
                        selector = css,
                        "chart container did not appear"
                    );
                }
                Err(driver_error(e))
            }
        }
    }

    async fn click(&mut self, xpath: &str) -> Result<()> {
        let page = self.page()?;
        let control = page.find_xpath(xpath).await.map_err(driver_error)?;
        control.click().await.map_err(driver_error)
    }

    async fn evaluate(&mut self, script: &str) -> Result<Value> {
        self.page()?.execute(script).await.map_err(driver_error)
    }

    async fn capture(&mut self, css: &str) -> Result<Vec<u8>> {
        let element = self.page()?.find_css(css).await.map_err(driver_error)?;
        element.screenshot().await.map_err(driver_error)
    }

    async fn close(&mut self) -> Result<()> {
        self.page = None;
        match self.driver.take() {
            Some(driver) => driver.close().await.map_err(driver_error),
            None => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::io::Cursor;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
    use std::sync::Arc;

    /// Scripted stand-in for a browser session.
    #[derive(Clone, Default)]
    struct Script {
        chart_appears: bool,
        click_fails: bool,
        stalls: bool,
        lengths: Vec<Value>,
        data: Option<std::result::Result<Value, String>>,
        png: Vec<u8>,
    }

    struct FakeBrowser {
        script: Script,
        lengths: VecDeque<Value>,
        closed: Arc<AtomicBool>,
        probes: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ChartBrowser for FakeBrowser {
        async fn open(&mut self, _url: &str) -> Result<()> {
            Ok(())
        }

        async fn wait_for(&mut self, css: &str, timeout: Duration) -> Result<()> {
            if self.script.stalls {
                tokio::time::sleep(Duration::from_secs(30)).await;
            }
            if self.script.chart_appears {
                Ok(())
            } else {
                Err(BlueRateError::Timeout {
                    what: format!("element `{css}`"),
                    after: timeout,
                })
            }
        }

        async fn click(&mut self, _xpath: &str) -> Result<()> {
            if self.script.click_fails {
                Err(BlueRateError::Driver("element not found: 1Y".into()))
            } else {
                Ok(())
            }
        }

        async fn evaluate(&mut self, script: &str) -> Result<Value> {
            if script.contains("length") {
                self.probes.fetch_add(1, Ordering::SeqCst);
                let next = match self.lengths.len() {
                    0 => json!(-1),
                    1 => self.lengths[0].clone(),
                    _ => self.lengths.pop_front().unwrap_or(json!(-1)),
                };
                return Ok(next);
            }
            match &self.script.data {
                Some(Ok(v)) => Ok(v.clone()),
                Some(Err(msg)) => Err(BlueRateError::Driver(format!("script failed: {msg}"))),
                None => Ok(Value::Null),
            }
        }

        async fn capture(&mut self, _css: &str) -> Result<Vec<u8>> {
            Ok(self.script.png.clone())
        }

        async fn close(&mut self) -> Result<()> {
            self.closed.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    struct FakeLauncher {
        script: Script,
        closed: Arc<AtomicBool>,
        probes: Arc<AtomicUsize>,
    }

    impl FakeLauncher {
        fn new(script: Script) -> Self {
            Self {
                script,
                closed: Arc::new(AtomicBool::new(false)),
                probes: Arc::new(AtomicUsize::new(0)),
            }
        }
    }

    #[async_trait]
    impl BrowserLauncher for FakeLauncher {
        async fn launch(&self) -> Result<Box<dyn ChartBrowser>> {
            Ok(Box::new(FakeBrowser {
                lengths: self.script.lengths.iter().cloned().collect(),
                script: self.script.clone(),
                closed: self.closed.clone(),
                probes: self.probes.clone(),
            }))
        }
    }

    fn fast_settings() -> ChartSettings {
        ChartSettings {
            chart_wait: Duration::from_millis(50),
            settle: SettlePolicy {
                poll_interval: Duration::from_millis(5),
                stable_polls: 3,
                max_wait: Duration::from_millis(200),
            },
            ..ChartSettings::default()
        }
    }

    fn url() -> Url {
        Url::parse("https://bluedollar.net/informal-rate/").unwrap()
    }

    fn ready(data: Value) -> Script {
        Script {
            chart_appears: true,
            lengths: vec![json!(2)],
            data: Some(Ok(data)),
            ..Script::default()
        }
    }

    fn tiny_png() -> Vec<u8> {
        let img = image::RgbaImage::from_pixel(4, 3, image::Rgba([10, 20, 30, 255]));
        let mut buf = Cursor::new(Vec::new());
        img.write_to(&mut buf, image::ImageFormat::Png).unwrap();
        buf.into_inner()
    }

    #[tokio::test]
    async fn structured_history_keeps_every_record() {
        let data = json!([
            {"date": "2024-01-01", "value": 900.0},
            {"date": "2024-06-01", "value": 1200.0}
        ]);
        let launcher = FakeLauncher::new(ready(data));
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let history = extractor
            .fetch_history(&url(), ChartMode::Structured)
            .await
            .unwrap();
        match history {
            ChartHistory::Series(s) => assert_eq!(s.len(), 2),
            other => panic!("unexpected history: {other:?}"),
        }
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn empty_provider_is_no_data_and_session_closed() {
        let launcher = FakeLauncher::new(ready(json!([])));
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let err = extractor
            .fetch_history(&url(), ChartMode::Structured)
            .await
            .unwrap_err();
        assert_eq!(err, BlueRateError::NoData);
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_chart_times_out_and_session_closed() {
        let launcher = FakeLauncher::new(Script::default());
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let err = extractor
            .fetch_history(&url(), ChartMode::Structured)
            .await
            .unwrap_err();
        assert!(matches!(err, BlueRateError::Timeout { .. }));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn missing_range_control_fails_and_session_closed() {
        let launcher = FakeLauncher::new(Script {
            click_fails: true,
            ..ready(json!([]))
        });
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let err = extractor
            .fetch_history(&url(), ChartMode::Screenshot)
            .await
            .unwrap_err();
        assert!(matches!(err, BlueRateError::Driver(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn throwing_data_script_closes_session() {
        let launcher = FakeLauncher::new(Script {
            data: Some(Err("AmCharts is not defined".into())),
            ..ready(Value::Null)
        });
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let err = extractor
            .fetch_history(&url(), ChartMode::Structured)
            .await
            .unwrap_err();
        assert!(matches!(err, BlueRateError::Driver(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelling_mid_wait_still_closes_session() {
        let launcher = FakeLauncher::new(Script {
            stalls: true,
            ..ready(json!([]))
        });
        let closed = launcher.closed.clone();
        let cancel = CancellationToken::new();
        let extractor =
            BrowserChartExtractor::new(launcher, fast_settings()).with_cancel(cancel.clone());

        let task = tokio::spawn(async move {
            extractor.fetch_history(&url(), ChartMode::Structured).await
        });
        tokio::time::sleep(Duration::from_millis(100)).await;
        assert!(!closed.load(Ordering::SeqCst));
        cancel.cancel();

        let err = tokio::time::timeout(Duration::from_secs(5), task)
            .await
            .unwrap()
            .unwrap()
            .unwrap_err();
        assert!(matches!(err, BlueRateError::Driver(ref m) if m.contains("cancelled")));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn cancelled_extractor_never_launches() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let launcher = FakeLauncher::new(ready(json!([])));
        let probes = launcher.probes.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings()).with_cancel(cancel);

        let result = extractor.fetch_history(&url(), ChartMode::Structured).await;
        assert!(result.is_err());
        assert_eq!(probes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn screenshot_mode_decodes_in_memory() {
        let launcher = FakeLauncher::new(Script {
            png: tiny_png(),
            ..ready(Value::Null)
        });
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        match extractor
            .fetch_history(&url(), ChartMode::Screenshot)
            .await
            .unwrap()
        {
            ChartHistory::Snapshot(snap) => {
                assert_eq!((snap.width(), snap.height()), (4, 3));
            }
            other => panic!("unexpected history: {other:?}"),
        }
    }

    #[tokio::test]
    async fn garbage_screenshot_is_driver_error() {
        let launcher = FakeLauncher::new(Script {
            png: b"not a png".to_vec(),
            ..ready(Value::Null)
        });
        let closed = launcher.closed.clone();
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());

        let err = extractor
            .fetch_history(&url(), ChartMode::Screenshot)
            .await
            .unwrap_err();
        assert!(matches!(err, BlueRateError::Driver(_)));
        assert!(closed.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn settle_waits_for_repeated_length() {
        let launcher = FakeLauncher::new(Script {
            lengths: vec![json!(-1), json!(30), json!(365), json!(365), json!(365)],
            ..Script::default()
        });
        let probes = launcher.probes.clone();
        let mut browser = launcher.launch().await.unwrap();

        let outcome =
            wait_for_settle(browser.as_mut(), "length", fast_settings().settle).await;
        assert!(matches!(outcome, SettleOutcome::Stable { length: 365, .. }));
        assert_eq!(probes.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn settle_gives_up_after_max_wait() {
        let launcher = FakeLauncher::new(Script {
            lengths: vec![json!(-1)],
            ..Script::default()
        });
        let mut browser = launcher.launch().await.unwrap();
        let policy = SettlePolicy {
            poll_interval: Duration::from_millis(10),
            stable_polls: 2,
            max_wait: Duration::from_millis(60),
        };

        let started = Instant::now();
        let outcome = wait_for_settle(browser.as_mut(), "length", policy).await;
        assert_eq!(outcome, SettleOutcome::TimedOut { last: None });
        assert!(started.elapsed() >= policy.max_wait);
    }

    #[tokio::test]
    async fn unsettled_chart_is_still_read() {
        let launcher = FakeLauncher::new(Script {
            lengths: vec![json!(-1)],
            ..ready(json!([{"date": "2024-01-01", "value": 1.0}]))
        });
        let extractor = BrowserChartExtractor::new(launcher, fast_settings());
        let history = extractor
            .fetch_history(&url(), ChartMode::Structured)
            .await
            .unwrap();
        assert!(matches!(history, ChartHistory::Series(ref s) if s.len() == 1));
    }

    #[test]
    fn driver_timeouts_keep_their_kind() {
        let err = driver_error(DriverError::Timeout {
            what: "element `.chart`".into(),
            after: Duration::from_secs(10),
        });
        assert_eq!(
            err.to_string(),
            "Timed out after 10.0s waiting for element `.chart`"
        );
        assert!(matches!(
            driver_error(DriverError::NotFound("x".into())),
            BlueRateError::Driver(_)
        ));
    }
}
