use anyhow::{Context, Result};
use bluerate_common::ChartMode;
use bluerate_common::observability::{LogConfig, LogFormat};
use bluerate_config::{
    BlueRateConfig, BlueRateConfigLoader, BrowserConfig, DEFAULT_CONFIG_FILE, LoggingConfig,
    SourceConfig, user_config_path,
};
use bluerate_drivers::browser::options::DriverOptions;
use bluerate_tui::{Session, SessionContext};
use bluerate_web::chart::SettlePolicy;
use bluerate_web::{
    BrowserChartExtractor, ChartSettings, FantocciniLauncher, RateFetcher, RateSelectors,
};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::info;
use url::Url;

/// Command-line values that win over file and environment.
#[derive(Debug, Default)]
pub struct Overrides {
    pub url: Option<String>,
    pub mode: Option<ChartMode>,
    pub webdriver_url: Option<String>,
}

/// `explicit` if given, else the first existing default location.
fn config_file(explicit: Option<&Path>) -> Option<PathBuf> {
    if let Some(path) = explicit {
        return Some(path.to_path_buf());
    }
    let local = PathBuf::from(DEFAULT_CONFIG_FILE);
    if local.is_file() {
        return Some(local);
    }
    user_config_path().filter(|p| p.is_file())
}

pub fn load_config(explicit: Option<&Path>, overrides: &Overrides) -> Result<BlueRateConfig> {
    let mut loader = BlueRateConfigLoader::new();
    if let Some(path) = config_file(explicit) {
        loader = loader.with_file(&path);
    }
    let mut cfg = loader.load().context("loading configuration")?;
    apply_overrides(&mut cfg, overrides);
    Ok(cfg)
}

fn apply_overrides(cfg: &mut BlueRateConfig, overrides: &Overrides) {
    if let Some(url) = &overrides.url {
        cfg.source.url = url.clone();
    }
    if let Some(mode) = overrides.mode {
        cfg.chart.mode = mode;
    }
    if let Some(endpoint) = &overrides.webdriver_url {
        cfg.browser.webdriver_url = endpoint.clone();
    }
}

pub fn log_config(cfg: &LoggingConfig) -> LogConfig {
    LogConfig {
        log_dir: cfg.dir.as_ref().map(PathBuf::from),
        emit_stderr: cfg.stderr,
        format: LogFormat::from_name(&cfg.format),
        default_filter: cfg.filter.clone(),
        ..LogConfig::default()
    }
}

fn rate_selectors(cfg: &SourceConfig) -> RateSelectors {
    RateSelectors {
        buy_selector: cfg.buy_selector.clone(),
        sell_selector: cfg.sell_selector.clone(),
        buy_label: cfg.buy_label.clone(),
        sell_label: cfg.sell_label.clone(),
    }
}

fn driver_options(cfg: &BrowserConfig) -> DriverOptions {
    DriverOptions {
        webdriver_url: cfg.webdriver_url.clone(),
        headless: cfg.headless,
        window_size: (cfg.window_width, cfg.window_height),
        ..DriverOptions::default()
    }
}

fn chart_settings(cfg: &BrowserConfig) -> ChartSettings {
    ChartSettings {
        chart_selector: cfg.chart_selector.clone(),
        range_xpath: cfg.range_xpath.clone(),
        data_script: cfg.data_script.clone(),
        length_script: cfg.length_script.clone(),
        chart_wait: Duration::from_secs(cfg.chart_wait_secs),
        settle: SettlePolicy {
            poll_interval: Duration::from_millis(cfg.settle.poll_ms),
            stable_polls: cfg.settle.stable_polls,
            max_wait: Duration::from_millis(cfg.settle.max_wait_ms),
        },
    }
}

/// Build the rate and chart components plus the initial request context.
/// Chart extractions stop, closing their browser session, once `cancel` fires.
pub fn build_session(
    cfg: &BlueRateConfig,
    cancel: CancellationToken,
) -> Result<(Session, SessionContext)> {
    let source_url = Url::parse(&cfg.source.url)
        .with_context(|| format!("invalid source url '{}'", cfg.source.url))?;
    let mode = cfg.chart.mode;

    let rates = RateFetcher::with_timeout(
        rate_selectors(&cfg.source),
        Duration::from_secs(cfg.source.timeout_secs),
    )?;
    let chart = BrowserChartExtractor::new(
        FantocciniLauncher::new(driver_options(&cfg.browser)),
        chart_settings(&cfg.browser),
    )
    .with_cancel(cancel);

    info!(
        source = %source_url,
        webdriver = %cfg.browser.webdriver_url,
        %mode,
        "components wired"
    );

    Ok((
        Session::new(Arc::new(rates), Arc::new(chart)),
        SessionContext::new(source_url, mode),
    ))
}
