//! Loader for bluerate configuration with file + environment overlays.
//!
//! Every field has a built-in default, so an empty document (or no file at
//! all) yields a working configuration pointed at the public blue-dollar
//! page. Sources merge in increasing precedence:
//!
//! 1. defaults baked into the structs below
//! 2. an optional YAML/TOML/JSON file
//! 3. `BLUERATE__`-prefixed environment variables, `__` separating nesting
//!    (`BLUERATE__BROWSER__WEBDRIVER_URL=http://grid:4444`)
//!
//! String values may reference `${VAR}` placeholders, expanded after merge.
use bluerate_common::ChartMode;
use config::{Config, ConfigError, Environment, File};
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

const MAXIMUM_ENV_EXPANSION_DEPTH: usize = 8;
const ENV_PREFIX: &str = "BLUERATE";

/// File name looked up in the working directory and the user config dir.
pub const DEFAULT_CONFIG_FILE: &str = "bluerate.yaml";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct BlueRateConfig {
    pub version: Option<String>,
    pub source: SourceConfig,
    pub browser: BrowserConfig,
    pub chart: ChartConfig,
    pub logging: LoggingConfig,
}

/// Where the current rate is scraped from and how the two nodes are found.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SourceConfig {
    pub url: String,
    pub timeout_secs: u64,
    pub buy_selector: String,
    pub sell_selector: String,
    pub buy_label: String,
    pub sell_label: String,
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            url: "https://bluedollar.net/informal-rate/".into(),
            timeout_secs: 15,
            buy_selector: "div.buy.buy-sell-blue".into(),
            sell_selector: "div.sell.buy-sell-blue".into(),
            buy_label: "Buy".into(),
            sell_label: "Sell".into(),
        }
    }
}

/// WebDriver session and chart-page interaction knobs.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    pub webdriver_url: String,
    pub headless: bool,
    pub window_width: u32,
    pub window_height: u32,
    /// Upper bound for the chart container to appear.
    pub chart_wait_secs: u64,
    pub chart_selector: String,
    pub range_xpath: String,
    /// Script returning the chart's data provider array.
    pub data_script: String,
    /// Script returning the data provider length, or -1 when not ready.
    pub length_script: String,
    pub settle: SettleConfig,
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".into(),
            headless: true,
            window_width: 1366,
            window_height: 900,
            chart_wait_secs: 10,
            chart_selector: ".amcharts-chart-div".into(),
            range_xpath: "//input[@value='1Y']".into(),
            data_script: "return AmCharts.charts[0].dataProvider || [];".into(),
            length_script: "var c = window.AmCharts && AmCharts.charts && AmCharts.charts[0]; \
                            return (c && c.dataProvider) ? c.dataProvider.length : -1;"
                .into(),
            settle: SettleConfig::default(),
        }
    }
}

/// Post-click re-render detection: poll until the data length stops changing.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct SettleConfig {
    pub poll_ms: u64,
    pub stable_polls: u32,
    pub max_wait_ms: u64,
}

impl Default for SettleConfig {
    fn default() -> Self {
        Self {
            poll_ms: 250,
            stable_polls: 3,
            max_wait_ms: 3000,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ChartConfig {
    /// `structured` or `screenshot`.
    pub mode: ChartMode,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub dir: Option<String>,
    /// `text` or `json`.
    pub format: String,
    pub stderr: bool,
    /// Filter used when `RUST_LOG` is unset.
    pub filter: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            dir: None,
            format: "text".into(),
            stderr: false,
            filter: "info".into(),
        }
    }
}

/// `~/.config/bluerate/bluerate.yaml` (platform equivalent), if a config dir exists.
pub fn user_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("bluerate").join(DEFAULT_CONFIG_FILE))
}

fn expand_env_in_value(v: &mut Value) {
    match v {
        Value::String(s) => {
            if s.contains('$') {
                let mut cur = std::mem::take(s);
                for _ in 0..MAXIMUM_ENV_EXPANSION_DEPTH {
                    let expanded = match shellexpand::env(&cur) {
                        Ok(cow) => cow.into_owned(),
                        Err(_) => cur.clone(),
                    };
                    if expanded == cur {
                        break;
                    }
                    cur = expanded;
                }
                *s = cur;
            }
        }
        Value::Array(arr) => arr.iter_mut().for_each(expand_env_in_value),
        Value::Object(obj) => obj.values_mut().for_each(expand_env_in_value),
        _ => {}
    }
}

/// Builder hides the `config` crate wiring (files + env overrides).
pub struct BlueRateConfigLoader {
    builder: config::ConfigBuilder<config::builder::DefaultState>,
    env_prefix: String,
}

impl Default for BlueRateConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

impl BlueRateConfigLoader {
    /// Start from struct defaults; `BLUERATE__` env overrides are applied last.
    ///
    /// ```
    /// use bluerate_config::BlueRateConfigLoader;
    ///
    /// let config = BlueRateConfigLoader::new()
    ///     .with_yaml_str("version: '1'")
    ///     .load()
    ///     .expect("valid config");
    ///
    /// assert_eq!(config.version.as_deref(), Some("1"));
    /// assert_eq!(config.browser.chart_wait_secs, 10);
    /// assert_eq!(config.source.url, "https://bluedollar.net/informal-rate/");
    /// ```
    pub fn new() -> Self {
        Self {
            builder: Config::builder(),
            env_prefix: ENV_PREFIX.to_string(),
        }
    }

    /// Use a different environment prefix (tests isolate themselves this way).
    pub fn with_env_prefix(mut self, prefix: &str) -> Self {
        self.env_prefix = prefix.to_string();
        self
    }

    /// Attach a YAML/TOML/JSON file that must exist; format inferred by suffix.
    pub fn with_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(true));
        self
    }

    /// Attach a file that is silently skipped when absent.
    pub fn with_optional_file<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.builder = self
            .builder
            .add_source(File::from(path.as_ref()).required(false));
        self
    }

    /// Allow tests/CLI to merge inline YAML snippets.
    ///
    /// ```
    /// use bluerate_config::BlueRateConfigLoader;
    ///
    /// let cfg = BlueRateConfigLoader::new()
    ///     .with_yaml_str(
    ///         r#"
    /// browser:
    ///   headless: false
    ///   settle:
    ///     stable_polls: 5
    /// chart:
    ///   mode: screenshot
    /// "#,
    ///     )
    ///     .load()
    ///     .unwrap();
    ///
    /// assert!(!cfg.browser.headless);
    /// assert_eq!(cfg.browser.settle.stable_polls, 5);
    /// assert_eq!(cfg.browser.settle.poll_ms, 250);
    /// assert_eq!(cfg.chart.mode, bluerate_common::ChartMode::Screenshot);
    /// ```
    pub fn with_yaml_str(mut self, yaml: &str) -> Self {
        self.builder = self
            .builder
            .add_source(File::from_str(yaml, config::FileFormat::Yaml));
        self
    }

    /// Consume the builder and deserialize the merged sources into strongly typed config.
    ///
    /// ```
    /// use bluerate_config::BlueRateConfigLoader;
    ///
    /// unsafe { std::env::set_var("BLUERATE_DOC_GRID", "http://grid:4444"); }
    ///
    /// let config = BlueRateConfigLoader::new()
    ///     .with_yaml_str(r#"
    /// browser:
    ///   webdriver_url: "${BLUERATE_DOC_GRID}/wd/hub"
    /// "#)
    ///     .load()
    ///     .expect("valid configuration");
    ///
    /// assert_eq!(config.browser.webdriver_url, "http://grid:4444/wd/hub");
    ///
    /// unsafe { std::env::remove_var("BLUERATE_DOC_GRID"); }
    /// ```
    pub fn load(self) -> Result<BlueRateConfig, ConfigError> {
        let cfg = self
            .builder
            .add_source(
                Environment::with_prefix(&self.env_prefix)
                    .separator("__")
                    .try_parsing(true),
            )
            .build()?;

        let mut v: Value = cfg.try_deserialize()?;
        expand_env_in_value(&mut v);

        let typed: BlueRateConfig =
            serde_json::from_value(v).map_err(|e| ConfigError::Message(e.to_string()))?;
        validate(&typed)?;

        Ok(typed)
    }
}

fn validate(cfg: &BlueRateConfig) -> Result<(), ConfigError> {
    if cfg.source.url.trim().is_empty() {
        return Err(ConfigError::Message("source.url must not be empty".into()));
    }
    if cfg.browser.chart_wait_secs == 0 {
        return Err(ConfigError::Message(
            "browser.chart_wait_secs must be at least 1".into(),
        ));
    }
    if cfg.browser.settle.stable_polls == 0 {
        return Err(ConfigError::Message(
            "browser.settle.stable_polls must be at least 1".into(),
        ));
    }
    Ok(())
}
