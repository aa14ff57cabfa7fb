/// How to reach the WebDriver service and shape the browser it starts.
#[derive(Debug, Clone)]
pub struct DriverOptions {
    /// WebDriver endpoint, e.g. `http://localhost:9515` for Chromedriver.
    pub webdriver_url: String,
    /// Run without a visible window.
    pub headless: bool,
    /// Viewport width and height in CSS pixels.
    pub window_size: (u32, u32),
    /// Appended verbatim after the built-in arguments.
    pub extra_args: Vec<String>,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            webdriver_url: "http://localhost:9515".to_string(),
            headless: true,
            window_size: (1366, 900),
            extra_args: Vec::new(),
        }
    }
}

/// Construct Chrome command‑line arguments for a throwaway session.
///
/// Sandboxing is disabled: sessions are ephemeral and run in a trusted
/// environment (containers frequently lack the privileges the sandbox needs).
pub fn build_chrome_arguments(opts: &DriverOptions) -> Vec<String> {
    let mut args = vec![
        "--no-sandbox".to_string(),
        "--disable-dev-shm-usage".to_string(),
        "--disable-extensions".to_string(),
        "--disable-infobars".to_string(),
        format!("--window-size={},{}", opts.window_size.0, opts.window_size.1),
    ];
    if opts.headless {
        args.push("--headless".to_string());
        args.push("--disable-gpu".to_string());
    }
    args.extend(opts.extra_args.iter().cloned());
    args
}
