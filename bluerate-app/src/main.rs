mod wiring;

use anyhow::Result;
use bluerate_common::ChartMode;
use bluerate_common::observability::init_logging;
use bluerate_tui::{TuiApp, parse_amount};
use clap::Parser;
use std::path::PathBuf;
use tokio_util::sync::CancellationToken;
use tracing::info;
use wiring::{Overrides, build_session, load_config, log_config};

#[derive(Debug, Parser)]
#[command(name = "bluerate", about = "Dollars to pesos at the informal (blue) rate")]
struct Args {
    /// Config file (YAML/TOML/JSON). Defaults to ./bluerate.yaml, then the user config dir.
    #[arg(long, short)]
    config: Option<PathBuf>,

    /// Rate page to scrape.
    #[arg(long)]
    url: Option<String>,

    /// Chart history as `structured` data or a `screenshot`.
    #[arg(long)]
    mode: Option<ChartMode>,

    /// WebDriver endpoint, e.g. http://localhost:9515.
    #[arg(long)]
    webdriver_url: Option<String>,

    /// Convert this many dollars once, print the result and exit.
    #[arg(long, value_parser = parse_amount)]
    amount: Option<f64>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // 1) Config: defaults < file < env < flags
    let overrides = Overrides {
        url: args.url,
        mode: args.mode,
        webdriver_url: args.webdriver_url,
    };
    let cfg = load_config(args.config.as_deref(), &overrides)?;

    // 2) Logging to file; the TUI owns the terminal
    let log_path = init_logging(log_config(&cfg.logging))?;
    info!(log = %log_path.display(), "bluerate starting");

    // 3) Wire components; the token also stops an in-flight chart extraction
    let cancel = CancellationToken::new();
    let (session, ctx) = build_session(&cfg, cancel.clone())?;

    if let Some(dollars) = args.amount {
        let report = session.run(ctx.with_dollars(dollars)).await;
        println!("{}", report.render_plain());
        return Ok(());
    }

    let on_signal = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            on_signal.cancel();
        }
    });

    TuiApp::new(session, ctx, cancel)?.run().await
}
