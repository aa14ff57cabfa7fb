//! One interaction: fetch the quote, then the chart history, for an explicit
//! [`SessionContext`].

use crate::report;
use bluerate_common::{ChartHistory, ChartMode, ConversionResult, ExchangeQuote, Result};
use bluerate_web::{ChartExtractor, RateSource};
use std::sync::Arc;
use tracing::{info, warn};
use url::Url;

/// Everything an interaction needs to know about the user's request.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionContext {
    pub dollars: f64,
    pub mode: ChartMode,
    pub source_url: Url,
}

impl SessionContext {
    pub fn new(source_url: Url, mode: ChartMode) -> Self {
        Self {
            dollars: 0.0,
            mode,
            source_url,
        }
    }

    pub fn with_dollars(mut self, dollars: f64) -> Self {
        self.dollars = dollars.max(0.0);
        self
    }
}

/// Current quote plus the conversion for the requested amount.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateView {
    pub quote: ExchangeQuote,
    pub conversion: ConversionResult,
}

impl RateView {
    pub fn new(quote: ExchangeQuote, dollars: f64) -> Self {
        Self {
            quote,
            conversion: ConversionResult::compute(dollars, &quote),
        }
    }
}

/// Outcome of both branches; each fails on its own.
#[derive(Debug, Clone)]
pub struct InteractionReport {
    pub rates: Result<RateView>,
    pub history: Result<ChartHistory>,
}

impl InteractionReport {
    /// Text form used by the one-shot CLI mode.
    pub fn render_plain(&self) -> String {
        let mut out = Vec::new();
        match &self.rates {
            Ok(view) => out.extend(report::rate_lines(view)),
            Err(e) => out.push(report::rate_error_line(e)),
        }
        out.push(String::new());
        match &self.history {
            Ok(history) => {
                out.push(report::CHART_CAPTION.to_string());
                out.extend(report::history_lines(history));
            }
            Err(e) => out.push(report::history_error_line(e)),
        }
        out.join("\n")
    }
}

/// The two acquisition components, composed sequentially.
#[derive(Clone)]
pub struct Session {
    rates: Arc<dyn RateSource>,
    chart: Arc<dyn ChartExtractor>,
}

impl Session {
    pub fn new(rates: Arc<dyn RateSource>, chart: Arc<dyn ChartExtractor>) -> Self {
        Self { rates, chart }
    }

    pub async fn quote(&self, ctx: &SessionContext) -> Result<RateView> {
        let quote = self.rates.fetch_rates(&ctx.source_url).await.inspect_err(|e| {
            warn!(target: "session", error = %e, "rate fetch failed");
        })?;
        let view = RateView::new(quote, ctx.dollars);
        info!(
            target: "session",
            dollars = ctx.dollars,
            pesos = view.conversion.pesos_received,
            "conversion computed"
        );
        Ok(view)
    }

    pub async fn history(&self, ctx: &SessionContext) -> Result<ChartHistory> {
        self.chart
            .fetch_history(&ctx.source_url, ctx.mode)
            .await
            .inspect_err(|e| {
                warn!(target: "session", mode = %ctx.mode, error = %e, "history fetch failed");
            })
    }

    /// Both branches in order; the chart is attempted whatever the rates did.
    pub async fn run(&self, ctx: SessionContext) -> InteractionReport {
        let rates = self.quote(&ctx).await;
        let history = self.history(&ctx).await;
        InteractionReport { rates, history }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use bluerate_common::{BlueRateError, HistoricalSeries, HistoryPoint};
    use chrono::NaiveDate;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct FixedRates(Result<ExchangeQuote>);

    #[async_trait]
    impl RateSource for FixedRates {
        async fn fetch_rates(&self, _source_url: &Url) -> Result<ExchangeQuote> {
            self.0.clone()
        }
    }

    struct FixedChart {
        result: Result<ChartHistory>,
        calls: AtomicUsize,
    }

    #[async_trait]
    impl ChartExtractor for FixedChart {
        async fn fetch_history(&self, _url: &Url, _mode: ChartMode) -> Result<ChartHistory> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.result.clone()
        }
    }

    fn ctx(dollars: f64) -> SessionContext {
        SessionContext::new(
            Url::parse("https://bluedollar.net/informal-rate/").unwrap(),
            ChartMode::Structured,
        )
        .with_dollars(dollars)
    }

    fn one_point() -> ChartHistory {
        ChartHistory::Series(HistoricalSeries::new(vec![HistoryPoint {
            date: NaiveDate::from_ymd_opt(2024, 5, 1).unwrap(),
            value: 1045.0,
        }]))
    }

    #[tokio::test]
    async fn hundred_dollars_at_350_5() {
        let session = Session::new(
            Arc::new(FixedRates(Ok(ExchangeQuote::new(350.5, 370.0)))),
            Arc::new(FixedChart {
                result: Ok(one_point()),
                calls: AtomicUsize::new(0),
            }),
        );
        let report = session.run(ctx(100.0)).await;
        let text = report.render_plain();
        assert!(text.contains("You will receive this many pesos: 35050.00"));
        assert!(text.contains(report::CHART_CAPTION));
        assert!(text.contains("Data shape: (1, 2)"));
    }

    #[tokio::test]
    async fn rate_failure_does_not_skip_chart() {
        let chart = Arc::new(FixedChart {
            result: Ok(one_point()),
            calls: AtomicUsize::new(0),
        });
        let session = Session::new(
            Arc::new(FixedRates(Err(BlueRateError::Extraction("buy".into())))),
            chart.clone(),
        );
        let report = session.run(ctx(10.0)).await;
        assert!(report.rates.is_err());
        assert!(report.history.is_ok());
        assert_eq!(chart.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn chart_failure_keeps_rates() {
        let session = Session::new(
            Arc::new(FixedRates(Ok(ExchangeQuote::new(1000.0, 1020.0)))),
            Arc::new(FixedChart {
                result: Err(BlueRateError::NoData),
                calls: AtomicUsize::new(0),
            }),
        );
        let report = session.run(ctx(2.0)).await;
        let text = report.render_plain();
        assert!(text.contains("You will receive this many pesos: 2000.00"));
        assert!(text.contains("Error in historical data extraction: No chart data found"));
    }

    #[test]
    fn negative_amounts_clamp_to_zero() {
        assert_eq!(ctx(-3.0).dollars, 0.0);
    }
}
