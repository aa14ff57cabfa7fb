//! Plain-text renderings of interaction results, shared by the transcript
//! and one-shot stdout output.

use bluerate_common::{BlueRateError, ChartHistory, ChartSnapshot, HistoricalSeries};
use crate::session::RateView;

pub const CHART_CAPTION: &str = "Historical Exchange Rate (Last 1 Year)";
pub const PREVIEW_ROWS: usize = 5;
pub const COLUMNS: [&str; 2] = ["date", "value"];

pub fn rate_lines(view: &RateView) -> Vec<String> {
    vec![
        format!("Buy Rate: {}", view.quote.buy_rate),
        format!("Sell Rate: {}", view.quote.sell_rate),
        pesos_line(view),
    ]
}

pub fn pesos_line(view: &RateView) -> String {
    format!(
        "You will receive this many pesos: {}",
        view.conversion.pesos_display()
    )
}

pub fn rate_error_line(err: &BlueRateError) -> String {
    format!("Error fetching exchange rates: {err}")
}

pub fn history_error_line(err: &BlueRateError) -> String {
    format!("Error in historical data extraction: {err}")
}

/// Shape, columns and the first rows of the series.
pub fn series_lines(series: &HistoricalSeries) -> Vec<String> {
    let mut out = vec![
        format!("Data shape: ({}, {})", series.len(), COLUMNS.len()),
        format!("Columns: {}", COLUMNS.join(", ")),
        format!("{:>4}  {:<10}  {:>10}", "", COLUMNS[0], COLUMNS[1]),
    ];
    out.extend(
        series
            .points
            .iter()
            .take(PREVIEW_ROWS)
            .enumerate()
            .map(|(i, p)| {
                let date = p.date.format("%Y-%m-%d").to_string();
                format!("{i:>4}  {date:<10}  {:>10.2}", p.value)
            }),
    );
    if series.len() > PREVIEW_ROWS {
        out.push(format!("      … {} more rows", series.len() - PREVIEW_ROWS));
    }
    if let (Some((first, last)), Some((lo, hi))) = (series.date_span(), series.value_span()) {
        out.push(format!("Range: {first} to {last}, {lo:.2} to {hi:.2}"));
    }
    out
}

pub fn snapshot_line(snapshot: &ChartSnapshot) -> String {
    format!(
        "Chart screenshot captured ({}×{} px)",
        snapshot.width(),
        snapshot.height()
    )
}

pub fn history_lines(history: &ChartHistory) -> Vec<String> {
    match history {
        ChartHistory::Series(series) => series_lines(series),
        ChartHistory::Snapshot(snapshot) => vec![snapshot_line(snapshot)],
    }
}
