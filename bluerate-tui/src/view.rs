use crate::{raster::raster_lines, report, styles, transcript::TranscriptLine};
use anyhow::Result;
use bluerate_common::{ChartHistory, HistoricalSeries};
use chrono::{Datelike, NaiveDate};
use ratatui::{
    Frame, Terminal,
    backend::CrosstermBackend,
    layout::{Alignment, Constraint, Direction, Layout, Position, Rect},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{
        Axis, Block, Borders, Chart, Clear, Dataset, GraphType, List, ListItem, Paragraph, Wrap,
    },
};
use std::io::Stdout;
use textwrap::wrap;

/// What the right-hand column currently shows.
pub enum ChartPanel {
    Empty,
    Loading,
    Ready(ChartHistory),
    Failed(String),
}

/// Which branch of the interaction is running, if any.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Activity {
    Idle,
    FetchingRates,
    FetchingHistory,
}

pub struct ViewSnap<'a> {
    pub input: &'a str,
    pub input_cursor: usize,
    pub lines: &'a [TranscriptLine],
    pub scroll: usize,
    pub activity: Activity,
    pub spinner: &'static str,
    pub chart: &'a ChartPanel,
    pub settings: String,
    pub source: &'a str,
}

pub fn draw(term: &mut Terminal<CrosstermBackend<Stdout>>, snap: &ViewSnap<'_>) -> Result<()> {
    term.draw(|frame| {
        let area = frame.area();

        let layout = Layout::default()
            .direction(Direction::Vertical)
            .constraints([
                Constraint::Length(1),
                Constraint::Min(6),
                Constraint::Length(3),
                Constraint::Length(3),
                Constraint::Length(1),
            ])
            .split(area);

        let header = Paragraph::new(Line::from(vec![Span::styled(
            " Dollar to Pesos Exchange Rate ",
            Style::default()
                .fg(Color::Cyan)
                .add_modifier(Modifier::BOLD),
        )]));
        frame.render_widget(header, layout[0]);

        let columns = Layout::default()
            .direction(Direction::Horizontal)
            .constraints([Constraint::Ratio(1, 3), Constraint::Ratio(2, 3)])
            .split(layout[1]);

        draw_transcript(frame, columns[0], snap);
        draw_chart_panel(frame, columns[1], snap);

        let input_box = Paragraph::new(snap.input).block(
            Block::default()
                .borders(Borders::ALL)
                .title(" Dollars to exchange (or /help) "),
        );
        frame.render_widget(Clear, layout[2]);
        frame.render_widget(input_box, layout[2]);

        let caret_x = layout[2].x + 1 + visual_caret_col(snap.input, snap.input_cursor);
        let caret_y = layout[2].y + 1;
        frame.set_cursor_position(Position {
            x: caret_x,
            y: caret_y,
        });

        let state = match snap.activity {
            Activity::Idle => Span::styled("Idle", Style::default().fg(Color::Green)),
            Activity::FetchingRates => {
                Span::styled("Fetching exchange rates…", Style::default().fg(Color::Yellow))
            }
            Activity::FetchingHistory => {
                Span::styled("Fetching historical data…", Style::default().fg(Color::Yellow))
            }
        };
        let status_line = Line::from(vec![
            Span::raw(" "),
            Span::styled(snap.spinner, Style::default().fg(Color::Yellow)),
            Span::raw(" "),
            state,
            Span::styled(format!(" • {}", snap.settings), styles::dim()),
        ]);
        let status = Paragraph::new(status_line)
            .block(Block::default().borders(Borders::ALL).title(" Status "));
        frame.render_widget(status, layout[3]);

        let footer = Paragraph::new(Line::from(vec![
            Span::styled(" Data source: ", styles::dim()),
            Span::styled(format!("Blue Dollar ({})", snap.source), styles::value()),
        ]));
        frame.render_widget(footer, layout[4]);
    })?;

    Ok(())
}

fn draw_transcript(frame: &mut Frame<'_>, area: Rect, snap: &ViewSnap<'_>) {
    let visible_h = area.height.saturating_sub(2) as usize;
    let content_width = area.width.saturating_sub(2) as usize;
    let wrapped = wrap_transcript(snap.lines, content_width);
    let total = wrapped.len();
    let scroll = snap.scroll.min(total.saturating_sub(visible_h));
    let start = total.saturating_sub(visible_h + scroll);
    let end = total.saturating_sub(scroll);

    let items: Vec<ListItem> = wrapped[start..end]
        .iter()
        .map(|(text, style)| ListItem::new(Line::from(Span::styled(text.clone(), *style))))
        .collect();

    let body = List::new(items).block(Block::default().borders(Borders::ALL).title(" Rates "));
    frame.render_widget(body, area);
}

fn draw_chart_panel(frame: &mut Frame<'_>, area: Rect, snap: &ViewSnap<'_>) {
    let block = Block::default()
        .borders(Borders::ALL)
        .title(format!(" {} ", report::CHART_CAPTION));

    match snap.chart {
        ChartPanel::Ready(ChartHistory::Series(series)) if !series.is_empty() => {
            let points = plot_points(series);
            frame.render_widget(series_chart(series, &points, block), area);
        }
        ChartPanel::Ready(ChartHistory::Snapshot(snapshot)) => {
            let inner = block.inner(area);
            frame.render_widget(block, area);
            let lines = raster_lines(&snapshot.image, inner.width, inner.height);
            frame.render_widget(Paragraph::new(lines), inner);
        }
        other => {
            let (text, style) = match other {
                ChartPanel::Loading => (
                    format!("{} Fetching historical data…", snap.spinner),
                    Style::default().fg(Color::Yellow),
                ),
                ChartPanel::Failed(msg) => (msg.clone(), styles::error()),
                _ => (
                    "Enter an amount and press Enter to load the chart.".to_string(),
                    styles::dim(),
                ),
            };
            let p = Paragraph::new(text)
                .style(style)
                .alignment(Alignment::Center)
                .wrap(Wrap { trim: true })
                .block(block);
            frame.render_widget(p, area);
        }
    }
}

/// Plot coordinates ordered by date; x is the day number since the common era.
fn plot_points(series: &HistoricalSeries) -> Vec<(f64, f64)> {
    let mut points: Vec<(f64, f64)> = series
        .points
        .iter()
        .map(|p| (p.date.num_days_from_ce() as f64, p.value))
        .collect();
    points.sort_by(|a, b| a.0.total_cmp(&b.0));
    points
}

fn series_chart<'a>(
    series: &HistoricalSeries,
    points: &'a [(f64, f64)],
    block: Block<'a>,
) -> Chart<'a> {
    let (x_lo, x_hi) = match series.date_span() {
        Some((first, last)) => (first, last),
        None => return Chart::new(Vec::new()).block(block),
    };
    let (y_lo, y_hi) = series.value_span().unwrap_or((0.0, 1.0));
    let pad = ((y_hi - y_lo) * 0.05).max(1.0);
    let (y_lo, y_hi) = (y_lo - pad, y_hi + pad);
    let x_bounds = [
        x_lo.num_days_from_ce() as f64,
        (x_hi.num_days_from_ce() as f64).max(x_lo.num_days_from_ce() as f64 + 1.0),
    ];
    let x_mid = x_lo + (x_hi - x_lo) / 2;

    let dataset = Dataset::default()
        .name("value")
        .marker(symbols::Marker::Braille)
        .graph_type(GraphType::Line)
        .style(styles::chart_line())
        .data(points);

    Chart::new(vec![dataset])
        .block(block)
        .x_axis(
            Axis::default()
                .style(styles::dim())
                .bounds(x_bounds)
                .labels(vec![date_label(x_lo), date_label(x_mid), date_label(x_hi)]),
        )
        .y_axis(
            Axis::default()
                .style(styles::dim())
                .bounds([y_lo, y_hi])
                .labels(vec![
                    format!("{y_lo:.0}"),
                    format!("{:.0}", (y_lo + y_hi) / 2.0),
                    format!("{y_hi:.0}"),
                ]),
        )
}

fn date_label(d: NaiveDate) -> String {
    d.format("%b %Y").to_string()
}

fn visual_caret_col(input: &str, cursor: usize) -> u16 {
    use unicode_width::UnicodeWidthStr;
    UnicodeWidthStr::width(&input[..cursor]) as u16
}

fn wrap_transcript(lines: &[TranscriptLine], width: usize) -> Vec<(String, Style)> {
    let effective_width = width.max(1);
    let mut out = Vec::new();

    for entry in lines {
        let style = entry.style;
        for raw_line in entry.text.split('\n') {
            let segments = wrap(raw_line, effective_width);
            if segments.is_empty() {
                out.push((String::new(), style));
            } else {
                out.extend(segments.into_iter().map(|seg| (seg.into_owned(), style)));
            }
        }
    }

    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wrapping_keeps_blank_lines_and_style() {
        let lines = vec![
            TranscriptLine {
                text: "Buy Rate: 1180.5".into(),
                style: styles::rate_text(),
            },
            TranscriptLine {
                text: String::new(),
                style: Style::default(),
            },
        ];
        let out = wrap_transcript(&lines, 9);
        assert_eq!(out.len(), 3);
        assert_eq!(out[0].0, "Buy Rate:");
        assert_eq!(out[0].1, styles::rate_text());
        assert_eq!(out[2].0, "");
    }

    #[test]
    fn plot_points_are_date_ordered() {
        use bluerate_common::HistoryPoint;
        let d = |s: &str| NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap();
        let series = HistoricalSeries::new(vec![
            HistoryPoint {
                date: d("2024-03-01"),
                value: 3.0,
            },
            HistoryPoint {
                date: d("2024-01-01"),
                value: 1.0,
            },
        ]);
        let points = plot_points(&series);
        assert!(points[0].0 < points[1].0);
        assert_eq!(points[0].1, 1.0);
        assert_eq!(series.points[0].value, 3.0);
    }

    #[test]
    fn caret_counts_display_width() {
        assert_eq!(visual_caret_col("$1,000", 6), 6);
        assert_eq!(visual_caret_col("ñandú", "ñandú".len()), 5);
    }
}
