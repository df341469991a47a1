use std::io::Write;

use async_trait::async_trait;
use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout},
    style::{Color, Modifier, Style},
    symbols,
    text::{Line, Span},
    widgets::{Axis, Block, Borders, Chart, Dataset, GraphType, Paragraph},
};
use sonoroi_orchestrator::{AnalysisReport, ReportSink};
use sonoroi_types::{series::IntensitySeries, Result, SonoError};
use tracing::info;

use crate::render::{frame_lines, tui_error, with_terminal, Tui, Viewport};

/// Intensity-vs-frame chart with the reference frame shown bare and with the
/// ROI overlay. Blocks until the operator presses `q`.
pub struct TerminalPlot;

#[async_trait]
impl ReportSink for TerminalPlot {
    async fn present(&mut self, report: &AnalysisReport) -> Result<()> {
        let report = report.clone();
        tokio::task::spawn_blocking(move || with_terminal(|terminal| plot_loop(terminal, &report)))
            .await
            .map_err(|err| SonoError::Ops(format!("plot task failed: {err}")))?
    }
}

fn plot_loop(terminal: &mut Tui, report: &AnalysisReport) -> Result<()> {
    let points = report.series.points();
    let (x_bounds, y_bounds) = chart_bounds(&report.series);
    let summary = format!(
        "{}  frames {}  ROI cells {}  mask {} ms  reduce {} ms",
        report.source,
        report.series.len(),
        report.mask.included_count(),
        report.timings.mask_ms,
        report.timings.reduce_ms
    );

    loop {
        terminal
            .draw(|f| {
                let rows = Layout::default()
                    .direction(Direction::Vertical)
                    .constraints(
                        [
                            Constraint::Length(3),
                            Constraint::Percentage(55),
                            Constraint::Min(0),
                        ]
                        .as_ref(),
                    )
                    .split(f.size());

                let header = Paragraph::new(Line::from(vec![
                    Span::styled(
                        "Pixel intensity",
                        Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                    ),
                    Span::raw("  "),
                    Span::raw(summary.clone()),
                    Span::raw("  "),
                    Span::styled("q", Style::default().fg(Color::Yellow)),
                    Span::raw(" to close"),
                ]))
                .block(Block::default().borders(Borders::ALL).title("Summary"));
                f.render_widget(header, rows[0]);

                let dataset = Dataset::default()
                    .name("ROI mean")
                    .marker(symbols::Marker::Braille)
                    .graph_type(GraphType::Line)
                    .style(Style::default().fg(Color::Green))
                    .data(&points);
                let chart = Chart::new(vec![dataset])
                    .block(Block::default().borders(Borders::ALL).title("Intensity vs frame"))
                    .x_axis(
                        Axis::default()
                            .title("Number of frames")
                            .bounds(x_bounds)
                            .labels(axis_labels(x_bounds, 0)),
                    )
                    .y_axis(
                        Axis::default()
                            .title("Pixel intensity")
                            .bounds(y_bounds)
                            .labels(axis_labels(y_bounds, 1)),
                    );
                f.render_widget(chart, rows[1]);

                let panes = Layout::default()
                    .direction(Direction::Horizontal)
                    .constraints([Constraint::Percentage(50), Constraint::Percentage(50)].as_ref())
                    .split(rows[2]);
                for (pane, overlay, title) in [
                    (panes[0], None, format!("Frame {}", report.reference_index)),
                    (panes[1], Some(&report.mask), "With ROI".to_string()),
                ] {
                    let block = Block::default().borders(Borders::ALL).title(title);
                    let viewport = Viewport::fit(report.shape, block.inner(pane));
                    f.render_widget(
                        Paragraph::new(frame_lines(&report.reference, viewport, overlay, &[]))
                            .block(block),
                        pane,
                    );
                }
            })
            .map_err(tui_error)?;

        if event::poll(std::time::Duration::from_millis(100)).map_err(tui_error)? {
            if let CEvent::Key(key) = event::read().map_err(tui_error)? {
                if key.kind == KeyEventKind::Press
                    && matches!(key.code, KeyCode::Char('q') | KeyCode::Esc)
                {
                    return Ok(());
                }
            }
        }
    }
}

/// Axis bounds covering the whole series, widened when flat.
fn chart_bounds(series: &IntensitySeries) -> ([f64; 2], [f64; 2]) {
    let x_max = series.len().saturating_sub(1).max(1) as f64;
    let (lo, hi) = series.range().unwrap_or((0.0, 1.0));
    let pad = if hi > lo { (hi - lo) * 0.05 } else { 1.0 };
    ([0.0, x_max], [lo - pad, hi + pad])
}

fn axis_labels(bounds: [f64; 2], precision: usize) -> Vec<Span<'static>> {
    let mid = (bounds[0] + bounds[1]) / 2.0;
    [bounds[0], mid, bounds[1]]
        .iter()
        .map(|v| Span::raw(format!("{v:.precision$}")))
        .collect()
}

/// Writes the report summary as pretty JSON to stdout.
pub struct JsonSink;

#[async_trait]
impl ReportSink for JsonSink {
    async fn present(&mut self, report: &AnalysisReport) -> Result<()> {
        let doc = serde_json::to_string_pretty(&report.summary())
            .map_err(|err| SonoError::Ops(format!("failed to encode summary: {err}")))?;
        let mut stdout = std::io::stdout().lock();
        writeln!(stdout, "{doc}")
            .map_err(|err| SonoError::Ops(format!("failed to write summary: {err}")))?;
        info!("Wrote JSON summary for run {}", report.run_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bounds_cover_series() {
        let (x, y) = chart_bounds(&IntensitySeries::new(vec![10.0, 30.0, 20.0]));
        assert_eq!(x, [0.0, 2.0]);
        assert!(y[0] < 10.0 && y[1] > 30.0);
    }

    #[test]
    fn flat_and_single_point_series_get_room() {
        let (x, y) = chart_bounds(&IntensitySeries::new(vec![5.0]));
        assert_eq!(x, [0.0, 1.0]);
        assert_eq!(y, [4.0, 6.0]);
    }

    #[test]
    fn labels_use_requested_precision() {
        let labels = axis_labels([0.0, 4.0], 1);
        let texts: Vec<String> = labels.iter().map(|s| s.content.to_string()).collect();
        assert_eq!(texts, vec!["0.0", "2.0", "4.0"]);
    }
}
