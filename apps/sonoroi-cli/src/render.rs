use std::io::Stdout;

use crossterm::{
    execute,
    terminal::{disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen},
};
use ratatui::{
    backend::CrosstermBackend,
    layout::Rect,
    style::{Color, Style},
    text::{Line, Span},
    Terminal,
};
use sonoroi_types::{
    geometry::Vertex,
    grid::{Frame, GridShape, RoiMask},
    SonoError,
};

pub type Tui = Terminal<CrosstermBackend<Stdout>>;

/// Runs `body` inside the alternate screen and always restores the terminal.
pub fn with_terminal<T>(body: impl FnOnce(&mut Tui) -> Result<T, SonoError>) -> Result<T, SonoError> {
    enable_raw_mode().map_err(tui_error)?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen).map_err(tui_error)?;
    let backend = CrosstermBackend::new(stdout);
    let mut terminal = Terminal::new(backend).map_err(tui_error)?;
    terminal.hide_cursor().map_err(tui_error)?;

    let res = body(&mut terminal);

    terminal.show_cursor().map_err(tui_error)?;
    disable_raw_mode().map_err(tui_error)?;
    execute!(terminal.backend_mut(), LeaveAlternateScreen).map_err(tui_error)?;
    res
}

pub fn tui_error(err: impl std::fmt::Display) -> SonoError {
    SonoError::Capture(format!("terminal error: {err}"))
}

/// Maps image pixels onto terminal cells, one sample per cell.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Viewport {
    pub width: u16,
    pub height: u16,
    pub scale_x: f64,
    pub scale_y: f64,
}

impl Viewport {
    /// Largest view of `shape` that fits in `area` without upscaling.
    pub fn fit(shape: GridShape, area: Rect) -> Self {
        let scale_x = (shape.cols as f64 / area.width.max(1) as f64).max(1.0);
        let scale_y = (shape.rows as f64 / area.height.max(1) as f64).max(1.0);
        Self {
            width: (shape.cols as f64 / scale_x).floor() as u16,
            height: (shape.rows as f64 / scale_y).floor() as u16,
            scale_x,
            scale_y,
        }
    }

    /// Pixel `(row, col)` sampled by terminal cell `(cx, cy)`.
    pub fn pixel_at(&self, cx: u16, cy: u16) -> (usize, usize) {
        let row = ((cy as f64 + 0.5) * self.scale_y).floor() as usize;
        let col = ((cx as f64 + 0.5) * self.scale_x).floor() as usize;
        (row, col)
    }

    /// Terminal cell that shows image point `v`.
    pub fn cell_of(&self, v: Vertex) -> (u16, u16) {
        let cx = (v.x.max(0.0) / self.scale_x).floor() as u16;
        let cy = (v.y.max(0.0) / self.scale_y).floor() as u16;
        (cx.min(self.width.saturating_sub(1)), cy.min(self.height.saturating_sub(1)))
    }
}

/// Glyph drawn on top of the raster at an image point.
pub struct Marker {
    pub at: Vertex,
    pub glyph: &'static str,
    pub color: Color,
}

/// Renders `frame` as gray cells, tinting ROI cells of `overlay` green.
pub fn frame_lines(
    frame: &Frame,
    viewport: Viewport,
    overlay: Option<&RoiMask>,
    markers: &[Marker],
) -> Vec<Line<'static>> {
    let peak = frame.cells().iter().copied().fold(0.0_f64, f64::max);
    let gain = if peak > 0.0 { 255.0 / peak } else { 0.0 };

    (0..viewport.height)
        .map(|cy| {
            let spans: Vec<Span> = (0..viewport.width)
                .map(|cx| {
                    let (row, col) = viewport.pixel_at(cx, cy);
                    let level = frame.get(row, col).map(|v| (v * gain).clamp(0.0, 255.0)).unwrap_or(0.0) as u8;
                    let in_roi = overlay.map(|mask| !mask.is_excluded(row, col)).unwrap_or(false);
                    let background = if in_roi {
                        Color::Rgb(level / 2, level / 2 + 110, level / 2)
                    } else {
                        Color::Rgb(level, level, level)
                    };
                    let marker = markers.iter().rev().find(|m| viewport.cell_of(m.at) == (cx, cy));
                    match marker {
                        Some(m) => Span::styled(m.glyph, Style::default().fg(m.color).bg(background)),
                        None => Span::styled(" ", Style::default().bg(background)),
                    }
                })
                .collect();
            Line::from(spans)
        })
        .collect()
}
