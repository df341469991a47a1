use std::time::Duration;

use crossterm::event::{self, Event as CEvent, KeyCode, KeyEventKind};
use ratatui::{
    layout::{Constraint, Direction, Layout, Rect},
    style::{Color, Modifier, Style},
    text::{Line, Span},
    widgets::{Block, Borders, Paragraph},
};
use sonoroi_capture::{CaptureSession, Review};
use sonoroi_roi::rasterize;
use sonoroi_types::{
    geometry::{PolygonBoundary, Vertex},
    grid::{Frame, RoiMask},
    Result, SonoError,
};

use crate::render::{frame_lines, tui_error, with_terminal, Marker, Tui, Viewport};

const POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Keyboard-driven polygon capture over the reference frame.
#[derive(Default)]
pub struct TerminalSession {
    notice: Option<String>,
}

impl TerminalSession {
    pub fn new() -> Self {
        Self::default()
    }
}

/// Draft state while the operator places vertices.
struct Draft {
    cursor: Vertex,
    vertices: Vec<Vertex>,
}

enum DraftKey {
    Continue,
    Finish,
    Quit,
}

impl Draft {
    fn new(reference: &Frame) -> Self {
        let shape = reference.shape();
        Self {
            cursor: Vertex::new((shape.cols / 2) as f64, (shape.rows / 2) as f64),
            vertices: Vec::new(),
        }
    }

    fn handle(&mut self, code: KeyCode, viewport: Viewport, reference: &Frame) -> DraftKey {
        let shape = reference.shape();
        let max_x = shape.cols.saturating_sub(1) as f64;
        let max_y = shape.rows.saturating_sub(1) as f64;
        let (dx, dy) = match code {
            KeyCode::Left => (-viewport.scale_x, 0.0),
            KeyCode::Right => (viewport.scale_x, 0.0),
            KeyCode::Up => (0.0, -viewport.scale_y),
            KeyCode::Down => (0.0, viewport.scale_y),
            KeyCode::Char(' ') => {
                self.vertices.push(self.cursor);
                return DraftKey::Continue;
            }
            KeyCode::Backspace => {
                self.vertices.pop();
                return DraftKey::Continue;
            }
            KeyCode::Char('r') => {
                self.vertices.clear();
                return DraftKey::Continue;
            }
            KeyCode::Enter => return DraftKey::Finish,
            KeyCode::Char('q') | KeyCode::Esc => return DraftKey::Quit,
            _ => return DraftKey::Continue,
        };
        self.cursor = Vertex::new(
            (self.cursor.x + dx).clamp(0.0, max_x),
            (self.cursor.y + dy).clamp(0.0, max_y),
        );
        DraftKey::Continue
    }

    fn boundary(&self) -> PolygonBoundary {
        PolygonBoundary::new(self.vertices.clone())
    }

    fn markers(&self) -> Vec<Marker> {
        let mut markers: Vec<Marker> = self
            .vertices
            .iter()
            .map(|v| Marker {
                at: *v,
                glyph: "o",
                color: Color::Yellow,
            })
            .collect();
        markers.push(Marker {
            at: self.cursor,
            glyph: "+",
            color: Color::Red,
        });
        markers
    }
}

impl CaptureSession for TerminalSession {
    fn draft(&mut self, reference: &Frame) -> Result<Option<PolygonBoundary>> {
        let notice = self.notice.take();
        with_terminal(|terminal| {
            let mut draft = Draft::new(reference);
            loop {
                let boundary = draft.boundary();
                let preview = live_preview(&boundary, reference)?;
                let status = format!(
                    "cursor ({:.0}, {:.0})  vertices {}",
                    draft.cursor.x,
                    draft.cursor.y,
                    draft.vertices.len()
                );
                let viewport = draw(
                    terminal,
                    reference,
                    preview.as_ref(),
                    &draft.markers(),
                    "Draw ROI",
                    &status,
                    notice.as_deref(),
                    "arrows move  space add vertex  backspace undo  r reset  enter finish  q quit",
                )?;

                if let Some(code) = next_key()? {
                    match draft.handle(code, viewport, reference) {
                        DraftKey::Continue => {}
                        DraftKey::Finish => return Ok(Some(boundary)),
                        DraftKey::Quit => return Ok(None),
                    }
                }
            }
        })
    }

    fn review(
        &mut self,
        reference: &Frame,
        draft: &PolygonBoundary,
        preview: &RoiMask,
    ) -> Result<Review> {
        let markers: Vec<Marker> = draft
            .vertices()
            .iter()
            .map(|v| Marker {
                at: *v,
                glyph: "o",
                color: Color::Yellow,
            })
            .collect();
        let status = format!(
            "{} vertices  {} cells in ROI",
            draft.len(),
            preview.included_count()
        );
        with_terminal(|terminal| loop {
            draw(
                terminal,
                reference,
                Some(preview),
                &markers,
                "Is this ROI correct?",
                &status,
                None,
                "y accept  n redraw  q quit",
            )?;
            if let Some(code) = next_key()? {
                match code {
                    KeyCode::Char('y') | KeyCode::Char('Y') => return Ok(Review::Accept),
                    KeyCode::Char('n') | KeyCode::Char('N') => return Ok(Review::Redraw),
                    KeyCode::Char('q') | KeyCode::Esc => return Ok(Review::Abort),
                    _ => {}
                }
            }
        })
    }

    fn reject_degenerate(&mut self, _draft: &PolygonBoundary, reason: &SonoError) -> Result<()> {
        self.notice = Some(format!("{reason}; draw at least 3 non-collinear vertices"));
        Ok(())
    }
}

fn live_preview(boundary: &PolygonBoundary, reference: &Frame) -> Result<Option<RoiMask>> {
    if boundary.is_degenerate() {
        return Ok(None);
    }
    rasterize(boundary, reference, reference.shape()).map(Some)
}

fn next_key() -> Result<Option<KeyCode>> {
    if !event::poll(POLL_INTERVAL).map_err(tui_error)? {
        return Ok(None);
    }
    match event::read().map_err(tui_error)? {
        CEvent::Key(key) if key.kind == KeyEventKind::Press => Ok(Some(key.code)),
        _ => Ok(None),
    }
}

#[allow(clippy::too_many_arguments)]
fn draw(
    terminal: &mut Tui,
    reference: &Frame,
    overlay: Option<&RoiMask>,
    markers: &[Marker],
    title: &str,
    status: &str,
    notice: Option<&str>,
    help: &str,
) -> Result<Viewport> {
    let mut viewport = Viewport::fit(reference.shape(), Rect::new(0, 0, 1, 1));
    terminal
        .draw(|f| {
            let chunks = Layout::default()
                .direction(Direction::Vertical)
                .constraints([Constraint::Length(3), Constraint::Min(0), Constraint::Length(3)].as_ref())
                .split(f.size());

            let mut header = vec![
                Span::styled(
                    title.to_string(),
                    Style::default().fg(Color::Cyan).add_modifier(Modifier::BOLD),
                ),
                Span::raw("  "),
                Span::raw(status.to_string()),
            ];
            if let Some(notice) = notice {
                header.push(Span::raw("  "));
                header.push(Span::styled(notice.to_string(), Style::default().fg(Color::Red)));
            }
            f.render_widget(
                Paragraph::new(Line::from(header))
                    .block(Block::default().borders(Borders::ALL).title("ROI")),
                chunks[0],
            );

            let block = Block::default().borders(Borders::ALL).title("Reference frame");
            let inner = block.inner(chunks[1]);
            viewport = Viewport::fit(reference.shape(), inner);
            f.render_widget(
                Paragraph::new(frame_lines(reference, viewport, overlay, markers)).block(block),
                chunks[1],
            );

            f.render_widget(
                Paragraph::new(Line::from(Span::styled(
                    help.to_string(),
                    Style::default().fg(Color::Yellow),
                )))
                .block(Block::default().borders(Borders::ALL)),
                chunks[2],
            );
        })
        .map_err(tui_error)?;
    Ok(viewport)
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoroi_types::grid::GridShape;

    #[test]
    fn draft_keys_place_and_undo_vertices() {
        let reference = Frame::filled(GridShape::new(10, 10), 1.0);
        let viewport = Viewport::fit(reference.shape(), Rect::new(0, 0, 40, 20));
        let mut draft = Draft::new(&reference);
        assert_eq!(draft.cursor, Vertex::new(5.0, 5.0));

        draft.handle(KeyCode::Char(' '), viewport, &reference);
        draft.handle(KeyCode::Right, viewport, &reference);
        draft.handle(KeyCode::Right, viewport, &reference);
        draft.handle(KeyCode::Char(' '), viewport, &reference);
        draft.handle(KeyCode::Down, viewport, &reference);
        draft.handle(KeyCode::Char(' '), viewport, &reference);
        assert_eq!(
            draft.vertices,
            vec![Vertex::new(5.0, 5.0), Vertex::new(7.0, 5.0), Vertex::new(7.0, 6.0)]
        );

        draft.handle(KeyCode::Backspace, viewport, &reference);
        assert_eq!(draft.vertices.len(), 2);
        assert!(matches!(
            draft.handle(KeyCode::Enter, viewport, &reference),
            DraftKey::Finish
        ));
        assert!(matches!(
            draft.handle(KeyCode::Esc, viewport, &reference),
            DraftKey::Quit
        ));
    }

    #[test]
    fn cursor_stays_on_the_frame() {
        let reference = Frame::filled(GridShape::new(3, 3), 1.0);
        let viewport = Viewport::fit(reference.shape(), Rect::new(0, 0, 40, 20));
        let mut draft = Draft::new(&reference);
        for _ in 0..10 {
            draft.handle(KeyCode::Left, viewport, &reference);
            draft.handle(KeyCode::Up, viewport, &reference);
        }
        assert_eq!(draft.cursor, Vertex::new(0.0, 0.0));
    }

    #[test]
    fn preview_only_for_enclosing_drafts() {
        let reference = Frame::filled(GridShape::new(4, 4), 1.0);
        let line: PolygonBoundary = vec![(0.0, 0.0), (3.0, 3.0)].into();
        assert!(live_preview(&line, &reference).expect("preview").is_none());
        let square: PolygonBoundary = vec![(0.5, 0.5), (2.5, 0.5), (2.5, 2.5), (0.5, 2.5)].into();
        let mask = live_preview(&square, &reference).expect("preview").expect("mask");
        assert_eq!(mask.included_count(), 4);
    }
}
