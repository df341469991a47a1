//! Boundary capture: obtains exactly one confirmed ROI polygon per run.

use async_trait::async_trait;
use sonoroi_roi::rasterize;
use sonoroi_types::{
    geometry::{PolygonBoundary, Vertex},
    grid::{Frame, RoiMask},
    Result, SonoError,
};
use tracing::{info, warn};

/// Result of a capture: one immutable boundary, or an operator abort.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    Confirmed(PolygonBoundary),
    Aborted,
}

/// Operator verdict on a drafted boundary.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Review {
    Accept,
    Redraw,
    Abort,
}

#[async_trait]
pub trait BoundaryCapture: Send + Sync {
    async fn capture(&mut self, reference: &Frame) -> Result<CaptureOutcome>;
}

#[async_trait]
impl BoundaryCapture for Box<dyn BoundaryCapture> {
    async fn capture(&mut self, reference: &Frame) -> Result<CaptureOutcome> {
        (**self).capture(reference).await
    }
}

/// Blocking, operator-facing half of a capture.
///
/// `draft` returns `None` when the operator quits while drawing.
pub trait CaptureSession: Send {
    fn draft(&mut self, reference: &Frame) -> Result<Option<PolygonBoundary>>;

    fn review(
        &mut self,
        reference: &Frame,
        draft: &PolygonBoundary,
        preview: &RoiMask,
    ) -> Result<Review>;

    /// Called when a draft encloses no area and has to be drawn again.
    fn reject_degenerate(&mut self, _draft: &PolygonBoundary, _reason: &SonoError) -> Result<()> {
        Ok(())
    }
}

/// Drives draft -> review until the operator accepts or aborts.
pub fn run_session<S: CaptureSession + ?Sized>(
    session: &mut S,
    reference: &Frame,
) -> Result<CaptureOutcome> {
    let mut attempt = 0u32;
    loop {
        attempt += 1;
        let Some(draft) = session.draft(reference)? else {
            info!("Boundary capture aborted while drawing (attempt {attempt})");
            return Ok(CaptureOutcome::Aborted);
        };

        if let Err(reason) = draft.ensure_area() {
            warn!("Discarding draft {attempt}: {reason}");
            session.reject_degenerate(&draft, &reason)?;
            continue;
        }

        let preview = rasterize(&draft, reference, reference.shape())?;
        match session.review(reference, &draft, &preview)? {
            Review::Accept => {
                info!(
                    "Boundary confirmed after {attempt} attempt(s): {} vertices, {} cells",
                    draft.len(),
                    preview.included_count()
                );
                return Ok(CaptureOutcome::Confirmed(draft));
            }
            Review::Redraw => info!("Operator rejected draft {attempt}; redrawing"),
            Review::Abort => {
                info!("Boundary capture aborted at review (attempt {attempt})");
                return Ok(CaptureOutcome::Aborted);
            }
        }
    }
}

/// Capture backed by a preset boundary, for batch runs.
pub struct ScriptedCapture {
    boundary: Option<PolygonBoundary>,
}

impl ScriptedCapture {
    pub fn new(boundary: PolygonBoundary) -> Self {
        Self {
            boundary: Some(boundary),
        }
    }

    /// Capture that always reports an operator abort.
    pub fn aborting() -> Self {
        Self { boundary: None }
    }
}

#[async_trait]
impl BoundaryCapture for ScriptedCapture {
    async fn capture(&mut self, _reference: &Frame) -> Result<CaptureOutcome> {
        Ok(match &self.boundary {
            Some(boundary) => {
                info!("Using preset boundary with {} vertices", boundary.len());
                CaptureOutcome::Confirmed(boundary.clone())
            }
            None => CaptureOutcome::Aborted,
        })
    }
}

/// Runs a blocking [`CaptureSession`] on the blocking thread pool.
pub struct InteractiveCapture<S> {
    session: Option<S>,
}

impl<S> InteractiveCapture<S>
where
    S: CaptureSession + Sync + 'static,
{
    pub fn new(session: S) -> Self {
        Self {
            session: Some(session),
        }
    }
}

#[async_trait]
impl<S> BoundaryCapture for InteractiveCapture<S>
where
    S: CaptureSession + Sync + 'static,
{
    async fn capture(&mut self, reference: &Frame) -> Result<CaptureOutcome> {
        let mut session = self
            .session
            .take()
            .ok_or_else(|| capture_error("capture session is already running"))?;
        let reference = reference.clone();
        let (session, outcome) = tokio::task::spawn_blocking(move || {
            let outcome = run_session(&mut session, &reference);
            (session, outcome)
        })
        .await
        .map_err(|err| capture_error(format!("capture task failed: {err}")))?;
        self.session = Some(session);
        outcome
    }
}

/// Parses `x,y;x,y;...` into a boundary of at least three finite vertices.
pub fn parse_boundary(text: &str) -> Result<PolygonBoundary> {
    let mut vertices = Vec::new();
    for pair in text.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (x, y) = pair
            .split_once(',')
            .ok_or_else(|| capture_error(format!("vertex '{pair}' is not of the form x,y")))?;
        let x = parse_coordinate(x, pair)?;
        let y = parse_coordinate(y, pair)?;
        vertices.push(Vertex::new(x, y));
    }
    if vertices.len() < 3 {
        return Err(capture_error(format!(
            "boundary needs at least 3 vertices, got {}",
            vertices.len()
        )));
    }
    Ok(PolygonBoundary::new(vertices))
}

fn parse_coordinate(raw: &str, pair: &str) -> Result<f64> {
    raw.trim()
        .parse::<f64>()
        .ok()
        .filter(|v| v.is_finite())
        .ok_or_else(|| capture_error(format!("invalid coordinate '{}' in '{pair}'", raw.trim())))
}

pub fn capture_error(message: impl Into<String>) -> SonoError {
    SonoError::Capture(message.into())
}
