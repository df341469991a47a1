use thiserror::Error;

use crate::grid::GridShape;

pub type Result<T, E = SonoError> = std::result::Result<T, E>;

/// Unified error type covering common failure scenarios across subsystems.
#[derive(Debug, Error)]
pub enum SonoError {
    #[error("shape mismatch in {context}: expected {expected}, got {actual}")]
    ShapeMismatch {
        context: String,
        expected: GridShape,
        actual: GridShape,
    },
    #[error("grid {shape} needs {} cells, got {cells}", .shape.cell_count())]
    CellCount { shape: GridShape, cells: usize },
    #[error("region of interest excludes every cell; no samples to average")]
    EmptyRoi,
    #[error("degenerate polygon with {vertices} vertices encloses no area")]
    DegeneratePolygon { vertices: usize },
    #[error("boundary capture aborted by operator")]
    CaptureAborted,
    #[error("configuration error: {0}")]
    Configuration(String),
    #[error("video error: {0}")]
    Video(String),
    #[error("capture error: {0}")]
    Capture(String),
    #[error("operational error: {0}")]
    Ops(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl SonoError {
    pub fn shape_mismatch(
        context: impl Into<String>,
        expected: GridShape,
        actual: GridShape,
    ) -> Self {
        SonoError::ShapeMismatch {
            context: context.into(),
            expected,
            actual,
        }
    }
}
