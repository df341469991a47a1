use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SonoError};

/// Raster dimensions shared by every frame and the mask of a run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GridShape {
    pub rows: usize,
    pub cols: usize,
}

impl GridShape {
    pub const fn new(rows: usize, cols: usize) -> Self {
        Self { rows, cols }
    }

    pub fn cell_count(&self) -> usize {
        self.rows * self.cols
    }

    pub fn index(&self, row: usize, col: usize) -> Option<usize> {
        if row < self.rows && col < self.cols {
            Some(row * self.cols + col)
        } else {
            None
        }
    }

    pub fn ensure_matches(&self, actual: GridShape, context: impl Into<String>) -> Result<()> {
        if *self == actual {
            Ok(())
        } else {
            Err(SonoError::shape_mismatch(context, *self, actual))
        }
    }
}

impl fmt::Display for GridShape {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}x{}", self.rows, self.cols)
    }
}

/// Row-major 2D grid of cells.
///
/// Deserialization goes through [`Grid::from_vec`], so a decoded grid always
/// holds exactly `shape.cell_count()` cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(
    try_from = "RawGrid<T>",
    bound(deserialize = "T: Deserialize<'de>")
)]
pub struct Grid<T> {
    shape: GridShape,
    cells: Vec<T>,
}

#[derive(Deserialize)]
struct RawGrid<T> {
    shape: GridShape,
    cells: Vec<T>,
}

impl<T> TryFrom<RawGrid<T>> for Grid<T> {
    type Error = SonoError;

    fn try_from(raw: RawGrid<T>) -> Result<Self> {
        Grid::from_vec(raw.shape, raw.cells)
    }
}

impl<T: Clone> Grid<T> {
    pub fn filled(shape: GridShape, value: T) -> Self {
        Self {
            shape,
            cells: vec![value; shape.cell_count()],
        }
    }
}

impl<T> Grid<T> {
    pub fn from_vec(shape: GridShape, cells: Vec<T>) -> Result<Self> {
        if cells.len() != shape.cell_count() {
            return Err(SonoError::CellCount {
                shape,
                cells: cells.len(),
            });
        }
        Ok(Self { shape, cells })
    }

    pub fn from_fn(shape: GridShape, mut f: impl FnMut(usize, usize) -> T) -> Self {
        let mut cells = Vec::with_capacity(shape.cell_count());
        for row in 0..shape.rows {
            for col in 0..shape.cols {
                cells.push(f(row, col));
            }
        }
        Self { shape, cells }
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn get(&self, row: usize, col: usize) -> Option<&T> {
        self.shape.index(row, col).and_then(|idx| self.cells.get(idx))
    }

    pub fn cells(&self) -> &[T] {
        &self.cells
    }
}

/// One grayscale time slice of the video.
pub type Frame = Grid<f64>;

/// Boolean grid where `true` marks a cell excluded from every reduction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoiMask {
    excluded: Grid<bool>,
}

impl RoiMask {
    pub fn new(excluded: Grid<bool>) -> Self {
        Self { excluded }
    }

    /// Mask that excludes every cell.
    pub fn all_excluded(shape: GridShape) -> Self {
        Self::new(Grid::filled(shape, true))
    }

    pub fn shape(&self) -> GridShape {
        self.excluded.shape()
    }

    pub fn is_excluded(&self, row: usize, col: usize) -> bool {
        self.excluded.get(row, col).copied().unwrap_or(true)
    }

    pub fn excluded(&self) -> &Grid<bool> {
        &self.excluded
    }

    pub fn included_count(&self) -> usize {
        self.excluded.cells().iter().filter(|excluded| !**excluded).count()
    }

    pub fn is_empty(&self) -> bool {
        self.included_count() == 0
    }
}

/// Decoded video: grayscale frames in acquisition order, all of one shape.
#[derive(Debug, Clone, PartialEq)]
pub struct Video {
    shape: GridShape,
    frames: Vec<Frame>,
}

impl Video {
    pub fn new(shape: GridShape, frames: Vec<Frame>) -> Result<Self> {
        for (index, frame) in frames.iter().enumerate() {
            shape.ensure_matches(frame.shape(), format!("video frame {index}"))?;
        }
        Ok(Self { shape, frames })
    }

    pub fn shape(&self) -> GridShape {
        self.shape
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }

    pub fn frames(&self) -> &[Frame] {
        &self.frames
    }

    pub fn frame(&self, index: usize) -> Result<&Frame> {
        self.frames.get(index).ok_or_else(|| {
            SonoError::Video(format!(
                "frame index {index} out of range (video has {} frames)",
                self.frames.len()
            ))
        })
    }
}
