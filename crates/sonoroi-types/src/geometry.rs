use std::fmt;

use serde::{Deserialize, Serialize};

use crate::{Result, SonoError};

/// Relative tolerance for collinearity: a cross product no larger than this
/// fraction of the product of the two spanning lengths counts as zero.
const COLLINEAR_TOLERANCE: f64 = 1e-9;

/// Point in image space: `x` is the column axis, `y` the row axis.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub x: f64,
    pub y: f64,
}

impl Vertex {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

impl From<(f64, f64)> for Vertex {
    fn from((x, y): (f64, f64)) -> Self {
        Self::new(x, y)
    }
}

impl fmt::Display for Vertex {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},{}", self.x, self.y)
    }
}

/// Closed polygon boundary. The last vertex implicitly connects to the first.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PolygonBoundary {
    vertices: Vec<Vertex>,
}

impl PolygonBoundary {
    pub fn new(vertices: Vec<Vertex>) -> Self {
        Self { vertices }
    }

    pub fn vertices(&self) -> &[Vertex] {
        &self.vertices
    }

    pub fn len(&self) -> usize {
        self.vertices.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Iterates `(start, end)` pairs for every edge, including the closing edge.
    pub fn edges(&self) -> impl Iterator<Item = (Vertex, Vertex)> + '_ {
        let n = self.vertices.len();
        (0..n).map(move |i| (self.vertices[(i + n - 1) % n], self.vertices[i]))
    }

    /// Shoelace area; positive for counter-clockwise winding in a y-up frame.
    pub fn signed_area(&self) -> f64 {
        self.edges()
            .map(|(a, b)| a.x * b.y - b.x * a.y)
            .sum::<f64>()
            / 2.0
    }

    /// True when the boundary cannot enclose any area: fewer than three
    /// distinct vertices, or every vertex on one line.
    /// A symmetric figure-eight has zero signed area but is not degenerate.
    pub fn is_degenerate(&self) -> bool {
        let Some(&origin) = self.vertices.first() else {
            return true;
        };
        let Some(&axis) = self.vertices.iter().find(|v| **v != origin) else {
            return true;
        };
        let (dx, dy) = (axis.x - origin.x, axis.y - origin.y);
        let axis_len = dx.hypot(dy);
        self.vertices.iter().all(|v| {
            let (vx, vy) = (v.x - origin.x, v.y - origin.y);
            let cross = dx * vy - dy * vx;
            cross.abs() <= COLLINEAR_TOLERANCE * axis_len * vx.hypot(vy)
        })
    }

    pub fn ensure_area(&self) -> Result<()> {
        if self.is_degenerate() {
            Err(SonoError::DegeneratePolygon {
                vertices: self.vertices.len(),
            })
        } else {
            Ok(())
        }
    }

    /// `(min_x, min_y, max_x, max_y)`, or `None` for an empty boundary.
    pub fn bounding_box(&self) -> Option<(f64, f64, f64, f64)> {
        let first = self.vertices.first()?;
        let init = (first.x, first.y, first.x, first.y);
        Some(self.vertices.iter().fold(init, |(x0, y0, x1, y1), v| {
            (x0.min(v.x), y0.min(v.y), x1.max(v.x), y1.max(v.y))
        }))
    }

    /// Even-odd containment by casting a ray towards +x.
    ///
    /// Uses the same half-open crossing rule as [`edge_crossing`], so a point
    /// on a shared edge belongs to exactly one of two adjacent polygons.
    pub fn contains(&self, point: Vertex) -> bool {
        if self.vertices.len() < 3 {
            return false;
        }
        self.edges()
            .filter_map(|(a, b)| edge_crossing(a, b, point.y))
            .filter(|&x| point.x < x)
            .count()
            % 2
            == 1
    }
}

impl From<Vec<(f64, f64)>> for PolygonBoundary {
    fn from(points: Vec<(f64, f64)>) -> Self {
        Self::new(points.into_iter().map(Vertex::from).collect())
    }
}

impl fmt::Display for PolygonBoundary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let parts: Vec<String> = self.vertices.iter().map(Vertex::to_string).collect();
        f.write_str(&parts.join(";"))
    }
}

/// X coordinate where the edge `a -> b` crosses the horizontal line at `y`.
///
/// An edge counts only when exactly one endpoint lies strictly above `y`, so
/// horizontal edges never cross and shared vertices are counted once.
pub fn edge_crossing(a: Vertex, b: Vertex, y: f64) -> Option<f64> {
    if (a.y > y) != (b.y > y) {
        Some((b.x - a.x) * (y - a.y) / (b.y - a.y) + a.x)
    } else {
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_square() -> PolygonBoundary {
        vec![(0.0, 0.0), (2.0, 0.0), (2.0, 2.0), (0.0, 2.0)].into()
    }

    #[test]
    fn square_contains_interior_points() {
        let square = unit_square();
        assert!(square.contains(Vertex::new(1.0, 1.0)));
        assert!(square.contains(Vertex::new(0.5, 1.5)));
        assert!(!square.contains(Vertex::new(3.0, 1.0)));
        assert!(!square.contains(Vertex::new(1.0, -0.5)));
    }

    #[test]
    fn shared_edge_belongs_to_one_side() {
        let left: PolygonBoundary = vec![(0.0, 0.0), (1.0, 0.0), (1.0, 2.0), (0.0, 2.0)].into();
        let right: PolygonBoundary = vec![(1.0, 0.0), (2.0, 0.0), (2.0, 2.0), (1.0, 2.0)].into();
        let on_edge = Vertex::new(1.0, 1.0);
        assert_ne!(left.contains(on_edge), right.contains(on_edge));
    }

    #[test]
    fn area_and_degeneracy() {
        assert!((unit_square().signed_area() - 4.0).abs() < 1e-12);
        assert!(!unit_square().is_degenerate());

        let collapsed: PolygonBoundary = vec![(3.0, 3.0); 4].into();
        assert!(collapsed.is_degenerate());
        assert!(matches!(
            collapsed.ensure_area(),
            Err(SonoError::DegeneratePolygon { vertices: 4 })
        ));

        let segment: PolygonBoundary = vec![(0.0, 0.0), (4.0, 4.0)].into();
        assert!(segment.is_degenerate());
        assert!(!segment.contains(Vertex::new(2.0, 2.0)));

        let collinear: PolygonBoundary = vec![(0.0, 0.0), (1.0, 2.0), (3.0, 6.0)].into();
        assert!(collinear.is_degenerate());
    }

    #[test]
    fn collinear_at_image_scale_is_degenerate() {
        for k in 0..60 {
            let s = 0.1 * k as f64 + 3.3;
            let line: PolygonBoundary =
                vec![(0.0, 0.0), (30.0 * s, 10.0 * s), (111.0 * s, 37.0 * s)].into();
            assert!(line.is_degenerate(), "scale {s}");
        }
        let sliver: PolygonBoundary = vec![(0.0, 0.0), (900.0, 300.0), (900.0, 301.0)].into();
        assert!(!sliver.is_degenerate());
    }

    #[test]
    fn symmetric_figure_eight_is_not_degenerate() {
        let bowtie: PolygonBoundary = vec![(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 4.0)].into();
        assert_eq!(bowtie.signed_area(), 0.0);
        assert!(!bowtie.is_degenerate());
    }

    #[test]
    fn self_intersecting_uses_even_odd() {
        // Bow-tie: the left and right lobes are inside, the top and bottom wedges are not.
        let bowtie: PolygonBoundary = vec![(0.0, 0.0), (4.0, 4.0), (4.0, 0.0), (0.0, 4.0)].into();
        assert!(bowtie.contains(Vertex::new(0.5, 2.0)));
        assert!(bowtie.contains(Vertex::new(3.5, 2.0)));
        assert!(!bowtie.contains(Vertex::new(2.0, 0.5)));
    }

    #[test]
    fn bounding_box_spans_vertices() {
        let poly: PolygonBoundary = vec![(1.0, 5.0), (-2.0, 3.0), (4.0, -1.0)].into();
        assert_eq!(poly.bounding_box(), Some((-2.0, -1.0, 4.0, 5.0)));
        assert_eq!(PolygonBoundary::default().bounding_box(), None);
    }
}
