use sonoroi_types::{
    geometry::{edge_crossing, PolygonBoundary},
    grid::{Frame, Grid, GridShape, RoiMask},
    Result,
};
use tracing::{debug, warn};

/// Builds the excluded-cell mask for `boundary` over `shape`.
///
/// Cell `(row, col)` is sampled at the point `(x = col, y = row)`. It is kept
/// only when that point lies inside the polygon and the reference frame has a
/// strictly positive value there; every other cell is excluded. A degenerate
/// boundary excludes the whole grid.
///
/// Rows are filled by scanline: the sorted crossings of each row with the
/// polygon edges split the row into alternating outside/inside spans, using
/// the same crossing rule as [`PolygonBoundary::contains`].
pub fn rasterize(
    boundary: &PolygonBoundary,
    reference: &Frame,
    shape: GridShape,
) -> Result<RoiMask> {
    shape.ensure_matches(reference.shape(), "reference frame")?;

    let bounds = boundary.bounding_box().filter(|_| !boundary.is_degenerate());
    let Some((_, min_y, _, max_y)) = bounds else {
        warn!(
            "Boundary with {} vertices encloses no area; excluding every cell",
            boundary.len()
        );
        return Ok(RoiMask::all_excluded(shape));
    };

    let samples = reference.cells();
    let mut excluded = Vec::with_capacity(shape.cell_count());
    let mut crossings = Vec::with_capacity(boundary.len());

    for row in 0..shape.rows {
        let y = row as f64;
        // No edge has one endpoint above y unless min_y <= y < max_y.
        if y < min_y || y >= max_y {
            excluded.extend(std::iter::repeat(true).take(shape.cols));
            continue;
        }
        row_crossings(boundary, y, &mut crossings);

        // Number of crossings at or left of the current column.
        let mut passed = 0;
        for col in 0..shape.cols {
            let x = col as f64;
            while passed < crossings.len() && crossings[passed] <= x {
                passed += 1;
            }
            let inside = (crossings.len() - passed) % 2 == 1;
            let positive = samples[row * shape.cols + col] > 0.0;
            excluded.push(!(inside && positive));
        }
    }

    let mask = RoiMask::new(Grid::from_vec(shape, excluded)?);
    debug!(
        "Rasterized {}-vertex boundary over {}: {} cells included",
        boundary.len(),
        shape,
        mask.included_count()
    );
    Ok(mask)
}

fn row_crossings(boundary: &PolygonBoundary, y: f64, out: &mut Vec<f64>) {
    out.clear();
    out.extend(boundary.edges().filter_map(|(a, b)| edge_crossing(a, b, y)));
    out.sort_by(|a, b| a.total_cmp(b));
}
