use sonoroi_types::{
    grid::{Frame, GridShape, RoiMask},
    series::IntensitySeries,
    Result, SonoError,
};
use tracing::debug;

/// Mean intensity inside `mask` for every frame, in frame order.
///
/// Shapes are checked before any averaging. An empty frame sequence yields an
/// empty series; otherwise a mask without included cells is `EmptyRoi`.
pub fn reduce(mask: &RoiMask, frames: &[Frame], shape: GridShape) -> Result<IntensitySeries> {
    shape.ensure_matches(mask.shape(), "roi mask")?;
    for (index, frame) in frames.iter().enumerate() {
        shape.ensure_matches(frame.shape(), format!("frame {index}"))?;
    }
    if frames.is_empty() {
        return Ok(IntensitySeries::default());
    }

    let included = mask.included_count();
    if included == 0 {
        return Err(SonoError::EmptyRoi);
    }

    let values: Vec<f64> = frames
        .iter()
        .map(|frame| masked_sum(mask, frame) / included as f64)
        .collect();
    debug!(
        "Reduced {} frames over {} included cells",
        values.len(),
        included
    );
    Ok(IntensitySeries::new(values))
}

fn masked_sum(mask: &RoiMask, frame: &Frame) -> f64 {
    mask.excluded()
        .cells()
        .iter()
        .zip(frame.cells())
        .filter(|(excluded, _)| !**excluded)
        .map(|(_, value)| *value)
        .sum()
}
