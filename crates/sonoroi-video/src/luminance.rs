use image::RgbaImage;
use sonoroi_types::grid::{Frame, GridShape};

pub const RED_WEIGHT: f64 = 0.2989;
pub const GREEN_WEIGHT: f64 = 0.5870;
pub const BLUE_WEIGHT: f64 = 0.1140;

/// Linear luminance of one RGB sample.
pub fn luminance(red: u8, green: u8, blue: u8) -> f64 {
    RED_WEIGHT * red as f64 + GREEN_WEIGHT * green as f64 + BLUE_WEIGHT * blue as f64
}

/// Converts an RGBA raster to a grayscale frame; alpha is ignored.
pub fn frame_from_rgba(image: &RgbaImage) -> Frame {
    let (width, height) = image.dimensions();
    let shape = GridShape::new(height as usize, width as usize);
    Frame::from_fn(shape, |row, col| {
        let [r, g, b, _] = image.get_pixel(col as u32, row as u32).0;
        luminance(r, g, b)
    })
}
