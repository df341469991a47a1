//! ROI core: polygon rasterization and masked temporal reduction.
//!
//! Both entry points are pure and synchronous. The same inputs always give
//! bit-identical outputs, and neither keeps state between calls.

mod rasterize;
mod reduce;

pub use rasterize::rasterize;
pub use reduce::reduce;
