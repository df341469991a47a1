//! Shared domain types for the Sonoroi project.

pub mod config;
pub mod events;
pub mod geometry;
pub mod grid;
pub mod series;
pub mod telemetry;

mod errors;

pub use errors::{Result, SonoError};
