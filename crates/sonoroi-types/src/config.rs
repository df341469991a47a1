use std::{fs, path::Path};

use serde::{Deserialize, Serialize};

use crate::{geometry::PolygonBoundary, Result, SonoError};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoConfig {
    /// Frame directory or multi-frame GIF.
    pub input: Option<String>,
    /// Frame the operator traces the ROI on.
    pub reference_frame: Option<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RoiConfig {
    /// Preset boundary; skips interactive capture when present.
    pub boundary: Option<PolygonBoundary>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DisplayConfig {
    pub plot: bool,
    pub json: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OpsConfig {
    pub log_level: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SonoConfig {
    pub video: VideoConfig,
    #[serde(default)]
    pub roi: RoiConfig,
    pub display: DisplayConfig,
    pub ops: OpsConfig,
}

impl SonoConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path_ref = path.as_ref();
        let contents = fs::read_to_string(path_ref).map_err(|err| {
            SonoError::Configuration(format!(
                "unable to read config file {}: {err}",
                path_ref.display()
            ))
        })?;
        toml::from_str(&contents).map_err(|err| {
            SonoError::Configuration(format!(
                "failed to parse config file {}: {err}",
                path_ref.display()
            ))
        })
    }

    pub fn validate(&self) -> Result<()> {
        if self.ops.log_level.trim().is_empty() {
            return Err(SonoError::Configuration(
                "ops.log_level must not be empty".into(),
            ));
        }
        if let Some(input) = &self.video.input {
            if input.trim().is_empty() {
                return Err(SonoError::Configuration(
                    "video.input must not be empty when set".into(),
                ));
            }
        }
        if let Some(boundary) = &self.roi.boundary {
            if boundary.len() < 3 {
                return Err(SonoError::Configuration(
                    "roi.boundary needs at least 3 vertices".into(),
                ));
            }
            if boundary
                .vertices()
                .iter()
                .any(|v| !v.x.is_finite() || !v.y.is_finite())
            {
                return Err(SonoError::Configuration(
                    "roi.boundary vertices must be finite".into(),
                ));
            }
        }
        Ok(())
    }
}
