use serde::{Deserialize, Serialize};

/// Mean ROI intensity per frame, in frame order.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct IntensitySeries {
    values: Vec<f64>,
}

impl IntensitySeries {
    pub fn new(values: Vec<f64>) -> Self {
        Self { values }
    }

    pub fn values(&self) -> &[f64] {
        &self.values
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<f64> {
        self.values.get(frame).copied()
    }

    /// `(frame index, intensity)` pairs for plotting.
    pub fn points(&self) -> Vec<(f64, f64)> {
        self.values
            .iter()
            .enumerate()
            .map(|(frame, value)| (frame as f64, *value))
            .collect()
    }

    /// `(min, max)` over the finite values.
    pub fn range(&self) -> Option<(f64, f64)> {
        self.values
            .iter()
            .copied()
            .filter(|v| v.is_finite())
            .fold(None, |acc, v| match acc {
                None => Some((v, v)),
                Some((lo, hi)) => Some((lo.min(v), hi.max(v))),
            })
    }
}
