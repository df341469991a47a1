use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Wall-clock cost of each analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunTimings {
    pub load_ms: u64,
    pub capture_ms: u64,
    pub mask_ms: u64,
    pub reduce_ms: u64,
    pub started_at: DateTime<Utc>,
}

impl Default for RunTimings {
    fn default() -> Self {
        Self {
            load_ms: 0,
            capture_ms: 0,
            mask_ms: 0,
            reduce_ms: 0,
            started_at: Utc::now(),
        }
    }
}

impl RunTimings {
    pub fn total_ms(&self) -> u64 {
        self.load_ms + self.capture_ms + self.mask_ms + self.reduce_ms
    }
}
