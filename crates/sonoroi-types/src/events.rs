use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::grid::GridShape;

/// Coarse classification of analysis events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventKind {
    Lifecycle,
    Video,
    Boundary,
    Mask,
    Series,
}

/// Immutable event envelope for logging and run inspection.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisEvent {
    pub id: Uuid,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
    pub payload: EventPayload,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum EventPayload {
    Lifecycle(LifecycleEvent),
    Video(VideoEvent),
    Boundary(BoundaryEvent),
    Mask(MaskEvent),
    Series(SeriesEvent),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LifecycleEvent {
    pub phase: LifecyclePhase,
    pub details: Option<String>,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum LifecyclePhase {
    Start,
    AwaitingBoundary,
    Completed,
    Aborted,
    Failed,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VideoEvent {
    pub frame_count: usize,
    pub shape: GridShape,
    pub reference_frame: usize,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundaryEvent {
    pub vertices: usize,
    pub area: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MaskEvent {
    pub included_cells: usize,
    pub elapsed_ms: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SeriesEvent {
    pub frames: usize,
    pub elapsed_ms: u64,
}

impl AnalysisEvent {
    pub fn new(payload: EventPayload) -> Self {
        let kind = match &payload {
            EventPayload::Lifecycle(_) => EventKind::Lifecycle,
            EventPayload::Video(_) => EventKind::Video,
            EventPayload::Boundary(_) => EventKind::Boundary,
            EventPayload::Mask(_) => EventKind::Mask,
            EventPayload::Series(_) => EventKind::Series,
        };
        Self {
            id: Uuid::new_v4(),
            kind,
            timestamp: Utc::now(),
            payload,
        }
    }

    pub fn lifecycle(phase: LifecyclePhase, details: Option<String>) -> Self {
        Self::new(EventPayload::Lifecycle(LifecycleEvent { phase, details }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_follows_payload() {
        let event = AnalysisEvent::new(EventPayload::Mask(MaskEvent {
            included_cells: 4,
            elapsed_ms: 1,
        }));
        assert_eq!(event.kind, EventKind::Mask);

        let lifecycle = AnalysisEvent::lifecycle(LifecyclePhase::Start, None);
        assert_eq!(lifecycle.kind, EventKind::Lifecycle);
        let json = serde_json::to_string(&lifecycle).expect("serialize event");
        assert!(json.contains("Start"));
    }
}
