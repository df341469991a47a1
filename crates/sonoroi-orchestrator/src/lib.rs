//! High-level orchestrator coordinating video source, boundary capture, the
//! ROI core, and report presentation.

use std::time::Instant;

use async_trait::async_trait;
use serde::Serialize;
use sonoroi_capture::{BoundaryCapture, CaptureOutcome};
use sonoroi_ops::TelemetryStore;
use sonoroi_roi::{rasterize, reduce};
use sonoroi_types::{
    events::{
        AnalysisEvent, BoundaryEvent, EventPayload, LifecyclePhase, MaskEvent, SeriesEvent,
        VideoEvent,
    },
    geometry::PolygonBoundary,
    grid::{Frame, GridShape, RoiMask},
    series::IntensitySeries,
    telemetry::RunTimings,
    Result, SonoError,
};
use sonoroi_video::VideoSource;
use tracing::{info, warn};
use uuid::Uuid;

/// Everything a presentation sink needs about one finished run.
#[derive(Debug, Clone)]
pub struct AnalysisReport {
    pub run_id: Uuid,
    pub source: String,
    pub shape: GridShape,
    pub reference_index: usize,
    pub reference: Frame,
    pub boundary: PolygonBoundary,
    pub mask: RoiMask,
    pub series: IntensitySeries,
    pub timings: RunTimings,
}

/// Serializable digest of a report, without the raster payloads.
#[derive(Debug, Clone, Serialize)]
pub struct ReportSummary {
    pub run_id: Uuid,
    pub source: String,
    pub shape: GridShape,
    pub frame_count: usize,
    pub reference_frame: usize,
    pub boundary: PolygonBoundary,
    pub included_cells: usize,
    pub series: IntensitySeries,
    pub timings: RunTimings,
}

impl AnalysisReport {
    pub fn summary(&self) -> ReportSummary {
        ReportSummary {
            run_id: self.run_id,
            source: self.source.clone(),
            shape: self.shape,
            frame_count: self.series.len(),
            reference_frame: self.reference_index,
            boundary: self.boundary.clone(),
            included_cells: self.mask.included_count(),
            series: self.series.clone(),
            timings: self.timings.clone(),
        }
    }
}

#[async_trait]
pub trait ReportSink: Send + Sync {
    async fn present(&mut self, report: &AnalysisReport) -> Result<()>;
}

#[async_trait]
impl ReportSink for Vec<Box<dyn ReportSink>> {
    async fn present(&mut self, report: &AnalysisReport) -> Result<()> {
        for sink in self.iter_mut() {
            sink.present(report).await?;
        }
        Ok(())
    }
}

pub struct Orchestrator<S, B, P>
where
    S: VideoSource,
    B: BoundaryCapture,
    P: ReportSink,
{
    source: S,
    capture: B,
    sink: P,
    telemetry: TelemetryStore,
    reference_frame: usize,
}

impl<S, B, P> Orchestrator<S, B, P>
where
    S: VideoSource,
    B: BoundaryCapture,
    P: ReportSink,
{
    pub fn new(
        reference_frame: usize,
        source: S,
        capture: B,
        sink: P,
        telemetry: TelemetryStore,
    ) -> Self {
        Self {
            source,
            capture,
            sink,
            telemetry,
            reference_frame,
        }
    }

    pub fn telemetry(&self) -> &TelemetryStore {
        &self.telemetry
    }

    async fn analyze(&mut self) -> Result<AnalysisReport> {
        let mut timings = RunTimings::default();

        let started = Instant::now();
        let video = self.source.load().await?;
        timings.load_ms = elapsed_ms(started);
        let shape = video.shape();
        let reference = video.frame(self.reference_frame)?.clone();
        info!(
            "Loaded {} frames of {} from {}",
            video.frame_count(),
            shape,
            self.source.describe()
        );
        self.publish(AnalysisEvent::new(EventPayload::Video(VideoEvent {
            frame_count: video.frame_count(),
            shape,
            reference_frame: self.reference_frame,
        })))
        .await?;

        self.publish(AnalysisEvent::lifecycle(
            LifecyclePhase::AwaitingBoundary,
            Some(format!("reference frame {}", self.reference_frame)),
        ))
        .await?;
        let started = Instant::now();
        let boundary = match self.capture.capture(&reference).await? {
            CaptureOutcome::Confirmed(boundary) => boundary,
            CaptureOutcome::Aborted => return Err(SonoError::CaptureAborted),
        };
        timings.capture_ms = elapsed_ms(started);
        self.publish(AnalysisEvent::new(EventPayload::Boundary(BoundaryEvent {
            vertices: boundary.len(),
            area: boundary.signed_area().abs(),
        })))
        .await?;

        // The mask is built once from the reference frame; ROI motion across
        // the video is not tracked.
        let started = Instant::now();
        let mask = rasterize(&boundary, &reference, shape)?;
        timings.mask_ms = elapsed_ms(started);
        info!(
            "Mask created in {} ms: {} of {} cells in ROI",
            timings.mask_ms,
            mask.included_count(),
            shape.cell_count()
        );
        if mask.is_empty() {
            warn!("ROI holds no positive reference cells");
        }
        self.publish(AnalysisEvent::new(EventPayload::Mask(MaskEvent {
            included_cells: mask.included_count(),
            elapsed_ms: timings.mask_ms,
        })))
        .await?;

        let started = Instant::now();
        let series = reduce(&mask, video.frames(), shape)?;
        timings.reduce_ms = elapsed_ms(started);
        info!(
            "Reduced {} frames in {} ms",
            series.len(),
            timings.reduce_ms
        );
        self.publish(AnalysisEvent::new(EventPayload::Series(SeriesEvent {
            frames: series.len(),
            elapsed_ms: timings.reduce_ms,
        })))
        .await?;

        Ok(AnalysisReport {
            run_id: Uuid::new_v4(),
            source: self.source.describe(),
            shape,
            reference_index: self.reference_frame,
            reference,
            boundary,
            mask,
            series,
            timings,
        })
    }

    async fn publish(&self, event: AnalysisEvent) -> Result<()> {
        self.telemetry.record_event(event).await
    }
}

#[async_trait]
pub trait AnalysisRunner {
    async fn run(&mut self) -> Result<AnalysisReport>;
}

#[async_trait]
impl<S, B, P> AnalysisRunner for Orchestrator<S, B, P>
where
    S: VideoSource + Send + Sync,
    B: BoundaryCapture + Send + Sync,
    P: ReportSink + Send + Sync,
{
    async fn run(&mut self) -> Result<AnalysisReport> {
        self.publish(AnalysisEvent::lifecycle(
            LifecyclePhase::Start,
            Some(self.source.describe()),
        ))
        .await?;

        let report = match self.analyze().await {
            Ok(report) => report,
            Err(err) => {
                let phase = if matches!(err, SonoError::CaptureAborted) {
                    LifecyclePhase::Aborted
                } else {
                    LifecyclePhase::Failed
                };
                self.publish(AnalysisEvent::lifecycle(phase, Some(err.to_string())))
                    .await?;
                return Err(err);
            }
        };

        self.sink.present(&report).await?;
        self.publish(AnalysisEvent::lifecycle(
            LifecyclePhase::Completed,
            Some(format!("run {}", report.run_id)),
        ))
        .await?;
        Ok(report)
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;
    use sonoroi_capture::ScriptedCapture;
    use sonoroi_types::{events::EventKind, grid::Video};
    use sonoroi_video::InMemorySource;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct RecordingSink {
        seen: Arc<Mutex<Vec<IntensitySeries>>>,
    }

    #[async_trait]
    impl ReportSink for RecordingSink {
        async fn present(&mut self, report: &AnalysisReport) -> Result<()> {
            self.seen
                .lock()
                .expect("sink lock")
                .push(report.series.clone());
            Ok(())
        }
    }

    fn ramp_video() -> Video {
        let shape = GridShape::new(4, 4);
        let frames = (1..=3)
            .map(|k| Frame::filled(shape, k as f64 * 10.0))
            .collect();
        Video::new(shape, frames).expect("video")
    }

    fn square() -> PolygonBoundary {
        vec![(0.5, 0.5), (2.5, 0.5), (2.5, 2.5), (0.5, 2.5)].into()
    }

    #[tokio::test]
    async fn run_produces_series_and_presents_it() {
        let sink = RecordingSink::default();
        let mut orchestrator = Orchestrator::new(
            1,
            InMemorySource::new(ramp_video()),
            ScriptedCapture::new(square()),
            sink.clone(),
            TelemetryStore::new(),
        );

        let report = orchestrator.run().await.expect("run");
        assert_eq!(report.series.values(), &[10.0, 20.0, 30.0]);
        assert_eq!(report.mask.included_count(), 4);
        assert_eq!(report.reference_index, 1);
        assert_eq!(sink.seen.lock().expect("sink lock").len(), 1);

        let summary = report.summary();
        assert_eq!(summary.frame_count, 3);
        assert_eq!(summary.included_cells, 4);

        let telemetry = orchestrator.telemetry();
        assert_eq!(telemetry.events_of(EventKind::Mask).await.len(), 1);
        assert_eq!(telemetry.events_of(EventKind::Series).await.len(), 1);
        let lifecycle = telemetry.events_of(EventKind::Lifecycle).await;
        assert!(matches!(
            lifecycle.last().map(|e| &e.payload),
            Some(EventPayload::Lifecycle(l)) if l.phase == LifecyclePhase::Completed
        ));
    }

    #[tokio::test]
    async fn abort_skips_core_and_sink() {
        let sink = RecordingSink::default();
        let mut orchestrator = Orchestrator::new(
            0,
            InMemorySource::new(ramp_video()),
            ScriptedCapture::aborting(),
            sink.clone(),
            TelemetryStore::new(),
        );

        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, SonoError::CaptureAborted));
        assert!(sink.seen.lock().expect("sink lock").is_empty());
        assert!(orchestrator
            .telemetry()
            .events_of(EventKind::Mask)
            .await
            .is_empty());
    }

    #[tokio::test]
    async fn reference_frame_out_of_range() {
        let mut orchestrator = Orchestrator::new(
            7,
            InMemorySource::new(ramp_video()),
            ScriptedCapture::new(square()),
            RecordingSink::default(),
            TelemetryStore::new(),
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, SonoError::Video(_)));
    }

    #[tokio::test]
    async fn roi_outside_grid_is_empty_roi() {
        let outside: PolygonBoundary = vec![(10.0, 10.0), (12.0, 10.0), (12.0, 12.0)].into();
        let mut orchestrator = Orchestrator::new(
            0,
            InMemorySource::new(ramp_video()),
            ScriptedCapture::new(outside),
            RecordingSink::default(),
            TelemetryStore::new(),
        );
        let err = orchestrator.run().await.unwrap_err();
        assert!(matches!(err, SonoError::EmptyRoi));
    }

    #[tokio::test]
    async fn sink_list_presents_to_every_sink() {
        let first = RecordingSink::default();
        let second = RecordingSink::default();
        let mut sinks: Vec<Box<dyn ReportSink>> =
            vec![Box::new(first.clone()), Box::new(second.clone())];
        let mut orchestrator = Orchestrator::new(
            0,
            InMemorySource::new(ramp_video()),
            ScriptedCapture::new(square()),
            RecordingSink::default(),
            TelemetryStore::new(),
        );
        let report = orchestrator.run().await.expect("run");
        sinks.present(&report).await.expect("present");
        assert_eq!(first.seen.lock().expect("sink lock").len(), 1);
        assert_eq!(second.seen.lock().expect("sink lock").len(), 1);
    }
}
