//! Operational helpers: logging setup and in-memory run telemetry.

use std::sync::Arc;

use sonoroi_types::{
    config::OpsConfig,
    events::{AnalysisEvent, EventKind},
    Result, SonoError,
};
use tokio::sync::Mutex;
use tracing::debug;
use tracing_subscriber::{fmt, EnvFilter};

pub fn init_tracing(config: &OpsConfig) -> Result<()> {
    let filter = EnvFilter::try_new(config.log_level.clone())
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|err| SonoError::Ops(format!("failed to create log filter: {err}")))?;

    fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| SonoError::Ops(format!("tracing init error: {err}")))?;
    Ok(())
}

/// Events recorded over one analysis run.
#[derive(Clone, Default)]
pub struct TelemetryStore {
    events: Arc<Mutex<Vec<AnalysisEvent>>>,
}

impl TelemetryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn record_event(&self, event: AnalysisEvent) -> Result<()> {
        debug!("Recording {:?} event {}", event.kind, event.id);
        self.events.lock().await.push(event);
        Ok(())
    }

    pub async fn snapshot_events(&self) -> Vec<AnalysisEvent> {
        self.events.lock().await.clone()
    }

    pub async fn events_of(&self, kind: EventKind) -> Vec<AnalysisEvent> {
        self.events
            .lock()
            .await
            .iter()
            .filter(|event| event.kind == kind)
            .cloned()
            .collect()
    }
}
