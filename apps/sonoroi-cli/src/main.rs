use std::{
    env,
    io::{self, BufRead, Write},
    path::PathBuf,
};

use anyhow::{anyhow, Result};
use clap::Parser;
use sonoroi_capture::{parse_boundary, BoundaryCapture, InteractiveCapture, ScriptedCapture};
use sonoroi_ops::{init_tracing, TelemetryStore};
use sonoroi_orchestrator::{AnalysisRunner, Orchestrator, ReportSink};
use sonoroi_types::{
    config::{DisplayConfig, OpsConfig, RoiConfig, SonoConfig, VideoConfig},
    SonoError,
};
use sonoroi_video::open_source;
use tracing::{debug, info};

mod plot;
mod render;
mod ui;

const DEFAULT_CONFIG_PATH: &str = "sonoroi.toml";

/// Trace an ROI on one frame of an ultrasound clip and plot its mean
/// intensity over every frame.
#[derive(Debug, Parser)]
#[command(name = "sonoroi", version)]
struct Args {
    /// Frame directory (PNG stills), multi-frame GIF, or DICOM file.
    input: Option<PathBuf>,
    /// Reference frame to trace the ROI on; prompted for when omitted.
    #[arg(short, long)]
    frame: Option<usize>,
    /// TOML config file (also read from SONOROI_CONFIG).
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Preset boundary as "x,y;x,y;...", skipping interactive capture.
    #[arg(long)]
    boundary: Option<String>,
    /// Print a JSON summary to stdout.
    #[arg(long)]
    json: bool,
    /// Skip the terminal chart.
    #[arg(long)]
    no_plot: bool,
    /// Log filter, e.g. "info" or "sonoroi_roi=debug".
    #[arg(long)]
    log_level: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();
    let mut config = load_config(args.config.clone());
    apply_overrides(&mut config, &args)?;
    init_tracing(&config.ops)?;

    let input = config
        .video
        .input
        .clone()
        .ok_or_else(|| anyhow!("no input given; pass a frame directory, .gif or .dcm file"))?;
    let reference_frame = match config.video.reference_frame {
        Some(frame) => frame,
        None => prompt_frame()?,
    };

    let source = open_source(&input)?;
    let capture: Box<dyn BoundaryCapture> = match config.roi.boundary.clone() {
        Some(boundary) => Box::new(ScriptedCapture::new(boundary)),
        None => Box::new(InteractiveCapture::new(ui::TerminalSession::new())),
    };
    let mut sinks: Vec<Box<dyn ReportSink>> = Vec::new();
    if config.display.json {
        sinks.push(Box::new(plot::JsonSink));
    }
    if config.display.plot {
        sinks.push(Box::new(plot::TerminalPlot));
    }

    let mut orchestrator = Orchestrator::new(
        reference_frame,
        source,
        capture,
        sinks,
        TelemetryStore::new(),
    );

    let outcome = orchestrator.run().await;
    for event in orchestrator.telemetry().snapshot_events().await {
        debug!("{} {:?} {:?}", event.timestamp, event.kind, event.payload);
    }
    match outcome {
        Ok(report) => {
            info!(
                "Run {} finished: {} frames in {} ms",
                report.run_id,
                report.series.len(),
                report.timings.total_ms()
            );
            Ok(())
        }
        Err(SonoError::CaptureAborted) => {
            info!("ROI capture aborted; nothing to analyze");
            Ok(())
        }
        Err(err) => Err(err.into()),
    }
}

fn load_config(explicit: Option<PathBuf>) -> SonoConfig {
    let from_env = env::var("SONOROI_CONFIG").ok().map(PathBuf::from);
    let requested = explicit.or(from_env);
    let path = requested
        .clone()
        .unwrap_or_else(|| PathBuf::from(DEFAULT_CONFIG_PATH));
    if requested.is_none() && !path.exists() {
        return default_config();
    }
    match SonoConfig::from_file(&path) {
        Ok(cfg) => {
            if let Err(err) = cfg.validate() {
                eprintln!(
                    "Invalid config in '{}': {err}. Falling back to internal defaults.",
                    path.display()
                );
                default_config()
            } else {
                cfg
            }
        }
        Err(err) => {
            eprintln!(
                "Failed to load config from '{}': {err}. Falling back to internal defaults.",
                path.display()
            );
            default_config()
        }
    }
}

fn default_config() -> SonoConfig {
    let config = SonoConfig {
        video: VideoConfig {
            input: None,
            reference_frame: None,
        },
        roi: RoiConfig::default(),
        display: DisplayConfig {
            plot: true,
            json: false,
        },
        ops: OpsConfig {
            log_level: "info".into(),
        },
    };
    debug_assert!(config.validate().is_ok());
    config
}

fn apply_overrides(config: &mut SonoConfig, args: &Args) -> Result<()> {
    if let Some(input) = &args.input {
        config.video.input = Some(input.display().to_string());
    }
    if let Some(frame) = args.frame {
        config.video.reference_frame = Some(frame);
    }
    if let Some(text) = &args.boundary {
        config.roi.boundary = Some(parse_boundary(text)?);
    }
    if args.json {
        config.display.json = true;
    }
    if args.no_plot {
        config.display.plot = false;
    }
    if let Some(level) = &args.log_level {
        config.ops.log_level = level.clone();
    }
    config.validate()?;
    Ok(())
}

/// Asks for the reference frame on stdin until a valid index is entered.
fn prompt_frame() -> Result<usize> {
    let stdin = io::stdin();
    let mut stderr = io::stderr();
    loop {
        write!(stderr, "\nEnter desired frame to view: ")?;
        stderr.flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            return Err(anyhow!("no reference frame given"));
        }
        match parse_frame_index(&line) {
            Some(frame) => return Ok(frame),
            None => writeln!(stderr, "Please enter a non-negative frame number")?,
        }
    }
}

fn parse_frame_index(line: &str) -> Option<usize> {
    line.trim().parse().ok()
}
