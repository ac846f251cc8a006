//! pitchd - football video analysis runner
//!
//! This binary:
//! 1. Loads layered configuration (defaults, config file, env, flags)
//! 2. Validates mode, device and detector backend before reading any frame
//! 3. Runs the selected mode over the source video at the configured stride
//! 4. Writes annotated frames to the target and reports detected saves

use anyhow::{bail, Context, Result};
use clap::Parser;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};

use pitch_kernel::sink::FrameSink;
use pitch_kernel::{FileConfig, FileSource, Mode, Pipeline, PipelineConfig, StopFlag};

const SUPPORTED_DEVICE: &str = "cpu";

#[derive(Parser, Debug)]
#[command(author, version, about = "Detect, track and analyse football match video")]
struct Args {
    /// Source video path, or stub://<name>?frames=N for a synthetic clip.
    #[arg(long = "source_video_path")]
    source_video_path: String,

    /// Target for annotated output frames.
    #[arg(long = "target_video_path")]
    target_video_path: PathBuf,

    /// Inference device.
    #[arg(long, default_value = SUPPORTED_DEVICE)]
    device: String,

    /// Analysis mode (e.g. PLAYER_DETECTION, SAVE_DETECTION).
    #[arg(long, default_value = "PLAYER_DETECTION")]
    mode: String,

    /// Config file (JSON, or TOML by extension).
    #[arg(long, env = "PITCH_CONFIG")]
    config: Option<PathBuf>,

    /// Sampling stride override for every mode.
    #[arg(long)]
    stride: Option<u32>,

    /// Detector backend: synthetic, scripted or tract.
    #[arg(long)]
    backend: Option<String>,

    /// Scripted detections file (JSON).
    #[arg(long)]
    detections: Option<PathBuf>,

    /// Player detection ONNX model (tract backend).
    #[arg(long)]
    player_model: Option<PathBuf>,

    /// Ball detection ONNX model (tract backend).
    #[arg(long)]
    ball_model: Option<PathBuf>,

    /// Write the run summary and save events as JSON.
    #[arg(long)]
    events_json: Option<PathBuf>,

    /// Seed for the synthetic detector.
    #[arg(long, default_value_t = 0)]
    seed: u64,
}

fn main() -> Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let mode: Mode = args.mode.parse()?;
    if !args.device.eq_ignore_ascii_case(SUPPORTED_DEVICE) {
        bail!(
            "unsupported device '{}': this build runs inference on cpu only",
            args.device
        );
    }

    let mut config = PipelineConfig::load(args.config.as_deref())?;
    if let Some(stride) = args.stride {
        config.stride.override_all = Some(stride);
    }
    if let Some(backend) = &args.backend {
        config.detector.backend = backend.parse()?;
    }
    if let Some(path) = args.detections {
        config.detector.detections_path = Some(path);
    }
    if let Some(path) = args.player_model {
        config.detector.player_model = Some(path);
    }
    if let Some(path) = args.ball_model {
        config.detector.ball_model = Some(path);
    }
    config.validate(&args.source_video_path)?;

    let registry = config.build_registry(&args.source_video_path, args.seed)?;
    let stop = StopFlag::new();
    let mut pipeline = Pipeline::new(mode, &config.pipeline_settings(), registry)?
        .with_stop_flag(stop.clone());

    let handler_stop = stop.clone();
    ctrlc::set_handler(move || handler_stop.trigger()).expect("error setting Ctrl-C handler");

    let stride = config.stride_for(mode);
    let mut source = FileSource::new(FileConfig {
        path: args.source_video_path.clone(),
        stride,
    })?;
    let mut sink = open_sink(&args.target_video_path);

    log::info!(
        "pitchd running. mode={} source={} stride={} backend={}",
        mode,
        args.source_video_path,
        stride,
        config.detector.backend.as_str()
    );

    let summary = pipeline.run(&mut source, sink.as_mut())?;

    log::info!(
        "processed {} frames ({} decoded){}",
        summary.frames_processed,
        summary.source.frames_decoded,
        if summary.interrupted { ", interrupted" } else { "" }
    );
    if let Some(saves) = summary.saves {
        println!("Total saves detected: {}", saves);
    }

    if let Some(path) = &args.events_json {
        let file = File::create(path)
            .with_context(|| format!("failed to create {}", path.display()))?;
        serde_json::to_writer_pretty(BufWriter::new(file), &summary)
            .with_context(|| format!("failed to write {}", path.display()))?;
        log::info!("run summary written to {}", path.display());
    }

    Ok(())
}

#[cfg(feature = "sink-image")]
fn open_sink(target: &Path) -> Box<dyn FrameSink> {
    // Video encoding is not available; frames go to a directory beside the target.
    let dir = if target.extension().is_some() {
        let stem = target
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        target.with_file_name(format!("{}_frames", stem))
    } else {
        target.to_path_buf()
    };
    Box::new(pitch_kernel::ImageSequenceSink::new(dir))
}

#[cfg(not(feature = "sink-image"))]
fn open_sink(target: &Path) -> Box<dyn FrameSink> {
    log::warn!(
        "built without sink-image; annotated frames for {} are discarded",
        target.display()
    );
    Box::new(pitch_kernel::NullSink::new())
}
