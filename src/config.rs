use anyhow::{anyhow, bail, Context, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::detect::{BackendRegistry, ScriptedBackend, SyntheticBackend};
use crate::events::{SaveThresholds, DEFAULT_PROXIMITY_PX, DEFAULT_SPEED_PX_PER_FRAME};
use crate::pipeline::{Mode, PipelineSettings};
use crate::track::{TrackerSettings, DEFAULT_HISTORY_CAPACITY};

const DEFAULT_SAVE_STRIDE: u32 = 30;
const DEFAULT_STRIDE: u32 = 60;
const DEFAULT_TRACKER_MIN_CONSECUTIVE: u32 = 3;
const DEFAULT_TRACKER_IOU: f32 = 0.3;
const DEFAULT_TRACKER_MAX_AGE: u32 = 30;
const DEFAULT_CONFIDENCE: f32 = 0.3;
const DEFAULT_BACKEND: BackendKind = BackendKind::Synthetic;
const DEFAULT_PLAYER_INPUT_SIZE: u32 = 1280;
const DEFAULT_BALL_INPUT_SIZE: u32 = 640;
const MODEL_INPUT_ALIGN: u32 = 32;
const SYNTHETIC_SOURCE_PREFIX: &str = "stub://";

#[derive(Debug, Deserialize, Default)]
struct PipelineConfigFile {
    ball: Option<BallConfigFile>,
    saves: Option<SavesConfigFile>,
    stride: Option<StrideConfigFile>,
    tracker: Option<TrackerConfigFile>,
    detector: Option<DetectorConfigFile>,
}

#[derive(Debug, Deserialize, Default)]
struct BallConfigFile {
    history_capacity: Option<usize>,
}

#[derive(Debug, Deserialize, Default)]
struct SavesConfigFile {
    proximity_px: Option<f32>,
    speed_px_per_frame: Option<f32>,
}

#[derive(Debug, Deserialize, Default)]
struct StrideConfigFile {
    save_detection: Option<u32>,
    default: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct TrackerConfigFile {
    min_consecutive_frames: Option<u32>,
    iou_threshold: Option<f32>,
    max_age: Option<u32>,
}

#[derive(Debug, Deserialize, Default)]
struct DetectorConfigFile {
    backend: Option<String>,
    player_model: Option<PathBuf>,
    ball_model: Option<PathBuf>,
    detections_path: Option<PathBuf>,
    confidence: Option<f32>,
    player_input_size: Option<u32>,
    ball_input_size: Option<u32>,
}

/// Which detector stack to register.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BackendKind {
    /// Seeded stand-in for `stub://` demos. Rejected for any other source.
    Synthetic,
    /// Replays detections from a JSON file.
    Scripted,
    /// YOLOv8 ONNX models (feature `backend-tract`).
    Tract,
}

impl BackendKind {
    pub fn as_str(self) -> &'static str {
        match self {
            BackendKind::Synthetic => "synthetic",
            BackendKind::Scripted => "scripted",
            BackendKind::Tract => "tract",
        }
    }
}

impl FromStr for BackendKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "synthetic" => Ok(BackendKind::Synthetic),
            "scripted" => Ok(BackendKind::Scripted),
            "tract" => Ok(BackendKind::Tract),
            other => Err(anyhow!(
                "unknown detector backend '{}' (expected synthetic, scripted or tract)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StrideSettings {
    pub save_detection: u32,
    pub default: u32,
    /// Applies to every mode when set (`PITCH_STRIDE` or `--stride`).
    pub override_all: Option<u32>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DetectorSettings {
    pub backend: BackendKind,
    pub player_model: Option<PathBuf>,
    pub ball_model: Option<PathBuf>,
    pub detections_path: Option<PathBuf>,
    pub confidence: f32,
    /// Square input size of the player model.
    pub player_input_size: u32,
    /// Square input size of the ball model.
    pub ball_input_size: u32,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PipelineConfig {
    pub ball_history_capacity: usize,
    pub saves: SaveThresholds,
    pub stride: StrideSettings,
    pub tracker: TrackerSettings,
    pub detector: DetectorSettings,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            ball_history_capacity: DEFAULT_HISTORY_CAPACITY,
            saves: SaveThresholds::default(),
            stride: StrideSettings {
                save_detection: DEFAULT_SAVE_STRIDE,
                default: DEFAULT_STRIDE,
                override_all: None,
            },
            tracker: TrackerSettings {
                min_consecutive_frames: DEFAULT_TRACKER_MIN_CONSECUTIVE,
                iou_threshold: DEFAULT_TRACKER_IOU,
                max_age: DEFAULT_TRACKER_MAX_AGE,
            },
            detector: DetectorSettings {
                backend: DEFAULT_BACKEND,
                player_model: None,
                ball_model: None,
                detections_path: None,
                confidence: DEFAULT_CONFIDENCE,
                player_input_size: DEFAULT_PLAYER_INPUT_SIZE,
                ball_input_size: DEFAULT_BALL_INPUT_SIZE,
            },
        }
    }
}

impl PipelineConfig {
    /// Defaults, then the config file (`path`, else `PITCH_CONFIG`), then
    /// environment overrides. Call `validate` after applying CLI flags.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let env_path = std::env::var("PITCH_CONFIG")
            .ok()
            .filter(|p| !p.trim().is_empty())
            .map(PathBuf::from);
        let config_path = path.map(Path::to_path_buf).or(env_path);
        let file_cfg = match config_path.as_deref() {
            Some(path) => Some(read_config_file(path)?),
            None => None,
        };
        let mut cfg = Self::from_file(file_cfg.unwrap_or_default())?;
        cfg.apply_env()?;
        Ok(cfg)
    }

    fn from_file(file: PipelineConfigFile) -> Result<Self> {
        let ball_history_capacity = file
            .ball
            .and_then(|ball| ball.history_capacity)
            .unwrap_or(DEFAULT_HISTORY_CAPACITY);
        let saves = SaveThresholds {
            proximity_px: file
                .saves
                .as_ref()
                .and_then(|saves| saves.proximity_px)
                .unwrap_or(DEFAULT_PROXIMITY_PX),
            speed_px_per_frame: file
                .saves
                .as_ref()
                .and_then(|saves| saves.speed_px_per_frame)
                .unwrap_or(DEFAULT_SPEED_PX_PER_FRAME),
        };
        let stride = StrideSettings {
            save_detection: file
                .stride
                .as_ref()
                .and_then(|stride| stride.save_detection)
                .unwrap_or(DEFAULT_SAVE_STRIDE),
            default: file
                .stride
                .as_ref()
                .and_then(|stride| stride.default)
                .unwrap_or(DEFAULT_STRIDE),
            override_all: None,
        };
        let tracker = TrackerSettings {
            min_consecutive_frames: file
                .tracker
                .as_ref()
                .and_then(|tracker| tracker.min_consecutive_frames)
                .unwrap_or(DEFAULT_TRACKER_MIN_CONSECUTIVE),
            iou_threshold: file
                .tracker
                .as_ref()
                .and_then(|tracker| tracker.iou_threshold)
                .unwrap_or(DEFAULT_TRACKER_IOU),
            max_age: file
                .tracker
                .as_ref()
                .and_then(|tracker| tracker.max_age)
                .unwrap_or(DEFAULT_TRACKER_MAX_AGE),
        };
        let detector_file = file.detector.unwrap_or_default();
        let detector = DetectorSettings {
            backend: match detector_file.backend.as_deref() {
                Some(name) => name.parse()?,
                None => DEFAULT_BACKEND,
            },
            player_model: detector_file.player_model,
            ball_model: detector_file.ball_model,
            detections_path: detector_file.detections_path,
            confidence: detector_file.confidence.unwrap_or(DEFAULT_CONFIDENCE),
            player_input_size: detector_file
                .player_input_size
                .unwrap_or(DEFAULT_PLAYER_INPUT_SIZE),
            ball_input_size: detector_file
                .ball_input_size
                .unwrap_or(DEFAULT_BALL_INPUT_SIZE),
        };
        Ok(Self {
            ball_history_capacity,
            saves,
            stride,
            tracker,
            detector,
        })
    }

    fn apply_env(&mut self) -> Result<()> {
        if let Some(value) = env_value("PITCH_SAVE_PROXIMITY_PX") {
            self.saves.proximity_px = value
                .parse()
                .map_err(|_| anyhow!("PITCH_SAVE_PROXIMITY_PX must be a number of pixels"))?;
        }
        if let Some(value) = env_value("PITCH_SAVE_SPEED_PX") {
            self.saves.speed_px_per_frame = value
                .parse()
                .map_err(|_| anyhow!("PITCH_SAVE_SPEED_PX must be a number of pixels per frame"))?;
        }
        if let Some(value) = env_value("PITCH_BALL_HISTORY") {
            self.ball_history_capacity = value
                .parse()
                .map_err(|_| anyhow!("PITCH_BALL_HISTORY must be a non-negative integer"))?;
        }
        if let Some(value) = env_value("PITCH_STRIDE") {
            let stride: u32 = value
                .parse()
                .map_err(|_| anyhow!("PITCH_STRIDE must be a non-negative integer"))?;
            self.stride.override_all = Some(stride);
        }
        if let Some(value) = env_value("PITCH_DETECTIONS_PATH") {
            self.detector.detections_path = Some(PathBuf::from(value));
        }
        if let Some(value) = env_value("PITCH_DETECTOR_BACKEND") {
            self.detector.backend = value.parse()?;
        }
        Ok(())
    }

    /// Check the configuration for a run over `source`.
    pub fn validate(&self, source: &str) -> Result<()> {
        if self.ball_history_capacity == 0 {
            bail!("ball history capacity must be greater than zero");
        }
        self.saves.validate()?;
        if self.stride.save_detection == 0 || self.stride.default == 0 {
            bail!("stride must be greater than zero");
        }
        if self.stride.override_all == Some(0) {
            bail!("stride must be greater than zero");
        }
        if self.tracker.min_consecutive_frames == 0 {
            bail!("tracker min_consecutive_frames must be greater than zero");
        }
        let iou = self.tracker.iou_threshold;
        if !iou.is_finite() || iou <= 0.0 || iou > 1.0 {
            bail!("tracker iou_threshold must be in (0, 1]");
        }
        let confidence = self.detector.confidence;
        if !confidence.is_finite() || !(0.0..=1.0).contains(&confidence) {
            bail!("detector confidence must be in [0, 1]");
        }
        for (model, size) in [
            ("player", self.detector.player_input_size),
            ("ball", self.detector.ball_input_size),
        ] {
            if size == 0 || size % MODEL_INPUT_ALIGN != 0 {
                bail!(
                    "{} model input size must be a positive multiple of {}",
                    model,
                    MODEL_INPUT_ALIGN
                );
            }
        }
        self.check_backend_source(source)?;
        match self.detector.backend {
            BackendKind::Synthetic => {}
            BackendKind::Scripted => {
                if self.detector.detections_path.is_none() {
                    bail!("scripted backend requires a detections file (detector.detections_path, PITCH_DETECTIONS_PATH or --detections)");
                }
            }
            BackendKind::Tract => {
                if !cfg!(feature = "backend-tract") {
                    bail!("tract backend requested but built without feature backend-tract");
                }
                if self.detector.player_model.is_none() {
                    bail!("tract backend requires a player model (detector.player_model or --player-model)");
                }
            }
        }
        Ok(())
    }

    fn check_backend_source(&self, source: &str) -> Result<()> {
        if self.detector.backend == BackendKind::Synthetic
            && !source.starts_with(SYNTHETIC_SOURCE_PREFIX)
        {
            bail!(
                "synthetic detector only runs on {}<name> sources; choose a detector backend for '{}' (detector.backend, PITCH_DETECTOR_BACKEND or --backend)",
                SYNTHETIC_SOURCE_PREFIX,
                source
            );
        }
        Ok(())
    }

    /// Sampling stride for `mode`.
    pub fn stride_for(&self, mode: Mode) -> u32 {
        if let Some(stride) = self.stride.override_all {
            return stride;
        }
        match mode {
            Mode::SaveDetection => self.stride.save_detection,
            _ => self.stride.default,
        }
    }

    pub fn pipeline_settings(&self) -> PipelineSettings {
        PipelineSettings {
            ball_history_capacity: self.ball_history_capacity,
            save_thresholds: self.saves,
            tracker: self.tracker,
        }
    }

    /// Register the configured detector backends for a run over `source`.
    ///
    /// `seed` only affects the synthetic backend.
    pub fn build_registry(&self, source: &str, seed: u64) -> Result<BackendRegistry> {
        self.check_backend_source(source)?;
        let mut registry = BackendRegistry::new();
        match self.detector.backend {
            BackendKind::Synthetic => registry.register(SyntheticBackend::new(seed)),
            BackendKind::Scripted => {
                let path = self
                    .detector
                    .detections_path
                    .as_ref()
                    .ok_or_else(|| anyhow!("scripted backend requires a detections file"))?;
                let backend = ScriptedBackend::from_path(path)?;
                log::info!(
                    "scripted backend: {} frames from {}",
                    backend.frame_count(),
                    path.display()
                );
                registry.register(backend);
            }
            BackendKind::Tract => self.register_tract(&mut registry)?,
        }
        Ok(registry)
    }

    #[cfg(feature = "backend-tract")]
    fn register_tract(&self, registry: &mut BackendRegistry) -> Result<()> {
        use crate::detect::{DetectionCapability, TractBackend};

        let player_model = self
            .detector
            .player_model
            .as_ref()
            .ok_or_else(|| anyhow!("tract backend requires a player model"))?;
        let mut player_caps = vec![DetectionCapability::Players];
        if self.detector.ball_model.is_none() {
            player_caps.push(DetectionCapability::Ball);
        }
        registry.register(
            TractBackend::new(
                "tract-players",
                player_model,
                player_caps,
                self.detector.player_input_size,
            )?
            .with_threshold(self.detector.confidence),
        );
        if let Some(ball_model) = &self.detector.ball_model {
            registry.register(
                TractBackend::new(
                    "tract-ball",
                    ball_model,
                    vec![DetectionCapability::Ball],
                    self.detector.ball_input_size,
                )?
                .with_threshold(self.detector.confidence),
            );
        }
        Ok(())
    }

    #[cfg(not(feature = "backend-tract"))]
    fn register_tract(&self, _registry: &mut BackendRegistry) -> Result<()> {
        bail!("tract backend requested but built without feature backend-tract")
    }
}

fn env_value(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|value| !value.trim().is_empty())
}

fn read_config_file(path: &Path) -> Result<PipelineConfigFile> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read config file {}", path.display()))?;
    let is_toml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("toml"));
    let cfg = if is_toml {
        toml::from_str(&raw).map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    } else {
        serde_json::from_str(&raw)
            .map_err(|e| anyhow!("invalid config file {}: {}", path.display(), e))?
    };
    Ok(cfg)
}

#[cfg(test)]
mod tests {
    use super::*;

    const STUB_SOURCE: &str = "stub://clip";

    #[test]
    fn defaults_match_documented_values() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.ball_history_capacity, 20);
        assert_eq!(cfg.saves.proximity_px, 100.0);
        assert_eq!(cfg.saves.speed_px_per_frame, 10.0);
        assert_eq!(cfg.stride_for(Mode::SaveDetection), 30);
        assert_eq!(cfg.stride_for(Mode::PlayerTracking), 60);
        assert_eq!(cfg.tracker.min_consecutive_frames, 3);
        assert_eq!(cfg.detector.backend, BackendKind::Synthetic);
        cfg.validate(STUB_SOURCE).unwrap();
    }

    #[test]
    fn stride_override_applies_to_every_mode() {
        let mut cfg = PipelineConfig::default();
        cfg.stride.override_all = Some(5);
        for mode in Mode::ALL {
            assert_eq!(cfg.stride_for(mode), 5);
        }
    }

    #[test]
    fn validation_rejects_bad_values() {
        let mut cfg = PipelineConfig::default();
        cfg.ball_history_capacity = 0;
        assert!(cfg.validate(STUB_SOURCE).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.saves.speed_px_per_frame = f32::NAN;
        assert!(cfg.validate(STUB_SOURCE).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.stride.override_all = Some(0);
        assert!(cfg.validate(STUB_SOURCE).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.tracker.iou_threshold = 1.5;
        assert!(cfg.validate(STUB_SOURCE).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.detector.backend = BackendKind::Scripted;
        assert!(cfg.validate(STUB_SOURCE).is_err());
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!("Scripted".parse::<BackendKind>().unwrap(), BackendKind::Scripted);
        assert!("onnxruntime".parse::<BackendKind>().is_err());
    }

    #[test]
    fn synthetic_backend_is_limited_to_stub_sources() {
        let cfg = PipelineConfig::default();
        let err = cfg.validate("match.mp4").unwrap_err();
        assert!(err.to_string().contains("synthetic"));
        assert!(cfg.build_registry("match.mp4", 0).is_err());
        assert!(cfg.build_registry(STUB_SOURCE, 0).is_ok());
    }

    #[test]
    fn model_input_sizes_default_per_model_and_must_align() {
        let cfg = PipelineConfig::default();
        assert_eq!(cfg.detector.player_input_size, 1280);
        assert_eq!(cfg.detector.ball_input_size, 640);

        let mut cfg = PipelineConfig::default();
        cfg.detector.ball_input_size = 500;
        assert!(cfg.validate(STUB_SOURCE).is_err());

        let mut cfg = PipelineConfig::default();
        cfg.detector.player_input_size = 0;
        assert!(cfg.validate(STUB_SOURCE).is_err());
    }
}
