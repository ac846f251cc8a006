use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use pitch_kernel::config::{BackendKind, PipelineConfig};
use pitch_kernel::Mode;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "PITCH_CONFIG",
        "PITCH_SAVE_PROXIMITY_PX",
        "PITCH_SAVE_SPEED_PX",
        "PITCH_BALL_HISTORY",
        "PITCH_STRIDE",
        "PITCH_DETECTIONS_PATH",
        "PITCH_DETECTOR_BACKEND",
    ] {
        std::env::remove_var(key);
    }
}

fn config_file(suffix: &str, contents: &str) -> NamedTempFile {
    let mut file = tempfile::Builder::new()
        .suffix(suffix)
        .tempfile()
        .expect("temp config");
    file.write_all(contents.as_bytes()).expect("write config");
    file
}

#[test]
fn loads_json_config_from_env_path_with_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{
            "ball": { "history_capacity": 12 },
            "saves": { "proximity_px": 80.0, "speed_px_per_frame": 15.0 },
            "stride": { "save_detection": 10, "default": 20 },
            "tracker": { "min_consecutive_frames": 2, "iou_threshold": 0.5, "max_age": 10 },
            "detector": { "backend": "scripted", "detections_path": "dets.json", "confidence": 0.4 }
        }"#,
    );

    std::env::set_var("PITCH_CONFIG", file.path());
    std::env::set_var("PITCH_SAVE_SPEED_PX", "25");
    std::env::set_var("PITCH_DETECTIONS_PATH", "override.json");

    let cfg = PipelineConfig::load(None).expect("load config");
    cfg.validate("match.mp4").expect("valid config");

    assert_eq!(cfg.ball_history_capacity, 12);
    assert_eq!(cfg.saves.proximity_px, 80.0);
    assert_eq!(cfg.saves.speed_px_per_frame, 25.0);
    assert_eq!(cfg.stride_for(Mode::SaveDetection), 10);
    assert_eq!(cfg.stride_for(Mode::BallDetection), 20);
    assert_eq!(cfg.tracker.min_consecutive_frames, 2);
    assert_eq!(cfg.tracker.max_age, 10);
    assert_eq!(cfg.detector.backend, BackendKind::Scripted);
    assert_eq!(
        cfg.detector.detections_path.as_deref(),
        Some(std::path::Path::new("override.json"))
    );
    assert_eq!(cfg.detector.confidence, 0.4);

    let settings = cfg.pipeline_settings();
    assert_eq!(settings.ball_history_capacity, 12);
    assert_eq!(settings.save_thresholds.proximity_px, 80.0);

    clear_env();
}

#[test]
fn toml_config_is_parsed_by_extension() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".toml",
        r#"
[saves]
proximity_px = 120.0

[stride]
save_detection = 15
"#,
    );
    std::env::set_var("PITCH_STRIDE", "3");

    let cfg = PipelineConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.saves.proximity_px, 120.0);
    assert_eq!(cfg.saves.speed_px_per_frame, 10.0);
    assert_eq!(cfg.stride.save_detection, 15);
    assert_eq!(cfg.stride_for(Mode::SaveDetection), 3);
    assert_eq!(cfg.stride_for(Mode::PlayerDetection), 3);

    clear_env();
}

#[test]
fn defaults_apply_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load(None).expect("load config");
    assert_eq!(cfg, PipelineConfig::default());
    assert_eq!(cfg.stride_for(Mode::SaveDetection), 30);
    assert_eq!(cfg.stride_for(Mode::PlayerDetection), 60);
    cfg.validate("stub://clip").expect("defaults are valid");
}

#[test]
fn invalid_values_are_rejected() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("PITCH_BALL_HISTORY", "0");
    let cfg = PipelineConfig::load(None).expect("load config");
    assert!(cfg.validate("stub://clip").is_err());
    clear_env();

    std::env::set_var("PITCH_SAVE_PROXIMITY_PX", "close");
    assert!(PipelineConfig::load(None).is_err());
    clear_env();

    std::env::set_var("PITCH_DETECTOR_BACKEND", "onnxruntime");
    assert!(PipelineConfig::load(None).is_err());
    clear_env();

    let file = config_file(".json", r#"{"stride": {"default": 0}}"#);
    let cfg = PipelineConfig::load(Some(file.path())).expect("load config");
    let err = cfg.validate("stub://clip").unwrap_err();
    assert!(err.to_string().contains("stride"));

    let file = config_file(".json", "{ not json");
    assert!(PipelineConfig::load(Some(file.path())).is_err());

    clear_env();
}

#[test]
fn scripted_registry_is_built_from_detections_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let detections = config_file(
        ".json",
        r#"{"frames": [{"index": 0, "detections": [{"class_id": 0, "bbox": [1, 2, 3, 4]}]}]}"#,
    );
    let mut cfg = PipelineConfig::default();
    cfg.detector.backend = BackendKind::Scripted;
    cfg.detector.detections_path = Some(detections.path().to_path_buf());
    cfg.validate("match.mp4").expect("valid config");

    let registry = cfg.build_registry("match.mp4", 0).expect("registry");
    assert_eq!(registry.list(), vec!["scripted".to_string()]);

    cfg.detector.detections_path = Some(detections.path().with_extension("missing"));
    assert!(cfg.build_registry("match.mp4", 0).is_err());
}

#[test]
fn default_config_rejects_local_video_before_any_frame() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = PipelineConfig::load(None).expect("load config");
    assert_eq!(cfg.detector.backend, BackendKind::Synthetic);

    let err = cfg.validate("match.mp4").unwrap_err();
    assert!(err.to_string().contains("match.mp4"));
    assert!(cfg.build_registry("match.mp4", 0).is_err());

    cfg.validate("stub://match?frames=10").expect("stub source is allowed");
    let registry = cfg
        .build_registry("stub://match?frames=10", 0)
        .expect("registry");
    assert_eq!(registry.list(), vec!["synthetic".to_string()]);
}

#[test]
fn model_input_sizes_load_from_file() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let file = config_file(
        ".json",
        r#"{"detector": {"player_input_size": 960, "ball_input_size": 320}}"#,
    );
    let cfg = PipelineConfig::load(Some(file.path())).expect("load config");
    assert_eq!(cfg.detector.player_input_size, 960);
    assert_eq!(cfg.detector.ball_input_size, 320);
    cfg.validate("stub://clip").expect("valid config");
}
