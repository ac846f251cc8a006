use std::collections::HashMap;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::Deserialize;

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{Detection, ObjectClass};
use crate::frame::Frame;

#[derive(Debug, Deserialize)]
struct ScriptFile {
    frames: Vec<ScriptFrame>,
}

#[derive(Debug, Deserialize)]
struct ScriptFrame {
    index: u64,
    #[serde(default)]
    detections: Vec<Detection>,
}

/// Replays precomputed detections keyed by decoded frame index.
///
/// Useful for running the pipeline against detections exported from another
/// inference stack. Frames missing from the script have no detections.
pub struct ScriptedBackend {
    frames: HashMap<u64, Vec<Detection>>,
}

impl ScriptedBackend {
    pub fn new(frames: HashMap<u64, Vec<Detection>>) -> Self {
        Self { frames }
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read detections file {}", path.display()))?;
        Self::from_json(&raw)
            .with_context(|| format!("invalid detections file {}", path.display()))
    }

    pub fn from_json(raw: &str) -> Result<Self> {
        let script: ScriptFile = serde_json::from_str(raw)?;
        let mut frames = HashMap::with_capacity(script.frames.len());
        for frame in script.frames {
            if frames.insert(frame.index, frame.detections).is_some() {
                return Err(anyhow!("frame {} listed more than once", frame.index));
            }
        }
        Ok(Self { frames })
    }

    pub fn frame_count(&self) -> usize {
        self.frames.len()
    }
}

impl DetectorBackend for ScriptedBackend {
    fn name(&self) -> &'static str {
        "scripted"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::Players | DetectionCapability::Ball
        )
    }

    fn detect(&mut self, frame: &Frame, capability: DetectionCapability) -> Result<Vec<Detection>> {
        let Some(detections) = self.frames.get(&frame.index) else {
            return Ok(Vec::new());
        };
        Ok(match capability {
            DetectionCapability::Ball => detections
                .iter()
                .filter(|d| d.class == ObjectClass::Ball)
                .cloned()
                .collect(),
            _ => detections.clone(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SCRIPT: &str = r#"{
        "frames": [
            {"index": 0, "detections": [
                {"class_id": 0, "bbox": [10, 10, 20, 20], "confidence": 0.8},
                {"class_id": 1, "bbox": [0, 0, 40, 80]}
            ]},
            {"index": 30, "detections": []}
        ]
    }"#;

    #[test]
    fn scripted_backend_replays_by_frame_index() {
        let mut backend = ScriptedBackend::from_json(SCRIPT).unwrap();
        assert_eq!(backend.frame_count(), 2);

        let frame = Frame::blank(0, 2, 2);
        let players = backend
            .detect(&frame, DetectionCapability::Players)
            .unwrap();
        assert_eq!(players.len(), 2);
        let balls = backend.detect(&frame, DetectionCapability::Ball).unwrap();
        assert_eq!(balls.len(), 1);
        assert_eq!(balls[0].class, ObjectClass::Ball);

        let unscripted = Frame::blank(60, 2, 2);
        assert!(backend
            .detect(&unscripted, DetectionCapability::Players)
            .unwrap()
            .is_empty());
    }

    #[test]
    fn scripted_backend_rejects_duplicate_frames() {
        let raw = r#"{"frames": [{"index": 1}, {"index": 1}]}"#;
        assert!(ScriptedBackend::from_json(raw).is_err());
    }
}
