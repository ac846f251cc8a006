use anyhow::Result;

use crate::detect::result::Detection;
use crate::frame::Frame;

/// Detection capabilities supported by backends.
#[non_exhaustive]
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DetectionCapability {
    /// Players, goalkeepers and referees (the ball may also appear).
    Players,
    /// Dedicated ball detection.
    Ball,
    /// Pitch keypoints for homography.
    PitchKeypoints,
}

/// Detector backend trait.
///
/// Backends are black boxes to the pipeline: a frame goes in, per-frame
/// detections come out. A backend must not reorder or drop frames on its own;
/// the pipeline depends on strict frame order for speed computation.
pub trait DetectorBackend: Send {
    /// Backend identifier.
    fn name(&self) -> &'static str;

    /// Returns true when the backend supports a capability.
    fn supports(&self, capability: DetectionCapability) -> bool;

    /// Run detection on a frame for the requested capability.
    ///
    /// Returned detections are in frame pixel coordinates.
    fn detect(&mut self, frame: &Frame, capability: DetectionCapability) -> Result<Vec<Detection>>;

    /// Optional warm-up hook.
    fn warm_up(&mut self) -> Result<()> {
        Ok(())
    }
}
