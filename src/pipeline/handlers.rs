//! One handler per analysis mode.
//!
//! `handler_for` is the only place that maps a `Mode` to behaviour. Modes
//! whose collaborators this crate does not provide (pitch keypoints, team
//! classification, homography) are rejected there, before any frame is read.

use anyhow::{anyhow, Result};

use crate::detect::{
    filter_class, BackendRegistry, Detection, DetectionCapability, ObjectClass,
};
use crate::events::{SaveDetector, SaveEvent};
use crate::frame::Frame;
use crate::track::{IouTracker, ObjectTracker, PositionSmoother};

use super::mode::Mode;
use super::PipelineSettings;

/// Result of processing one frame.
#[derive(Clone, Debug, Default)]
pub struct FrameOutput {
    /// Detections to hand to the annotator.
    pub detections: Vec<Detection>,
    /// Smoothed ball detection, for modes that track the ball.
    pub ball: Option<Detection>,
    pub save: Option<SaveEvent>,
}

/// Per-mode frame processing.
pub trait ModeHandler {
    fn mode(&self) -> Mode;

    /// Detector capabilities the handler will request.
    fn capabilities(&self) -> &'static [DetectionCapability];

    fn process(&mut self, frame: &Frame, registry: &mut BackendRegistry) -> Result<FrameOutput>;

    /// Running save count, for modes that detect saves.
    fn saves(&self) -> Option<u64> {
        None
    }
}

/// Build the handler for `mode`.
pub fn handler_for(mode: Mode, settings: &PipelineSettings) -> Result<Box<dyn ModeHandler>> {
    match mode {
        Mode::PlayerDetection => Ok(Box::new(PlayerDetection)),
        Mode::BallDetection => Ok(Box::new(BallDetection::new(settings)?)),
        Mode::PlayerTracking => Ok(Box::new(PlayerTracking::new(settings)?)),
        Mode::SaveDetection => Ok(Box::new(SaveDetection::new(settings)?)),
        Mode::PitchDetection => Err(unavailable(mode, "a pitch keypoint model")),
        Mode::TeamClassification => Err(unavailable(mode, "a team classifier")),
        Mode::Radar => Err(unavailable(mode, "a pitch homography")),
    }
}

fn unavailable(mode: Mode, needs: &str) -> anyhow::Error {
    anyhow!(
        "mode {} is not implemented: it requires {}, which this build does not provide",
        mode,
        needs
    )
}

// ----------------------------------------------------------------------------
// PLAYER_DETECTION
// ----------------------------------------------------------------------------

pub struct PlayerDetection;

impl ModeHandler for PlayerDetection {
    fn mode(&self) -> Mode {
        Mode::PlayerDetection
    }

    fn capabilities(&self) -> &'static [DetectionCapability] {
        &[DetectionCapability::Players]
    }

    fn process(&mut self, frame: &Frame, registry: &mut BackendRegistry) -> Result<FrameOutput> {
        let detections = registry.detect_with_capability(DetectionCapability::Players, frame)?;
        Ok(FrameOutput {
            detections,
            ..FrameOutput::default()
        })
    }
}

// ----------------------------------------------------------------------------
// BALL_DETECTION
// ----------------------------------------------------------------------------

pub struct BallDetection {
    smoother: PositionSmoother,
}

impl BallDetection {
    pub fn new(settings: &PipelineSettings) -> Result<Self> {
        Ok(Self {
            smoother: PositionSmoother::new(settings.ball_history_capacity)?,
        })
    }
}

impl ModeHandler for BallDetection {
    fn mode(&self) -> Mode {
        Mode::BallDetection
    }

    fn capabilities(&self) -> &'static [DetectionCapability] {
        &[DetectionCapability::Ball]
    }

    fn process(&mut self, frame: &Frame, registry: &mut BackendRegistry) -> Result<FrameOutput> {
        let raw = registry.detect_with_capability(DetectionCapability::Ball, frame)?;
        let balls = filter_class(&raw, ObjectClass::Ball);
        let ball = self.smoother.update(&balls);
        Ok(FrameOutput {
            detections: ball.iter().cloned().collect(),
            ball,
            save: None,
        })
    }
}

// ----------------------------------------------------------------------------
// PLAYER_TRACKING
// ----------------------------------------------------------------------------

pub struct PlayerTracking {
    tracker: IouTracker,
}

impl PlayerTracking {
    pub fn new(settings: &PipelineSettings) -> Result<Self> {
        Ok(Self {
            tracker: IouTracker::new(settings.tracker)?,
        })
    }
}

impl ModeHandler for PlayerTracking {
    fn mode(&self) -> Mode {
        Mode::PlayerTracking
    }

    fn capabilities(&self) -> &'static [DetectionCapability] {
        &[DetectionCapability::Players]
    }

    fn process(&mut self, frame: &Frame, registry: &mut BackendRegistry) -> Result<FrameOutput> {
        let people: Vec<Detection> = registry
            .detect_with_capability(DetectionCapability::Players, frame)?
            .into_iter()
            .filter(|d| d.class != ObjectClass::Ball)
            .collect();
        Ok(FrameOutput {
            detections: self.tracker.update(people),
            ..FrameOutput::default()
        })
    }
}

// ----------------------------------------------------------------------------
// SAVE_DETECTION
// ----------------------------------------------------------------------------

pub struct SaveDetection {
    smoother: PositionSmoother,
    detector: SaveDetector,
}

impl SaveDetection {
    pub fn new(settings: &PipelineSettings) -> Result<Self> {
        Ok(Self {
            smoother: PositionSmoother::new(settings.ball_history_capacity)?,
            detector: SaveDetector::new(settings.save_thresholds)?,
        })
    }

    pub fn smoother(&self) -> &PositionSmoother {
        &self.smoother
    }

    pub fn detector(&self) -> &SaveDetector {
        &self.detector
    }
}

impl ModeHandler for SaveDetection {
    fn mode(&self) -> Mode {
        Mode::SaveDetection
    }

    fn capabilities(&self) -> &'static [DetectionCapability] {
        &[DetectionCapability::Players, DetectionCapability::Ball]
    }

    fn process(&mut self, frame: &Frame, registry: &mut BackendRegistry) -> Result<FrameOutput> {
        let people = registry.detect_with_capability(DetectionCapability::Players, frame)?;
        let raw_balls = registry.detect_with_capability(DetectionCapability::Ball, frame)?;

        let balls = filter_class(&raw_balls, ObjectClass::Ball);
        let ball = self.smoother.update(&balls);
        let goalkeepers = filter_class(&people, ObjectClass::Goalkeeper);
        let save = self
            .detector
            .evaluate(frame.index, self.smoother.current(), &goalkeepers);

        Ok(FrameOutput {
            detections: people,
            ball,
            save,
        })
    }

    fn saves(&self) -> Option<u64> {
        Some(self.detector.saves())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn every_mode_has_a_handler_or_a_descriptive_error() {
        let settings = PipelineSettings::default();
        for mode in Mode::ALL {
            match handler_for(mode, &settings) {
                Ok(handler) => assert_eq!(handler.mode(), mode),
                Err(e) => assert!(e.to_string().contains(mode.as_str())),
            }
        }
    }

    #[test]
    fn unimplemented_modes_are_rejected() {
        let settings = PipelineSettings::default();
        for mode in [Mode::PitchDetection, Mode::TeamClassification, Mode::Radar] {
            assert!(handler_for(mode, &settings).is_err());
        }
    }

    #[test]
    fn save_detection_reports_running_count() {
        let handler = handler_for(Mode::SaveDetection, &PipelineSettings::default()).unwrap();
        assert_eq!(handler.saves(), Some(0));
        let handler = handler_for(Mode::PlayerDetection, &PipelineSettings::default()).unwrap();
        assert_eq!(handler.saves(), None);
    }

    #[test]
    fn zero_history_capacity_fails_handler_construction() {
        let settings = PipelineSettings {
            ball_history_capacity: 0,
            ..PipelineSettings::default()
        };
        assert!(handler_for(Mode::SaveDetection, &settings).is_err());
        assert!(handler_for(Mode::BallDetection, &settings).is_err());
    }
}
