//! Goalkeeper save detection.
//!
//! A save fires on a frame when the ball moved faster than the speed threshold
//! since its previous sighting AND some goalkeeper's box centre is within the
//! proximity threshold of the ball. Evaluation stops at the first qualifying
//! goalkeeper, so a frame counts at most once. There is no cooldown: a
//! condition that holds over consecutive frames counts on each of them.
//!
//! Speed is measured in pixels per sampled frame and is therefore coupled to
//! the source stride and resolution.

use anyhow::{anyhow, Result};
use serde::Serialize;

use crate::detect::{Detection, Point};

pub const DEFAULT_PROXIMITY_PX: f32 = 100.0;
pub const DEFAULT_SPEED_PX_PER_FRAME: f32 = 10.0;

#[derive(Clone, Copy, Debug, PartialEq)]
pub struct SaveThresholds {
    /// Ball to goalkeeper-centre distance must be strictly below this.
    pub proximity_px: f32,
    /// Ball displacement since the previous sighting must be strictly above this.
    pub speed_px_per_frame: f32,
}

impl Default for SaveThresholds {
    fn default() -> Self {
        Self {
            proximity_px: DEFAULT_PROXIMITY_PX,
            speed_px_per_frame: DEFAULT_SPEED_PX_PER_FRAME,
        }
    }
}

impl SaveThresholds {
    pub fn validate(&self) -> Result<()> {
        if !self.proximity_px.is_finite() || self.proximity_px <= 0.0 {
            return Err(anyhow!("save proximity threshold must be a positive number"));
        }
        if !self.speed_px_per_frame.is_finite() || self.speed_px_per_frame <= 0.0 {
            return Err(anyhow!("save speed threshold must be a positive number"));
        }
        Ok(())
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SaveDetectorState {
    AwaitingFirstSighting,
    Tracking,
}

/// A detected save.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct SaveEvent {
    /// 1-based running count at the time of this save.
    pub save_number: u64,
    pub frame_index: u64,
    /// Ball displacement since the previous sighting, in pixels.
    pub speed: f32,
    /// Ball to goalkeeper-centre distance, in pixels.
    pub distance: f32,
    /// Position of the qualifying goalkeeper in the frame's goalkeeper list.
    pub goalkeeper_index: usize,
    pub ball_position: Point,
}

/// Stateful save rule, evaluated once per frame in frame order.
#[derive(Clone, Debug)]
pub struct SaveDetector {
    thresholds: SaveThresholds,
    state: SaveDetectorState,
    previous: Option<Point>,
    last_speed: Option<f32>,
    saves: u64,
}

impl SaveDetector {
    pub fn new(thresholds: SaveThresholds) -> Result<Self> {
        thresholds.validate()?;
        Ok(Self {
            thresholds,
            state: SaveDetectorState::AwaitingFirstSighting,
            previous: None,
            last_speed: None,
            saves: 0,
        })
    }

    /// Evaluate one frame.
    ///
    /// `ball` is the frame's smoothed ball position (`None` when the ball was
    /// not seen); `goalkeepers` are the frame's goalkeeper detections.
    pub fn evaluate(
        &mut self,
        frame_index: u64,
        ball: Option<Point>,
        goalkeepers: &[Detection],
    ) -> Option<SaveEvent> {
        self.last_speed = None;

        let Some(current) = ball else {
            log::debug!("frame {}: no ball, save rule skipped", frame_index);
            return None;
        };

        let Some(previous) = self.previous.replace(current) else {
            self.state = SaveDetectorState::Tracking;
            log::debug!("frame {}: first ball sighting", frame_index);
            return None;
        };

        let speed = current.distance(previous);
        self.last_speed = Some(speed);
        if speed <= self.thresholds.speed_px_per_frame {
            return None;
        }

        let (goalkeeper_index, distance) = goalkeepers
            .iter()
            .map(|gk| current.distance(gk.bbox.center()))
            .enumerate()
            .find(|(_, distance)| *distance < self.thresholds.proximity_px)?;

        self.saves += 1;
        Some(SaveEvent {
            save_number: self.saves,
            frame_index,
            speed,
            distance,
            goalkeeper_index,
            ball_position: current,
        })
    }

    pub fn saves(&self) -> u64 {
        self.saves
    }

    pub fn state(&self) -> SaveDetectorState {
        self.state
    }

    /// Ball position from the most recent sighting.
    pub fn previous(&self) -> Option<Point> {
        self.previous
    }

    /// Speed computed on the last evaluated frame, if any.
    pub fn last_speed(&self) -> Option<f32> {
        self.last_speed
    }

    pub fn thresholds(&self) -> SaveThresholds {
        self.thresholds
    }
}
