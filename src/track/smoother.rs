//! Ball position smoothing.
//!
//! `PositionSmoother` keeps a bounded history of recent ball sightings and
//! picks one representative ball detection per frame:
//! - Empty history: the first candidate in input order.
//! - Otherwise: the candidate whose anchor is closest to the history centroid
//!   (ties go to the earlier candidate).
//!
//! Frames without a ball are skipped. Nothing is appended and no position is
//! synthesized, so occlusion shows up as a gap rather than as motion.

use std::collections::VecDeque;

use anyhow::{anyhow, Result};

use crate::detect::{Detection, Point};

/// Default history capacity.
pub const DEFAULT_HISTORY_CAPACITY: usize = 20;

/// Whether the ball has been seen, relative to the most recent frame.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum BallVisibility {
    /// No sighting since the pipeline started.
    NeverSeen,
    /// Seen earlier, missing in the latest frame.
    Absent,
    /// Seen in the latest frame.
    Present,
}

/// Bounded sliding window of ball positions.
#[derive(Clone, Debug)]
pub struct PositionSmoother {
    history: VecDeque<Point>,
    capacity: usize,
    present: bool,
}

impl PositionSmoother {
    /// Create a smoother. A zero capacity is rejected.
    pub fn new(capacity: usize) -> Result<Self> {
        if capacity == 0 {
            return Err(anyhow!("ball history capacity must be greater than zero"));
        }
        Ok(Self {
            history: VecDeque::with_capacity(capacity),
            capacity,
            present: false,
        })
    }

    /// Feed one frame's ball candidates (already filtered to the ball class).
    ///
    /// Returns the selected detection, or `None` when the frame had no ball.
    pub fn update(&mut self, balls: &[Detection]) -> Option<Detection> {
        let Some(index) = self.select(balls) else {
            self.present = false;
            return None;
        };
        let selected = balls[index].clone();

        while self.history.len() >= self.capacity {
            self.history.pop_front();
        }
        self.history.push_back(anchor(&selected));
        self.present = true;
        Some(selected)
    }

    fn select(&self, balls: &[Detection]) -> Option<usize> {
        if balls.is_empty() {
            return None;
        }
        let Some(centroid) = self.centroid() else {
            return Some(0);
        };
        let mut best = 0;
        let mut best_distance = f32::INFINITY;
        for (i, ball) in balls.iter().enumerate() {
            let distance = anchor(ball).distance(centroid);
            if distance < best_distance {
                best = i;
                best_distance = distance;
            }
        }
        Some(best)
    }

    /// Mean of the positions currently held.
    pub fn centroid(&self) -> Option<Point> {
        if self.history.is_empty() {
            return None;
        }
        let n = self.history.len() as f32;
        let (sx, sy) = self
            .history
            .iter()
            .fold((0.0f32, 0.0f32), |(sx, sy), p| (sx + p.x, sy + p.y));
        Some(Point::new(sx / n, sy / n))
    }

    /// Ball position in the latest frame, if the ball was seen in it.
    pub fn current(&self) -> Option<Point> {
        if self.present {
            self.history.back().copied()
        } else {
            None
        }
    }

    /// Most recent sighting, however old.
    pub fn latest(&self) -> Option<Point> {
        self.history.back().copied()
    }

    pub fn visibility(&self) -> BallVisibility {
        match (self.present, self.history.is_empty()) {
            (true, _) => BallVisibility::Present,
            (false, true) => BallVisibility::NeverSeen,
            (false, false) => BallVisibility::Absent,
        }
    }

    pub fn history(&self) -> impl Iterator<Item = &Point> + '_ {
        self.history.iter()
    }

    pub fn len(&self) -> usize {
        self.history.len()
    }

    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }
}

/// Position recorded for a ball detection: the box's top-left corner.
pub fn anchor(detection: &Detection) -> Point {
    detection.bbox.top_left()
}
