use anyhow::Result;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use crate::detect::backend::{DetectionCapability, DetectorBackend};
use crate::detect::result::{BoundingBox, Detection, ObjectClass};
use crate::frame::Frame;

const BALL_SIZE: f32 = 12.0;
const SHOT_START_X: f32 = 200.0;
const SHOT_SPEED: f32 = 40.0;
const REBOUND_SPEED: f32 = 60.0;
const APPROACH_STEPS: u64 = 24;
const REBOUND_STEPS: u64 = 6;

/// Seeded stand-in for the detection models, for `stub://` sources.
///
/// Plays a repeating scene: the ball is shot from midfield at a goalkeeper on
/// the right edge and rebounds. The ball is randomly occluded with
/// `occlusion` probability.
pub struct SyntheticBackend {
    rng: StdRng,
    occlusion: f64,
    last_index: Option<u64>,
    step: u64,
    ball_visible: bool,
    ball_jitter: f32,
}

impl SyntheticBackend {
    pub fn new(seed: u64) -> Self {
        Self {
            rng: StdRng::seed_from_u64(seed),
            occlusion: 0.2,
            last_index: None,
            step: 0,
            ball_visible: true,
            ball_jitter: 0.0,
        }
    }

    pub fn with_occlusion(mut self, probability: f64) -> Self {
        self.occlusion = probability.clamp(0.0, 1.0);
        self
    }

    // Both capabilities are queried per frame; the scene advances once per frame.
    fn advance(&mut self, frame: &Frame) {
        if self.last_index == Some(frame.index) {
            return;
        }
        if self.last_index.is_some() {
            self.step += 1;
        }
        self.last_index = Some(frame.index);
        self.ball_visible = !self.rng.gen_bool(self.occlusion);
        self.ball_jitter = self.rng.gen_range(-3.0..3.0);
    }

    fn keeper_box(frame: &Frame) -> BoundingBox {
        let cx = frame.width as f32 - 80.0;
        let cy = frame.height as f32 / 2.0;
        BoundingBox::new(cx - 20.0, cy - 45.0, cx + 20.0, cy + 45.0)
    }

    fn ball_box(&self, frame: &Frame) -> BoundingBox {
        let keeper_x = Self::keeper_box(frame).center().x;
        let cycle = self.step % (APPROACH_STEPS + REBOUND_STEPS);
        let x = if cycle < APPROACH_STEPS {
            (SHOT_START_X + SHOT_SPEED * cycle as f32).min(keeper_x - 30.0)
        } else {
            keeper_x - 30.0 - REBOUND_SPEED * (cycle - APPROACH_STEPS + 1) as f32
        };
        let y = frame.height as f32 / 2.0 + self.ball_jitter;
        BoundingBox::new(x, y, x + BALL_SIZE, y + BALL_SIZE)
    }

    fn people(&self, frame: &Frame) -> Vec<Detection> {
        let w = frame.width as f32;
        let h = frame.height as f32;
        let drift = (self.step % 40) as f32 * 2.0;
        let mut out = vec![Detection::new(ObjectClass::Goalkeeper, Self::keeper_box(frame))
            .with_confidence(0.9)];
        for (i, fx) in [0.3f32, 0.45, 0.6, 0.75].iter().enumerate() {
            let x = w * fx + drift;
            let y = h * (0.25 + 0.15 * i as f32);
            out.push(
                Detection::new(ObjectClass::Player, BoundingBox::new(x, y, x + 30.0, y + 80.0))
                    .with_confidence(0.85),
            );
        }
        out.push(
            Detection::new(
                ObjectClass::Referee,
                BoundingBox::new(w * 0.5, h * 0.1, w * 0.5 + 30.0, h * 0.1 + 80.0),
            )
            .with_confidence(0.8),
        );
        out
    }
}

impl DetectorBackend for SyntheticBackend {
    fn name(&self) -> &'static str {
        "synthetic"
    }

    fn supports(&self, capability: DetectionCapability) -> bool {
        matches!(
            capability,
            DetectionCapability::Players | DetectionCapability::Ball
        )
    }

    fn detect(&mut self, frame: &Frame, capability: DetectionCapability) -> Result<Vec<Detection>> {
        self.advance(frame);
        match capability {
            DetectionCapability::Ball if self.ball_visible => Ok(vec![Detection::new(
                ObjectClass::Ball,
                self.ball_box(frame),
            )
            .with_confidence(0.6)]),
            DetectionCapability::Ball => Ok(Vec::new()),
            _ => Ok(self.people(frame)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn synthetic_backend_is_deterministic_per_seed() {
        let run = |seed| {
            let mut backend = SyntheticBackend::new(seed);
            (0..20u64)
                .map(|i| {
                    let frame = Frame::blank(i * 30, 1280, 720);
                    backend
                        .detect(&frame, DetectionCapability::Ball)
                        .unwrap()
                        .len()
                })
                .collect::<Vec<_>>()
        };
        assert_eq!(run(7), run(7));
    }

    #[test]
    fn synthetic_backend_advances_once_per_frame() {
        let mut backend = SyntheticBackend::new(1).with_occlusion(0.0);
        let frame = Frame::blank(0, 1280, 720);
        let first = backend.detect(&frame, DetectionCapability::Ball).unwrap();
        let people = backend.detect(&frame, DetectionCapability::Players).unwrap();
        let again = backend.detect(&frame, DetectionCapability::Ball).unwrap();
        assert_eq!(first, again);
        assert!(people.iter().any(|d| d.class == ObjectClass::Goalkeeper));

        let next = Frame::blank(30, 1280, 720);
        let moved = backend.detect(&next, DetectionCapability::Ball).unwrap();
        assert!(moved[0].bbox.x1 > first[0].bbox.x1);
    }
}
