//! Temporal state over detections: ball position smoothing and identity tracking.

pub mod smoother;
pub mod tracker;

pub use smoother::{BallVisibility, PositionSmoother, DEFAULT_HISTORY_CAPACITY};
pub use tracker::{IouTracker, ObjectTracker, TrackerSettings};
