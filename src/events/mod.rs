//! Higher-level events derived from the temporal evolution of detections.

pub mod save;

pub use save::{
    SaveDetector, SaveDetectorState, SaveEvent, SaveThresholds, DEFAULT_PROXIMITY_PX,
    DEFAULT_SPEED_PX_PER_FRAME,
};
