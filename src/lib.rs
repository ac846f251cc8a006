//! Pitch Kernel
//!
//! Per-frame analysis of football match video: object detection, ball
//! position smoothing, identity tracking, and goalkeeper save detection.
//!
//! # Architecture
//!
//! The pipeline is single-threaded and frame-at-a-time:
//!
//! 1. A `FrameSource` yields sampled RGB frames in decode order.
//! 2. Detector backends, selected through a `BackendRegistry` by capability,
//!    turn each frame into class-labelled boxes.
//! 3. The handler for the selected `Mode` routes detections through the
//!    `PositionSmoother`, `IouTracker` and `SaveDetector` as that mode needs.
//! 4. An `Annotator` draws the frame's overlay and a `FrameSink` receives the
//!    result. Sinks are scoped and always closed, even on error or interrupt.
//!
//! # Module Structure
//!
//! - `config`: layered configuration (defaults, file, environment)
//! - `detect`: detection types, backend trait, registry and backends
//! - `events`: save detection state machine
//! - `frame`: decoded RGB frame
//! - `ingest`: frame sources (local files, synthetic `stub://`)
//! - `pipeline`: modes, per-mode handlers and the run loop
//! - `render`: annotation boundary
//! - `sink`: output sinks
//! - `track`: ball position smoothing and IoU tracking

pub mod config;
pub mod detect;
pub mod events;
pub mod frame;
pub mod ingest;
pub mod pipeline;
pub mod render;
pub mod sink;
pub mod track;

pub use config::{BackendKind, PipelineConfig};
pub use detect::{
    BackendRegistry, BoundingBox, Detection, DetectionCapability, DetectorBackend, ObjectClass,
    Point,
};
pub use events::{SaveDetector, SaveEvent, SaveThresholds};
pub use frame::Frame;
pub use ingest::{FileConfig, FileSource, FrameSource, SourceStats};
pub use pipeline::{Mode, Pipeline, PipelineSettings, RunSummary, StopFlag};
pub use render::{Annotator, Overlay, PassthroughAnnotator};
pub use sink::{FrameSink, NullSink, ScopedSink};
pub use track::{IouTracker, ObjectTracker, PositionSmoother, TrackerSettings};

#[cfg(feature = "sink-image")]
pub use sink::ImageSequenceSink;
