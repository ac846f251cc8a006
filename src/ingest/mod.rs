//! Frame ingestion sources.
//!
//! This module provides sources of decoded RGB frames:
//! - Local video files (feature: ingest-file-ffmpeg)
//! - Synthetic `stub://` source (testing and demos)
//!
//! Sources apply the sampling stride themselves: only every Nth decoded frame
//! is yielded, and each `Frame` keeps its decoded index. Sources yield frames
//! in decode order and signal exhaustion with `Ok(None)`. A source is
//! restartable only by opening it again.

pub mod file;
#[cfg(feature = "ingest-file-ffmpeg")]
pub(crate) mod file_ffmpeg;

use anyhow::Result;
use serde::Serialize;

use crate::frame::Frame;

pub use file::{FileConfig, FileSource};

/// Ordered, finite source of frames.
pub trait FrameSource {
    /// Open the underlying stream.
    fn connect(&mut self) -> Result<()>;

    /// Next sampled frame, or `None` once the stream is exhausted.
    fn next_frame(&mut self) -> Result<Option<Frame>>;

    fn stats(&self) -> SourceStats;
}

/// Counters for a frame source.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct SourceStats {
    /// Frames decoded, including those skipped by the stride.
    pub frames_decoded: u64,
    /// Frames handed to the caller.
    pub frames_yielded: u64,
    pub path: String,
}
