//! Annotation boundary.
//!
//! Drawing overlays is delegated to an `Annotator`. The pipeline treats it as
//! a pure function of the frame and the frame's overlay data; annotators never
//! see tracking or event state.

use anyhow::Result;

use crate::detect::Detection;
use crate::frame::Frame;

/// Per-frame data an annotator may draw.
#[derive(Clone, Copy, Debug, Default)]
pub struct Overlay<'a> {
    pub detections: &'a [Detection],
    /// The smoothed ball detection, when the mode tracks the ball.
    pub ball: Option<&'a Detection>,
}

pub trait Annotator {
    fn annotate(&self, frame: Frame, overlay: &Overlay<'_>) -> Result<Frame>;
}

/// Returns frames unchanged.
#[derive(Clone, Copy, Debug, Default)]
pub struct PassthroughAnnotator;

impl Annotator for PassthroughAnnotator {
    fn annotate(&self, frame: Frame, _overlay: &Overlay<'_>) -> Result<Frame> {
        Ok(frame)
    }
}
