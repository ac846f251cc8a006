//! Output sinks for annotated frames.
//!
//! Sinks are scoped resources: `ScopedSink` opens a sink and guarantees it is
//! closed on every exit path. Call `finish` to observe close errors; a guard
//! dropped during an early return or error still closes the sink and logs any
//! failure.

#[cfg(feature = "sink-image")]
pub mod image_seq;

use anyhow::Result;

use crate::frame::Frame;

#[cfg(feature = "sink-image")]
pub use image_seq::ImageSequenceSink;

/// Ordered consumer of annotated frames.
pub trait FrameSink {
    fn open(&mut self) -> Result<()>;
    fn write_frame(&mut self, frame: &Frame) -> Result<()>;
    fn close(&mut self) -> Result<()>;
}

/// Open-on-create, close-on-drop wrapper around a sink.
pub struct ScopedSink<'a> {
    sink: &'a mut dyn FrameSink,
    closed: bool,
}

impl<'a> ScopedSink<'a> {
    pub fn open(sink: &'a mut dyn FrameSink) -> Result<Self> {
        sink.open()?;
        Ok(Self {
            sink,
            closed: false,
        })
    }

    pub fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        self.sink.write_frame(frame)
    }

    /// Close the sink, surfacing any error.
    pub fn finish(mut self) -> Result<()> {
        self.closed = true;
        self.sink.close()
    }
}

impl Drop for ScopedSink<'_> {
    fn drop(&mut self) {
        if !self.closed {
            self.closed = true;
            if let Err(e) = self.sink.close() {
                log::error!("failed to close frame sink: {}", e);
            }
        }
    }
}

/// Discards frames, keeping counts.
#[derive(Debug, Default)]
pub struct NullSink {
    frames_written: u64,
    last_index: Option<u64>,
    open: bool,
    closed: bool,
}

impl NullSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn last_index(&self) -> Option<u64> {
        self.last_index
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl FrameSink for NullSink {
    fn open(&mut self) -> Result<()> {
        self.open = true;
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.open || self.closed {
            anyhow::bail!("NullSink: write on a sink that is not open");
        }
        self.frames_written += 1;
        self.last_index = Some(frame.index);
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scoped_sink_closes_on_drop() {
        let mut sink = NullSink::new();
        {
            let mut scoped = ScopedSink::open(&mut sink).unwrap();
            scoped.write_frame(&Frame::blank(4, 2, 2)).unwrap();
        }
        assert!(sink.is_closed());
        assert_eq!(sink.frames_written(), 1);
        assert_eq!(sink.last_index(), Some(4));
    }

    #[test]
    fn scoped_sink_finish_closes_once() {
        let mut sink = NullSink::new();
        let scoped = ScopedSink::open(&mut sink).unwrap();
        scoped.finish().unwrap();
        assert!(sink.is_closed());
        assert!(sink.write_frame(&Frame::blank(0, 1, 1)).is_err());
    }
}
