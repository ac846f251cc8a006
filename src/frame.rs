//! Decoded video frames.
//!
//! - `Frame`: RGB24 pixel buffer plus the index of the decoded frame it came from.
//!
//! Frame indices count every decoded frame of the source, including the ones a
//! stride skipped, so they stay comparable across modes with different strides.

use anyhow::{anyhow, Result};

/// One decoded RGB frame.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Frame {
    /// Index of this frame in the decoded stream (0-based).
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pixels: Vec<u8>,
}

impl Frame {
    /// Wrap an RGB24 buffer. The buffer length must be `width * height * 3`.
    pub fn new(index: u64, width: u32, height: u32, pixels: Vec<u8>) -> Result<Self> {
        let expected = (width as usize)
            .checked_mul(height as usize)
            .and_then(|v| v.checked_mul(3))
            .ok_or_else(|| anyhow!("frame dimensions overflow"))?;
        if pixels.len() != expected {
            return Err(anyhow!(
                "expected {} RGB bytes for {}x{}, received {}",
                expected,
                width,
                height,
                pixels.len()
            ));
        }
        Ok(Self {
            index,
            width,
            height,
            pixels,
        })
    }

    /// Solid black frame, used by synthetic sources.
    pub fn blank(index: u64, width: u32, height: u32) -> Self {
        Self {
            index,
            width,
            height,
            pixels: vec![0u8; width as usize * height as usize * 3],
        }
    }

    pub fn pixels(&self) -> &[u8] {
        &self.pixels
    }

    pub fn byte_len(&self) -> usize {
        self.pixels.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn frame_rejects_mismatched_buffer() {
        assert!(Frame::new(0, 4, 4, vec![0u8; 47]).is_err());
        let frame = Frame::new(3, 4, 4, vec![0u8; 48]).unwrap();
        assert_eq!(frame.index, 3);
        assert_eq!(frame.byte_len(), 48);
    }

    #[test]
    fn blank_frame_has_rgb_layout() {
        let frame = Frame::blank(0, 640, 480);
        assert_eq!(frame.pixels().len(), 640 * 480 * 3);
    }
}
