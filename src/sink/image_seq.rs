use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use image::RgbImage;

use super::FrameSink;
use crate::frame::Frame;

/// Writes each frame as `frame_<index>.png` into a directory.
pub struct ImageSequenceSink {
    dir: PathBuf,
    frames_written: u64,
    open: bool,
}

impl ImageSequenceSink {
    pub fn new<P: AsRef<Path>>(dir: P) -> Self {
        Self {
            dir: dir.as_ref().to_path_buf(),
            frames_written: 0,
            open: false,
        }
    }

    pub fn frames_written(&self) -> u64 {
        self.frames_written
    }

    pub fn frame_path(&self, index: u64) -> PathBuf {
        self.dir.join(format!("frame_{:06}.png", index))
    }
}

impl FrameSink for ImageSequenceSink {
    fn open(&mut self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create output directory {}", self.dir.display()))?;
        self.open = true;
        log::info!("ImageSequenceSink: writing frames to {}", self.dir.display());
        Ok(())
    }

    fn write_frame(&mut self, frame: &Frame) -> Result<()> {
        if !self.open {
            return Err(anyhow!("ImageSequenceSink: write before open"));
        }
        let image = RgbImage::from_raw(frame.width, frame.height, frame.pixels().to_vec())
            .ok_or_else(|| anyhow!("frame buffer does not match {}x{}", frame.width, frame.height))?;
        let path = self.frame_path(frame.index);
        image
            .save(&path)
            .with_context(|| format!("failed to write {}", path.display()))?;
        self.frames_written += 1;
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.open {
            self.open = false;
            log::info!(
                "ImageSequenceSink: closed {} after {} frames",
                self.dir.display(),
                self.frames_written
            );
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn writes_png_per_frame() {
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("frames");
        let mut sink = ImageSequenceSink::new(&out);
        sink.open().unwrap();
        sink.write_frame(&Frame::blank(30, 4, 2)).unwrap();
        sink.close().unwrap();

        assert!(sink.frame_path(30).exists());
        assert_eq!(sink.frames_written(), 1);
        assert!(sink.write_frame(&Frame::blank(60, 4, 2)).is_err());
    }
}
