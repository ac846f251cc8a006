//! Local file frame source.
//!
//! `FileSource` reads frames from a local video file (no network access) or,
//! for `stub://` paths, generates them synthetically. Synthetic paths accept
//! query parameters: `stub://clip?frames=300&width=1280&height=720`.

use anyhow::{anyhow, Context, Result};

#[cfg(feature = "ingest-file-ffmpeg")]
use super::file_ffmpeg::FfmpegFileSource;
use super::{FrameSource, SourceStats};
use crate::frame::Frame;

const SYNTHETIC_DEFAULT_FRAMES: u64 = 300;
const SYNTHETIC_DEFAULT_WIDTH: u32 = 1280;
const SYNTHETIC_DEFAULT_HEIGHT: u32 = 720;

/// Configuration for a local file source.
#[derive(Clone, Debug)]
pub struct FileConfig {
    /// Local file path (e.g., "match.mp4") or "stub://<name>".
    pub path: String,
    /// Yield every `stride`th decoded frame.
    pub stride: u32,
}

impl Default for FileConfig {
    fn default() -> Self {
        Self {
            path: String::new(),
            stride: 1,
        }
    }
}

/// Local file frame source.
pub struct FileSource {
    backend: FileBackend,
}

enum FileBackend {
    Synthetic(SyntheticFileSource),
    #[cfg(feature = "ingest-file-ffmpeg")]
    Ffmpeg(FfmpegFileSource),
}

impl FileSource {
    pub fn new(config: FileConfig) -> Result<Self> {
        if !is_local_file_path(&config.path) {
            return Err(anyhow!(
                "file ingestion only supports local paths (no URL schemes): '{}'",
                config.path
            ));
        }
        if config.stride == 0 {
            return Err(anyhow!("frame stride must be >= 1"));
        }
        if config.path.starts_with("stub://") {
            Ok(Self {
                backend: FileBackend::Synthetic(SyntheticFileSource::new(config)?),
            })
        } else {
            #[cfg(feature = "ingest-file-ffmpeg")]
            {
                Ok(Self {
                    backend: FileBackend::Ffmpeg(FfmpegFileSource::new(config)?),
                })
            }
            #[cfg(not(feature = "ingest-file-ffmpeg"))]
            {
                Err(anyhow!(
                    "file ingestion requires the ingest-file-ffmpeg feature"
                ))
            }
        }
    }
}

impl FrameSource for FileSource {
    fn connect(&mut self) -> Result<()> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.connect(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.connect(),
        }
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        match &mut self.backend {
            FileBackend::Synthetic(source) => source.next_frame(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.next_frame(),
        }
    }

    fn stats(&self) -> SourceStats {
        match &self.backend {
            FileBackend::Synthetic(source) => source.stats(),
            #[cfg(feature = "ingest-file-ffmpeg")]
            FileBackend::Ffmpeg(source) => source.stats(),
        }
    }
}

// ----------------------------------------------------------------------------
// Synthetic source (stub://) for tests
// ----------------------------------------------------------------------------

struct SyntheticFileSource {
    config: FileConfig,
    total_frames: u64,
    width: u32,
    height: u32,
    decoded: u64,
    yielded: u64,
    connected: bool,
}

impl SyntheticFileSource {
    fn new(config: FileConfig) -> Result<Self> {
        let mut total_frames = SYNTHETIC_DEFAULT_FRAMES;
        let mut width = SYNTHETIC_DEFAULT_WIDTH;
        let mut height = SYNTHETIC_DEFAULT_HEIGHT;

        if let Some((_, query)) = config.path.split_once('?') {
            for pair in query.split('&').filter(|p| !p.is_empty()) {
                let (key, value) = pair
                    .split_once('=')
                    .ok_or_else(|| anyhow!("malformed stub parameter '{}'", pair))?;
                match key {
                    "frames" => {
                        total_frames = value.parse().context("stub frames must be an integer")?
                    }
                    "width" => width = value.parse().context("stub width must be an integer")?,
                    "height" => {
                        height = value.parse().context("stub height must be an integer")?
                    }
                    other => return Err(anyhow!("unknown stub parameter '{}'", other)),
                }
            }
        }
        if width == 0 || height == 0 {
            return Err(anyhow!("stub frame size must be non-zero"));
        }

        Ok(Self {
            config,
            total_frames,
            width,
            height,
            decoded: 0,
            yielded: 0,
            connected: false,
        })
    }

    fn connect(&mut self) -> Result<()> {
        self.connected = true;
        log::info!("FileSource: connected to {} (synthetic)", self.config.path);
        Ok(())
    }

    fn next_frame(&mut self) -> Result<Option<Frame>> {
        if !self.connected {
            return Err(anyhow!("FileSource: next_frame called before connect"));
        }
        let stride = self.config.stride as u64;
        while self.decoded < self.total_frames {
            let index = self.decoded;
            self.decoded += 1;
            if index % stride != 0 {
                continue;
            }
            self.yielded += 1;
            return Ok(Some(Frame::blank(index, self.width, self.height)));
        }
        Ok(None)
    }

    fn stats(&self) -> SourceStats {
        SourceStats {
            frames_decoded: self.decoded,
            frames_yielded: self.yielded,
            path: self.config.path.clone(),
        }
    }
}

fn is_local_file_path(path: &str) -> bool {
    if path.trim().is_empty() {
        return false;
    }
    if path.starts_with("stub://") {
        return true;
    }
    !path.contains("://")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open(path: &str, stride: u32) -> Result<FileSource> {
        let mut source = FileSource::new(FileConfig {
            path: path.to_string(),
            stride,
        })?;
        source.connect()?;
        Ok(source)
    }

    #[test]
    fn synthetic_source_applies_stride() {
        let mut source = open("stub://clip?frames=95&width=8&height=4", 30).unwrap();
        let mut indices = Vec::new();
        while let Some(frame) = source.next_frame().unwrap() {
            assert_eq!((frame.width, frame.height), (8, 4));
            indices.push(frame.index);
        }
        assert_eq!(indices, vec![0, 30, 60, 90]);

        let stats = source.stats();
        assert_eq!(stats.frames_decoded, 95);
        assert_eq!(stats.frames_yielded, 4);
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn rejects_remote_urls_and_bad_config() {
        assert!(open("rtsp://camera/stream", 1).is_err());
        assert!(open("", 1).is_err());
        assert!(open("stub://clip", 0).is_err());
        assert!(open("stub://clip?fps=3", 1).is_err());
        assert!(open("stub://clip?width=0", 1).is_err());
    }

    #[test]
    fn next_frame_requires_connect() {
        let mut source = FileSource::new(FileConfig {
            path: "stub://clip".to_string(),
            stride: 1,
        })
        .unwrap();
        assert!(source.next_frame().is_err());
    }
}
