pub mod ffmpeg;
pub mod mimetype;

use std::path::Path;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum MediaError {
    #[error("failed to open video {path}: {reason}")]
    Open { path: String, reason: String },
    #[error("failed to decode frame {index}: {reason}")]
    Decode { index: u64, reason: String },
}

/// Byte order of the three 8-bit channels in a decoded frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PixelLayout {
    Rgb,
    Bgr,
}

/// One decoded still image, packed row-major, 3 bytes per pixel.
#[derive(Debug, Clone)]
pub struct Frame {
    pub index: u64,
    pub width: u32,
    pub height: u32,
    pub layout: PixelLayout,
    pub data: Vec<u8>,
}

/// A decodable media stream. Dropping the source releases it.
pub trait VideoSource {
    /// Frame count as reported by the container. May be zero or wrong.
    fn reported_frame_count(&self) -> i64;

    /// Seek to `index` and decode it. An error here is recoverable: the
    /// caller moves on to the next index.
    fn read_frame(&mut self, index: u64) -> Result<Frame, MediaError>;
}

/// Opens video files into [`VideoSource`]s.
pub trait VideoOpener: Send + Sync {
    fn open(&self, path: &Path) -> Result<Box<dyn VideoSource>, MediaError>;
}
