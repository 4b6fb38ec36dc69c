//! Frame Encoder
//!
//! Turns raw RGBA video frames into JPEG stills on disk.
//! Supports:
//! - Row padding (stride larger than `width * 4`)
//! - Baseline JPEG at a caller-chosen quality
//! - Atomic output (temporary file renamed into place)

pub mod frame;
pub mod jpeg;

pub use frame::{PixelFormat, RawFrame, RGBA_BYTES_PER_PIXEL};
pub use jpeg::{encode, EncodedImage};

use std::path::PathBuf;
use thiserror::Error;

/// Encoder error types
#[derive(Error, Debug)]
pub enum EncodeError {
    #[error("Invalid frame dimensions: {width}x{height}")]
    InvalidDimensions { width: u32, height: u32 },

    #[error("Stride {stride} is shorter than a {width}-pixel RGBA row")]
    InvalidStride { stride: usize, width: u32 },

    #[error("Frame buffer too small: need {expected} bytes, got {actual}")]
    BufferTooSmall { expected: usize, actual: usize },

    #[error("Failed to write {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JPEG compression failed: {0}")]
    Compress(#[from] image::ImageError),
}

impl EncodeError {
    /// True when the failure came from the filesystem rather than the frame or compressor
    pub fn is_io(&self) -> bool {
        matches!(self, EncodeError::Io { .. })
    }
}
