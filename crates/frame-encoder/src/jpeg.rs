//! JPEG still-image writer

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{ExtendedColorType, ImageEncoder};
use tracing::{debug, warn};

use crate::{EncodeError, RawFrame};

/// A JPEG written to disk
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedImage {
    /// Final location of the image
    pub path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// Size of the file in bytes
    pub size_bytes: u64,
}

/// Temporary sibling file removed on drop unless committed
struct PartialFile {
    path: PathBuf,
    committed: bool,
}

impl PartialFile {
    fn for_destination(destination: &Path) -> Self {
        let name = destination
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();
        Self {
            path: destination.with_file_name(format!(".{}.partial", name)),
            committed: false,
        }
    }

    fn commit(mut self, destination: &Path) -> Result<(), EncodeError> {
        fs::rename(&self.path, destination).map_err(|source| EncodeError::Io {
            path: destination.to_path_buf(),
            source,
        })?;
        self.committed = true;
        Ok(())
    }
}

impl Drop for PartialFile {
    fn drop(&mut self) {
        if !self.committed {
            if let Err(e) = fs::remove_file(&self.path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!("Failed to remove partial file {:?}: {}", self.path, e);
                }
            }
        }
    }
}

/// Map a requested quality onto the range the compressor accepts
fn compressor_quality(quality: i32) -> u8 {
    quality.clamp(1, 100) as u8
}

/// Encode one RGBA frame as a baseline RGB JPEG at `destination`
///
/// The destination's parent directory must already exist. An existing file
/// at `destination` is replaced. Nothing is left behind on failure.
pub fn encode(
    frame: &RawFrame<'_>,
    width: u32,
    height: u32,
    quality: i32,
    destination: &Path,
) -> Result<EncodedImage, EncodeError> {
    // Reject bad input before touching the filesystem
    let rgb = frame.to_rgb(width, height)?;

    let partial = PartialFile::for_destination(destination);
    let file = File::create(&partial.path).map_err(|source| EncodeError::Io {
        path: destination.to_path_buf(),
        source,
    })?;

    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, compressor_quality(quality));
    encoder.write_image(&rgb, width, height, ExtendedColorType::Rgb8)?;

    let io_err = |source: std::io::Error| EncodeError::Io {
        path: destination.to_path_buf(),
        source,
    };
    writer.flush().map_err(io_err)?;
    let file = writer.into_inner().map_err(|e| io_err(e.into_error()))?;
    let size_bytes = file.metadata().map_err(io_err)?.len();
    drop(file);

    partial.commit(destination)?;
    debug!(
        "Wrote {}x{} JPEG ({} bytes) to {:?}",
        width, height, size_bytes, destination
    );

    Ok(EncodedImage {
        path: destination.to_path_buf(),
        width,
        height,
        size_bytes,
    })
}
