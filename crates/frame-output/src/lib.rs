//! Frame Capture Output
//!
//! Receives raw RGBA frames from a host media pipeline and stores each one
//! as a JPEG still. Two naming modes are provided:
//! - Flat: `{save_path}/{timestamp}.jpeg`, user-chosen directory and quality
//! - Rotating: timestamp-named session folders of 60 frames, each closed
//!   with a `done` marker

mod host;
mod naming;
mod output;
mod settings;
mod stats;

pub use frame_encoder::{EncodeError, EncodedImage, PixelFormat, RawFrame};
pub use host::{
    Output, OutputDescriptor, OutputHost, OutputRegistry, Property, PropertyKind, VideoInfo,
    FLAT_OUTPUT, ROTATING_OUTPUT,
};
pub use naming::{Clock, NamingMode, RotationState, SystemClock, DONE_MARKER, ROTATION_THRESHOLD};
pub use output::FrameOutput;
pub use settings::{default_session_root, OutputSettings, DEFAULT_QUALITY};
pub use stats::{CaptureStats, StatsSnapshot};

use std::path::PathBuf;
use thiserror::Error;
use tracing::Level;
use tracing_subscriber::FmtSubscriber;

/// Capture error types
#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("Unsupported pixel format {0:?}, frame capture requires RGBA")]
    UnsupportedFormat(PixelFormat),

    #[error("Output is already active")]
    AlreadyActive,

    #[error("save_path must be set for frame capture output")]
    MissingDestination,

    #[error("Host refused to begin video capture")]
    CaptureUnavailable,

    #[error("I/O error at {path:?}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Encoding failed: {0}")]
    Encode(EncodeError),

    #[error("Session lock poisoned")]
    LockPoisoned,

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Unknown output: {0}")]
    UnknownOutput(String),

    #[error("Output already registered: {0}")]
    AlreadyRegistered(&'static str),
}

impl From<EncodeError> for CaptureError {
    fn from(e: EncodeError) -> Self {
        match e {
            EncodeError::Io { path, source } => CaptureError::Io { path, source },
            other => CaptureError::Encode(other),
        }
    }
}

/// Install a global fmt subscriber for hosts that do not bring their own
pub fn init_logging() -> Result<(), tracing::subscriber::SetGlobalDefaultError> {
    let subscriber = FmtSubscriber::builder()
        .with_max_level(Level::INFO)
        .with_target(true)
        .finish();

    tracing::subscriber::set_global_default(subscriber)
}
