//! Host pipeline interface
//!
//! The host owns the video pipeline and drives outputs through the
//! `Output` lifecycle hooks. Outputs reach back through `OutputHost`.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::naming::NamingMode;
use crate::{CaptureError, FrameOutput, OutputSettings, PixelFormat, RawFrame};

/// Negotiated video format of the host pipeline
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VideoInfo {
    pub format: PixelFormat,
    pub width: u32,
    pub height: u32,
}

/// Services the host exposes to an output
pub trait OutputHost: Send + Sync {
    /// Current video format
    fn video_info(&self) -> VideoInfo;

    /// Whether video data capture may begin now
    fn can_begin_capture(&self) -> bool;

    /// Deliver frames in the negotiated format, without conversion
    fn request_raw_video(&self) {}

    /// Start delivering frames to the output
    fn begin_capture(&self);

    /// Stop delivering frames to the output
    fn end_capture(&self);
}

/// Lifecycle hooks the host invokes on an output
///
/// `create` is `OutputRegistry::create`; `destroy` is dropping the output.
pub trait Output: Send + Sync {
    fn descriptor(&self) -> &'static OutputDescriptor;

    /// Apply a (possibly partial) settings update
    fn update(&self, settings: &OutputSettings) -> Result<(), CaptureError>;

    fn start(&self) -> Result<(), CaptureError>;

    /// Stop capturing; `timestamp_ns` is the host's stop time
    fn stop(&self, timestamp_ns: u64) -> Result<(), CaptureError>;

    /// Consume one frame. Failures are logged and counted, never propagated
    fn raw_video(&self, frame: &RawFrame<'_>);

    /// User-configurable properties for the host UI
    fn properties(&self) -> Vec<Property>;
}

/// Static description an output is registered under
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OutputDescriptor {
    /// Stable identifier
    pub id: &'static str,
    /// Display name
    pub name: &'static str,
    /// Consumes video frames
    pub video: bool,
    /// Consumes audio frames
    pub audio: bool,
    /// File layout used by the output
    pub naming: NamingMode,
}

/// Single directory, user-chosen path and quality
pub static FLAT_OUTPUT: OutputDescriptor = OutputDescriptor {
    id: "frame_output",
    name: "Frame Capture Output",
    video: true,
    audio: false,
    naming: NamingMode::Flat,
};

/// Session folders of 60 frames under the data directory
pub static ROTATING_OUTPUT: OutputDescriptor = OutputDescriptor {
    id: "frame_session_output",
    name: "Frame Session Capture Output",
    video: true,
    audio: false,
    naming: NamingMode::Rotating,
};

/// Kind of value a property holds
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PropertyKind {
    /// Directory picker
    Directory { default: Option<PathBuf> },
    /// Integer slider
    Int { min: i64, max: i64, step: i64 },
}

/// One user-configurable setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Property {
    /// Settings key
    pub name: &'static str,
    /// Label shown to the user
    pub label: &'static str,
    pub kind: PropertyKind,
}

/// Descriptors known to the host
#[derive(Debug, Default)]
pub struct OutputRegistry {
    outputs: Vec<&'static OutputDescriptor>,
}

impl OutputRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry with both frame outputs registered
    pub fn with_defaults() -> Self {
        Self {
            outputs: vec![&FLAT_OUTPUT, &ROTATING_OUTPUT],
        }
    }

    pub fn register(&mut self, descriptor: &'static OutputDescriptor) -> Result<(), CaptureError> {
        if self.get(descriptor.id).is_some() {
            return Err(CaptureError::AlreadyRegistered(descriptor.id));
        }
        info!("Registered output {} ({})", descriptor.id, descriptor.name);
        self.outputs.push(descriptor);
        Ok(())
    }

    pub fn get(&self, id: &str) -> Option<&'static OutputDescriptor> {
        self.outputs.iter().copied().find(|d| d.id == id)
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &'static OutputDescriptor> + '_ {
        self.outputs.iter().copied()
    }

    /// Instantiate the output registered under `id`
    pub fn create(
        &self,
        id: &str,
        settings: &OutputSettings,
        host: Arc<dyn OutputHost>,
    ) -> Result<Box<dyn Output>, CaptureError> {
        let descriptor = self
            .get(id)
            .ok_or_else(|| CaptureError::UnknownOutput(id.to_string()))?;
        Ok(Box::new(FrameOutput::create(descriptor, settings, host)))
    }
}
