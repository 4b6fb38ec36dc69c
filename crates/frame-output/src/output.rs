//! Capture controller
//!
//! All session state sits behind one mutex. A frame holds the lock for the
//! whole write, so `stop` and `configure` wait for an in-flight frame and
//! rotation bookkeeping is never interleaved.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use frame_encoder::{encode, EncodedImage, RawFrame};
use tracing::{debug, info, warn};

use crate::host::{Output, OutputDescriptor, OutputHost, Property, PropertyKind};
use crate::naming::{flat_frame_path, Clock, NamingMode, RotationState, SystemClock};
use crate::settings::{default_session_root, OutputSettings, DEFAULT_QUALITY};
use crate::stats::{CaptureStats, StatsSnapshot};
use crate::CaptureError;

/// Mutable session state guarded by the output's lock
#[derive(Debug)]
struct SessionState {
    save_path: Option<PathBuf>,
    quality: i32,
    /// Negotiated frame size, zero while inactive
    width: u32,
    height: u32,
    active: bool,
    rotation: RotationState,
}

impl SessionState {
    fn apply(&mut self, settings: &OutputSettings) {
        if let Some(path) = settings.effective_save_path() {
            self.save_path = Some(path.to_path_buf());
        }
        if let Some(quality) = settings.effective_quality() {
            self.quality = quality;
        }
    }
}

/// Everything the encoder needs for one frame, owned
#[derive(Debug, Clone)]
struct FrameTarget {
    path: PathBuf,
    width: u32,
    height: u32,
    quality: i32,
}

/// Output that writes every delivered frame as a JPEG
pub struct FrameOutput {
    descriptor: &'static OutputDescriptor,
    host: Arc<dyn OutputHost>,
    clock: Arc<dyn Clock>,
    state: Mutex<SessionState>,
    stats: CaptureStats,
}

impl FrameOutput {
    /// Create an inactive output and apply the initial settings
    pub fn create(
        descriptor: &'static OutputDescriptor,
        settings: &OutputSettings,
        host: Arc<dyn OutputHost>,
    ) -> Self {
        let save_path = match descriptor.naming {
            NamingMode::Flat => None,
            NamingMode::Rotating => Some(default_session_root()),
        };

        let mut state = SessionState {
            save_path,
            quality: DEFAULT_QUALITY,
            width: 0,
            height: 0,
            active: false,
            rotation: RotationState::new(),
        };
        state.apply(settings);

        debug!("Created {} with save path {:?}", descriptor.id, state.save_path);

        Self {
            descriptor,
            host,
            clock: Arc::new(SystemClock),
            state: Mutex::new(state),
            stats: CaptureStats::new(),
        }
    }

    /// Replace the timestamp source used for file and folder names
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    fn lock_state(&self) -> Result<MutexGuard<'_, SessionState>, CaptureError> {
        self.state.lock().map_err(|_| CaptureError::LockPoisoned)
    }

    /// Overwrite the save path and/or quality for subsequent frames
    pub fn configure(&self, settings: &OutputSettings) -> Result<(), CaptureError> {
        let mut state = self.lock_state()?;
        state.apply(settings);
        debug!(
            "{} configured: save_path={:?} quality={}",
            self.descriptor.id, state.save_path, state.quality
        );
        Ok(())
    }

    /// Activate the output
    ///
    /// Fails without changing state when already active, when no save path
    /// is set (flat mode), when the host format is not RGBA, or when the
    /// host refuses to begin capture.
    pub fn start(&self) -> Result<(), CaptureError> {
        let mut state = self.lock_state()?;
        if state.active {
            return Err(CaptureError::AlreadyActive);
        }

        if self.descriptor.naming.requires_save_path() && state.save_path.is_none() {
            debug!("save_path must be set for {}", self.descriptor.id);
            return Err(CaptureError::MissingDestination);
        }

        let video = self.host.video_info();
        if !video.format.is_capturable() {
            debug!(
                "Invalid pixel format {:?} for {}, must be RGBA",
                video.format, self.descriptor.id
            );
            return Err(CaptureError::UnsupportedFormat(video.format));
        }

        if !self.host.can_begin_capture() {
            return Err(CaptureError::CaptureUnavailable);
        }

        state.width = video.width;
        state.height = video.height;
        state.rotation.reset();
        state.active = true;

        self.host.request_raw_video();
        self.host.begin_capture();

        info!(
            "{} started: {}x{} -> {:?}",
            self.descriptor.id, video.width, video.height, state.save_path
        );
        Ok(())
    }

    /// Deactivate the output; a no-op when inactive
    pub fn stop(&self) -> Result<(), CaptureError> {
        let mut state = self.lock_state()?;
        if !state.active {
            return Ok(());
        }

        if self.descriptor.naming == NamingMode::Rotating {
            if let Err(e) = state.rotation.finalize() {
                warn!("Failed to finalize capture folder on stop: {}", e);
            }
        }

        state.active = false;
        state.width = 0;
        state.height = 0;
        self.host.end_capture();

        let stats = self.stats.snapshot();
        info!(
            "{} stopped: {} frames written, {} dropped",
            self.descriptor.id, stats.frames_written, stats.frames_dropped
        );
        Ok(())
    }

    /// Write one frame; `Ok(None)` when the output is inactive
    pub fn on_frame(&self, frame: &RawFrame<'_>) -> Result<Option<EncodedImage>, CaptureError> {
        let mut state = self.lock_state()?;
        if !state.active {
            debug!("Ignoring frame delivered to inactive {}", self.descriptor.id);
            return Ok(None);
        }

        let result = self
            .next_target(&mut state)
            .and_then(|target| {
                encode(frame, target.width, target.height, target.quality, &target.path)
                    .map_err(CaptureError::from)
            });

        match result {
            Ok(image) => {
                state.rotation.record_frame();
                self.stats.record_written();
                Ok(Some(image))
            }
            Err(e) => {
                self.stats.record_dropped();
                warn!("Dropped frame for {}: {}", self.descriptor.id, e);
                Err(e)
            }
        }
    }

    /// Resolve the destination of the next frame, rotating folders if due
    fn next_target(&self, state: &mut SessionState) -> Result<FrameTarget, CaptureError> {
        let root = state
            .save_path
            .clone()
            .ok_or(CaptureError::MissingDestination)?;

        let path = match self.descriptor.naming {
            NamingMode::Flat => flat_frame_path(&root, self.clock.now()),
            NamingMode::Rotating => {
                if state.rotation.needs_rotation(&root) {
                    if let Some(open) = state.rotation.current_path() {
                        if !open.starts_with(&root) {
                            info!("Save path changed, closing {:?}", open);
                        }
                    }
                    let folder = state.rotation.rotate(&root, self.clock.now())?;
                    self.stats.record_folder();
                    info!("Rotated capture folder to {:?}", folder);
                }
                state
                    .rotation
                    .frame_path(self.clock.now())
                    .ok_or(CaptureError::MissingDestination)?
            }
        };

        Ok(FrameTarget {
            path,
            width: state.width,
            height: state.height,
            quality: state.quality,
        })
    }

    pub fn is_active(&self) -> bool {
        self.lock_state().map(|s| s.active).unwrap_or(false)
    }

    /// Negotiated frame size while active
    pub fn dimensions(&self) -> Option<(u32, u32)> {
        self.lock_state()
            .ok()
            .filter(|s| s.active)
            .map(|s| (s.width, s.height))
    }

    pub fn save_path(&self) -> Option<PathBuf> {
        self.lock_state().ok().and_then(|s| s.save_path.clone())
    }

    pub fn quality(&self) -> i32 {
        self.lock_state().map(|s| s.quality).unwrap_or(DEFAULT_QUALITY)
    }

    /// Copy of the rotation bookkeeping
    pub fn rotation(&self) -> RotationState {
        self.lock_state()
            .map(|s| s.rotation.clone())
            .unwrap_or_default()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }
}

impl Output for FrameOutput {
    fn descriptor(&self) -> &'static OutputDescriptor {
        self.descriptor
    }

    fn update(&self, settings: &OutputSettings) -> Result<(), CaptureError> {
        self.configure(settings)
    }

    fn start(&self) -> Result<(), CaptureError> {
        FrameOutput::start(self)
    }

    fn stop(&self, _timestamp_ns: u64) -> Result<(), CaptureError> {
        FrameOutput::stop(self)
    }

    fn raw_video(&self, frame: &RawFrame<'_>) {
        // Failures are already logged and counted by on_frame
        let _ = self.on_frame(frame);
    }

    fn properties(&self) -> Vec<Property> {
        match self.descriptor.naming {
            NamingMode::Flat => vec![
                Property {
                    name: "save_path",
                    label: "Save Path",
                    kind: PropertyKind::Directory {
                        default: self.save_path(),
                    },
                },
                Property {
                    name: "quality",
                    label: "Quality",
                    kind: PropertyKind::Int {
                        min: 0,
                        max: 100,
                        step: 1,
                    },
                },
            ],
            NamingMode::Rotating => Vec::new(),
        }
    }
}

impl Drop for FrameOutput {
    fn drop(&mut self) {
        if let Err(e) = FrameOutput::stop(self) {
            warn!("Failed to stop {} on destroy: {}", self.descriptor.id, e);
        }
    }
}
