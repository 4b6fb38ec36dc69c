//! Capture counters

use std::sync::atomic::{AtomicU64, Ordering};

/// Per-output counters, mirrored to the global metrics recorder
#[derive(Debug, Default)]
pub struct CaptureStats {
    frames_written: AtomicU64,
    frames_dropped: AtomicU64,
    folders_created: AtomicU64,
}

/// Point-in-time copy of `CaptureStats`
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub frames_written: u64,
    pub frames_dropped: u64,
    pub folders_created: u64,
}

impl CaptureStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record_written(&self) {
        self.frames_written.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frame_output_frames_written_total").increment(1);
    }

    pub(crate) fn record_dropped(&self) {
        self.frames_dropped.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frame_output_frames_dropped_total").increment(1);
    }

    pub(crate) fn record_folder(&self) {
        self.folders_created.fetch_add(1, Ordering::Relaxed);
        metrics::counter!("frame_output_folders_rotated_total").increment(1);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
            folders_created: self.folders_created.load(Ordering::Relaxed),
        }
    }
}
