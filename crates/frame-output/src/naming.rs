//! File and folder naming from wall-clock time

use std::fs::{self, File};
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use crate::CaptureError;

/// Frames stored per session folder before rotating
pub const ROTATION_THRESHOLD: u32 = 60;

/// Zero-length marker written into a folder once it is closed
pub const DONE_MARKER: &str = "done";

const IMAGE_EXTENSION: &str = "jpeg";

/// Source of the timestamps used in file and folder names
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;
}

/// Wall clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// How frame files are laid out under the save path
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NamingMode {
    /// One directory, second-resolution names
    Flat,
    /// Session folders of `ROTATION_THRESHOLD` frames, millisecond names
    Rotating,
}

impl NamingMode {
    /// Whether a save path must be configured before starting
    pub fn requires_save_path(&self) -> bool {
        matches!(self, NamingMode::Flat)
    }
}

/// `YYYYMMDDHHMMSSmmm`
fn millis_stamp(now: DateTime<Utc>) -> String {
    now.format("%Y%m%d%H%M%S%3f").to_string()
}

/// `YYYYMMDDHHMMSS000`, the millisecond field is always zero
fn seconds_stamp(now: DateTime<Utc>) -> String {
    format!("{}000", now.format("%Y%m%d%H%M%S"))
}

/// Path of a frame captured at `now` in flat mode
pub(crate) fn flat_frame_path(root: &Path, now: DateTime<Utc>) -> PathBuf {
    root.join(format!("{}.{}", seconds_stamp(now), IMAGE_EXTENSION))
}

/// Attempts at minting a folder name before giving up
const MAX_MINT_ATTEMPTS: u32 = 1000;

/// The folder frames are currently written into
#[derive(Debug, Clone, PartialEq, Eq)]
struct OpenFolder {
    /// Save path the folder was created under
    root: PathBuf,
    name: String,
}

impl OpenFolder {
    fn path(&self) -> PathBuf {
        self.root.join(&self.name)
    }
}

/// Session folder bookkeeping for rotating mode
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RotationState {
    current: Option<OpenFolder>,
    frame_count: u32,
}

impl RotationState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Name of the open folder, if any
    pub fn current_folder(&self) -> Option<&str> {
        self.current.as_ref().map(|f| f.name.as_str())
    }

    /// Full path of the open folder, if any
    pub fn current_path(&self) -> Option<PathBuf> {
        self.current.as_ref().map(OpenFolder::path)
    }

    /// Frames written into the open folder
    pub fn frame_count(&self) -> u32 {
        self.frame_count
    }

    /// A new folder is due when none is open, the open one is full, or
    /// the save path moved away from the open folder's root
    pub fn needs_rotation(&self, root: &Path) -> bool {
        match &self.current {
            None => true,
            Some(folder) => self.frame_count >= ROTATION_THRESHOLD || folder.root != root,
        }
    }

    /// Forget the open folder without finalizing it (session start)
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    pub fn record_frame(&mut self) {
        self.frame_count += 1;
    }

    /// Close the open folder by writing its `done` marker
    ///
    /// The folder is closed even if the marker cannot be written.
    pub fn finalize(&mut self) -> Result<Option<PathBuf>, CaptureError> {
        let Some(open) = self.current.take() else {
            return Ok(None);
        };
        self.frame_count = 0;

        let folder = open.path();
        let marker = folder.join(DONE_MARKER);
        File::create(&marker).map_err(|source| CaptureError::Io {
            path: marker,
            source,
        })?;

        debug!("Finalized capture folder {:?}", folder);
        Ok(Some(folder))
    }

    /// Finalize the open folder and open a new one under `root` named after `now`
    ///
    /// Existing folders are never reused: if the name is taken the next
    /// free millisecond is used instead.
    pub fn rotate(&mut self, root: &Path, now: DateTime<Utc>) -> Result<PathBuf, CaptureError> {
        if let Err(e) = self.finalize() {
            warn!("Failed to finalize capture folder: {}", e);
        }

        fs::create_dir_all(root).map_err(|source| CaptureError::Io {
            path: root.to_path_buf(),
            source,
        })?;

        let mut stamp = now;
        for _ in 0..MAX_MINT_ATTEMPTS {
            let name = millis_stamp(stamp);
            let folder = root.join(&name);
            match fs::create_dir(&folder) {
                Ok(()) => {
                    self.current = Some(OpenFolder {
                        root: root.to_path_buf(),
                        name,
                    });
                    self.frame_count = 0;
                    return Ok(folder);
                }
                Err(e) if e.kind() == ErrorKind::AlreadyExists => {
                    stamp += chrono::Duration::milliseconds(1);
                }
                Err(source) => return Err(CaptureError::Io { path: folder, source }),
            }
        }

        Err(CaptureError::Io {
            path: root.join(millis_stamp(stamp)),
            source: std::io::Error::from(ErrorKind::AlreadyExists),
        })
    }

    /// Path of a frame captured at `now` inside the open folder
    pub fn frame_path(&self, now: DateTime<Utc>) -> Option<PathBuf> {
        self.current
            .as_ref()
            .map(|folder| folder.path().join(format!("{}.{}", millis_stamp(now), IMAGE_EXTENSION)))
    }
}

/// Clock advancing a fixed step on every read
#[cfg(test)]
pub(crate) struct StepClock {
    start: DateTime<Utc>,
    step_ms: i64,
    ticks: std::sync::atomic::AtomicI64,
}

#[cfg(test)]
impl StepClock {
    pub(crate) fn new(step_ms: i64) -> Self {
        use chrono::TimeZone;
        Self {
            start: Utc.with_ymd_and_hms(2024, 3, 9, 14, 5, 7).unwrap(),
            step_ms,
            ticks: std::sync::atomic::AtomicI64::new(0),
        }
    }

    /// Time the `n`th read returned (zero-based)
    pub(crate) fn at(&self, n: i64) -> DateTime<Utc> {
        self.start + chrono::Duration::milliseconds(self.step_ms * n)
    }
}

#[cfg(test)]
impl Clock for StepClock {
    fn now(&self) -> DateTime<Utc> {
        let n = self
            .ticks
            .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        self.at(n)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::tempdir;

    fn sample_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2023, 1, 2, 3, 4, 5).unwrap() + chrono::Duration::milliseconds(67)
    }

    #[test]
    fn test_millis_stamp_format() {
        assert_eq!(millis_stamp(sample_time()), "20230102030405067");
    }

    #[test]
    fn test_flat_path_zeroes_millis() {
        let path = flat_frame_path(Path::new("/captures"), sample_time());
        assert_eq!(path, PathBuf::from("/captures/20230102030405000.jpeg"));
    }

    #[test]
    fn test_fresh_state_needs_rotation() {
        let state = RotationState::new();
        assert!(state.needs_rotation(Path::new("/x")));
        assert_eq!(state.current_folder(), None);
        assert!(state.frame_path(sample_time()).is_none());
    }

    #[test]
    fn test_rotate_creates_folder() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("nested").join("root");
        let mut state = RotationState::new();

        let folder = state.rotate(&root, sample_time()).unwrap();

        assert!(folder.is_dir());
        assert_eq!(state.current_folder(), Some("20230102030405067"));
        assert_eq!(state.current_path(), Some(folder.clone()));
        assert_eq!(state.frame_count(), 0);
        assert!(!state.needs_rotation(&root));

        let later = sample_time() + chrono::Duration::milliseconds(5);
        assert_eq!(
            state.frame_path(later).unwrap(),
            folder.join("20230102030405072.jpeg")
        );
    }

    #[test]
    fn test_threshold_triggers_rotation() {
        let dir = tempdir().unwrap();
        let mut state = RotationState::new();
        state.rotate(dir.path(), sample_time()).unwrap();

        for _ in 0..ROTATION_THRESHOLD - 1 {
            state.record_frame();
        }
        assert!(!state.needs_rotation(dir.path()));
        state.record_frame();
        assert!(state.needs_rotation(dir.path()));
    }

    #[test]
    fn test_root_change_triggers_rotation() {
        let dir = tempdir().unwrap();
        let first_root = dir.path().join("a");
        let second_root = dir.path().join("b");
        let mut state = RotationState::new();
        let first = state.rotate(&first_root, sample_time()).unwrap();
        state.record_frame();

        assert!(state.needs_rotation(&second_root));
        // Frames keep going to the folder it was opened in
        assert!(state
            .frame_path(sample_time())
            .unwrap()
            .starts_with(&first));

        let second = state.rotate(&second_root, sample_time()).unwrap();
        assert!(second.starts_with(&second_root));
        assert!(first.join(DONE_MARKER).is_file());
        assert_eq!(state.frame_count(), 0);
    }

    #[test]
    fn test_rotate_finalizes_previous_folder() {
        let dir = tempdir().unwrap();
        let mut state = RotationState::new();
        let first = state.rotate(dir.path(), sample_time()).unwrap();
        let second = state
            .rotate(dir.path(), sample_time() + chrono::Duration::seconds(1))
            .unwrap();

        assert_ne!(first, second);
        assert!(first.join(DONE_MARKER).is_file());
        assert_eq!(std::fs::metadata(first.join(DONE_MARKER)).unwrap().len(), 0);
        assert!(!second.join(DONE_MARKER).exists());
    }

    #[test]
    fn test_rotate_same_millisecond_mints_next_name() {
        let dir = tempdir().unwrap();
        let mut state = RotationState::new();
        let first = state.rotate(dir.path(), sample_time()).unwrap();
        let second = state.rotate(dir.path(), sample_time()).unwrap();

        assert_eq!(first, dir.path().join("20230102030405067"));
        assert_eq!(second, dir.path().join("20230102030405068"));
        assert!(first.join(DONE_MARKER).is_file());
        assert_eq!(std::fs::read_dir(&second).unwrap().count(), 0);
    }

    #[test]
    fn test_rotate_into_file_root_fails() {
        let dir = tempdir().unwrap();
        let root = dir.path().join("not-a-dir");
        std::fs::write(&root, b"").unwrap();
        let mut state = RotationState::new();

        assert!(matches!(
            state.rotate(&root, sample_time()),
            Err(CaptureError::Io { .. })
        ));
        assert_eq!(state.current_folder(), None);
    }

    #[test]
    fn test_finalize_closes_folder_once() {
        let dir = tempdir().unwrap();
        let mut state = RotationState::new();
        let folder = state.rotate(dir.path(), sample_time()).unwrap();

        assert_eq!(state.finalize().unwrap(), Some(folder));
        assert_eq!(state.finalize().unwrap(), None);
        assert!(state.needs_rotation(dir.path()));
    }

    #[test]
    fn test_step_clock_advances() {
        let clock = StepClock::new(250);
        let a = clock.now();
        let b = clock.now();
        assert_eq!(b - a, chrono::Duration::milliseconds(250));
        assert_eq!(clock.at(0), a);
    }
}
