//! Output settings and their sources

use std::path::{Path, PathBuf};

use config::{Config, Environment, File};
use directories::ProjectDirs;
use serde::Deserialize;

use crate::CaptureError;

/// JPEG quality used until a setting overrides it
pub const DEFAULT_QUALITY: i32 = 90;

/// User-facing settings, each field optional so updates can be partial
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct OutputSettings {
    /// Directory frames are written under
    #[serde(default)]
    pub save_path: Option<PathBuf>,

    /// JPEG quality 0-100; zero means "unchanged"
    #[serde(default)]
    pub quality: Option<i64>,
}

impl OutputSettings {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_save_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.save_path = Some(path.into());
        self
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = Some(quality);
        self
    }

    /// Load settings from an optional file, overridden by `FRAME_OUTPUT_*` variables
    pub fn load(file: Option<&Path>) -> Result<Self, CaptureError> {
        let mut builder = Config::builder();
        if let Some(path) = file {
            builder = builder.add_source(File::from(path).required(true));
        }

        let settings = builder
            .add_source(Environment::with_prefix("FRAME_OUTPUT").try_parsing(true))
            .build()?
            .try_deserialize()?;

        Ok(settings)
    }

    /// Save path to apply, ignoring empty values
    pub(crate) fn effective_save_path(&self) -> Option<&Path> {
        self.save_path
            .as_deref()
            .filter(|p| !p.as_os_str().is_empty())
    }

    /// Quality to apply, ignoring zero
    pub(crate) fn effective_quality(&self) -> Option<i32> {
        self.quality
            .filter(|&q| q != 0)
            .map(|q| q.clamp(i32::MIN as i64, i32::MAX as i64) as i32)
    }
}

/// Default root for rotating-mode captures: `<data dir>/frames`
pub fn default_session_root() -> PathBuf {
    ProjectDirs::from("", "", "frame-capture")
        .map(|dirs| dirs.data_dir().join("frames"))
        .unwrap_or_else(|| std::env::temp_dir().join("frame-capture").join("frames"))
}
