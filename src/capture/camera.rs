//! Camera device boundary.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempPath;

use crate::error::StripResult;

/// Which camera the shutter fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, clap::ValueEnum)]
pub enum CameraFacing {
    #[default]
    Back,
    Front,
}

impl CameraFacing {
    pub fn toggled(self) -> Self {
        match self {
            CameraFacing::Back => CameraFacing::Front,
            CameraFacing::Front => CameraFacing::Back,
        }
    }
}

/// Reference to a photo a device has written to local storage.
///
/// Artifacts backed by a scratch file delete it when dropped, so a shot does
/// not outlive the capture that produced it.
#[derive(Debug)]
pub struct CaptureArtifact {
    path: PathBuf,
    _scratch: Option<TempPath>,
}

impl CaptureArtifact {
    /// An artifact pointing at a file the caller owns.
    pub fn from_path(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _scratch: None,
        }
    }

    /// An artifact that owns (and removes on drop) its scratch file.
    pub fn scratch(path: TempPath) -> Self {
        Self {
            path: path.to_path_buf(),
            _scratch: Some(path),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// A camera that takes single still shots.
#[async_trait]
pub trait CaptureDevice: Send {
    /// Fire the shutter on the camera facing `facing`.
    async fn take_picture(&mut self, facing: CameraFacing) -> StripResult<CaptureArtifact>;
}
