// # File-Backed Camera
//
// Stands in for a phone camera when running from the command line. Each facing
// is mapped to a photo on disk; pressing the shutter copies that photo into a
// private scratch directory and hands the copy out as the shot, the same way a
// device writes a fresh file per capture.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tempfile::TempDir;
use tracing::debug;

use crate::capture::camera::{CameraFacing, CaptureArtifact, CaptureDevice};
use crate::capture::permission::{MediaDevice, MediaStream, PermissionProbe, PermissionState};
use crate::error::{StripError, StripResult};

pub struct FileCamera {
    back: PathBuf,
    front: Option<PathBuf>,
    scratch: TempDir,
}

impl FileCamera {
    /// Camera whose back lens "sees" the photo at `back`.
    pub fn new(back: impl Into<PathBuf>) -> StripResult<Self> {
        let scratch = tempfile::Builder::new()
            .prefix("strip-shots-")
            .tempdir()
            .map_err(|e| StripError::io("create scratch directory", e))?;
        Ok(Self {
            back: back.into(),
            front: None,
            scratch,
        })
    }

    /// Give the front lens its own photo.
    pub fn with_front(mut self, front: impl Into<PathBuf>) -> Self {
        self.front = Some(front.into());
        self
    }

    /// Permission probe over the back source, usable natively or as a stream device.
    pub fn probe(&self) -> FileSourceProbe {
        FileSourceProbe {
            path: self.back.clone(),
        }
    }

    fn source(&self, facing: CameraFacing) -> StripResult<&Path> {
        match facing {
            CameraFacing::Back => Ok(&self.back),
            CameraFacing::Front => self.front.as_deref().ok_or_else(|| {
                StripError::capture("no front camera source configured")
                    .with_recovery_suggestion("Pass --front <PHOTO> or switch back to the back camera")
            }),
        }
    }
}

#[async_trait]
impl CaptureDevice for FileCamera {
    async fn take_picture(&mut self, facing: CameraFacing) -> StripResult<CaptureArtifact> {
        let source = self.source(facing)?.to_path_buf();
        let suffix = source
            .extension()
            .map(|ext| format!(".{}", ext.to_string_lossy()))
            .unwrap_or_default();

        let shot = tempfile::Builder::new()
            .prefix("shot-")
            .suffix(&suffix)
            .tempfile_in(self.scratch.path())
            .map_err(|e| StripError::capture(format!("allocating shot file: {}", e)))?
            .into_temp_path();

        tokio::fs::copy(&source, &shot).await.map_err(|e| {
            StripError::capture(format!("reading {}: {}", source.display(), e))
                .with_metadata("source", source.display().to_string())
        })?;

        debug!(source = %source.display(), shot = %shot.display(), "shutter fired");
        Ok(CaptureArtifact::scratch(shot))
    }
}

/// Checks that the photo source is readable.
#[derive(Debug, Clone)]
pub struct FileSourceProbe {
    path: PathBuf,
}

#[async_trait]
impl PermissionProbe for FileSourceProbe {
    async fn request_permission(&self) -> StripResult<PermissionState> {
        match tokio::fs::metadata(&self.path).await {
            Ok(meta) if meta.is_file() => Ok(PermissionState::Granted),
            Ok(_) => Ok(PermissionState::Denied),
            Err(e) => Err(StripError::io_at("probe photo source", &self.path, e)),
        }
    }
}

/// Holding the source open is the file camera's notion of a live stream.
struct FileStream {
    file: Option<std::fs::File>,
}

impl MediaStream for FileStream {
    fn stop(&mut self) {
        self.file.take();
    }
}

#[async_trait]
impl MediaDevice for FileSourceProbe {
    async fn open_stream(&self) -> StripResult<Box<dyn MediaStream>> {
        let file = std::fs::File::open(&self.path)
            .map_err(|e| StripError::io_at("open photo source", &self.path, e))?;
        Ok(Box::new(FileStream { file: Some(file) }))
    }
}
