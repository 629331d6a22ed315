//! # Capture Controller
//!
//! Owns the camera facing and the shutter. The shutter is guarded by an
//! [`AnalyzingFlag`]: [`CaptureController::try_begin`] claims the flag and hands
//! back an [`AnalyzingGuard`], and [`CaptureController::capture`] only accepts a
//! shot while that guard is alive. The flag is released when the guard drops,
//! on every exit path of the pipeline including cancellation.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use tracing::debug;

use crate::capture::camera::{CameraFacing, CaptureArtifact, CaptureDevice};
use crate::error::StripResult;

/// Shared "analysis in flight" flag.
///
/// Cloning yields another handle to the same flag, so a UI (or a test) can
/// observe it while the session is busy.
#[derive(Debug, Clone, Default)]
pub struct AnalyzingFlag(Arc<AtomicBool>);

impl AnalyzingFlag {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_set(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// Claim the flag if it is clear.
    pub fn try_acquire(&self) -> Option<AnalyzingGuard> {
        self.0
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .ok()
            .map(|_| AnalyzingGuard { flag: self.0.clone() })
    }
}

/// Proof that the analyzing flag is held; clears it on drop.
#[derive(Debug)]
pub struct AnalyzingGuard {
    flag: Arc<AtomicBool>,
}

impl Drop for AnalyzingGuard {
    fn drop(&mut self) {
        self.flag.store(false, Ordering::SeqCst);
    }
}

pub struct CaptureController {
    device: Box<dyn CaptureDevice>,
    facing: CameraFacing,
    analyzing: AnalyzingFlag,
}

impl CaptureController {
    pub fn new(device: impl CaptureDevice + 'static) -> Self {
        Self::from_boxed(Box::new(device))
    }

    pub fn from_boxed(device: Box<dyn CaptureDevice>) -> Self {
        Self {
            device,
            facing: CameraFacing::default(),
            analyzing: AnalyzingFlag::new(),
        }
    }

    pub fn facing(&self) -> CameraFacing {
        self.facing
    }

    pub fn toggle_facing(&mut self) -> CameraFacing {
        self.facing = self.facing.toggled();
        debug!(facing = ?self.facing, "camera facing toggled");
        self.facing
    }

    pub fn analyzing(&self) -> AnalyzingFlag {
        self.analyzing.clone()
    }

    /// Whether the shutter currently accepts a press.
    pub fn is_ready(&self) -> bool {
        !self.analyzing.is_set()
    }

    /// Press the shutter: `None` while a previous capture is still in flight.
    pub fn try_begin(&self) -> Option<AnalyzingGuard> {
        self.analyzing.try_acquire()
    }

    /// Take one photo with the active camera.
    pub async fn capture(&mut self, _busy: &AnalyzingGuard) -> StripResult<CaptureArtifact> {
        let artifact = self.device.take_picture(self.facing).await?;
        debug!(path = %artifact.path().display(), facing = ?self.facing, "photo captured");
        Ok(artifact)
    }
}
