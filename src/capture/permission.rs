//! # Camera Permission Gate
//!
//! The gate turns a platform permission mechanism into a tri-state status.
//! Two probe styles exist:
//!
//! - **Native**: the platform has a permission API. A [`PermissionProbe`]
//!   implementation issues one request and reports Granted or Denied.
//! - **Stream**: the platform has no permission API, only a way to open the
//!   camera. [`StreamProbe`] opens a [`MediaStream`] as proof of access and
//!   stops it straight away so the device is not held outside the preview.
//!
//! Denial is never fatal. The gate stays in `Denied` until [`PermissionGate::retry`]
//! succeeds, and once the first probe resolves it never reports `Unknown` again.

use async_trait::async_trait;
use tracing::{debug, warn};

use crate::error::{ErrorSeverity, StripError, StripResult};

/// Camera access status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PermissionState {
    /// No probe has resolved yet
    #[default]
    Unknown,
    Granted,
    Denied,
}

/// A native permission request.
#[async_trait]
pub trait PermissionProbe: Send + Sync {
    /// Issue one permission request and report the outcome.
    ///
    /// An `Err` is treated as a denial by the gate.
    async fn request_permission(&self) -> StripResult<PermissionState>;
}

/// An open camera stream.
pub trait MediaStream: Send {
    /// Release the underlying device.
    fn stop(&mut self);
}

/// A device that can only prove access by opening a stream.
#[async_trait]
pub trait MediaDevice: Send + Sync {
    async fn open_stream(&self) -> StripResult<Box<dyn MediaStream>>;
}

/// Permission probe for platforms without a native permission API.
pub struct StreamProbe<D> {
    device: D,
}

impl<D: MediaDevice> StreamProbe<D> {
    pub fn new(device: D) -> Self {
        Self { device }
    }
}

#[async_trait]
impl<D: MediaDevice> PermissionProbe for StreamProbe<D> {
    async fn request_permission(&self) -> StripResult<PermissionState> {
        match self.device.open_stream().await {
            Ok(mut stream) => {
                // Access is proven; the live preview opens its own stream.
                stream.stop();
                Ok(PermissionState::Granted)
            }
            Err(e) => {
                warn!(error = %e, "opening camera stream failed");
                Ok(PermissionState::Denied)
            }
        }
    }
}

/// Tri-state camera permission holder with a retry action.
pub struct PermissionGate {
    probe: Box<dyn PermissionProbe>,
    state: PermissionState,
}

impl PermissionGate {
    pub fn new(probe: impl PermissionProbe + 'static) -> Self {
        Self::from_boxed(Box::new(probe))
    }

    pub fn from_boxed(probe: Box<dyn PermissionProbe>) -> Self {
        Self {
            probe,
            state: PermissionState::Unknown,
        }
    }

    pub fn state(&self) -> PermissionState {
        self.state
    }

    /// Whether the UI should offer a "grant permission" action.
    pub fn retry_available(&self) -> bool {
        self.state == PermissionState::Denied
    }

    /// Probe for camera access and record the result.
    pub async fn request_access(&mut self) -> PermissionState {
        let state = match self.probe.request_permission().await {
            Ok(PermissionState::Granted) => PermissionState::Granted,
            // A probe that cannot decide counts as a refusal.
            Ok(PermissionState::Denied | PermissionState::Unknown) => PermissionState::Denied,
            Err(e) => {
                warn!(error = %e, "camera permission probe failed");
                PermissionState::Denied
            }
        };
        debug!(?state, "camera permission resolved");
        self.state = state;
        state
    }

    /// Re-run the probe after a denial. A granted gate is left alone.
    pub async fn retry(&mut self) -> PermissionState {
        if self.state == PermissionState::Granted {
            return self.state;
        }
        self.request_access().await
    }

    /// `Ok` only when access has been granted.
    pub fn ensure_granted(&self) -> StripResult<()> {
        match self.state {
            PermissionState::Granted => Ok(()),
            state => Err(StripError::permission_denied(format!("camera access is {:?}", state))
                .with_severity(ErrorSeverity::Warning)
                .with_recovery_suggestion("Grant camera access and retry")),
        }
    }
}
