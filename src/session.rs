//! # Analysis Session
//!
//! Orchestrates one screen's worth of state: the permission gate, the capture
//! controller, the normalizer, the analysis client and the result presenter.
//! Sessions are assembled with [`AnalysisSessionBuilder`].
//!
//! ## Pipeline
//!
//! ```text
//! shutter ─▶ CaptureController ─▶ ImageNormalizer ─▶ AnalysisClient ─▶ ResultPresenter
//!    │                                                     ▲
//!    └── AnalyzingFlag held for the whole span ────────────┘
//! ```
//!
//! ## Failure Policy
//!
//! Capture, network and parse failures are logged and swallowed: the flag
//! clears, the presenter keeps whatever it showed, and the shutter is ready
//! again. Nothing is retried. Permission denial is surfaced as
//! [`CaptureOutcome::NotPermitted`] so the caller can offer a retry.
//!
//! ## Lifecycle
//!
//! [`Lifecycle::teardown`] marks the session unmounted. An analysis in flight
//! at that moment is cancelled, and no state is updated afterwards.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, error, info, warn};

use crate::analysis::{AnalysisClient, ReadingSet};
use crate::capture::{
    AnalyzingFlag, AnalyzingGuard, CameraFacing, CaptureController, CaptureDevice, PermissionGate,
    PermissionProbe, PermissionState,
};
use crate::config::AnalyzerConfig;
use crate::error::{FailureKind, HasRecoverySuggestion, StripError, StripResult, classify};
use crate::presenter::{ResultPresenter, StalePolicy};
use crate::processing::ImageNormalizer;

/// What a shutter press led to.
#[derive(Debug, Clone, PartialEq)]
pub enum CaptureOutcome {
    /// A previous capture is still in flight; the press was ignored.
    Busy,
    /// Camera access has not been granted.
    NotPermitted,
    /// New readings are on display.
    Displayed(ReadingSet),
    /// The pipeline failed; the presenter is unchanged.
    Failed(FailureKind),
    /// The session was torn down before the pipeline settled.
    Discarded,
}

/// Mounted/unmounted signal shared between a session and whoever owns its screen.
#[derive(Debug, Clone)]
pub struct Lifecycle {
    mounted: Arc<watch::Sender<bool>>,
}

impl Default for Lifecycle {
    fn default() -> Self {
        Self::new()
    }
}

impl Lifecycle {
    pub fn new() -> Self {
        Self {
            mounted: Arc::new(watch::Sender::new(true)),
        }
    }

    pub fn is_mounted(&self) -> bool {
        *self.mounted.borrow()
    }

    /// Unmount. Idempotent.
    pub fn teardown(&self) {
        self.mounted.send_replace(false);
    }

    /// Resolves once [`Lifecycle::teardown`] has been called.
    pub async fn torn_down(&self) {
        let mut rx = self.mounted.subscribe();
        // The sender lives in `self`, so the channel cannot close under us.
        let _ = rx.wait_for(|mounted| !*mounted).await;
    }
}

pub struct AnalysisSession {
    gate: PermissionGate,
    controller: CaptureController,
    normalizer: ImageNormalizer,
    client: AnalysisClient,
    presenter: ResultPresenter,
    lifecycle: Lifecycle,
}

impl AnalysisSession {
    /// Create a new session using the builder pattern.
    pub fn builder() -> AnalysisSessionBuilder {
        AnalysisSessionBuilder::new()
    }

    /// Session wired from configuration: normalizer, HTTP client and stale policy.
    pub fn from_config(
        config: &AnalyzerConfig,
        probe: impl PermissionProbe + 'static,
        device: impl CaptureDevice + 'static,
    ) -> StripResult<Self> {
        Self::builder()
            .with_permission_probe(probe)
            .with_capture_device(device)
            .with_normalizer(config.normalizer())
            .with_analysis_client(config.analysis_client()?)
            .with_stale_policy(config.stale_policy)
            .build()
    }

    /// Probe camera access. Call once when the screen mounts.
    pub async fn start(&mut self) -> PermissionState {
        self.probe_permission(false).await
    }

    /// The "grant permission" action offered after a denial.
    pub async fn retry_permission(&mut self) -> PermissionState {
        self.probe_permission(true).await
    }

    async fn probe_permission(&mut self, retry: bool) -> PermissionState {
        if !self.lifecycle.is_mounted() {
            return self.gate.state();
        }
        let state = if retry {
            self.gate.retry().await
        } else {
            self.gate.request_access().await
        };
        if state == PermissionState::Denied {
            warn!("camera access denied; waiting for retry");
        }
        state
    }

    pub fn permission(&self) -> PermissionState {
        self.gate.state()
    }

    /// Whether a "grant permission" action should be offered.
    pub fn retry_available(&self) -> bool {
        self.lifecycle.is_mounted() && self.gate.retry_available()
    }

    /// Whether the shutter is enabled: mounted, granted and not analyzing.
    pub fn is_ready(&self) -> bool {
        self.lifecycle.is_mounted()
            && self.gate.state() == PermissionState::Granted
            && self.controller.is_ready()
    }

    pub fn facing(&self) -> CameraFacing {
        self.controller.facing()
    }

    /// Switch between front and back cameras. Displayed readings are untouched.
    pub fn toggle_facing(&mut self) -> CameraFacing {
        self.controller.toggle_facing()
    }

    /// Observable handle to the analyzing flag.
    pub fn analyzing(&self) -> AnalyzingFlag {
        self.controller.analyzing()
    }

    pub fn presenter(&self) -> &ResultPresenter {
        &self.presenter
    }

    pub fn lifecycle(&self) -> Lifecycle {
        self.lifecycle.clone()
    }

    /// Press the shutter and run the whole pipeline.
    pub async fn capture(&mut self) -> CaptureOutcome {
        if !self.lifecycle.is_mounted() {
            return CaptureOutcome::Discarded;
        }
        if let Err(e) = self.gate.ensure_granted() {
            debug!(error = %e, "shutter pressed without camera access");
            return CaptureOutcome::NotPermitted;
        }
        let Some(busy) = self.controller.try_begin() else {
            debug!("shutter pressed while analysis in flight; ignoring");
            return CaptureOutcome::Busy;
        };

        self.presenter.clear_on_capture_start();

        let settled = tokio::select! {
            result = run_pipeline(&mut self.controller, &self.normalizer, &self.client, &busy) => Some(result),
            _ = self.lifecycle.torn_down() => None,
        };
        drop(busy);

        let Some(result) = settled.filter(|_| self.lifecycle.is_mounted()) else {
            info!("session torn down; discarding in-flight analysis");
            return CaptureOutcome::Discarded;
        };

        match result {
            Ok(readings) => {
                self.presenter.show(readings);
                CaptureOutcome::Displayed(readings)
            }
            Err(e) => {
                let suggestion = e.recovery_suggestion().unwrap_or("");
                if classify::is_silent(&e) {
                    error!(
                        category = e.category(),
                        kind = %e.kind(),
                        error = %e,
                        suggestion,
                        "analysis failed; ready for another capture"
                    );
                } else {
                    warn!(category = e.category(), error = %e, suggestion, "capture needs user action");
                }
                CaptureOutcome::Failed(e.kind())
            }
        }
    }
}

async fn run_pipeline(
    controller: &mut CaptureController,
    normalizer: &ImageNormalizer,
    client: &AnalysisClient,
    busy: &AnalyzingGuard,
) -> StripResult<ReadingSet> {
    let artifact = controller.capture(busy).await?;
    let image = normalizer.normalize(&artifact).await?;
    // The shot is not kept once it has been encoded.
    drop(artifact);
    client.analyze(&image).await
}

/// Builder for analysis sessions.
pub struct AnalysisSessionBuilder {
    probe: Option<Box<dyn PermissionProbe>>,
    device: Option<Box<dyn CaptureDevice>>,
    normalizer: ImageNormalizer,
    client: Option<AnalysisClient>,
    stale_policy: StalePolicy,
    lifecycle: Option<Lifecycle>,
}

impl Default for AnalysisSessionBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl AnalysisSessionBuilder {
    pub fn new() -> Self {
        Self {
            probe: None,
            device: None,
            normalizer: ImageNormalizer::default(),
            client: None,
            stale_policy: StalePolicy::default(),
            lifecycle: None,
        }
    }

    pub fn with_permission_probe(mut self, probe: impl PermissionProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    pub fn with_capture_device(mut self, device: impl CaptureDevice + 'static) -> Self {
        self.device = Some(Box::new(device));
        self
    }

    pub fn with_normalizer(mut self, normalizer: ImageNormalizer) -> Self {
        self.normalizer = normalizer;
        self
    }

    pub fn with_analysis_client(mut self, client: AnalysisClient) -> Self {
        self.client = Some(client);
        self
    }

    pub fn with_stale_policy(mut self, policy: StalePolicy) -> Self {
        self.stale_policy = policy;
        self
    }

    /// Share an existing lifecycle instead of creating a fresh one.
    pub fn with_lifecycle(mut self, lifecycle: Lifecycle) -> Self {
        self.lifecycle = Some(lifecycle);
        self
    }

    pub fn build(self) -> StripResult<AnalysisSession> {
        let probe = self
            .probe
            .ok_or_else(|| StripError::config("permission_probe", "<none>", "no permission probe specified"))?;
        let device = self
            .device
            .ok_or_else(|| StripError::config("capture_device", "<none>", "no capture device specified"))?;
        let client = self
            .client
            .ok_or_else(|| StripError::config("analysis_client", "<none>", "no analysis client specified"))?;

        Ok(AnalysisSession {
            gate: PermissionGate::from_boxed(probe),
            controller: CaptureController::from_boxed(device),
            normalizer: self.normalizer,
            client,
            presenter: ResultPresenter::new(self.stale_policy),
            lifecycle: self.lifecycle.unwrap_or_default(),
        })
    }
}
