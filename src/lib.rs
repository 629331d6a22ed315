//! # Water Strip Analyzer Library
//!
//! Reads water-test strips with a vision-capable language model. A photo of
//! the strip is taken, shrunk to a bounded JPEG, sent to a hosted multimodal
//! model with a fixed instruction, and the pH / ammonia / nitrite / nitrate
//! readings in the reply are validated and displayed.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//! - `capture`: Permission gate, capture controller and camera devices
//! - `processing`: Photo normalization (resize, JPEG, base64)
//! - `analysis`: Inference transport, analysis client and reading sets
//! - `presenter`: The single displayed reading set
//! - `config`: Analyzer configuration and persisted settings
//! - `session`: Pipeline orchestration, analyzing flag and lifecycle
//!
//! ## Example
//!
//! ```rust,no_run
//! use water_strip_analyzer::capture::FileCamera;
//! use water_strip_analyzer::config::AnalyzerConfig;
//! use water_strip_analyzer::session::{AnalysisSession, CaptureOutcome};
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let config = AnalyzerConfig {
//!     api_key: Some("sk-...".to_string()),
//!     ..AnalyzerConfig::default()
//! };
//! let camera = FileCamera::new("strip.jpg")?;
//! let mut session = AnalysisSession::from_config(&config, camera.probe(), camera)?;
//!
//! session.start().await;
//! if let CaptureOutcome::Displayed(readings) = session.capture().await {
//!     println!("pH {}", readings.ph);
//! }
//! # Ok(())
//! # }
//! ```

pub mod analysis;
pub mod capture;
pub mod config;
pub mod error;
pub mod presenter;
pub mod processing;
pub mod session;

/// Re-export error types for convenience
pub use error::{FailureKind, HasRecoverySuggestion, HasSeverity, StripError, StripResult};

pub use analysis::ReadingSet;
pub use session::{AnalysisSession, CaptureOutcome};
