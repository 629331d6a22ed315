//! # Analyzer Configuration
//!
//! [`AnalyzerConfig`] is the single scoped value the pipeline is built from.
//! It replaces a module-level API client with an embedded key: the credential
//! is resolved once at startup and handed to an explicitly constructed
//! transport.
//!
//! ## Configuration Parameters
//!
//! | Parameter      | Type               | Range / Default                              |
//! |----------------|--------------------|----------------------------------------------|
//! | `endpoint`     | `String`           | `https://api.openai.com/v1/chat/completions` |
//! | `model`        | `String`           | `gpt-4o`                                     |
//! | `api_key`      | `Option<String>`   | flag, `OPENAI_API_KEY`, then settings file   |
//! | `target_width` | `u32`              | 1-4096, default 800                          |
//! | `jpeg_quality` | `u8`               | 1-100, default 70                            |
//! | `timeout`      | `Option<Duration>` | default 60s, `None` waits forever            |
//! | `stale_policy` | `StalePolicy`      | default `KeepVisible`                        |
//!
//! ## Examples
//!
//! ```rust
//! use water_strip_analyzer::config::AnalyzerConfig;
//!
//! let mut config = AnalyzerConfig::default();
//! config.api_key = Some("sk-test".to_string());
//! assert!(config.validate().is_ok());
//! assert_eq!(config.target_width, 800);
//! ```

use std::time::Duration;

use crate::analysis::client::AnalysisClient;
use crate::analysis::transport::ChatCompletionsTransport;
use crate::config::settings::Settings;
use crate::error::{StripError, StripResult};
use crate::presenter::StalePolicy;
use crate::processing::normalize::ImageNormalizer;

/// Environment variable consulted for the inference credential.
pub const API_KEY_ENV: &str = "OPENAI_API_KEY";

/// Default OpenAI-compatible chat completions endpoint.
pub const DEFAULT_ENDPOINT: &str = "https://api.openai.com/v1/chat/completions";

/// Default vision-capable model.
pub const DEFAULT_MODEL: &str = "gpt-4o";

/// Configuration for one analyzer instance.
#[derive(Debug, Clone)]
pub struct AnalyzerConfig {
    /// Full URL of the chat completions endpoint.
    pub endpoint: String,

    /// Model name sent with every request.
    pub model: String,

    /// Bearer credential. Required before a transport can be built.
    pub api_key: Option<String>,

    /// Width the captured photo is reduced to before encoding.
    ///
    /// Narrower photos are left at their native width.
    pub target_width: u32,

    /// JPEG quality used for the outbound payload (1-100).
    pub jpeg_quality: u8,

    /// Upper bound on a single inference request.
    pub timeout: Option<Duration>,

    /// Whether previous readings stay visible while a new analysis runs.
    pub stale_policy: StalePolicy,
}

impl Default for AnalyzerConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            model: DEFAULT_MODEL.to_string(),
            api_key: None,
            target_width: 800,
            jpeg_quality: 70,
            timeout: Some(Duration::from_secs(60)),
            stale_policy: StalePolicy::KeepVisible,
        }
    }
}

impl AnalyzerConfig {
    /// Validates the configuration parameters.
    ///
    /// A missing credential is a validation failure: no request can succeed
    /// without one, so it is reported before the camera is even touched.
    pub fn validate(&self) -> StripResult<()> {
        if !self.endpoint.starts_with("http://") && !self.endpoint.starts_with("https://") {
            return Err(StripError::config(
                "endpoint",
                &self.endpoint,
                "must be an http(s) URL",
            ));
        }
        if self.model.trim().is_empty() {
            return Err(StripError::config("model", "", "must not be empty"));
        }
        if !(1..=4096).contains(&self.target_width) {
            return Err(StripError::config(
                "target_width",
                self.target_width.to_string(),
                "must be between 1 and 4096",
            ));
        }
        if !(1..=100).contains(&self.jpeg_quality) {
            return Err(StripError::config(
                "jpeg_quality",
                self.jpeg_quality.to_string(),
                "must be between 1 and 100",
            ));
        }
        if self.timeout == Some(Duration::ZERO) {
            return Err(StripError::config(
                "timeout",
                "0",
                "use no timeout instead of a zero timeout",
            ));
        }
        self.require_api_key().map(|_| ())
    }

    /// The credential, or a `Config` error naming where it can be supplied.
    pub fn require_api_key(&self) -> StripResult<&str> {
        match self.api_key.as_deref().map(str::trim) {
            Some(key) if !key.is_empty() => Ok(key),
            _ => Err(StripError::config("api_key", "<unset>", "no inference credential configured")
                .with_recovery_suggestion(format!(
                    "Pass --api-key, export {}, or run `strip settings set-key <KEY>`",
                    API_KEY_ENV
                ))),
        }
    }

    /// Resolve the credential: explicit value, then environment, then settings file.
    pub fn resolve_api_key(
        explicit: Option<String>,
        env_value: Option<String>,
        settings: &Settings,
    ) -> Option<String> {
        explicit
            .into_iter()
            .chain(env_value)
            .chain(settings.api_key.clone())
            .map(|key| key.trim().to_string())
            .find(|key| !key.is_empty())
    }

    /// Build the image normalizer described by this configuration.
    pub fn normalizer(&self) -> ImageNormalizer {
        ImageNormalizer::new(self.target_width, self.jpeg_quality)
    }

    /// Build the HTTP transport and wrap it in an analysis client.
    pub fn analysis_client(&self) -> StripResult<AnalysisClient> {
        self.validate()?;
        let transport = ChatCompletionsTransport::new(
            &self.endpoint,
            &self.model,
            self.require_api_key()?,
        )?;
        Ok(AnalysisClient::new(Box::new(transport)).with_timeout(self.timeout))
    }
}
