//! # Error Handling
//!
//! Hierarchical error type for the strip analysis pipeline. Every variant
//! carries an [`ErrorContext`] with a timestamp, the failing operation, a
//! recovery suggestion and free-form metadata, so a failure that the session
//! swallows still leaves a useful diagnostic line behind.
//!
//! ## Taxonomy
//!
//! Callers rarely care about the exact variant. [`StripError::kind`] folds
//! them onto the four failure kinds the session reacts to:
//!
//! | Variant(s)                               | [`FailureKind`]     |
//! |------------------------------------------|---------------------|
//! | `PermissionDenied`                       | `PermissionDenied`  |
//! | `Capture`, `Processing`, `Io`, `Config`  | `CaptureFailure`    |
//! | `Network`, `Http`, `Timeout`             | `NetworkFailure`    |
//! | `Parse`, `External`                      | `ParseFailure`      |
//!
//! ## Usage
//!
//! ```rust
//! use water_strip_analyzer::error::{FailureKind, HasRecoverySuggestion, StripError};
//!
//! let error = StripError::parse("completion is not JSON")
//!     .with_context("decoding reading set")
//!     .with_recovery_suggestion("Retake the photo with the strip filling the frame");
//!
//! assert_eq!(error.kind(), FailureKind::ParseFailure);
//! assert!(error.recovery_suggestion().is_some());
//! ```

use std::{error::Error as StdError, fmt, time::SystemTime};

/// Severity levels for errors
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ErrorSeverity {
    /// Informational errors
    Info,
    /// Warnings that may indicate potential issues
    Warning,
    /// Errors that affect operation but can be recovered from
    Error,
    /// Fatal errors that cannot be recovered from
    Fatal,
}

/// The four failure kinds the analysis session distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    PermissionDenied,
    CaptureFailure,
    NetworkFailure,
    ParseFailure,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::PermissionDenied => "permission denied",
            FailureKind::CaptureFailure => "capture failure",
            FailureKind::NetworkFailure => "network failure",
            FailureKind::ParseFailure => "parse failure",
        };
        f.write_str(name)
    }
}

/// Metadata about when and where an error occurred
#[derive(Debug, Clone)]
pub struct ErrorContext {
    /// When the error occurred
    pub timestamp: SystemTime,
    /// The operation being performed when the error occurred
    pub operation: Option<String>,
    /// Additional context about the error
    pub context: Option<String>,
    /// Suggested recovery action
    pub recovery_suggestion: Option<String>,
    /// Error severity level
    pub severity: ErrorSeverity,
    /// Additional metadata as key-value pairs
    pub metadata: std::collections::HashMap<String, String>,
}

impl Default for ErrorContext {
    fn default() -> Self {
        Self {
            timestamp: SystemTime::now(),
            operation: None,
            context: None,
            recovery_suggestion: None,
            severity: ErrorSeverity::Error,
            metadata: std::collections::HashMap::new(),
        }
    }
}

impl ErrorContext {
    /// Create a new error context
    pub fn new() -> Self {
        Self::default()
    }
}

/// Base error type for the strip analyzer
#[derive(Debug)]
pub enum StripError {
    /// Camera access was refused
    PermissionDenied {
        reason: String,
        context: ErrorContext,
    },
    /// The camera device failed to produce a photo
    Capture {
        reason: String,
        context: ErrorContext,
    },
    /// Decoding, resizing or encoding the photo failed
    Processing {
        operation: String,
        reason: String,
        context: ErrorContext,
    },
    /// The inference request could not be delivered or answered
    Network {
        operation: String,
        address: Option<String>,
        source: Option<Box<dyn StdError + Send + Sync>>,
        context: ErrorContext,
    },
    /// The inference service answered with a non-success status
    Http {
        status: u16,
        body: String,
        context: ErrorContext,
    },
    /// The inference request exceeded its time budget
    Timeout {
        operation: String,
        duration_ms: u64,
        context: ErrorContext,
    },
    /// The completion did not contain a usable reading set
    Parse {
        reason: String,
        context: ErrorContext,
    },
    /// Configuration validation errors
    Config {
        field: String,
        value: String,
        reason: String,
        context: ErrorContext,
    },
    /// I/O errors
    Io {
        operation: String,
        path: Option<String>,
        source: std::io::Error,
        context: ErrorContext,
    },
    /// External library errors
    External {
        library: String,
        source: Box<dyn StdError + Send + Sync>,
        context: ErrorContext,
    },
}

impl StripError {
    /// Create a permission error
    pub fn permission_denied(reason: impl Into<String>) -> Self {
        Self::PermissionDenied {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a capture error
    pub fn capture(reason: impl Into<String>) -> Self {
        Self::Capture {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a processing error
    pub fn processing(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::Processing {
            operation: operation.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a network error
    pub fn network(operation: impl Into<String>) -> Self {
        Self::Network {
            operation: operation.into(),
            address: None,
            source: None,
            context: ErrorContext::new(),
        }
    }

    /// Create a network error wrapping a transport failure
    pub fn network_with_source(
        operation: impl Into<String>,
        address: Option<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::Network {
            operation: operation.into(),
            address,
            source: Some(Box::new(source)),
            context: ErrorContext::new(),
        }
    }

    /// Create an HTTP status error
    pub fn http(status: u16, body: impl Into<String>) -> Self {
        Self::Http {
            status,
            body: body.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a timeout error
    pub fn timeout(operation: impl Into<String>, duration_ms: u64) -> Self {
        Self::Timeout {
            operation: operation.into(),
            duration_ms,
            context: ErrorContext::new(),
        }
    }

    /// Create a parse error
    pub fn parse(reason: impl Into<String>) -> Self {
        Self::Parse {
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create a configuration error
    pub fn config(
        field: impl Into<String>,
        value: impl Into<String>,
        reason: impl Into<String>,
    ) -> Self {
        Self::Config {
            field: field.into(),
            value: value.into(),
            reason: reason.into(),
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error
    pub fn io(operation: impl Into<String>, source: std::io::Error) -> Self {
        Self::Io {
            operation: operation.into(),
            path: None,
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an I/O error bound to a path
    pub fn io_at(
        operation: impl Into<String>,
        path: impl AsRef<std::path::Path>,
        source: std::io::Error,
    ) -> Self {
        Self::Io {
            operation: operation.into(),
            path: Some(path.as_ref().display().to_string()),
            source,
            context: ErrorContext::new(),
        }
    }

    /// Create an external library error
    pub fn external(
        library: impl Into<String>,
        source: impl StdError + Send + Sync + 'static,
    ) -> Self {
        Self::External {
            library: library.into(),
            source: Box::new(source),
            context: ErrorContext::new(),
        }
    }

    /// Add context to the error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        self.context_mut().context = Some(context.into());
        self
    }

    /// Add operation context
    pub fn with_operation(mut self, operation: impl Into<String>) -> Self {
        self.context_mut().operation = Some(operation.into());
        self
    }

    /// Add recovery suggestion
    pub fn with_recovery_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.context_mut().recovery_suggestion = Some(suggestion.into());
        self
    }

    /// Set severity
    pub fn with_severity(mut self, severity: ErrorSeverity) -> Self {
        self.context_mut().severity = severity;
        self
    }

    /// Add metadata
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context_mut().metadata.insert(key.into(), value.into());
        self
    }

    /// Get the error context
    pub fn context(&self) -> &ErrorContext {
        match self {
            Self::PermissionDenied { context, .. } => context,
            Self::Capture { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Http { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Parse { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    fn context_mut(&mut self) -> &mut ErrorContext {
        match self {
            Self::PermissionDenied { context, .. } => context,
            Self::Capture { context, .. } => context,
            Self::Processing { context, .. } => context,
            Self::Network { context, .. } => context,
            Self::Http { context, .. } => context,
            Self::Timeout { context, .. } => context,
            Self::Parse { context, .. } => context,
            Self::Config { context, .. } => context,
            Self::Io { context, .. } => context,
            Self::External { context, .. } => context,
        }
    }

    /// Get the error category as a string
    pub fn category(&self) -> &'static str {
        match self {
            Self::PermissionDenied { .. } => "permission",
            Self::Capture { .. } => "capture",
            Self::Processing { .. } => "processing",
            Self::Network { .. } => "network",
            Self::Http { .. } => "http",
            Self::Timeout { .. } => "timeout",
            Self::Parse { .. } => "parse",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::External { .. } => "external",
        }
    }

    /// Fold the variant onto the pipeline failure taxonomy.
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::PermissionDenied { .. } => FailureKind::PermissionDenied,
            Self::Capture { .. } | Self::Processing { .. } | Self::Io { .. } | Self::Config { .. } => {
                FailureKind::CaptureFailure
            }
            Self::Network { .. } | Self::Http { .. } | Self::Timeout { .. } => {
                FailureKind::NetworkFailure
            }
            Self::Parse { .. } | Self::External { .. } => FailureKind::ParseFailure,
        }
    }
}

impl StripError {
    fn write_message(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StripError::PermissionDenied { reason, .. } => {
                write!(f, "Camera permission denied: {}", reason)
            }
            StripError::Capture { reason, .. } => write!(f, "Photo capture failed: {}", reason),
            StripError::Processing {
                operation, reason, ..
            } => {
                write!(f, "Image processing failed during {}: {}", operation, reason)
            }
            StripError::Network {
                operation,
                address,
                source,
                ..
            } => {
                match address {
                    Some(address) => write!(f, "Network error during {} on {}", operation, address)?,
                    None => write!(f, "Network error during {}", operation)?,
                }
                if let Some(source) = source {
                    write!(f, ": {}", source)?;
                }
                Ok(())
            }
            StripError::Http { status, body, .. } => {
                if body.is_empty() {
                    write!(f, "Inference service returned HTTP {}", status)
                } else {
                    write!(f, "Inference service returned HTTP {}: {}", status, body)
                }
            }
            StripError::Timeout {
                operation,
                duration_ms,
                ..
            } => {
                write!(f, "Timeout during {} after {}ms", operation, duration_ms)
            }
            StripError::Parse { reason, .. } => {
                write!(f, "Could not parse readings: {}", reason)
            }
            StripError::Config {
                field,
                value,
                reason,
                ..
            } => {
                write!(
                    f,
                    "Configuration error in '{}': {} (value: {})",
                    field, reason, value
                )
            }
            StripError::Io {
                operation,
                path,
                source,
                ..
            } => {
                if let Some(path) = path {
                    write!(
                        f,
                        "I/O error during {} on '{}': {}",
                        operation, path, source
                    )
                } else {
                    write!(f, "I/O error during {}: {}", operation, source)
                }
            }
            StripError::External {
                library, source, ..
            } => {
                write!(f, "External library error in {}: {}", library, source)
            }
        }
    }
}

impl fmt::Display for StripError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_message(f)?;
        if let Some(context) = &self.context().context {
            write!(f, " ({})", context)?;
        }
        Ok(())
    }
}

impl StdError for StripError {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        match self {
            Self::Io { source, .. } => Some(source),
            Self::External { source, .. } => Some(source.as_ref()),
            Self::Network {
                source: Some(source),
                ..
            } => Some(source.as_ref()),
            _ => None,
        }
    }
}

/// Result type alias using our custom error type
pub type StripResult<T> = Result<T, StripError>;

/// Trait for errors with severity levels
pub trait HasSeverity {
    /// Get the severity level of this error
    fn severity(&self) -> ErrorSeverity;
}

impl HasSeverity for StripError {
    fn severity(&self) -> ErrorSeverity {
        self.context().severity
    }
}

/// Trait for errors that provide recovery suggestions
pub trait HasRecoverySuggestion {
    /// Get recovery suggestion for this error
    fn recovery_suggestion(&self) -> Option<&str>;
}

impl HasRecoverySuggestion for StripError {
    fn recovery_suggestion(&self) -> Option<&str> {
        self.context().recovery_suggestion.as_deref()
    }
}

/// Error classification utilities
pub mod classify {
    use super::*;

    /// Errors the session logs and swallows, returning to the ready state.
    pub fn is_silent(error: &StripError) -> bool {
        matches!(
            error.kind(),
            FailureKind::CaptureFailure | FailureKind::NetworkFailure | FailureKind::ParseFailure
        )
    }

    /// Errors the user can act on directly (grant access, fix a setting).
    pub fn requires_user_intervention(error: &StripError) -> bool {
        matches!(
            error,
            StripError::PermissionDenied { .. } | StripError::Config { .. }
        ) || error.severity() == ErrorSeverity::Fatal
    }
}

/// Error conversion implementations
impl From<std::io::Error> for StripError {
    fn from(error: std::io::Error) -> Self {
        Self::io("unknown", error)
    }
}

impl From<serde_json::Error> for StripError {
    fn from(error: serde_json::Error) -> Self {
        Self::external("serde_json", error)
    }
}

impl From<image::ImageError> for StripError {
    fn from(error: image::ImageError) -> Self {
        Self::processing("decode", error.to_string())
    }
}

impl From<strip_scale::cpu::ScaleError> for StripError {
    fn from(error: strip_scale::cpu::ScaleError) -> Self {
        Self::processing("resize", error.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let error = StripError::config("jpeg_quality", "0", "must be between 1 and 100");
        assert_eq!(error.category(), "config");
        assert!(classify::requires_user_intervention(&error));
    }

    #[test]
    fn test_error_with_context() {
        let error = StripError::processing("resize", "zero width")
            .with_context("normalizing capture")
            .with_recovery_suggestion("retake the photo")
            .with_metadata("path", "/tmp/shot.jpg");

        assert_eq!(error.category(), "processing");
        assert_eq!(error.recovery_suggestion(), Some("retake the photo"));
        assert_eq!(
            error.context().metadata.get("path").map(String::as_str),
            Some("/tmp/shot.jpg")
        );
    }

    #[test]
    fn test_failure_kinds() {
        assert_eq!(
            StripError::permission_denied("user said no").kind(),
            FailureKind::PermissionDenied
        );
        assert_eq!(StripError::capture("shutter").kind(), FailureKind::CaptureFailure);
        assert_eq!(StripError::http(500, "").kind(), FailureKind::NetworkFailure);
        assert_eq!(
            StripError::timeout("analyze", 10).kind(),
            FailureKind::NetworkFailure
        );
        assert_eq!(StripError::parse("not json").kind(), FailureKind::ParseFailure);
    }

    #[test]
    fn test_error_classification() {
        assert!(classify::is_silent(&StripError::network("send")));
        assert!(!classify::is_silent(&StripError::permission_denied("no")));

        let fatal = StripError::capture("device gone").with_severity(ErrorSeverity::Fatal);
        assert!(classify::requires_user_intervention(&fatal));
    }

    #[test]
    fn test_display_appends_context() {
        let error = StripError::parse("trailing comma").with_context("reading /tmp/settings.json");
        assert_eq!(
            error.to_string(),
            "Could not parse readings: trailing comma (reading /tmp/settings.json)"
        );
    }

    #[test]
    fn test_display_includes_status() {
        let error = StripError::http(401, "invalid api key");
        assert_eq!(
            error.to_string(),
            "Inference service returned HTTP 401: invalid api key"
        );
    }
}
