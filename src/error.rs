use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use thiserror::Error;

/// Result type alias using the library's Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Comprehensive error types for the site-factory library.
#[derive(Error, Debug, Clone)]
#[non_exhaustive]
pub enum Error {
    /// IO error with context about the file path.
    #[error("IO error accessing '{path}': {message}")]
    Io {
        /// Path where the error occurred
        path: PathBuf,
        /// Error message
        message: String,
    },

    /// Template rendering error.
    #[error("Failed to render template '{template}': {message}")]
    Template {
        /// Template name
        template: String,
        /// Error message
        message: String,
    },

    /// Configuration validation error.
    #[error("Invalid configuration: {message}")]
    Config {
        /// Detailed error message
        message: String,
    },

    /// Input or output failed a shape check.
    #[error("Validation failed: {message}")]
    Validation {
        /// Detailed error message
        message: String,
    },

    /// Provider returned a non-success response.
    #[error("API error from {provider} (status {status}): {message}")]
    Api {
        /// Provider name
        provider: String,
        /// HTTP status code
        status: u16,
        /// Response body or summary
        message: String,
    },

    /// Provider rejected the call because of rate limiting (HTTP 429).
    #[error("API rate limit exceeded for {provider}: {message}")]
    RateLimited {
        /// Provider name
        provider: String,
        /// Response body or summary
        message: String,
    },

    /// Transport-level failure talking to a remote service.
    #[error("Network error contacting {url}: {message}")]
    Network {
        /// Target URL
        url: String,
        /// Error message
        message: String,
    },

    /// A pipeline stage failed in a way the pipeline cannot recover from.
    #[error("Pipeline failed at stage '{stage}': {message}")]
    Pipeline {
        /// Stage name
        stage: String,
        /// Error message
        message: String,
    },

    /// JSON serialization error.
    #[error("Serialization error: {message}")]
    Serialization {
        /// Error message
        message: String,
    },
}

impl Error {
    /// Creates an IO error with path context.
    #[must_use]
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            message: source.to_string(),
        }
    }

    /// Creates a configuration error.
    #[must_use]
    pub fn config(message: impl Into<String>) -> Self {
        Self::Config {
            message: message.into(),
        }
    }

    /// Creates a validation error.
    #[must_use]
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Creates a template error.
    #[must_use]
    pub fn template(template: impl Into<String>, source: tera::Error) -> Self {
        // tera nests the useful part of the message in its source chain
        let mut message = source.to_string();
        let mut cause = std::error::Error::source(&source);
        while let Some(inner) = cause {
            message.push_str(": ");
            message.push_str(&inner.to_string());
            cause = inner.source();
        }

        Self::Template {
            template: template.into(),
            message,
        }
    }

    /// Creates an API error.
    #[must_use]
    pub fn api(provider: impl Into<String>, status: u16, message: impl Into<String>) -> Self {
        Self::Api {
            provider: provider.into(),
            status,
            message: message.into(),
        }
    }

    /// Creates a rate-limit error.
    #[must_use]
    pub fn rate_limited(provider: impl Into<String>, message: impl Into<String>) -> Self {
        Self::RateLimited {
            provider: provider.into(),
            message: message.into(),
        }
    }

    /// Creates a network error.
    #[must_use]
    pub fn network(url: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Network {
            url: url.into(),
            message: message.into(),
        }
    }

    /// Creates a pipeline error.
    #[must_use]
    pub fn pipeline(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Pipeline {
            stage: stage.into(),
            message: message.into(),
        }
    }

    /// Returns the category this error is filed under.
    #[must_use]
    pub const fn category(&self) -> ErrorCategory {
        match self {
            Self::Io { .. } => ErrorCategory::FileSystem,
            Self::Template { .. } | Self::Config { .. } => ErrorCategory::Config,
            Self::Validation { .. } | Self::Serialization { .. } => ErrorCategory::Validation,
            Self::Api { .. } | Self::RateLimited { .. } => ErrorCategory::Api,
            Self::Network { .. } => ErrorCategory::Network,
            Self::Pipeline { .. } => ErrorCategory::Pipeline,
        }
    }

    /// Returns the default severity for this error.
    #[must_use]
    pub const fn severity(&self) -> Severity {
        match self {
            Self::RateLimited { .. } => Severity::Warning,
            _ => Severity::Error,
        }
    }

    /// Returns true if this is an IO error.
    #[must_use]
    pub const fn is_io(&self) -> bool {
        matches!(self, Self::Io { .. })
    }

    /// Returns true if this is a configuration error.
    #[must_use]
    pub const fn is_config(&self) -> bool {
        matches!(self, Self::Config { .. })
    }

    /// Returns true if the provider asked us to slow down.
    #[must_use]
    pub const fn is_rate_limited(&self) -> bool {
        matches!(self, Self::RateLimited { .. })
    }
}

/// Error taxonomy used for logging and reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Bad topic or article shape
    Validation,
    /// Provider errors and rate limits
    Api,
    /// Read/write failures
    FileSystem,
    /// Stage orchestration failures
    Pipeline,
    /// Transport failures
    Network,
    /// Missing or invalid configuration
    Config,
    /// Anything that could not be classified
    Unknown,
}

impl ErrorCategory {
    /// Returns the wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Api => "api",
            Self::FileSystem => "file_system",
            Self::Pipeline => "pipeline",
            Self::Network => "network",
            Self::Config => "config",
            Self::Unknown => "unknown",
        }
    }

    /// Guesses a category from a free-form error message.
    #[must_use]
    pub fn from_message(message: &str) -> Self {
        let lower = message.to_lowercase();
        let has = |needles: &[&str]| needles.iter().any(|n| lower.contains(n));

        if has(&["validation", "invalid", "required"]) {
            Self::Validation
        } else if has(&["api", "rate limit", "429"]) {
            Self::Api
        } else if has(&["file", "directory", "path", "enoent"]) {
            Self::FileSystem
        } else if has(&["pipeline", "stage"]) {
            Self::Pipeline
        } else if has(&["network", "fetch", "connection", "econnreset"]) {
            Self::Network
        } else if has(&["config", "environment"]) {
            Self::Config
        } else {
            Self::Unknown
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How bad an error is.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// Processing cannot continue
    Critical,
    /// An operation failed
    Error,
    /// Recoverable degradation
    Warning,
    /// Informational
    Info,
}

impl Severity {
    /// Returns the wire name of the severity.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Critical => "critical",
            Self::Error => "error",
            Self::Warning => "warning",
            Self::Info => "info",
        }
    }

    /// Guesses a severity from a message and its category.
    #[must_use]
    pub fn from_message(message: &str, category: ErrorCategory) -> Self {
        let lower = message.to_lowercase();
        if lower.contains("cannot continue") || lower.contains("fatal") || lower.contains("critical")
        {
            return Self::Critical;
        }
        if category == ErrorCategory::Api && lower.contains("rate limit") {
            return Self::Warning;
        }
        Self::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<tera::Error> for Error {
    fn from(e: tera::Error) -> Self {
        Self::template("unknown", e)
    }
}

impl From<serde_json::Error> for Error {
    fn from(e: serde_json::Error) -> Self {
        Self::Serialization {
            message: e.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_creation() {
        let err = Error::config("test message");
        assert!(err.is_config());
        assert!(err.to_string().contains("test message"));
        assert_eq!(err.category(), ErrorCategory::Config);
    }

    #[test]
    fn test_io_error() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err = Error::io("/tmp/test.txt", io_err);
        assert!(err.is_io());
        assert!(err.to_string().contains("/tmp/test.txt"));
        assert_eq!(err.category(), ErrorCategory::FileSystem);
    }

    #[test]
    fn test_rate_limit_is_warning() {
        let err = Error::rate_limited("openai", "slow down");
        assert!(err.is_rate_limited());
        assert_eq!(err.category(), ErrorCategory::Api);
        assert_eq!(err.severity(), Severity::Warning);
    }

    #[test]
    fn test_pipeline_error_category() {
        let err = Error::pipeline("blueprint", "boom");
        assert_eq!(err.category(), ErrorCategory::Pipeline);
        assert!(err.to_string().contains("blueprint"));
    }

    #[test]
    fn test_serialization_error() {
        let json_err = serde_json::from_str::<serde_json::Value>("invalid json").unwrap_err();
        let err: Error = json_err.into();
        assert!(err.to_string().contains("Serialization error"));
    }

    #[test]
    fn test_category_from_message() {
        assert_eq!(
            ErrorCategory::from_message("Topic is required"),
            ErrorCategory::Validation
        );
        assert_eq!(
            ErrorCategory::from_message("429 Too Many Requests"),
            ErrorCategory::Api
        );
        assert_eq!(
            ErrorCategory::from_message("ENOENT: no such directory"),
            ErrorCategory::FileSystem
        );
        assert_eq!(
            ErrorCategory::from_message("connection reset"),
            ErrorCategory::Network
        );
        assert_eq!(ErrorCategory::from_message("weird"), ErrorCategory::Unknown);
    }

    #[test]
    fn test_severity_from_message() {
        assert_eq!(
            Severity::from_message("fatal: cannot continue", ErrorCategory::Pipeline),
            Severity::Critical
        );
        assert_eq!(
            Severity::from_message("rate limit hit", ErrorCategory::Api),
            Severity::Warning
        );
        assert_eq!(
            Severity::from_message("bad thing", ErrorCategory::Unknown),
            Severity::Error
        );
    }

    #[test]
    fn test_category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::FileSystem).unwrap();
        assert_eq!(json, "\"file_system\"");
    }
}
