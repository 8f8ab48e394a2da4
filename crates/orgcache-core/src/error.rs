//! Error type shared by every OrgCache crate.
//!
//! Redis, HTTP, JSON and configuration failures are converted into
//! [`AppError`] at the crate boundary so callers only match on [`ErrorKind`].

use std::fmt;
use thiserror::Error;

/// What went wrong, independent of which crate noticed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum ErrorKind {
    /// Malformed input, e.g. a CDC event without snapshots.
    Validation,
    /// A bug or broken invariant.
    Internal,
    /// L2 failure.
    Cache,
    Configuration,
    /// A payload could not be encoded or decoded.
    Serialization,
    /// The authoritative query service returned an error.
    ExternalService,
    /// A dependency is temporarily unavailable.
    ServiceUnavailable,
    /// An operation exceeded its deadline.
    Timeout,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Validation => write!(f, "VALIDATION"),
            Self::Internal => write!(f, "INTERNAL"),
            Self::Cache => write!(f, "CACHE"),
            Self::Configuration => write!(f, "CONFIGURATION"),
            Self::Serialization => write!(f, "SERIALIZATION"),
            Self::ExternalService => write!(f, "EXTERNAL_SERVICE"),
            Self::ServiceUnavailable => write!(f, "SERVICE_UNAVAILABLE"),
            Self::Timeout => write!(f, "TIMEOUT"),
        }
    }
}

/// An error with its kind, a message for logs, and the underlying cause.
///
/// "Not found" is never an error here: lookups return `Ok(None)`.
#[derive(Debug, Error)]
#[error("{kind}: {message}")]
pub struct AppError {
    pub kind: ErrorKind,
    /// Operation context followed by the failure, e.g.
    /// `get_organization tenant=... code=...: authoritative query exceeded 5000ms`.
    pub message: String,
    #[source]
    pub source: Option<Box<dyn std::error::Error + Send + Sync>>,
}

impl AppError {
    /// An error without an underlying cause.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    /// An error wrapping the failure that caused it.
    pub fn with_source(
        kind: ErrorKind,
        message: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: message.into(),
            source: Some(Box::new(source)),
        }
    }

    /// Prefix the message with the operation context, keeping the kind and cause.
    pub fn context(mut self, context: impl fmt::Display) -> Self {
        self.message = format!("{context}: {}", self.message);
        self
    }

    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, message)
    }

    pub fn cache(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Cache, message)
    }

    pub fn configuration(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Configuration, message)
    }

    pub fn external_service(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::ExternalService, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        Self::with_source(
            ErrorKind::Serialization,
            format!("JSON (de)serialization failed: {err}"),
            err,
        )
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        Self::with_source(
            ErrorKind::Configuration,
            format!("Invalid configuration: {err}"),
            err,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_context_keeps_kind_and_source() {
        let inner = serde_json::from_str::<u32>("nope").unwrap_err();
        let err = AppError::from(inner).context("get_organizations tenant=t1");
        assert_eq!(err.kind, ErrorKind::Serialization);
        assert!(err.message.starts_with("get_organizations tenant=t1: "));
        assert!(std::error::Error::source(&err).is_some());
    }

    #[test]
    fn test_display_includes_kind() {
        let err = AppError::timeout("L3 query exceeded 5s");
        assert_eq!(err.to_string(), "TIMEOUT: L3 query exceeded 5s");
    }
}
