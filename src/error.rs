//! Error handling for the prediction service.
//!
//! This module defines the error types used throughout the service and how
//! they map onto HTTP responses.
//!
//! The main components are:
//! - [`ServiceError`]: The main error enum used throughout the application
//! - [`Result<T>`]: A type alias for `std::result::Result<T, ServiceError>`
//! - Conversion implementations from common error types to `ServiceError`
//!
//! Only two kinds are ever surfaced to the HTTP caller as errors from the
//! generation path: [`ServiceError::Credentials`] (mapped to 503) and
//! [`ServiceError::UpstreamRateLimit`] (mapped to 429). Every other upstream
//! failure is absorbed by the prediction engine, which substitutes the
//! deterministic fallback result instead.

use thiserror::Error;

use crate::validation::ValidationError;

/// The main error type for the prediction service.
///
/// Each variant carries a descriptive message. User-facing text is produced
/// at the HTTP boundary (in Dutch); these messages are for logs and
/// diagnostics.
#[derive(Error, Debug, Clone)]
pub enum ServiceError {
    /// Configuration errors, such as an unreadable or invalid config file.
    #[error("Configuration error: {0}")]
    Config(String),

    /// The upstream API key is missing or was rejected.
    #[error("Credential error: {0}")]
    Credentials(String),

    /// The upstream model provider rejected the request as rate limited.
    /// Distinct from this service's own admission control.
    #[error("Upstream rate limit: {0}")]
    UpstreamRateLimit(String),

    /// The upstream API returned an error response that is neither a
    /// credential nor a rate-limit rejection.
    #[error("API error: {0}")]
    Api(String),

    /// Network-level failures: connection errors, timeouts.
    #[error("Network error: {0}")]
    Network(String),

    /// The upstream response could not be parsed or had the wrong shape.
    #[error("Parse error: {0}")]
    Parse(String),

    /// The question failed validation.
    #[error(transparent)]
    Validation(#[from] ValidationError),
}

/// A type alias for `std::result::Result<T, ServiceError>`.
pub type Result<T> = std::result::Result<T, ServiceError>;

impl From<reqwest::Error> for ServiceError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() || err.is_connect() {
            ServiceError::Network(err.to_string())
        } else {
            ServiceError::Api(err.to_string())
        }
    }
}

impl From<serde_json::Error> for ServiceError {
    fn from(err: serde_json::Error) -> Self {
        ServiceError::Parse(err.to_string())
    }
}

impl From<toml::de::Error> for ServiceError {
    fn from(err: toml::de::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}

impl From<std::io::Error> for ServiceError {
    fn from(err: std::io::Error) -> Self {
        ServiceError::Config(err.to_string())
    }
}
