//! Error Handling Module
//!
//! Error taxonomy for the routing engine. The error kind drives retry and
//! fallback decisions directly: transient kinds are retried, a rate-limit
//! signal aborts retries on that provider and sets a lockout, anything else
//! moves straight to the next provider.
//!
//! # Example
//!
//! ```rust
//! use genroute::error::RouteError;
//!
//! let err = RouteError::Timeout("no response after 30s".into());
//! assert!(err.is_retryable());
//! assert!(!RouteError::InvalidParameter("width".into()).is_retryable());
//! ```

use std::time::Duration;

use thiserror::Error;

/// Errors produced by the routing engine and its provider adapters.
#[derive(Error, Debug, Clone)]
pub enum RouteError {
    /// Caller-supplied parameters are invalid or missing. Never retried,
    /// never subject to fallback; surfaced to the caller verbatim.
    #[error("Invalid parameter: {0}")]
    InvalidParameter(String),

    /// Provider call timed out.
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Network-level failure reaching the provider.
    #[error("Connection error: {0}")]
    Connection(String),

    /// Provider reported it is temporarily unavailable.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Provider-side internal error.
    #[error("Internal error: {0}")]
    Internal(String),

    /// Provider rejected the call due to rate limiting. Aborts remaining
    /// retries and places the provider under a lockout window.
    #[error("Rate limited: {message}")]
    RateLimited {
        message: String,
        /// Provider-supplied Retry-After, when available.
        retry_after: Option<Duration>,
    },

    /// Generic provider API error with an HTTP-like status code.
    #[error("API error {code}: {message}")]
    Api { code: u16, message: String },

    /// The request was cancelled by the caller.
    #[error("Request cancelled")]
    Cancelled,

    /// The fallback chain exceeded its end-to-end deadline.
    #[error("Deadline exceeded after {0:?}")]
    DeadlineExceeded(Duration),

    /// Router or provider misconfiguration.
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// The provider does not support the requested task type.
    #[error("Unsupported task: {0}")]
    UnsupportedTask(String),
}

impl RouteError {
    /// Convenience constructor for API errors.
    pub fn api(code: u16, message: impl Into<String>) -> Self {
        Self::Api {
            code,
            message: message.into(),
        }
    }

    /// Rate-limit error without a Retry-After hint.
    pub fn rate_limited(message: impl Into<String>) -> Self {
        Self::RateLimited {
            message: message.into(),
            retry_after: None,
        }
    }

    /// Coarse kind label, used in retry attempt records and log fields.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::InvalidParameter(_) => "invalid_parameter",
            Self::Timeout(_) => "timeout",
            Self::Connection(_) => "connection_error",
            Self::ServiceUnavailable(_) => "service_unavailable",
            Self::Internal(_) => "internal_error",
            Self::RateLimited { .. } => "rate_limit",
            Self::Api { code, .. } => {
                if (500..=599).contains(code) {
                    "service_unavailable"
                } else {
                    "api_error"
                }
            }
            Self::Cancelled => "cancelled",
            Self::DeadlineExceeded(_) => "deadline_exceeded",
            Self::Configuration(_) => "configuration",
            Self::UnsupportedTask(_) => "unsupported_task",
        }
    }

    /// Whether the retry executor may try again against the same provider.
    ///
    /// Rate limits are nominally retryable but receive special handling:
    /// the executor aborts remaining attempts and the orchestrator sets a
    /// lockout instead (see [`Self::is_rate_limit`]).
    pub fn is_retryable(&self) -> bool {
        match self {
            Self::Timeout(_)
            | Self::Connection(_)
            | Self::ServiceUnavailable(_)
            | Self::Internal(_)
            | Self::RateLimited { .. } => true,
            Self::Api { code, .. } => *code == 408 || *code == 429 || (500..=599).contains(code),
            _ => false,
        }
    }

    /// Whether this is an explicit rate-limit signal.
    pub fn is_rate_limit(&self) -> bool {
        matches!(self, Self::RateLimited { .. }) || matches!(self, Self::Api { code: 429, .. })
    }

    /// Provider-supplied Retry-After hint, if any.
    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }
}

/// Classify an opaque provider failure message into a typed error.
///
/// Provider adapters that only have a message string (or an HTTP status)
/// can use this to get an error whose kind drives retry/fallback decisions.
/// Matching is case-insensitive substring search over well-known markers.
pub fn classify_provider_error(provider: &str, status: Option<u16>, message: &str) -> RouteError {
    let lower = message.to_lowercase();

    if status == Some(429)
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("too many requests")
        || lower.contains("429")
    {
        return RouteError::rate_limited(format!("provider={provider} {message}"));
    }
    if lower.contains("timeout") || lower.contains("timed out") || status == Some(408) {
        return RouteError::Timeout(format!("provider={provider} {message}"));
    }
    if lower.contains("connection") || lower.contains("connect error") || lower.contains("dns") {
        return RouteError::Connection(format!("provider={provider} {message}"));
    }
    if lower.contains("service unavailable")
        || lower.contains("service_unavailable")
        || status == Some(503)
    {
        return RouteError::ServiceUnavailable(format!("provider={provider} {message}"));
    }
    if lower.contains("internal error") || lower.contains("internal_error") {
        return RouteError::Internal(format!("provider={provider} {message}"));
    }
    if let Some(code) = status {
        return RouteError::api(code, format!("provider={provider} {message}"));
    }
    RouteError::api(0, format!("provider={provider} {message}"))
}

/// Result type used throughout the crate.
pub type RouteResult<T> = std::result::Result<T, RouteError>;
