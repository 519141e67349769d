//! Error type definitions for the IPTV hub

use thiserror::Error;

/// Top-level application error type
///
/// This enum represents all possible errors that can occur in the
/// application. It uses `thiserror` to provide automatic error trait
/// implementations and proper error chaining.
#[derive(Error, Debug)]
pub enum AppError {
    /// Validation errors (missing required field, duplicate unique key)
    #[error("Validation error: {message}")]
    Validation { message: String },

    /// Resource not found errors
    #[error("Not found: {resource} with id {id}")]
    NotFound { resource: String, id: String },

    /// Source handling errors (upstream fetch, auth, parse)
    #[error("Source error: {0}")]
    Source(#[from] SourceError),

    /// Document store errors (file unreadable, serialization failure)
    #[error("Store error: {message}")]
    Store { message: String },

    /// Configuration errors
    #[error("Configuration error: {message}")]
    Configuration { message: String },

    /// Generic internal errors
    #[error("Internal error: {message}")]
    Internal { message: String },

    /// HTTP client errors
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),
}

/// Source handling specific errors
#[derive(Error, Debug)]
pub enum SourceError {
    /// Network connection timeouts
    #[error("Connection timeout: {url}")]
    Timeout { url: String },

    /// Authentication failures against a Stalker portal
    #[error("Authentication failed: {portal} - {message}")]
    AuthenticationFailed { portal: String, message: String },

    /// Upstream returned a non-success HTTP status
    #[error("Upstream error: {status} for {url}")]
    UpstreamStatus { status: u16, url: String },

    /// Parsing errors for source data
    #[error("Parse error: {message}")]
    Parse { message: String },
}

impl AppError {
    /// Create a validation error with a custom message
    pub fn validation<S: Into<String>>(message: S) -> Self {
        Self::Validation {
            message: message.into(),
        }
    }

    /// Create a not-found error for a resource/id pair
    pub fn not_found<R: Into<String>, I: ToString>(resource: R, id: I) -> Self {
        Self::NotFound {
            resource: resource.into(),
            id: id.to_string(),
        }
    }

    /// Create a store error
    pub fn store<S: Into<String>>(message: S) -> Self {
        Self::Store {
            message: message.into(),
        }
    }

    /// Create a configuration error
    pub fn configuration<S: Into<String>>(message: S) -> Self {
        Self::Configuration {
            message: message.into(),
        }
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(message: S) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Whether this error looks like a rejected/expired portal token.
    ///
    /// Callers use this to decide on the single forced-refresh retry; the
    /// token manager itself never retries.
    pub fn is_auth_rejection(&self) -> bool {
        match self {
            Self::Source(SourceError::AuthenticationFailed { .. }) => true,
            Self::Source(SourceError::UpstreamStatus { status, .. }) => {
                *status == 401 || *status == 403
            }
            _ => false,
        }
    }
}

impl SourceError {
    /// Create an authentication failed error
    pub fn auth_failed<P: Into<String>, M: Into<String>>(portal: P, message: M) -> Self {
        Self::AuthenticationFailed {
            portal: portal.into(),
            message: message.into(),
        }
    }

    /// Create a parse error
    pub fn parse<M: Into<String>>(message: M) -> Self {
        Self::Parse {
            message: message.into(),
        }
    }
}
