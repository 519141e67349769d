//! Error handling for the IPTV hub
//!
//! Provides a hierarchical error system built on `thiserror`. The top-level
//! [`AppError`] is what services return; the web layer maps it onto HTTP
//! status codes in `web::responses`.

pub mod types;

pub use types::{AppError, SourceError};

/// Convenience result alias used throughout the application
pub type AppResult<T> = Result<T, AppError>;
