//! Stalker Portal integration
//!
//! `client` speaks the middleware `load.php` protocol (handshake, auth,
//! category and channel listing); `token` owns the per-portal bearer token
//! cache with single-flight refresh.

pub mod client;
pub mod token;

pub use client::{HttpStalkerClient, StalkerApi, StalkerCategory, StalkerChannel};
pub use token::TokenManager;
