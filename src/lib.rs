//! IPTV hub library
//!
//! Channel metadata management with M3U playlist generation and periodic
//! re-import from remote playlists and Stalker middleware portals.

pub mod config;
pub mod errors;
pub mod models;
pub mod playlist;
pub mod scheduler;
pub mod stalker;
pub mod store;
pub mod sync;
pub mod utils;
pub mod web;
