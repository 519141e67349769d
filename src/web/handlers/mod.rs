//! HTTP handler modules

pub mod channels;
pub mod health;
pub mod import;
pub mod output;
pub mod playlists;
pub mod portals;
pub mod stream;
