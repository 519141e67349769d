//! Web layer: axum router, shared state and HTTP handlers
//!
//! Handlers are thin wrappers around the store and the sync/token services,
//! focusing only on request/response mapping.

pub mod handlers;
pub mod responses;

use std::sync::Arc;

use axum::Router;
use axum::routing::{get, post};
use tower_http::cors::CorsLayer;

use crate::config::Config;
use crate::stalker::token::TokenManager;
use crate::store::JsonStore;
use crate::sync::SyncService;

/// Shared application state handed to every handler
#[derive(Clone)]
pub struct AppState {
    pub store: JsonStore,
    pub sync: Arc<SyncService>,
    pub tokens: Arc<TokenManager>,
    pub config: Arc<Config>,
    /// Connect-timeout-only client for live stream relaying
    pub stream_client: reqwest::Client,
}

impl AppState {
    pub fn new(
        store: JsonStore,
        sync: Arc<SyncService>,
        tokens: Arc<TokenManager>,
        config: Arc<Config>,
    ) -> Self {
        // Live streams must stay open indefinitely, so only the connection
        // attempt is bounded.
        let stream_client = reqwest::Client::builder()
            .connect_timeout(std::time::Duration::from_secs(15))
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self {
            store,
            sync,
            tokens,
            config,
            stream_client,
        }
    }
}

/// Build the application router
pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(handlers::health::health))
        .route(
            "/api/channels",
            get(handlers::channels::list).post(handlers::channels::create),
        )
        .route(
            "/api/channels/{id}",
            get(handlers::channels::get_one)
                .put(handlers::channels::update)
                .delete(handlers::channels::delete),
        )
        .route("/api/groups", get(handlers::channels::groups))
        .route("/api/import", post(handlers::import::import_m3u))
        .route(
            "/api/playlists",
            get(handlers::playlists::list).post(handlers::playlists::create),
        )
        .route(
            "/api/playlists/{id}",
            get(handlers::playlists::get_one)
                .put(handlers::playlists::update)
                .delete(handlers::playlists::delete),
        )
        .route("/api/playlists/{id}/sync", post(handlers::playlists::sync))
        .route(
            "/api/portals",
            get(handlers::portals::list).post(handlers::portals::create),
        )
        .route(
            "/api/portals/{id}",
            get(handlers::portals::get_one)
                .put(handlers::portals::update)
                .delete(handlers::portals::delete),
        )
        .route("/api/portals/{id}/sync", post(handlers::portals::sync))
        .route("/playlist.m3u", get(handlers::output::playlist_m3u))
        .route("/stream/{channel_id}", get(handlers::stream::relay))
        .layer(CorsLayer::permissive())
        .with_state(state)
}
