//! Generated playlist endpoint

use axum::extract::State;
use axum::http::header;
use axum::response::{IntoResponse, Response};

use crate::playlist::generate_playlist;
use crate::web::AppState;

/// Serve the stored channels as an M3U playlist download
pub async fn playlist_m3u(State(state): State<AppState>) -> Response {
    let channels = state.store.list_channels(None, Some(true), None).await;
    let body = generate_playlist(&channels);
    (
        [
            (header::CONTENT_TYPE, "audio/x-mpegurl"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"playlist.m3u\"",
            ),
        ],
        body,
    )
        .into_response()
}
