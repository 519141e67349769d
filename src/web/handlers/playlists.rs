//! Playlist source handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    PlaylistSource, PlaylistSourceCreateRequest, PlaylistSourceUpdateRequest, SourceDeleteMode,
    SyncStatus,
};
use crate::web::AppState;
use crate::web::responses::{created, ok};

/// Deletion requires the caller to choose what happens to owned channels
#[derive(Debug, Deserialize)]
pub struct DeleteParams {
    pub mode: Option<SourceDeleteMode>,
}

pub async fn list(State(state): State<AppState>) -> Response {
    ok(state.store.list_playlists().await)
}

pub async fn create(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<PlaylistSourceCreateRequest>,
) -> AppResult<Response> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if request.url.trim().is_empty() {
        return Err(AppError::validation("url is required"));
    }

    let now = Utc::now();
    let playlist = PlaylistSource {
        id: Uuid::new_v4(),
        name: request.name,
        url: request.url,
        is_active: request.is_active,
        auto_sync: request.auto_sync,
        sync_interval_secs: request
            .sync_interval_secs
            .unwrap_or(state.config.ingestion.default_sync_interval_secs),
        last_sync_at: None,
        last_sync_status: SyncStatus::Pending,
        last_sync_message: String::new(),
        channel_count: 0,
        created_at: now,
        updated_at: now,
    };
    Ok(created(state.store.insert_playlist(playlist).await?))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    Ok(ok(state.store.get_playlist(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(request): axum::Json<PlaylistSourceUpdateRequest>,
) -> AppResult<Response> {
    let mut playlist = state.store.get_playlist(id).await?;
    if let Some(name) = request.name {
        playlist.name = name;
    }
    if let Some(url) = request.url {
        playlist.url = url;
    }
    if let Some(is_active) = request.is_active {
        playlist.is_active = is_active;
    }
    if let Some(auto_sync) = request.auto_sync {
        playlist.auto_sync = auto_sync;
    }
    if let Some(interval) = request.sync_interval_secs {
        playlist.sync_interval_secs = interval;
    }
    playlist.updated_at = Utc::now();
    Ok(ok(state.store.update_playlist(playlist).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> AppResult<Response> {
    let mode = params.mode.ok_or_else(|| {
        AppError::validation("query parameter 'mode' is required: cascade or detach")
    })?;
    let affected = state.sync.delete_playlist(id, mode).await?;
    Ok(ok(json!({ "deleted": id, "channels_affected": affected })))
}

pub async fn sync(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let outcome = state.sync.sync_playlist(id).await?;
    Ok(ok(outcome))
}
