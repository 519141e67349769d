//! Channel CRUD handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use serde::Deserialize;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{ChannelCreateRequest, ChannelRecord, ChannelUpdateRequest};
use crate::utils::synthesize_tvg_id;
use crate::web::AppState;
use crate::web::responses::{created, no_content, ok};

#[derive(Debug, Default, Deserialize)]
pub struct ChannelFilterParams {
    pub group: Option<String>,
    pub active: Option<bool>,
    /// Case-insensitive substring match on the channel title
    pub search: Option<String>,
}

pub async fn list(
    State(state): State<AppState>,
    Query(params): Query<ChannelFilterParams>,
) -> Response {
    let channels = state
        .store
        .list_channels(
            params.group.as_deref(),
            params.active,
            params.search.as_deref(),
        )
        .await;
    ok(channels)
}

pub async fn create(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<ChannelCreateRequest>,
) -> AppResult<Response> {
    if request.title.trim().is_empty() {
        return Err(AppError::validation("title is required"));
    }
    if request.url.trim().is_empty() {
        return Err(AppError::validation("url is required"));
    }

    let now = Utc::now();
    let record = ChannelRecord {
        id: Uuid::new_v4(),
        tvg_id: request
            .tvg_id
            .filter(|id| !id.trim().is_empty())
            .unwrap_or_else(synthesize_tvg_id),
        title: request.title,
        url: request.url,
        m3u8_url: request.m3u8_url,
        license_type: request.license_type,
        license_key: request.license_key,
        cookie: request.cookie,
        useragent: request.useragent,
        referer: request.referer,
        origin: request.origin,
        logo: request.logo,
        group_title: request.group_title,
        is_active: request.is_active,
        source_playlist_id: None,
        source_stalker_id: None,
        stalker_original_id: None,
        created_at: now,
        updated_at: now,
    };
    let record = state.store.insert_channel(record).await?;
    Ok(created(record))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    Ok(ok(state.store.get_channel(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(request): axum::Json<ChannelUpdateRequest>,
) -> AppResult<Response> {
    let mut record = state.store.get_channel(id).await?;

    if let Some(title) = request.title {
        record.title = title;
    }
    if let Some(url) = request.url {
        record.url = url;
    }
    if let Some(m3u8_url) = request.m3u8_url {
        record.m3u8_url = Some(m3u8_url);
    }
    if let Some(license_type) = request.license_type {
        record.license_type = license_type;
    }
    if let Some(license_key) = request.license_key {
        record.license_key = license_key;
    }
    if let Some(cookie) = request.cookie {
        record.cookie = cookie;
    }
    if let Some(useragent) = request.useragent {
        record.useragent = useragent;
    }
    if let Some(referer) = request.referer {
        record.referer = referer;
    }
    if let Some(origin) = request.origin {
        record.origin = origin;
    }
    if let Some(logo) = request.logo {
        record.logo = logo;
    }
    if let Some(group_title) = request.group_title {
        record.group_title = group_title;
    }
    if let Some(is_active) = request.is_active {
        record.is_active = is_active;
    }
    record.updated_at = Utc::now();

    Ok(ok(state.store.update_channel(record).await?))
}

pub async fn delete(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    state.store.delete_channel(id).await?;
    Ok(no_content())
}

pub async fn groups(State(state): State<AppState>) -> Response {
    ok(state.store.distinct_groups().await)
}
