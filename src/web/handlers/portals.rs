//! Stalker portal handlers

use axum::extract::{Path, Query, State};
use axum::response::Response;
use chrono::Utc;
use serde_json::json;
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    StalkerPortal, StalkerPortalCreateRequest, StalkerPortalUpdateRequest, SyncStatus,
};
use crate::utils::is_valid_mac;
use crate::web::AppState;
use crate::web::handlers::playlists::DeleteParams;
use crate::web::responses::{created, ok};

pub async fn list(State(state): State<AppState>) -> Response {
    ok(state.store.list_portals().await)
}

pub async fn create(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<StalkerPortalCreateRequest>,
) -> AppResult<Response> {
    if request.name.trim().is_empty() {
        return Err(AppError::validation("name is required"));
    }
    if request.host.trim().is_empty() {
        return Err(AppError::validation("host is required"));
    }
    if !is_valid_mac(&request.mac_address) {
        return Err(AppError::validation(format!(
            "invalid MAC address '{}'",
            request.mac_address
        )));
    }

    let stalker = &state.config.stalker;
    let now = Utc::now();
    let portal = StalkerPortal {
        id: Uuid::new_v4(),
        name: request.name,
        host: request.host,
        mac_address: request.mac_address,
        username: request
            .username
            .unwrap_or_else(|| stalker.default_username.clone()),
        password: request
            .password
            .unwrap_or_else(|| stalker.default_password.clone()),
        token: None,
        token_expiry: None,
        is_active: request.is_active,
        total_channels: 0,
        last_sync_at: None,
        last_sync_status: SyncStatus::Pending,
        last_sync_message: String::new(),
        created_at: now,
        updated_at: now,
    };
    Ok(created(state.store.insert_portal(portal).await?))
}

pub async fn get_one(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    Ok(ok(state.store.get_portal(id).await?))
}

pub async fn update(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    axum::Json(request): axum::Json<StalkerPortalUpdateRequest>,
) -> AppResult<Response> {
    let mut portal = state.store.get_portal(id).await?;
    if let Some(name) = request.name {
        portal.name = name;
    }
    if let Some(host) = request.host {
        portal.host = host;
    }
    if let Some(mac) = request.mac_address {
        if !is_valid_mac(&mac) {
            return Err(AppError::validation(format!("invalid MAC address '{mac}'")));
        }
        portal.mac_address = mac;
    }
    if let Some(username) = request.username {
        portal.username = username;
    }
    if let Some(password) = request.password {
        portal.password = password;
    }
    if let Some(is_active) = request.is_active {
        portal.is_active = is_active;
    }
    portal.updated_at = Utc::now();
    Ok(ok(state.store.update_portal(portal).await?))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Query(params): Query<DeleteParams>,
) -> AppResult<Response> {
    let mode = params.mode.ok_or_else(|| {
        AppError::validation("query parameter 'mode' is required: cascade or detach")
    })?;
    let affected = state.sync.delete_portal(id, mode).await?;
    Ok(ok(json!({ "deleted": id, "channels_affected": affected })))
}

pub async fn sync(State(state): State<AppState>, Path(id): Path<Uuid>) -> AppResult<Response> {
    let outcome = state.sync.sync_portal(id).await?;
    Ok(ok(outcome))
}
