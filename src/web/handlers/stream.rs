//! Live stream relay for portal-sourced channels
//!
//! Obtains a current token, rewrites the channel URL with it, and pipes the
//! upstream body through as it arrives. On an auth-shaped upstream rejection
//! the token is force-refreshed exactly once and the whole operation
//! retried; a second failure is terminal. When the client disconnects, axum
//! drops the body stream, which drops the upstream reqwest response and
//! closes the connection.

use axum::body::Body;
use axum::extract::{Path, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::utils::inject_token;
use crate::web::AppState;

pub async fn relay(
    State(state): State<AppState>,
    Path(channel_id): Path<Uuid>,
) -> AppResult<Response> {
    let channel = state.store.get_channel(channel_id).await?;
    let portal_id = channel.source_stalker_id.ok_or_else(|| {
        AppError::validation(format!(
            "channel '{}' is not portal-sourced and needs no relay",
            channel.title
        ))
    })?;

    info!("Relaying stream for channel '{}'", channel.title);

    // bounded retry: one forced refresh after an auth-shaped rejection
    let mut force_refresh = false;
    for attempt in 0..2 {
        let token = state.tokens.get_token(portal_id, force_refresh).await?;
        let url = inject_token(&channel.url, &token)?;

        let upstream = match state.stream_client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                error!("Upstream connect failed for '{}': {e}", channel.title);
                return Err(AppError::Http(e));
            }
        };

        let status = upstream.status();
        if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
            if attempt == 0 {
                warn!(
                    "Upstream rejected token for '{}' ({status}), refreshing once",
                    channel.title
                );
                force_refresh = true;
                continue;
            }
            error!("Upstream still rejecting after refresh for '{}'", channel.title);
            return Err(AppError::Source(crate::errors::SourceError::UpstreamStatus {
                status: status.as_u16(),
                url,
            }));
        }
        if !status.is_success() {
            return Err(AppError::Source(crate::errors::SourceError::UpstreamStatus {
                status: status.as_u16(),
                url,
            }));
        }

        let content_type = upstream
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("video/mp2t")
            .to_string();
        debug!("Upstream accepted for '{}' (ct={content_type})", channel.title);

        let body = Body::from_stream(upstream.bytes_stream());
        let response = Response::builder()
            .status(StatusCode::OK)
            .header(header::CONTENT_TYPE, content_type)
            .header(header::CACHE_CONTROL, "no-cache, no-store, must-revalidate")
            .header(header::PRAGMA, "no-cache")
            .body(body)
            .map_err(|e| AppError::internal(format!("failed to build relay response: {e}")))?;
        return Ok(response);
    }
    unreachable!("bounded retry loop always returns")
}
