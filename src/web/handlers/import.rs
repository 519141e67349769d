//! Direct playlist import handler

use axum::extract::State;
use axum::response::Response;
use serde::Deserialize;

use crate::errors::AppResult;
use crate::web::AppState;
use crate::web::responses::ok;

#[derive(Debug, Deserialize)]
pub struct ImportRequest {
    /// Raw M3U playlist text
    #[serde(default)]
    pub content: String,
}

/// Import pasted M3U text as manual channel entries
pub async fn import_m3u(
    State(state): State<AppState>,
    axum::Json(request): axum::Json<ImportRequest>,
) -> AppResult<Response> {
    Ok(ok(state.sync.import_m3u(&request.content).await?))
}
