//! Stalker middleware HTTP client
//!
//! All portal traffic goes through the `load.php` endpoint with `type=stb`
//! and an action parameter. Identity is carried by the `MAC` header (and a
//! matching `mac=` cookie, which real middleware insists on); authenticated
//! calls add a bearer token. The [`StalkerApi`] trait is the seam the token
//! manager and sync orchestrator depend on, so tests can substitute a
//! scripted portal.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::errors::{AppError, AppResult, SourceError};
use crate::models::StalkerPortal;

/// One channel category as reported by `get_categories`
#[derive(Debug, Clone, Deserialize)]
pub struct StalkerCategory {
    pub id: String,
    pub title: String,
}

/// One channel entry from `get_ordered_list`
#[derive(Debug, Clone)]
pub struct StalkerChannel {
    /// Upstream channel id, kept as provenance for re-sync matching
    pub id: String,
    pub name: String,
    pub logo: String,
    /// Raw playback command, e.g. `ffmpeg http://portal/ch/123_`
    pub cmd: String,
}

/// Portal protocol operations
#[async_trait]
pub trait StalkerApi: Send + Sync {
    /// Anonymous handshake; returns the bootstrap token
    async fn handshake(&self, portal: &StalkerPortal) -> AppResult<String>;
    /// Exchange the bootstrap token plus credentials for the real bearer token
    async fn authenticate(
        &self,
        portal: &StalkerPortal,
        handshake_token: &str,
    ) -> AppResult<String>;
    async fn get_categories(
        &self,
        portal: &StalkerPortal,
        token: &str,
    ) -> AppResult<Vec<StalkerCategory>>;
    async fn get_channels(
        &self,
        portal: &StalkerPortal,
        token: &str,
        category_id: &str,
    ) -> AppResult<Vec<StalkerChannel>>;
}

/// JSON envelope every portal response uses: `{"js": ...}`
#[derive(Debug, Deserialize)]
struct JsEnvelope<T> {
    js: T,
}

#[derive(Debug, Deserialize)]
struct TokenPayload {
    token: String,
}

#[derive(Debug, Deserialize)]
struct OrderedListPayload {
    #[serde(default)]
    data: Vec<Value>,
    #[serde(default)]
    total_items: Option<u64>,
    #[serde(default)]
    max_page_items: Option<u64>,
}

/// reqwest-backed portal client
pub struct HttpStalkerClient {
    client: Client,
    user_agent: String,
}

impl HttpStalkerClient {
    pub fn new(user_agent: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| Client::new());
        Self {
            client,
            user_agent: user_agent.into(),
        }
    }

    /// Normalize the stored host into a base URL with a scheme
    fn base_url(portal: &StalkerPortal) -> String {
        let host = portal.host.trim_end_matches('/');
        if host.starts_with("http://") || host.starts_with("https://") {
            host.to_string()
        } else {
            format!("http://{host}")
        }
    }

    fn load_url(portal: &StalkerPortal, query: &str) -> String {
        format!(
            "{}/server/load.php?type=stb&{}&JsHttpRequest=1-xml",
            Self::base_url(portal),
            query
        )
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        portal: &StalkerPortal,
        url: &str,
        token: Option<&str>,
    ) -> AppResult<T> {
        let mut request = self
            .client
            .get(url)
            .header("User-Agent", &self.user_agent)
            .header("MAC", &portal.mac_address)
            .header(
                "Cookie",
                format!("mac={}; stb_lang=en", urlencoding::encode(&portal.mac_address)),
            );
        if let Some(token) = token {
            request = request.header("Authorization", format!("Bearer {token}"));
        }

        let response = request.send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Source(SourceError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }));
        }

        let envelope: JsEnvelope<T> = response.json().await.map_err(|e| {
            AppError::Source(SourceError::parse(format!(
                "portal response from {url} was not the expected JSON shape: {e}"
            )))
        })?;
        Ok(envelope.js)
    }
}

#[async_trait]
impl StalkerApi for HttpStalkerClient {
    async fn handshake(&self, portal: &StalkerPortal) -> AppResult<String> {
        debug!("Handshaking with portal {}", portal.name);
        let url = Self::load_url(portal, "action=handshake&token=");
        let payload: TokenPayload = self.get_json(portal, &url, None).await.map_err(|e| {
            AppError::Source(SourceError::auth_failed(
                &portal.name,
                format!("handshake failed: {e}"),
            ))
        })?;
        Ok(payload.token)
    }

    async fn authenticate(
        &self,
        portal: &StalkerPortal,
        handshake_token: &str,
    ) -> AppResult<String> {
        debug!("Authenticating against portal {}", portal.name);
        let query = format!(
            "action=do_auth&login={}&password={}",
            urlencoding::encode(&portal.username),
            urlencoding::encode(&portal.password)
        );
        let url = Self::load_url(portal, &query);
        let payload: TokenPayload = self
            .get_json(portal, &url, Some(handshake_token))
            .await
            .map_err(|e| {
                AppError::Source(SourceError::auth_failed(
                    &portal.name,
                    format!("do_auth rejected: {e}"),
                ))
            })?;
        Ok(payload.token)
    }

    async fn get_categories(
        &self,
        portal: &StalkerPortal,
        token: &str,
    ) -> AppResult<Vec<StalkerCategory>> {
        let url = Self::load_url(portal, "action=get_categories");
        let categories: Vec<StalkerCategory> = self.get_json(portal, &url, Some(token)).await?;
        Ok(categories)
    }

    async fn get_channels(
        &self,
        portal: &StalkerPortal,
        token: &str,
        category_id: &str,
    ) -> AppResult<Vec<StalkerChannel>> {
        let mut channels = Vec::new();
        let mut page = 1u64;
        loop {
            let query = format!(
                "action=get_ordered_list&category={}&p={}",
                urlencoding::encode(category_id),
                page
            );
            let url = Self::load_url(portal, &query);
            let payload: OrderedListPayload = self.get_json(portal, &url, Some(token)).await?;

            let batch_len = payload.data.len();
            channels.extend(payload.data.iter().filter_map(channel_from_value));

            // middleware pages the list; stop once the reported total is in
            let total = payload.total_items.unwrap_or(batch_len as u64);
            let page_size = payload.max_page_items.unwrap_or(batch_len.max(1) as u64);
            if batch_len == 0 || page * page_size >= total {
                break;
            }
            page += 1;
        }
        Ok(channels)
    }
}

/// Map one raw channel object into a [`StalkerChannel`].
///
/// Portals are loose with types (numeric or string ids), so fields are read
/// through `Value` instead of a strict struct.
fn channel_from_value(value: &Value) -> Option<StalkerChannel> {
    let field = |key: &str| -> Option<String> {
        match value.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            _ => None,
        }
    };

    let id = field("id")?;
    let name = field("name").unwrap_or_else(|| format!("Channel {id}"));
    Some(StalkerChannel {
        id,
        name,
        logo: field("logo").unwrap_or_default(),
        cmd: field("cmd").unwrap_or_default(),
    })
}

/// Strip the player wrapper (`ffmpeg `, `ffrt `) off a portal `cmd` field,
/// leaving the raw stream URL.
pub fn cmd_to_url(cmd: &str) -> &str {
    let trimmed = cmd.trim();
    match trimmed.split_once(' ') {
        Some((prefix, rest)) if !prefix.contains("://") => rest.trim(),
        _ => trimmed,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cmd_to_url_strips_player_prefix() {
        assert_eq!(
            cmd_to_url("ffmpeg http://portal/ch/123_"),
            "http://portal/ch/123_"
        );
        assert_eq!(cmd_to_url("http://portal/ch/9"), "http://portal/ch/9");
    }

    #[test]
    fn channel_from_value_accepts_numeric_ids() {
        let raw = serde_json::json!({"id": 42, "name": "News HD", "cmd": "ffrt http://p/ch/42"});
        let channel = channel_from_value(&raw).unwrap();
        assert_eq!(channel.id, "42");
        assert_eq!(channel.name, "News HD");
        assert_eq!(cmd_to_url(&channel.cmd), "http://p/ch/42");
    }

    #[test]
    fn channel_without_id_is_dropped() {
        let raw = serde_json::json!({"name": "broken"});
        assert!(channel_from_value(&raw).is_none());
    }
}
