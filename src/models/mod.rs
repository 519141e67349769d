//! Domain models for the IPTV hub
//!
//! Channel records, ingestion sources (M3U playlists and Stalker portals),
//! the intermediate parse draft, and the request/response DTOs used by the
//! web layer.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Outcome status of the most recent sync for a source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStatus {
    Pending,
    Success,
    Error,
}

impl std::fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SyncStatus::Pending => write!(f, "pending"),
            SyncStatus::Success => write!(f, "success"),
            SyncStatus::Error => write!(f, "error"),
        }
    }
}

/// What to do with a source's channels when the source itself is deleted
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceDeleteMode {
    /// Delete every channel whose provenance points at the source
    Cascade,
    /// Null out the provenance, leaving the channels as manual entries
    Detach,
}

/// A stored IPTV channel
///
/// `tvg_id` is unique across the collection. Provenance is mutually
/// exclusive: at most one of `source_playlist_id` / `source_stalker_id` is
/// set, and `stalker_original_id` carries the upstream portal channel id for
/// portal-sourced records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChannelRecord {
    pub id: Uuid,
    pub tvg_id: String,
    pub title: String,
    /// Primary stream target
    pub url: String,
    /// Optional fallback stream
    #[serde(default)]
    pub m3u8_url: Option<String>,
    /// DRM scheme: "clearkey", "widevine", "playready" or empty
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub useragent: String,
    #[serde(default)]
    pub referer: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub group_title: String,
    pub is_active: bool,
    #[serde(default)]
    pub source_playlist_id: Option<Uuid>,
    #[serde(default)]
    pub source_stalker_id: Option<Uuid>,
    #[serde(default)]
    pub stalker_original_id: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A remote M3U playlist that channels are periodically re-imported from
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PlaylistSource {
    pub id: Uuid,
    pub name: String,
    /// Unique across playlist sources
    pub url: String,
    pub is_active: bool,
    pub auto_sync: bool,
    /// Minimum seconds between scheduled syncs
    pub sync_interval_secs: u64,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    #[serde(default)]
    pub last_sync_message: String,
    #[serde(default)]
    pub channel_count: usize,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A Stalker middleware portal acting as a channel source
///
/// The `(host, mac_address)` pair is unique. `token`/`token_expiry` mirror
/// the in-memory token cache so a restart can reuse an unexpired token.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StalkerPortal {
    pub id: Uuid,
    pub name: String,
    pub host: String,
    pub mac_address: String,
    #[serde(default)]
    pub username: String,
    #[serde(default)]
    pub password: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub token_expiry: Option<DateTime<Utc>>,
    pub is_active: bool,
    #[serde(default)]
    pub total_channels: usize,
    pub last_sync_at: Option<DateTime<Utc>>,
    pub last_sync_status: SyncStatus,
    #[serde(default)]
    pub last_sync_message: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Partial channel produced by the M3U parser or portal ingestion,
/// before reconciliation against the store
#[derive(Debug, Clone, Default)]
pub struct ChannelDraft {
    pub tvg_id: Option<String>,
    pub title: String,
    pub url: String,
    pub m3u8_url: Option<String>,
    pub license_type: Option<String>,
    pub license_key: Option<String>,
    pub cookie: Option<String>,
    pub useragent: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub logo: Option<String>,
    pub group_title: Option<String>,
    pub stalker_original_id: Option<String>,
}

/// Counted result of one sync run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncOutcome {
    pub added: usize,
    pub updated: usize,
    /// Reconciliation routes a draft matching an existing record to the
    /// update path, so this stays zero; the counter is kept so the reported
    /// shape stays stable for clients.
    pub skipped: usize,
    pub errors: usize,
    pub total: usize,
}

impl SyncOutcome {
    /// Render the summary line stored on the source record
    pub fn summary(&self) -> String {
        format!(
            "added {}, updated {}, skipped {}, errors {} (total {})",
            self.added, self.updated, self.skipped, self.errors, self.total
        )
    }
}

fn default_true() -> bool {
    true
}

/// Request DTO for creating a channel manually
#[derive(Debug, Clone, Deserialize)]
pub struct ChannelCreateRequest {
    pub tvg_id: Option<String>,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub m3u8_url: Option<String>,
    #[serde(default)]
    pub license_type: String,
    #[serde(default)]
    pub license_key: String,
    #[serde(default)]
    pub cookie: String,
    #[serde(default)]
    pub useragent: String,
    #[serde(default)]
    pub referer: String,
    #[serde(default)]
    pub origin: String,
    #[serde(default)]
    pub logo: String,
    #[serde(default)]
    pub group_title: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request DTO for updating a channel; absent fields are left untouched
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChannelUpdateRequest {
    pub title: Option<String>,
    pub url: Option<String>,
    pub m3u8_url: Option<String>,
    pub license_type: Option<String>,
    pub license_key: Option<String>,
    pub cookie: Option<String>,
    pub useragent: Option<String>,
    pub referer: Option<String>,
    pub origin: Option<String>,
    pub logo: Option<String>,
    pub group_title: Option<String>,
    pub is_active: Option<bool>,
}

/// Request DTO for creating a playlist source
#[derive(Debug, Clone, Deserialize)]
pub struct PlaylistSourceCreateRequest {
    pub name: String,
    pub url: String,
    #[serde(default = "default_true")]
    pub is_active: bool,
    #[serde(default = "default_true")]
    pub auto_sync: bool,
    pub sync_interval_secs: Option<u64>,
}

/// Request DTO for updating a playlist source
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PlaylistSourceUpdateRequest {
    pub name: Option<String>,
    pub url: Option<String>,
    pub is_active: Option<bool>,
    pub auto_sync: Option<bool>,
    pub sync_interval_secs: Option<u64>,
}

/// Request DTO for creating a Stalker portal
#[derive(Debug, Clone, Deserialize)]
pub struct StalkerPortalCreateRequest {
    pub name: String,
    pub host: String,
    pub mac_address: String,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default = "default_true")]
    pub is_active: bool,
}

/// Request DTO for updating a Stalker portal
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StalkerPortalUpdateRequest {
    pub name: Option<String>,
    pub host: Option<String>,
    pub mac_address: Option<String>,
    pub username: Option<String>,
    pub password: Option<String>,
    pub is_active: Option<bool>,
}
