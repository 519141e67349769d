//! JSON document store
//!
//! Single-file document store backing every collection. All reads and writes
//! go through an in-memory map guarded by a `tokio::sync::RwLock`; every
//! mutation is flushed to disk before it returns, so each record write is
//! its own atomic unit and a crash never loses acknowledged data beyond the
//! in-flight record. Tests construct the store without a backing file.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};
use uuid::Uuid;

use crate::errors::{AppError, AppResult};
use crate::models::{
    ChannelRecord, PlaylistSource, SourceDeleteMode, StalkerPortal, SyncStatus,
};

#[derive(Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    channels: HashMap<Uuid, ChannelRecord>,
    #[serde(default)]
    playlists: HashMap<Uuid, PlaylistSource>,
    #[serde(default)]
    portals: HashMap<Uuid, StalkerPortal>,
}

/// Handle to the shared document store; cheap to clone
#[derive(Clone, Debug)]
pub struct JsonStore {
    inner: Arc<RwLock<StoreData>>,
    path: Option<PathBuf>,
}

impl JsonStore {
    /// Open the store file, creating an empty collection set when the file
    /// does not exist yet.
    pub async fn open(path: PathBuf) -> AppResult<Self> {
        let data = if path.exists() {
            let raw = tokio::fs::read_to_string(&path)
                .await
                .map_err(|e| AppError::store(format!("cannot read {}: {e}", path.display())))?;
            serde_json::from_str(&raw)
                .map_err(|e| AppError::store(format!("corrupt store {}: {e}", path.display())))?
        } else {
            StoreData::default()
        };
        info!(
            "Store opened from {} ({} channels, {} playlists, {} portals)",
            path.display(),
            data.channels.len(),
            data.playlists.len(),
            data.portals.len()
        );
        Ok(Self {
            inner: Arc::new(RwLock::new(data)),
            path: Some(path),
        })
    }

    /// Purely in-memory store, used by tests
    pub fn in_memory() -> Self {
        Self {
            inner: Arc::new(RwLock::new(StoreData::default())),
            path: None,
        }
    }

    async fn flush(&self, data: &StoreData) -> AppResult<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let raw = serde_json::to_string_pretty(data)
            .map_err(|e| AppError::store(format!("serialize failed: {e}")))?;
        tokio::fs::write(path, raw)
            .await
            .map_err(|e| AppError::store(format!("cannot write {}: {e}", path.display())))
    }

    // ----- channels -----

    /// List channels, optionally narrowed by exact group, active flag and a
    /// case-insensitive title substring.
    pub async fn list_channels(
        &self,
        group: Option<&str>,
        active: Option<bool>,
        search: Option<&str>,
    ) -> Vec<ChannelRecord> {
        let needle = search.map(str::to_lowercase);
        let data = self.inner.read().await;
        let mut channels: Vec<ChannelRecord> = data
            .channels
            .values()
            .filter(|c| group.is_none_or(|g| c.group_title == g))
            .filter(|c| active.is_none_or(|a| c.is_active == a))
            .filter(|c| {
                needle
                    .as_deref()
                    .is_none_or(|s| c.title.to_lowercase().contains(s))
            })
            .cloned()
            .collect();
        channels.sort_by(|a, b| a.title.cmp(&b.title));
        channels
    }

    pub async fn get_channel(&self, id: Uuid) -> AppResult<ChannelRecord> {
        let data = self.inner.read().await;
        data.channels
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("channel", id))
    }

    pub async fn find_channel_by_tvg_id(&self, tvg_id: &str) -> Option<ChannelRecord> {
        let data = self.inner.read().await;
        data.channels
            .values()
            .find(|c| c.tvg_id == tvg_id)
            .cloned()
    }

    /// Lookup used by portal ingestion: upstream channel id within one portal
    pub async fn find_channel_by_stalker(
        &self,
        portal_id: Uuid,
        original_id: &str,
    ) -> Option<ChannelRecord> {
        let data = self.inner.read().await;
        data.channels
            .values()
            .find(|c| {
                c.source_stalker_id == Some(portal_id)
                    && c.stalker_original_id.as_deref() == Some(original_id)
            })
            .cloned()
    }

    pub async fn insert_channel(&self, channel: ChannelRecord) -> AppResult<ChannelRecord> {
        let mut data = self.inner.write().await;
        if data.channels.values().any(|c| c.tvg_id == channel.tvg_id) {
            return Err(AppError::validation(format!(
                "duplicate tvg_id '{}'",
                channel.tvg_id
            )));
        }
        data.channels.insert(channel.id, channel.clone());
        self.flush(&data).await?;
        Ok(channel)
    }

    /// Full-record replacement keyed by id; rejects a tvg_id collision with
    /// any other record.
    pub async fn update_channel(&self, channel: ChannelRecord) -> AppResult<ChannelRecord> {
        let mut data = self.inner.write().await;
        if !data.channels.contains_key(&channel.id) {
            return Err(AppError::not_found("channel", channel.id));
        }
        if data
            .channels
            .values()
            .any(|c| c.id != channel.id && c.tvg_id == channel.tvg_id)
        {
            return Err(AppError::validation(format!(
                "duplicate tvg_id '{}'",
                channel.tvg_id
            )));
        }
        data.channels.insert(channel.id, channel.clone());
        self.flush(&data).await?;
        Ok(channel)
    }

    pub async fn delete_channel(&self, id: Uuid) -> AppResult<()> {
        let mut data = self.inner.write().await;
        if data.channels.remove(&id).is_none() {
            return Err(AppError::not_found("channel", id));
        }
        self.flush(&data).await?;
        Ok(())
    }

    /// Distinct non-empty group titles, sorted
    pub async fn distinct_groups(&self) -> Vec<String> {
        let data = self.inner.read().await;
        let mut groups: Vec<String> = data
            .channels
            .values()
            .map(|c| c.group_title.clone())
            .filter(|g| !g.is_empty())
            .collect();
        groups.sort();
        groups.dedup();
        groups
    }

    pub async fn count_channels_for_playlist(&self, playlist_id: Uuid) -> usize {
        let data = self.inner.read().await;
        data.channels
            .values()
            .filter(|c| c.source_playlist_id == Some(playlist_id))
            .count()
    }

    pub async fn count_channels_for_portal(&self, portal_id: Uuid) -> usize {
        let data = self.inner.read().await;
        data.channels
            .values()
            .filter(|c| c.source_stalker_id == Some(portal_id))
            .count()
    }

    /// Apply the caller-chosen deletion policy to every channel owned by a
    /// playlist source. Returns the number of affected channels.
    pub async fn apply_playlist_delete_mode(
        &self,
        playlist_id: Uuid,
        mode: SourceDeleteMode,
    ) -> AppResult<usize> {
        let mut data = self.inner.write().await;
        let affected: Vec<Uuid> = data
            .channels
            .values()
            .filter(|c| c.source_playlist_id == Some(playlist_id))
            .map(|c| c.id)
            .collect();
        for id in &affected {
            match mode {
                SourceDeleteMode::Cascade => {
                    data.channels.remove(id);
                }
                SourceDeleteMode::Detach => {
                    if let Some(c) = data.channels.get_mut(id) {
                        c.source_playlist_id = None;
                        c.updated_at = Utc::now();
                    }
                }
            }
        }
        self.flush(&data).await?;
        debug!(
            "Applied {:?} to {} channels of playlist {}",
            mode,
            affected.len(),
            playlist_id
        );
        Ok(affected.len())
    }

    /// Same policy application for a portal's channels
    pub async fn apply_portal_delete_mode(
        &self,
        portal_id: Uuid,
        mode: SourceDeleteMode,
    ) -> AppResult<usize> {
        let mut data = self.inner.write().await;
        let affected: Vec<Uuid> = data
            .channels
            .values()
            .filter(|c| c.source_stalker_id == Some(portal_id))
            .map(|c| c.id)
            .collect();
        for id in &affected {
            match mode {
                SourceDeleteMode::Cascade => {
                    data.channels.remove(id);
                }
                SourceDeleteMode::Detach => {
                    if let Some(c) = data.channels.get_mut(id) {
                        c.source_stalker_id = None;
                        c.stalker_original_id = None;
                        c.updated_at = Utc::now();
                    }
                }
            }
        }
        self.flush(&data).await?;
        Ok(affected.len())
    }

    // ----- playlist sources -----

    pub async fn list_playlists(&self) -> Vec<PlaylistSource> {
        let data = self.inner.read().await;
        let mut playlists: Vec<PlaylistSource> = data.playlists.values().cloned().collect();
        playlists.sort_by(|a, b| a.name.cmp(&b.name));
        playlists
    }

    pub async fn get_playlist(&self, id: Uuid) -> AppResult<PlaylistSource> {
        let data = self.inner.read().await;
        data.playlists
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("playlist", id))
    }

    pub async fn insert_playlist(&self, playlist: PlaylistSource) -> AppResult<PlaylistSource> {
        let mut data = self.inner.write().await;
        if data.playlists.values().any(|p| p.url == playlist.url) {
            return Err(AppError::validation(format!(
                "playlist with url '{}' already exists",
                playlist.url
            )));
        }
        data.playlists.insert(playlist.id, playlist.clone());
        self.flush(&data).await?;
        Ok(playlist)
    }

    pub async fn update_playlist(&self, playlist: PlaylistSource) -> AppResult<PlaylistSource> {
        let mut data = self.inner.write().await;
        if !data.playlists.contains_key(&playlist.id) {
            return Err(AppError::not_found("playlist", playlist.id));
        }
        if data
            .playlists
            .values()
            .any(|p| p.id != playlist.id && p.url == playlist.url)
        {
            return Err(AppError::validation(format!(
                "playlist with url '{}' already exists",
                playlist.url
            )));
        }
        data.playlists.insert(playlist.id, playlist.clone());
        self.flush(&data).await?;
        Ok(playlist)
    }

    pub async fn delete_playlist(&self, id: Uuid) -> AppResult<()> {
        let mut data = self.inner.write().await;
        if data.playlists.remove(&id).is_none() {
            return Err(AppError::not_found("playlist", id));
        }
        self.flush(&data).await?;
        Ok(())
    }

    /// Stamp the sync result onto the source record. Written even when the
    /// sync failed outright, so operators can see the error message.
    pub async fn record_playlist_sync(
        &self,
        id: Uuid,
        status: SyncStatus,
        message: &str,
        channel_count: Option<usize>,
    ) -> AppResult<()> {
        let mut data = self.inner.write().await;
        let playlist = data
            .playlists
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("playlist", id))?;
        playlist.last_sync_at = Some(Utc::now());
        playlist.last_sync_status = status;
        playlist.last_sync_message = message.to_string();
        if let Some(count) = channel_count {
            playlist.channel_count = count;
        }
        playlist.updated_at = Utc::now();
        self.flush(&data).await
    }

    // ----- stalker portals -----

    pub async fn list_portals(&self) -> Vec<StalkerPortal> {
        let data = self.inner.read().await;
        let mut portals: Vec<StalkerPortal> = data.portals.values().cloned().collect();
        portals.sort_by(|a, b| a.name.cmp(&b.name));
        portals
    }

    pub async fn get_portal(&self, id: Uuid) -> AppResult<StalkerPortal> {
        let data = self.inner.read().await;
        data.portals
            .get(&id)
            .cloned()
            .ok_or_else(|| AppError::not_found("portal", id))
    }

    pub async fn insert_portal(&self, portal: StalkerPortal) -> AppResult<StalkerPortal> {
        let mut data = self.inner.write().await;
        if data
            .portals
            .values()
            .any(|p| p.host == portal.host && p.mac_address == portal.mac_address)
        {
            return Err(AppError::validation(format!(
                "portal {} with MAC {} already exists",
                portal.host, portal.mac_address
            )));
        }
        data.portals.insert(portal.id, portal.clone());
        self.flush(&data).await?;
        Ok(portal)
    }

    pub async fn update_portal(&self, portal: StalkerPortal) -> AppResult<StalkerPortal> {
        let mut data = self.inner.write().await;
        if !data.portals.contains_key(&portal.id) {
            return Err(AppError::not_found("portal", portal.id));
        }
        if data.portals.values().any(|p| {
            p.id != portal.id && p.host == portal.host && p.mac_address == portal.mac_address
        }) {
            return Err(AppError::validation(format!(
                "portal {} with MAC {} already exists",
                portal.host, portal.mac_address
            )));
        }
        data.portals.insert(portal.id, portal.clone());
        self.flush(&data).await?;
        Ok(portal)
    }

    pub async fn delete_portal(&self, id: Uuid) -> AppResult<()> {
        let mut data = self.inner.write().await;
        if data.portals.remove(&id).is_none() {
            return Err(AppError::not_found("portal", id));
        }
        self.flush(&data).await?;
        Ok(())
    }

    /// Persist a freshly minted token so a restart can reuse it
    pub async fn set_portal_token(
        &self,
        id: Uuid,
        token: &str,
        expiry: DateTime<Utc>,
    ) -> AppResult<()> {
        let mut data = self.inner.write().await;
        let portal = data
            .portals
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("portal", id))?;
        portal.token = Some(token.to_string());
        portal.token_expiry = Some(expiry);
        portal.updated_at = Utc::now();
        self.flush(&data).await
    }

    pub async fn record_portal_sync(
        &self,
        id: Uuid,
        status: SyncStatus,
        message: &str,
        total_channels: Option<usize>,
    ) -> AppResult<()> {
        let mut data = self.inner.write().await;
        let portal = data
            .portals
            .get_mut(&id)
            .ok_or_else(|| AppError::not_found("portal", id))?;
        portal.last_sync_at = Some(Utc::now());
        portal.last_sync_status = status;
        portal.last_sync_message = message.to_string();
        if let Some(total) = total_channels {
            portal.total_channels = total;
        }
        portal.updated_at = Utc::now();
        self.flush(&data).await
    }
}
