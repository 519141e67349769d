//! Sync orchestrator
//!
//! Fetches remote playlist or portal content, parses it into channel drafts
//! and reconciles the drafts against the stored channel collection with a
//! counted add/update/skip outcome. Per-record failures are counted and
//! never abort the batch; the source record is stamped with the sync result
//! even when the fetch itself fails. Syncs of the same source are
//! serialized so a manual trigger cannot race the scheduler.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{error, info, warn};
use uuid::Uuid;

use crate::config::IngestionConfig;
use crate::errors::{AppError, AppResult, SourceError};
use crate::models::{
    ChannelDraft, ChannelRecord, PlaylistSource, SourceDeleteMode, StalkerPortal, SyncOutcome,
    SyncStatus,
};
use crate::playlist::M3uParser;
use crate::stalker::client::{StalkerApi, cmd_to_url};
use crate::stalker::token::TokenManager;
use crate::store::JsonStore;
use crate::utils::{inject_token, synthesize_tvg_id};

/// Seam for fetching raw playlist text; tests substitute scripted bodies
#[async_trait]
pub trait PlaylistFetcher: Send + Sync {
    async fn fetch_text(&self, url: &str) -> AppResult<String>;
}

/// reqwest-backed fetcher with a bounded timeout
pub struct HttpPlaylistFetcher {
    client: reqwest::Client,
}

impl HttpPlaylistFetcher {
    pub fn new(timeout: Duration) -> Self {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .unwrap_or_else(|_| reqwest::Client::new());
        Self { client }
    }
}

#[async_trait]
impl PlaylistFetcher for HttpPlaylistFetcher {
    async fn fetch_text(&self, url: &str) -> AppResult<String> {
        let response = self.client.get(url).send().await.map_err(|e| {
            if e.is_timeout() {
                AppError::Source(SourceError::Timeout {
                    url: url.to_string(),
                })
            } else {
                AppError::Http(e)
            }
        })?;
        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Source(SourceError::UpstreamStatus {
                status: status.as_u16(),
                url: url.to_string(),
            }));
        }
        Ok(response.text().await?)
    }
}

/// Where the synced channels came from, for provenance tagging
#[derive(Debug, Clone, Copy)]
enum Provenance {
    Playlist(Uuid),
    Portal(Uuid),
    /// Pasted M3U text; resulting records carry no source id
    Manual,
}

pub struct SyncService {
    store: JsonStore,
    fetcher: Arc<dyn PlaylistFetcher>,
    api: Arc<dyn StalkerApi>,
    tokens: Arc<TokenManager>,
    parser: M3uParser,
    /// Per-source sync gates; manual and scheduled triggers share them
    locks: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl SyncService {
    pub fn new(
        store: JsonStore,
        fetcher: Arc<dyn PlaylistFetcher>,
        api: Arc<dyn StalkerApi>,
        tokens: Arc<TokenManager>,
        ingestion: &IngestionConfig,
    ) -> Self {
        Self {
            store,
            fetcher,
            api,
            tokens,
            parser: M3uParser::new(ingestion.default_group.clone()),
            locks: Mutex::new(HashMap::new()),
        }
    }

    /// Re-import one playlist source
    pub async fn sync_playlist(&self, playlist_id: Uuid) -> AppResult<SyncOutcome> {
        let gate = self.lock_for(playlist_id).await;
        let _held = gate.lock().await;

        let playlist = self.store.get_playlist(playlist_id).await?;
        info!("Syncing playlist '{}' from {}", playlist.name, playlist.url);

        let content = match self.fetcher.fetch_text(&playlist.url).await {
            Ok(content) => content,
            Err(e) => {
                // total failure still stamps the source record
                self.store
                    .record_playlist_sync(playlist_id, SyncStatus::Error, &e.to_string(), None)
                    .await?;
                error!("Playlist '{}' fetch failed: {e}", playlist.name);
                return Err(e);
            }
        };

        let drafts = self.parser.parse(&content);
        let outcome = self
            .reconcile(drafts, Provenance::Playlist(playlist_id))
            .await;

        let channel_count = self.store.count_channels_for_playlist(playlist_id).await;
        self.store
            .record_playlist_sync(
                playlist_id,
                SyncStatus::Success,
                &outcome.summary(),
                Some(channel_count),
            )
            .await?;
        info!("Playlist '{}' synced: {}", playlist.name, outcome.summary());
        Ok(outcome)
    }

    /// Import raw playlist text supplied by the caller directly, without a
    /// stored source. Imported channels are manual entries.
    pub async fn import_m3u(&self, content: &str) -> AppResult<SyncOutcome> {
        if content.trim().is_empty() {
            return Err(AppError::validation("playlist content is required"));
        }
        let drafts = self.parser.parse(content);
        let outcome = self.reconcile(drafts, Provenance::Manual).await;
        info!("Imported pasted playlist: {}", outcome.summary());
        Ok(outcome)
    }

    /// Re-import one Stalker portal
    pub async fn sync_portal(&self, portal_id: Uuid) -> AppResult<SyncOutcome> {
        let gate = self.lock_for(portal_id).await;
        let _held = gate.lock().await;

        let portal = self.store.get_portal(portal_id).await?;
        info!("Syncing portal '{}' at {}", portal.name, portal.host);

        let drafts = match self.fetch_portal_drafts(&portal).await {
            Ok(drafts) => drafts,
            Err(e) => {
                self.store
                    .record_portal_sync(portal_id, SyncStatus::Error, &e.to_string(), None)
                    .await?;
                error!("Portal '{}' sync failed: {e}", portal.name);
                return Err(e);
            }
        };

        let outcome = self.reconcile(drafts, Provenance::Portal(portal_id)).await;

        let total = self.store.count_channels_for_portal(portal_id).await;
        self.store
            .record_portal_sync(
                portal_id,
                SyncStatus::Success,
                &outcome.summary(),
                Some(total),
            )
            .await?;
        info!("Portal '{}' synced: {}", portal.name, outcome.summary());
        Ok(outcome)
    }

    /// List categories and channels, retrying exactly once with a forced
    /// token refresh when the portal rejects the token.
    async fn fetch_portal_drafts(&self, portal: &StalkerPortal) -> AppResult<Vec<ChannelDraft>> {
        let mut force = false;
        for attempt in 0..2 {
            let token = self.tokens.get_token(portal.id, force).await?;
            match self.list_portal_channels(portal, &token).await {
                Ok(drafts) => return Ok(drafts),
                Err(e) if attempt == 0 && e.is_auth_rejection() => {
                    warn!(
                        "Portal '{}' rejected token, retrying with forced refresh",
                        portal.name
                    );
                    force = true;
                }
                Err(e) => return Err(e),
            }
        }
        unreachable!("bounded retry loop always returns")
    }

    async fn list_portal_channels(
        &self,
        portal: &StalkerPortal,
        token: &str,
    ) -> AppResult<Vec<ChannelDraft>> {
        let categories = self.api.get_categories(portal, token).await?;
        let mut drafts = Vec::new();
        for category in &categories {
            let channels = self.api.get_channels(portal, token, &category.id).await?;
            for channel in channels {
                let playback = match inject_token(cmd_to_url(&channel.cmd), token) {
                    Ok(url) => url,
                    Err(_) => {
                        // unusable cmd, reconcile() will count it as an error
                        String::new()
                    }
                };
                drafts.push(ChannelDraft {
                    tvg_id: Some(format!("stalker_{}_{}", portal.id, channel.id)),
                    title: channel.name,
                    url: playback,
                    logo: if channel.logo.is_empty() {
                        None
                    } else {
                        Some(channel.logo)
                    },
                    group_title: Some(category.title.clone()),
                    stalker_original_id: Some(channel.id),
                    ..ChannelDraft::default()
                });
            }
        }
        Ok(drafts)
    }

    /// Reconcile parsed drafts against the stored collection.
    ///
    /// Each record is its own atomic unit; a failing record increments
    /// `errors` and the batch continues.
    async fn reconcile(&self, drafts: Vec<ChannelDraft>, provenance: Provenance) -> SyncOutcome {
        let mut outcome = SyncOutcome {
            total: drafts.len(),
            ..SyncOutcome::default()
        };

        for draft in drafts {
            match self.upsert_draft(draft, provenance).await {
                Ok(true) => outcome.added += 1,
                Ok(false) => outcome.updated += 1,
                Err(e) => {
                    outcome.errors += 1;
                    warn!("Skipping channel during sync: {e}");
                }
            }
        }
        outcome
    }

    /// Insert or overwrite one draft; returns true when a record was added
    async fn upsert_draft(&self, draft: ChannelDraft, provenance: Provenance) -> AppResult<bool> {
        if draft.url.is_empty() {
            return Err(AppError::validation(format!(
                "channel '{}' has no stream URL",
                draft.title
            )));
        }
        if draft.title.is_empty() {
            return Err(AppError::validation("channel has no title"));
        }

        let existing = match provenance {
            Provenance::Portal(portal_id) => match &draft.stalker_original_id {
                Some(original) => self.store.find_channel_by_stalker(portal_id, original).await,
                None => None,
            },
            Provenance::Playlist(_) | Provenance::Manual => match &draft.tvg_id {
                Some(tvg_id) => self.store.find_channel_by_tvg_id(tvg_id).await,
                None => None,
            },
        };

        match existing {
            Some(mut record) => {
                apply_draft(&mut record, &draft, provenance);
                record.updated_at = Utc::now();
                self.store.update_channel(record).await?;
                Ok(false)
            }
            None => {
                let record = new_record(draft, provenance);
                self.store.insert_channel(record).await?;
                Ok(true)
            }
        }
    }

    /// Delete a source and apply the caller-chosen channel policy
    pub async fn delete_playlist(
        &self,
        playlist_id: Uuid,
        mode: SourceDeleteMode,
    ) -> AppResult<usize> {
        let _exists: PlaylistSource = self.store.get_playlist(playlist_id).await?;
        let affected = self
            .store
            .apply_playlist_delete_mode(playlist_id, mode)
            .await?;
        self.store.delete_playlist(playlist_id).await?;
        self.locks.lock().await.remove(&playlist_id);
        info!("Deleted playlist {playlist_id} ({mode:?}, {affected} channels affected)");
        Ok(affected)
    }

    pub async fn delete_portal(
        &self,
        portal_id: Uuid,
        mode: SourceDeleteMode,
    ) -> AppResult<usize> {
        let _exists = self.store.get_portal(portal_id).await?;
        let affected = self.store.apply_portal_delete_mode(portal_id, mode).await?;
        self.store.delete_portal(portal_id).await?;
        self.tokens.invalidate(portal_id).await;
        self.locks.lock().await.remove(&portal_id);
        info!("Deleted portal {portal_id} ({mode:?}, {affected} channels affected)");
        Ok(affected)
    }

    async fn lock_for(&self, source_id: Uuid) -> Arc<Mutex<()>> {
        let mut locks = self.locks.lock().await;
        locks.entry(source_id).or_default().clone()
    }
}

/// Overwrite the ingestible fields of an existing record from a draft
fn apply_draft(record: &mut ChannelRecord, draft: &ChannelDraft, provenance: Provenance) {
    record.title = draft.title.clone();
    record.url = draft.url.clone();
    record.m3u8_url = draft.m3u8_url.clone();
    record.license_type = draft.license_type.clone().unwrap_or_default();
    record.license_key = draft.license_key.clone().unwrap_or_default();
    record.cookie = draft.cookie.clone().unwrap_or_default();
    record.useragent = draft.useragent.clone().unwrap_or_default();
    record.referer = draft.referer.clone().unwrap_or_default();
    record.origin = draft.origin.clone().unwrap_or_default();
    if let Some(logo) = &draft.logo {
        record.logo = logo.clone();
    }
    if let Some(group) = &draft.group_title {
        record.group_title = group.clone();
    }
    match provenance {
        Provenance::Playlist(id) => {
            record.source_playlist_id = Some(id);
            record.source_stalker_id = None;
        }
        Provenance::Portal(id) => {
            record.source_stalker_id = Some(id);
            record.source_playlist_id = None;
            record.stalker_original_id = draft.stalker_original_id.clone();
        }
        Provenance::Manual => {
            record.source_playlist_id = None;
            record.source_stalker_id = None;
        }
    }
}

fn new_record(draft: ChannelDraft, provenance: Provenance) -> ChannelRecord {
    let now = Utc::now();
    let (playlist_id, portal_id) = match provenance {
        Provenance::Playlist(id) => (Some(id), None),
        Provenance::Portal(id) => (None, Some(id)),
        Provenance::Manual => (None, None),
    };
    ChannelRecord {
        id: Uuid::new_v4(),
        tvg_id: draft.tvg_id.unwrap_or_else(synthesize_tvg_id),
        title: draft.title,
        url: draft.url,
        m3u8_url: draft.m3u8_url,
        license_type: draft.license_type.unwrap_or_default(),
        license_key: draft.license_key.unwrap_or_default(),
        cookie: draft.cookie.unwrap_or_default(),
        useragent: draft.useragent.unwrap_or_default(),
        referer: draft.referer.unwrap_or_default(),
        origin: draft.origin.unwrap_or_default(),
        logo: draft.logo.unwrap_or_default(),
        group_title: draft.group_title.unwrap_or_default(),
        is_active: true,
        source_playlist_id: playlist_id,
        source_stalker_id: portal_id,
        stalker_original_id: draft.stalker_original_id,
        created_at: now,
        updated_at: now,
    }
}
