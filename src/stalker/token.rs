//! Portal token manager
//!
//! Owns the in-memory bearer-token cache keyed by portal id. Tokens are
//! valid for a fixed 23 hour window; `get_token` answers from cache while at
//! least 30 seconds of validity remain, otherwise runs the
//! handshake + do_auth exchange and persists the result to the portal
//! record. Refreshes are single-flight per portal: concurrent callers share
//! one round trip. The manager never retries a rejected token itself; that
//! is the caller's one forced-refresh retry.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::errors::AppResult;
use crate::stalker::client::StalkerApi;
use crate::store::JsonStore;

/// Fixed validity window applied to freshly minted tokens
const TOKEN_VALIDITY_HOURS: i64 = 23;
/// Remaining lifetime below which a cached token is no longer served
const REFRESH_MARGIN_SECS: i64 = 30;

#[derive(Debug, Clone)]
struct CachedToken {
    token: String,
    minted_at: DateTime<Utc>,
    expires_at: DateTime<Utc>,
}

impl CachedToken {
    fn is_usable(&self, now: DateTime<Utc>) -> bool {
        self.expires_at - now >= Duration::seconds(REFRESH_MARGIN_SECS)
    }
}

pub struct TokenManager {
    api: Arc<dyn StalkerApi>,
    store: JsonStore,
    cache: RwLock<HashMap<Uuid, CachedToken>>,
    /// Per-portal refresh gates; holding one serializes the exchange
    gates: Mutex<HashMap<Uuid, Arc<Mutex<()>>>>,
}

impl TokenManager {
    pub fn new(api: Arc<dyn StalkerApi>, store: JsonStore) -> Self {
        Self {
            api,
            store,
            cache: RwLock::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
        }
    }

    /// Return a currently valid bearer token for the portal.
    ///
    /// `force_refresh` bypasses the cache but still deduplicates against a
    /// refresh that completed while this caller was waiting on the gate.
    pub async fn get_token(&self, portal_id: Uuid, force_refresh: bool) -> AppResult<String> {
        let now = Utc::now();
        if !force_refresh {
            if let Some(token) = self.cached(portal_id, now).await {
                return Ok(token);
            }
        }

        let gate = self.gate_for(portal_id).await;
        let _held = gate.lock().await;

        // Another caller may have refreshed while we waited. A forced caller
        // accepts only a token minted after it started waiting.
        {
            let cache = self.cache.read().await;
            if let Some(entry) = cache.get(&portal_id) {
                if entry.is_usable(Utc::now()) && (!force_refresh || entry.minted_at >= now) {
                    return Ok(entry.token.clone());
                }
            }
        }

        // On cache miss (not forced), an unexpired token persisted on the
        // portal record survives a process restart.
        let portal = self.store.get_portal(portal_id).await?;
        if !force_refresh {
            if let (Some(token), Some(expiry)) = (&portal.token, portal.token_expiry) {
                if expiry - Utc::now() >= Duration::seconds(REFRESH_MARGIN_SECS) {
                    debug!("Reusing persisted token for portal {}", portal.name);
                    let entry = CachedToken {
                        token: token.clone(),
                        minted_at: Utc::now(),
                        expires_at: expiry,
                    };
                    self.cache.write().await.insert(portal_id, entry);
                    return Ok(token.clone());
                }
            }
        }

        info!("Acquiring token for portal {}", portal.name);
        let handshake_token = self.api.handshake(&portal).await?;
        let token = self.api.authenticate(&portal, &handshake_token).await?;

        let minted_at = Utc::now();
        let expires_at = minted_at + Duration::hours(TOKEN_VALIDITY_HOURS);
        self.cache.write().await.insert(
            portal_id,
            CachedToken {
                token: token.clone(),
                minted_at,
                expires_at,
            },
        );
        if let Err(e) = self.store.set_portal_token(portal_id, &token, expires_at).await {
            warn!("Token acquired but not persisted for portal {portal_id}: {e}");
        }
        Ok(token)
    }

    /// Drop one portal's cache entry and refresh gate (e.g. after its
    /// record is deleted)
    pub async fn invalidate(&self, portal_id: Uuid) {
        self.cache.write().await.remove(&portal_id);
        self.gates.lock().await.remove(&portal_id);
    }

    /// Remove cache entries past expiry; returns how many were dropped
    pub async fn prune_expired(&self) -> usize {
        let now = Utc::now();
        let mut cache = self.cache.write().await;
        let before = cache.len();
        cache.retain(|_, entry| entry.expires_at > now);
        let pruned = before - cache.len();
        if pruned > 0 {
            debug!("Pruned {pruned} expired token cache entries");
        }
        pruned
    }

    /// Expiry of the cached token, if any; used by the pre-refresh sweep
    pub async fn cached_expiry(&self, portal_id: Uuid) -> Option<DateTime<Utc>> {
        self.cache
            .read()
            .await
            .get(&portal_id)
            .map(|e| e.expires_at)
    }

    async fn cached(&self, portal_id: Uuid, now: DateTime<Utc>) -> Option<String> {
        let cache = self.cache.read().await;
        cache
            .get(&portal_id)
            .filter(|entry| entry.is_usable(now))
            .map(|entry| entry.token.clone())
    }

    async fn gate_for(&self, portal_id: Uuid) -> Arc<Mutex<()>> {
        let mut gates = self.gates.lock().await;
        gates.entry(portal_id).or_default().clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::errors::{AppError, SourceError};
    use crate::models::{StalkerPortal, SyncStatus};
    use crate::stalker::client::{StalkerCategory, StalkerChannel};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scripted portal that counts round trips
    struct CountingApi {
        handshakes: AtomicUsize,
        auths: AtomicUsize,
        fail_auth: bool,
    }

    impl CountingApi {
        fn new() -> Self {
            Self {
                handshakes: AtomicUsize::new(0),
                auths: AtomicUsize::new(0),
                fail_auth: false,
            }
        }

        fn failing() -> Self {
            Self {
                fail_auth: true,
                ..Self::new()
            }
        }
    }

    #[async_trait]
    impl StalkerApi for CountingApi {
        async fn handshake(&self, _portal: &StalkerPortal) -> AppResult<String> {
            self.handshakes.fetch_add(1, Ordering::SeqCst);
            Ok("bootstrap".to_string())
        }

        async fn authenticate(
            &self,
            portal: &StalkerPortal,
            _handshake_token: &str,
        ) -> AppResult<String> {
            let n = self.auths.fetch_add(1, Ordering::SeqCst);
            if self.fail_auth {
                return Err(AppError::Source(SourceError::auth_failed(
                    &portal.name,
                    "bad credentials",
                )));
            }
            Ok(format!("bearer-{n}"))
        }

        async fn get_categories(
            &self,
            _portal: &StalkerPortal,
            _token: &str,
        ) -> AppResult<Vec<StalkerCategory>> {
            Ok(vec![])
        }

        async fn get_channels(
            &self,
            _portal: &StalkerPortal,
            _token: &str,
            _category_id: &str,
        ) -> AppResult<Vec<StalkerChannel>> {
            Ok(vec![])
        }
    }

    fn portal() -> StalkerPortal {
        let now = Utc::now();
        StalkerPortal {
            id: Uuid::new_v4(),
            name: "Test Portal".to_string(),
            host: "http://portal.example".to_string(),
            mac_address: "00:1A:79:AB:CD:EF".to_string(),
            username: "user".to_string(),
            password: "pass".to_string(),
            token: None,
            token_expiry: None,
            is_active: true,
            total_channels: 0,
            last_sync_at: None,
            last_sync_status: SyncStatus::Pending,
            last_sync_message: String::new(),
            created_at: now,
            updated_at: now,
        }
    }

    async fn setup(api: CountingApi) -> (Arc<CountingApi>, TokenManager, Uuid) {
        let store = JsonStore::in_memory();
        let portal = store.insert_portal(portal()).await.unwrap();
        let api = Arc::new(api);
        let manager = TokenManager::new(api.clone(), store);
        (api, manager, portal.id)
    }

    #[tokio::test]
    async fn second_call_within_validity_hits_cache() {
        let (api, manager, id) = setup(CountingApi::new()).await;
        let first = manager.get_token(id, false).await.unwrap();
        let second = manager.get_token(id, false).await.unwrap();
        assert_eq!(first, second);
        assert_eq!(api.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(api.auths.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn force_refresh_mints_a_new_token() {
        let (api, manager, id) = setup(CountingApi::new()).await;
        let first = manager.get_token(id, false).await.unwrap();
        let second = manager.get_token(id, true).await.unwrap();
        assert_ne!(first, second);
        assert_eq!(api.handshakes.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn concurrent_callers_share_one_exchange() {
        let (api, manager, id) = setup(CountingApi::new()).await;
        let manager = Arc::new(manager);
        let mut handles = Vec::new();
        for _ in 0..8 {
            let m = manager.clone();
            handles.push(tokio::spawn(async move { m.get_token(id, false).await }));
        }
        for handle in handles {
            handle.await.unwrap().unwrap();
        }
        assert_eq!(api.handshakes.load(Ordering::SeqCst), 1);
        assert_eq!(api.auths.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn auth_failure_surfaces_and_is_not_cached() {
        let (api, manager, id) = setup(CountingApi::failing()).await;
        let err = manager.get_token(id, false).await.unwrap_err();
        assert!(err.is_auth_rejection());
        // a second attempt reaches the portal again
        let _ = manager.get_token(id, false).await.unwrap_err();
        assert_eq!(api.auths.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn token_is_persisted_to_portal_record() {
        let store = JsonStore::in_memory();
        let portal = store.insert_portal(portal()).await.unwrap();
        let manager = TokenManager::new(Arc::new(CountingApi::new()), store.clone());
        let token = manager.get_token(portal.id, false).await.unwrap();
        let stored = store.get_portal(portal.id).await.unwrap();
        assert_eq!(stored.token.as_deref(), Some(token.as_str()));
        assert!(stored.token_expiry.unwrap() > Utc::now());
    }

    #[tokio::test]
    async fn persisted_token_survives_restart() {
        let store = JsonStore::in_memory();
        let mut p = portal();
        p.token = Some("persisted".to_string());
        p.token_expiry = Some(Utc::now() + Duration::hours(1));
        let p = store.insert_portal(p).await.unwrap();

        let api = Arc::new(CountingApi::new());
        let manager = TokenManager::new(api.clone(), store);
        let token = manager.get_token(p.id, false).await.unwrap();
        assert_eq!(token, "persisted");
        assert_eq!(api.handshakes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn invalidate_drops_cache_entry_and_gate() {
        let (_, manager, id) = setup(CountingApi::new()).await;
        manager.get_token(id, false).await.unwrap();
        assert!(manager.gates.lock().await.contains_key(&id));

        manager.invalidate(id).await;
        assert!(manager.cache.read().await.get(&id).is_none());
        assert!(manager.gates.lock().await.get(&id).is_none());
    }

    #[tokio::test]
    async fn prune_drops_only_expired_entries() {
        let (_, manager, id) = setup(CountingApi::new()).await;
        manager.get_token(id, false).await.unwrap();
        assert_eq!(manager.prune_expired().await, 0);
        manager
            .cache
            .write()
            .await
            .get_mut(&id)
            .unwrap()
            .expires_at = Utc::now() - Duration::seconds(1);
        assert_eq!(manager.prune_expired().await, 1);
    }
}
