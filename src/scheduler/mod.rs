//! Periodic task scheduler
//!
//! One loop owns every recurring task so timers cannot race each other on
//! the same sources: the sync sweep over auto-sync sources, the pre-emptive
//! token refresh for portals nearing expiry, and the token cache prune. A
//! failure for one source never stops the rest of a pass.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use tokio::time::{MissedTickBehavior, interval};
use tracing::{debug, error, info};

use crate::config::SchedulerConfig;
use crate::stalker::token::TokenManager;
use crate::store::JsonStore;
use crate::sync::SyncService;

/// Tokens expiring within this window get refreshed ahead of time
const PRE_REFRESH_WINDOW_SECS: i64 = 60 * 60;

pub struct SchedulerService {
    store: JsonStore,
    sync: Arc<SyncService>,
    tokens: Arc<TokenManager>,
    config: SchedulerConfig,
    /// Interval applied to portals, which carry no per-source setting
    portal_sync_interval_secs: u64,
}

impl SchedulerService {
    pub fn new(
        store: JsonStore,
        sync: Arc<SyncService>,
        tokens: Arc<TokenManager>,
        config: SchedulerConfig,
        portal_sync_interval_secs: u64,
    ) -> Self {
        Self {
            store,
            sync,
            tokens,
            config,
            portal_sync_interval_secs,
        }
    }

    /// Run the scheduler loop forever
    pub async fn run(self) {
        info!(
            "Scheduler started (sweep {}, token refresh {}, cache prune {})",
            humantime::format_duration(std::time::Duration::from_secs(
                self.config.sweep_interval_secs
            )),
            humantime::format_duration(std::time::Duration::from_secs(
                self.config.token_refresh_interval_secs
            )),
            humantime::format_duration(std::time::Duration::from_secs(
                self.config.cache_prune_interval_secs
            )),
        );

        let mut sweep = interval(std::time::Duration::from_secs(
            self.config.sweep_interval_secs.max(1),
        ));
        let mut token_refresh = interval(std::time::Duration::from_secs(
            self.config.token_refresh_interval_secs.max(1),
        ));
        let mut cache_prune = interval(std::time::Duration::from_secs(
            self.config.cache_prune_interval_secs.max(1),
        ));
        for i in [&mut sweep, &mut token_refresh, &mut cache_prune] {
            i.set_missed_tick_behavior(MissedTickBehavior::Delay);
            // consume the immediate first tick so the sweep starts one
            // interval after boot
            i.reset();
        }

        loop {
            tokio::select! {
                _ = sweep.tick() => self.run_sync_sweep().await,
                _ = token_refresh.tick() => self.run_token_refresh().await,
                _ = cache_prune.tick() => {
                    self.tokens.prune_expired().await;
                }
            }
        }
    }

    /// One pass over every active auto-sync source
    async fn run_sync_sweep(&self) {
        let now = Utc::now();

        for playlist in self.store.list_playlists().await {
            if !playlist.is_active || !playlist.auto_sync {
                continue;
            }
            if !is_due(playlist.last_sync_at, playlist.sync_interval_secs, now) {
                continue;
            }
            debug!("Scheduled sync for playlist '{}'", playlist.name);
            if let Err(e) = self.sync.sync_playlist(playlist.id).await {
                error!("Scheduled sync of playlist '{}' failed: {e}", playlist.name);
            }
        }

        for portal in self.store.list_portals().await {
            if !portal.is_active {
                continue;
            }
            if !is_due(portal.last_sync_at, self.portal_sync_interval_secs, now) {
                continue;
            }
            debug!("Scheduled sync for portal '{}'", portal.name);
            if let Err(e) = self.sync.sync_portal(portal.id).await {
                error!("Scheduled sync of portal '{}' failed: {e}", portal.name);
            }
        }
    }

    /// Force-refresh portal tokens that expire within the next hour
    async fn run_token_refresh(&self) {
        let now = Utc::now();
        for portal in self.store.list_portals().await {
            if !portal.is_active {
                continue;
            }
            let expiry = match self.tokens.cached_expiry(portal.id).await {
                Some(expiry) => Some(expiry),
                None => portal.token_expiry,
            };
            let Some(expiry) = expiry else {
                continue;
            };
            if expiry - now <= Duration::seconds(PRE_REFRESH_WINDOW_SECS) {
                debug!("Pre-emptive token refresh for portal '{}'", portal.name);
                if let Err(e) = self.tokens.get_token(portal.id, true).await {
                    error!("Token pre-refresh failed for '{}': {e}", portal.name);
                }
            }
        }
    }
}

/// Whether a source is due for its next scheduled sync.
/// A source that has never synced is always due.
fn is_due(last_sync_at: Option<DateTime<Utc>>, interval_secs: u64, now: DateTime<Utc>) -> bool {
    match last_sync_at {
        None => true,
        Some(last) => now - last >= Duration::seconds(interval_secs as i64),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn never_synced_source_is_due() {
        assert!(is_due(None, 3600, Utc::now()));
    }

    #[test]
    fn source_inside_interval_is_not_due() {
        let now = Utc::now();
        assert!(!is_due(Some(now - Duration::seconds(100)), 3600, now));
    }

    #[test]
    fn source_past_interval_is_due() {
        let now = Utc::now();
        assert!(is_due(Some(now - Duration::seconds(3601)), 3600, now));
        // boundary counts as due
        assert!(is_due(Some(now - Duration::seconds(3600)), 3600, now));
    }
}
