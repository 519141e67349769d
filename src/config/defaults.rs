//! Central default values used across configuration structures

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8000;

pub const DEFAULT_DATA_FILE: &str = "channels.json";

/// Group assigned to parsed channels that carry no group-title attribute
pub const DEFAULT_GROUP_TITLE: &str = "Uncategorized";

/// Bounded timeout for playlist/portal fetches
pub const DEFAULT_FETCH_TIMEOUT_SECS: u64 = 30;

/// Fallback per-source re-sync interval when a source does not set one
pub const DEFAULT_SYNC_INTERVAL_SECS: u64 = 6 * 60 * 60;

pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 5 * 60;
pub const DEFAULT_TOKEN_REFRESH_INTERVAL_SECS: u64 = 30 * 60;
pub const DEFAULT_CACHE_PRUNE_INTERVAL_SECS: u64 = 60;

/// Set-top-box user agent expected by Stalker middleware
pub const DEFAULT_STALKER_USER_AGENT: &str = "Mozilla/5.0 (QtEmbedded; U; Linux; C) \
     AppleWebKit/533.3 (KHTML, like Gecko) MAG200 stbapp ver: 2 rev: 250 Safari/533.3";
