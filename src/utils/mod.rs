//! Small shared helpers: id synthesis, MAC validation, stream URL rewriting.

use std::sync::LazyLock;

use chrono::Utc;
use rand::Rng;
use rand::distr::Alphanumeric;
use regex::Regex;
use url::Url;

use crate::errors::{AppError, AppResult};

static MAC_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[0-9A-Fa-f]{2}(:[0-9A-Fa-f]{2}){5}$").unwrap());

/// Validate a colon-separated MAC address (`00:1A:79:xx:xx:xx`)
pub fn is_valid_mac(mac: &str) -> bool {
    MAC_RE.is_match(mac)
}

/// Synthesize a tvg-id for an incoming channel that carries none.
///
/// Format: `channel_<unix-millis>_<random>`, unique enough for a single
/// collection without coordinating with the store.
pub fn synthesize_tvg_id() -> String {
    let suffix: String = rand::rng()
        .sample_iter(&Alphanumeric)
        .take(6)
        .map(char::from)
        .collect();
    format!("channel_{}_{}", Utc::now().timestamp_millis(), suffix)
}

/// Rewrite a stream URL with the current bearer token and a cache-busting
/// parameter, replacing any token parameter already present.
pub fn inject_token(stream_url: &str, token: &str) -> AppResult<String> {
    let mut url = Url::parse(stream_url)
        .map_err(|e| AppError::validation(format!("Invalid stream URL '{stream_url}': {e}")))?;

    let kept: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(k, _)| k != "token" && k != "_")
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();

    {
        let mut pairs = url.query_pairs_mut();
        pairs.clear();
        for (k, v) in &kept {
            pairs.append_pair(k, v);
        }
        pairs.append_pair("token", token);
        pairs.append_pair("_", &Utc::now().timestamp_millis().to_string());
    }

    Ok(url.into())
}
