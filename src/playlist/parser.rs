//! M3U playlist parser
//!
//! Line scanner producing [`ChannelDraft`]s. An `#EXTINF:` line opens a
//! draft; `#KODIPROP:` and `#EXTHTTP:` lines enrich it; the first
//! non-comment line starting with `http`, `rtmp` or `rtsp` is the stream URL
//! and finalizes the draft. A draft still lacking a URL at end of input is
//! dropped. Malformed `#EXTHTTP` JSON is logged and skipped rather than
//! aborting the parse.

use std::sync::LazyLock;

use regex::Regex;
use tracing::{debug, warn};

use crate::models::ChannelDraft;
use crate::utils::synthesize_tvg_id;

static TVG_ID_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"tvg-id="([^"]*)""#).unwrap());
static GROUP_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r#"group-title="([^"]*)""#).unwrap());
static LOGO_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r#"tvg-logo="([^"]*)""#).unwrap());

/// M3U text parser
#[derive(Debug, Clone)]
pub struct M3uParser {
    /// Group assigned to channels without a group-title attribute
    default_group: String,
}

impl M3uParser {
    pub fn new(default_group: impl Into<String>) -> Self {
        Self {
            default_group: default_group.into(),
        }
    }

    /// Parse raw playlist text into finalized channel drafts
    pub fn parse(&self, content: &str) -> Vec<ChannelDraft> {
        let mut drafts = Vec::new();
        let mut current: Option<ChannelDraft> = None;

        for line in content.lines() {
            let line = line.trim();
            if line.is_empty() {
                continue;
            }

            if let Some(extinf) = line.strip_prefix("#EXTINF:") {
                if let Some(dropped) = current.replace(self.parse_extinf(extinf)) {
                    debug!("Dropping channel entry '{}' without stream URL", dropped.title);
                }
            } else if let Some(prop) = line.strip_prefix("#KODIPROP:") {
                if let Some(draft) = current.as_mut() {
                    apply_kodiprop(draft, prop);
                }
            } else if let Some(json) = line.strip_prefix("#EXTHTTP:") {
                if let Some(draft) = current.as_mut() {
                    apply_exthttp(draft, json);
                }
            } else if is_stream_url(line) {
                if let Some(mut draft) = current.take() {
                    draft.url = line.to_string();
                    drafts.push(draft);
                } else {
                    debug!("Ignoring stream URL without EXTINF metadata: {line}");
                }
            }
            // other comment lines (#EXTM3U and friends) are skipped
        }

        if let Some(dropped) = current {
            debug!("Dropping channel entry '{}' without stream URL", dropped.title);
        }

        drafts
    }

    fn parse_extinf(&self, extinf: &str) -> ChannelDraft {
        let extract = |re: &Regex| {
            re.captures(extinf)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
                .filter(|s| !s.is_empty())
        };

        // channel name is the free text after the last comma
        let title = extinf
            .rsplit_once(',')
            .map(|(_, name)| name.trim().to_string())
            .unwrap_or_default();

        ChannelDraft {
            tvg_id: Some(extract(&TVG_ID_RE).unwrap_or_else(synthesize_tvg_id)),
            title,
            group_title: Some(extract(&GROUP_RE).unwrap_or_else(|| self.default_group.clone())),
            logo: extract(&LOGO_RE),
            ..ChannelDraft::default()
        }
    }
}

fn is_stream_url(line: &str) -> bool {
    !line.starts_with('#')
        && (line.starts_with("http") || line.starts_with("rtmp") || line.starts_with("rtsp"))
}

/// Apply one `#KODIPROP:key=value` line to the current draft.
///
/// `license_scheme` is accepted as an alias for `license_type` and
/// `license_url` for `license_key`; `license_title` is recognized but has no
/// record field to land in.
fn apply_kodiprop(draft: &mut ChannelDraft, prop: &str) {
    let Some((key, value)) = prop.split_once('=') else {
        return;
    };
    let value = value.trim();
    if value.is_empty() {
        return;
    }
    if key.ends_with("license_type") || key.ends_with("license_scheme") {
        draft.license_type = Some(value.to_string());
    } else if key.ends_with("license_key") || key.ends_with("license_url") {
        draft.license_key = Some(value.to_string());
    } else if key.ends_with("license_title") {
        debug!("Ignoring KODIPROP license_title for '{}'", draft.title);
    }
}

/// Apply an `#EXTHTTP:{json}` header line to the current draft.
///
/// Both `Cookie` and `cookie` keys are accepted; the capitalized form wins
/// when both are present. Malformed JSON is logged and skipped.
fn apply_exthttp(draft: &mut ChannelDraft, json: &str) {
    let parsed: serde_json::Map<String, serde_json::Value> = match serde_json::from_str(json) {
        Ok(map) => map,
        Err(e) => {
            warn!("Skipping malformed EXTHTTP JSON for '{}': {e}", draft.title);
            return;
        }
    };

    let text = |key: &str| {
        parsed
            .get(key)
            .and_then(|v| v.as_str())
            .map(|s| s.to_string())
    };

    if let Some(ua) = text("User-Agent") {
        draft.useragent = Some(ua);
    }
    if let Some(referer) = text("Referer") {
        draft.referer = Some(referer);
    }
    if let Some(origin) = text("Origin") {
        draft.origin = Some(origin);
    }
    if let Some(cookie) = text("Cookie").or_else(|| text("cookie")) {
        draft.cookie = Some(cookie);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    fn parser() -> M3uParser {
        M3uParser::new("Uncategorized")
    }

    #[test]
    fn parses_basic_extinf_entry() {
        let input = "#EXTM3U\n\
            #EXTINF:-1 tvg-id=\"bbc1\" group-title=\"News\" tvg-logo=\"logo.png\",BBC One\n\
            https://example.com/stream.m3u8\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts.len(), 1);
        let d = &drafts[0];
        assert_eq!(d.tvg_id.as_deref(), Some("bbc1"));
        assert_eq!(d.title, "BBC One");
        assert_eq!(d.group_title.as_deref(), Some("News"));
        assert_eq!(d.logo.as_deref(), Some("logo.png"));
        assert_eq!(d.url, "https://example.com/stream.m3u8");
    }

    #[test]
    fn kodiprop_lines_set_drm_fields() {
        let input = "#EXTINF:-1 tvg-id=\"c1\",Channel\n\
            #KODIPROP:inputstream.adaptive.license_type=clearkey\n\
            #KODIPROP:inputstream.adaptive.license_key=abc123\n\
            http://example.com/live.ts\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts[0].license_type.as_deref(), Some("clearkey"));
        assert_eq!(drafts[0].license_key.as_deref(), Some("abc123"));
    }

    #[test]
    fn license_scheme_and_url_are_aliases() {
        let input = "#EXTINF:-1 tvg-id=\"c1\",Channel\n\
            #KODIPROP:inputstream.adaptive.license_scheme=widevine\n\
            #KODIPROP:inputstream.adaptive.license_url=https://lic.example/wv\n\
            http://example.com/live.ts\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts[0].license_type.as_deref(), Some("widevine"));
        assert_eq!(
            drafts[0].license_key.as_deref(),
            Some("https://lic.example/wv")
        );
    }

    #[rstest]
    #[case(r#"{"User-Agent":"VLC","Referer":"https://r.example","Origin":"https://o.example","Cookie":"sid=1"}"#)]
    #[case(r#"{"User-Agent":"VLC","Referer":"https://r.example","Origin":"https://o.example","cookie":"sid=1"}"#)]
    fn exthttp_accepts_both_cookie_casings(#[case] json: &str) {
        let input = format!(
            "#EXTINF:-1 tvg-id=\"c1\",Channel\n#EXTHTTP:{json}\nhttp://example.com/live.ts\n"
        );
        let drafts = parser().parse(&input);
        let d = &drafts[0];
        assert_eq!(d.useragent.as_deref(), Some("VLC"));
        assert_eq!(d.referer.as_deref(), Some("https://r.example"));
        assert_eq!(d.origin.as_deref(), Some("https://o.example"));
        assert_eq!(d.cookie.as_deref(), Some("sid=1"));
    }

    #[test]
    fn malformed_exthttp_json_is_skipped_not_fatal() {
        let input = "#EXTINF:-1 tvg-id=\"c1\",Channel\n\
            #EXTHTTP:{not json}\n\
            http://example.com/live.ts\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts.len(), 1);
        assert!(drafts[0].cookie.is_none());
    }

    #[test]
    fn entry_without_url_is_discarded() {
        let input = "#EXTINF:-1 tvg-id=\"c1\",Dangling\n";
        assert!(parser().parse(input).is_empty());
    }

    #[test]
    fn urlless_entry_is_replaced_by_the_next_extinf() {
        let input = "#EXTINF:-1 tvg-id=\"lost\",Lost Channel\n\
            #EXTINF:-1 tvg-id=\"kept\",Kept Channel\n\
            http://example.com/kept.ts\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].tvg_id.as_deref(), Some("kept"));
    }

    #[test]
    fn missing_tvg_id_is_synthesized_and_group_defaulted() {
        let input = "#EXTINF:-1,No Metadata\nhttp://example.com/live.ts\n";
        let drafts = parser().parse(input);
        let d = &drafts[0];
        assert!(d.tvg_id.as_deref().unwrap().starts_with("channel_"));
        assert_eq!(d.group_title.as_deref(), Some("Uncategorized"));
    }

    #[rstest]
    #[case("rtmp://example.com/live")]
    #[case("rtsp://example.com/cam1")]
    #[case("http://example.com/a.ts")]
    fn recognizes_all_stream_schemes(#[case] url: &str) {
        let input = format!("#EXTINF:-1 tvg-id=\"c1\",Channel\n{url}\n");
        let drafts = parser().parse(&input);
        assert_eq!(drafts[0].url, url);
    }

    #[test]
    fn multiple_entries_parse_in_order() {
        let input = "#EXTM3U\n\
            #EXTINF:-1 tvg-id=\"a\",Alpha\nhttp://example.com/a\n\
            #EXTINF:-1 tvg-id=\"b\",Beta\nhttp://example.com/b\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts.len(), 2);
        assert_eq!(drafts[0].title, "Alpha");
        assert_eq!(drafts[1].title, "Beta");
    }

    #[test]
    fn title_with_commas_keeps_only_last_segment_as_name() {
        let input = "#EXTINF:-1 tvg-id=\"c1\" group-title=\"A,B\",The Name\nhttp://x/1\n";
        let drafts = parser().parse(input);
        assert_eq!(drafts[0].title, "The Name");
    }
}
