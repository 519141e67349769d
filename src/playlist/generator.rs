//! M3U playlist generator
//!
//! Renders stored channels as extended M3U text, emitting KODIPROP DRM
//! lines only when both license fields are set and one EXTHTTP line when
//! any HTTP context field is present.

use serde_json::{Map, Value};

use crate::models::ChannelRecord;

/// Render active channels, sorted by title, as an M3U playlist
pub fn generate_playlist(channels: &[ChannelRecord]) -> String {
    let mut active: Vec<&ChannelRecord> = channels.iter().filter(|c| c.is_active).collect();
    active.sort_by(|a, b| a.title.cmp(&b.title));

    let mut out = String::from("#EXTM3U\n");
    for channel in active {
        render_channel(&mut out, channel);
    }
    out
}

fn render_channel(out: &mut String, channel: &ChannelRecord) {
    out.push_str(&format!(
        "#EXTINF:-1 tvg-id=\"{}\" group-title=\"{}\" tvg-logo=\"{}\",{}\n",
        channel.tvg_id, channel.group_title, channel.logo, channel.title
    ));

    // DRM lines only when both halves are present
    if !channel.license_type.is_empty() && !channel.license_key.is_empty() {
        out.push_str(&format!(
            "#KODIPROP:inputstream.adaptive.license_type={}\n",
            channel.license_type
        ));
        out.push_str(&format!(
            "#KODIPROP:inputstream.adaptive.license_key={}\n",
            channel.license_key
        ));
    }

    if let Some(headers) = http_headers(channel) {
        out.push_str(&format!("#EXTHTTP:{headers}\n"));
    }

    out.push_str(&channel.url);
    out.push_str("\n\n");
}

fn http_headers(channel: &ChannelRecord) -> Option<String> {
    let mut map = Map::new();
    if !channel.cookie.is_empty() {
        map.insert("Cookie".into(), Value::String(channel.cookie.clone()));
    }
    if !channel.useragent.is_empty() {
        map.insert("User-Agent".into(), Value::String(channel.useragent.clone()));
    }
    if !channel.referer.is_empty() {
        map.insert("Referer".into(), Value::String(channel.referer.clone()));
    }
    if !channel.origin.is_empty() {
        map.insert("Origin".into(), Value::String(channel.origin.clone()));
    }
    if map.is_empty() {
        None
    } else {
        Some(Value::Object(map).to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::playlist::parser::M3uParser;
    use chrono::Utc;
    use uuid::Uuid;

    fn channel(tvg_id: &str, title: &str) -> ChannelRecord {
        let now = Utc::now();
        ChannelRecord {
            id: Uuid::new_v4(),
            tvg_id: tvg_id.to_string(),
            title: title.to_string(),
            url: format!("http://example.com/{tvg_id}.ts"),
            m3u8_url: None,
            license_type: String::new(),
            license_key: String::new(),
            cookie: String::new(),
            useragent: String::new(),
            referer: String::new(),
            origin: String::new(),
            logo: format!("http://example.com/{tvg_id}.png"),
            group_title: "News".to_string(),
            is_active: true,
            source_playlist_id: None,
            source_stalker_id: None,
            stalker_original_id: None,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn emits_header_and_sorts_by_title() {
        let output = generate_playlist(&[channel("b", "Zulu"), channel("a", "Alpha")]);
        assert!(output.starts_with("#EXTM3U\n"));
        let alpha = output.find("Alpha").unwrap();
        let zulu = output.find("Zulu").unwrap();
        assert!(alpha < zulu);
    }

    #[test]
    fn inactive_channels_are_omitted() {
        let mut off = channel("off", "Hidden");
        off.is_active = false;
        let output = generate_playlist(&[off, channel("on", "Visible")]);
        assert!(!output.contains("Hidden"));
        assert!(output.contains("Visible"));
    }

    #[test]
    fn kodiprop_lines_appear_immediately_before_url() {
        let mut c = channel("drm", "Encrypted");
        c.license_type = "clearkey".to_string();
        c.license_key = "abc123".to_string();
        let output = generate_playlist(&[c]);
        let lines: Vec<&str> = output.lines().collect();
        let url_pos = lines
            .iter()
            .position(|l| *l == "http://example.com/drm.ts")
            .unwrap();
        assert_eq!(
            lines[url_pos - 2],
            "#KODIPROP:inputstream.adaptive.license_type=clearkey"
        );
        assert_eq!(
            lines[url_pos - 1],
            "#KODIPROP:inputstream.adaptive.license_key=abc123"
        );
    }

    #[test]
    fn drm_lines_require_both_fields() {
        let mut c = channel("half", "Half DRM");
        c.license_type = "clearkey".to_string();
        let output = generate_playlist(&[c]);
        assert!(!output.contains("#KODIPROP"));
    }

    #[test]
    fn roundtrip_recovers_metadata_and_drm() {
        let mut c = channel("rt1", "Round Trip");
        c.license_type = "clearkey".to_string();
        c.license_key = "deadbeef".to_string();
        c.cookie = "sid=42".to_string();
        c.useragent = "VLC/3.0".to_string();
        c.referer = "https://r.example".to_string();
        c.origin = "https://o.example".to_string();

        let output = generate_playlist(std::slice::from_ref(&c));
        let drafts = M3uParser::new("Uncategorized").parse(&output);
        assert_eq!(drafts.len(), 1);
        let d = &drafts[0];
        assert_eq!(d.tvg_id.as_deref(), Some("rt1"));
        assert_eq!(d.title, "Round Trip");
        assert_eq!(d.group_title.as_deref(), Some("News"));
        assert_eq!(d.logo.as_deref(), Some("http://example.com/rt1.png"));
        assert_eq!(d.license_type.as_deref(), Some("clearkey"));
        assert_eq!(d.license_key.as_deref(), Some("deadbeef"));
        assert_eq!(d.url, c.url);
        assert_eq!(d.cookie.as_deref(), Some("sid=42"));
        assert_eq!(d.useragent.as_deref(), Some("VLC/3.0"));
        assert_eq!(d.referer.as_deref(), Some("https://r.example"));
        assert_eq!(d.origin.as_deref(), Some("https://o.example"));
    }
}
