//! Document store semantics: uniqueness constraints and file persistence

use chrono::Utc;
use uuid::Uuid;

use iptv_hub::errors::AppError;
use iptv_hub::models::{ChannelRecord, StalkerPortal, SyncStatus};
use iptv_hub::store::JsonStore;

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
        logo: String::new(),
        group_title: "News".to_string(),
        is_active: true,
        source_playlist_id: None,
        source_stalker_id: None,
        stalker_original_id: None,
        created_at: now,
        updated_at: now,
    }
}

fn portal(host: &str, mac: &str) -> StalkerPortal {
    let now = Utc::now();
    StalkerPortal {
        id: Uuid::new_v4(),
        name: format!("Portal {host}"),
        host: host.to_string(),
        mac_address: mac.to_string(),
        username: String::new(),
        password: String::new(),
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

#[tokio::test]
async fn duplicate_tvg_id_is_rejected_before_write() {
    let store = JsonStore::in_memory();
    store.insert_channel(channel("bbc1", "BBC One")).await.unwrap();
    let err = store
        .insert_channel(channel("bbc1", "Impostor"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
    assert_eq!(store.list_channels(None, None, None).await.len(), 1);
}

#[tokio::test]
async fn portal_host_mac_pair_is_unique() {
    let store = JsonStore::in_memory();
    store
        .insert_portal(portal("http://p.example", "00:1A:79:AB:CD:EF"))
        .await
        .unwrap();
    // same host, different MAC is fine
    store
        .insert_portal(portal("http://p.example", "00:1A:79:00:00:01"))
        .await
        .unwrap();
    // exact pair collides
    let err = store
        .insert_portal(portal("http://p.example", "00:1A:79:AB:CD:EF"))
        .await
        .unwrap_err();
    assert!(matches!(err, AppError::Validation { .. }));
}

#[tokio::test]
async fn group_filter_and_distinct_groups() {
    let store = JsonStore::in_memory();
    let mut sports = channel("s1", "Sports One");
    sports.group_title = "Sports".to_string();
    store.insert_channel(sports).await.unwrap();
    store.insert_channel(channel("n1", "News One")).await.unwrap();
    store.insert_channel(channel("n2", "News Two")).await.unwrap();

    assert_eq!(store.list_channels(Some("Sports"), None, None).await.len(), 1);
    assert_eq!(store.distinct_groups().await, vec!["News", "Sports"]);
}

#[tokio::test]
async fn title_search_is_case_insensitive_and_combines_with_group() {
    let store = JsonStore::in_memory();
    let mut sports = channel("s1", "Sky Sports News");
    sports.group_title = "Sports".to_string();
    store.insert_channel(sports).await.unwrap();
    store.insert_channel(channel("n1", "BBC News")).await.unwrap();
    store.insert_channel(channel("n2", "CNN")).await.unwrap();

    let hits = store.list_channels(None, None, Some("news")).await;
    assert_eq!(hits.len(), 2);
    assert!(hits.iter().all(|c| c.title.contains("News")));

    let narrowed = store.list_channels(Some("News"), None, Some("NEWS")).await;
    assert_eq!(narrowed.len(), 1);
    assert_eq!(narrowed[0].tvg_id, "n1");

    assert!(store.list_channels(None, None, Some("radio")).await.is_empty());
}

#[tokio::test]
async fn store_round_trips_through_its_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channels.json");

    {
        let store = JsonStore::open(path.clone()).await.unwrap();
        store.insert_channel(channel("bbc1", "BBC One")).await.unwrap();
        store
            .insert_portal(portal("http://p.example", "00:1A:79:AB:CD:EF"))
            .await
            .unwrap();
    }

    let reopened = JsonStore::open(path).await.unwrap();
    let channels = reopened.list_channels(None, None, None).await;
    assert_eq!(channels.len(), 1);
    assert_eq!(channels[0].tvg_id, "bbc1");
    assert_eq!(reopened.list_portals().await.len(), 1);
}

#[tokio::test]
async fn corrupt_store_file_fails_fast() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("channels.json");
    std::fs::write(&path, "{ not json").unwrap();

    let err = JsonStore::open(path).await.unwrap_err();
    assert!(matches!(err, AppError::Store { .. }));
}
