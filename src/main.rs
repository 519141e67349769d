use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use iptv_hub::{
    config::Config,
    scheduler::SchedulerService,
    stalker::{HttpStalkerClient, TokenManager},
    store::JsonStore,
    sync::{HttpPlaylistFetcher, SyncService},
    web::{AppState, create_router},
};

#[derive(Parser)]
#[command(name = "iptv-hub")]
#[command(about = "IPTV channel manager with M3U playlist generation and Stalker portal ingestion")]
#[command(long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, default_value = "config.toml")]
    config: String,

    /// Listening IP address
    #[arg(short = 'H', long, value_name = "IP")]
    host: Option<String>,

    /// Listening port
    #[arg(short, long, value_name = "PORT")]
    port: Option<u16>,

    /// Log level
    #[arg(short = 'v', long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_filter = format!("iptv_hub={}", cli.log_level);
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| log_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    info!("Starting IPTV hub v{}", env!("CARGO_PKG_VERSION"));

    let mut config = Config::load_from_file(&cli.config)?;
    info!("Configuration loaded from: {}", cli.config);
    if let Some(host) = cli.host {
        config.web.host = host;
    }
    if let Some(port) = cli.port {
        config.web.port = port;
    }
    let config = Arc::new(config);

    let store = JsonStore::open(config.storage.data_file.clone()).await?;

    let fetch_timeout = Duration::from_secs(config.ingestion.fetch_timeout_secs);
    let stalker_client = Arc::new(HttpStalkerClient::new(
        config.stalker.user_agent.clone(),
        fetch_timeout,
    ));
    let tokens = Arc::new(TokenManager::new(stalker_client.clone(), store.clone()));
    let sync = Arc::new(SyncService::new(
        store.clone(),
        Arc::new(HttpPlaylistFetcher::new(fetch_timeout)),
        stalker_client,
        tokens.clone(),
        &config.ingestion,
    ));

    let scheduler = SchedulerService::new(
        store.clone(),
        sync.clone(),
        tokens.clone(),
        config.scheduler.clone(),
        config.ingestion.default_sync_interval_secs,
    );
    tokio::spawn(scheduler.run());
    info!("Scheduler service started");

    let state = AppState::new(store, sync, tokens, config.clone());
    let app = create_router(state);

    let addr = format!("{}:{}", config.web.host, config.web.port);
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    info!("Listening on {addr}");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to install shutdown handler: {e}");
    }
    info!("Shutdown signal received");
}
