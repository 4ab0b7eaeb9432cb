//! remedy server binary.
//!
//! Reads `config.toml` (or the path given with `--config`), opens an
//! in-process SQLite store, serves the JSON API, and runs the subscription
//! notifier batch on a fixed interval.

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use clap::Parser;
use remedy_api::ApiState;
use remedy_core::{
  notify::{NotifierConfig, SubscriptionNotifier},
  service::CatalogService,
};
use remedy_server::{ServerConfig, geocode::HttpGeocoder, mail::LogMailer};
use remedy_store_sqlite::SqliteStore;
use tokio::net::TcpListener;
use tower_http::trace::TraceLayer;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about = "Remedy resource-matching server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  // Initialise tracing.
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  // Load configuration.
  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("REMEDY"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  // Open SQLite store.
  let store_path = expand_tilde(&server_cfg.store_path);
  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let geocoder = HttpGeocoder::new(
    server_cfg.geocoder_url.clone(),
    server_cfg.geocoder_timeout_secs,
  )
  .context("failed to build geocoder client")?;

  let notifier_cfg = NotifierConfig {
    max_distance_km: server_cfg.notify_max_distance_km,
    window_hours:    server_cfg.notify_window_hours,
  };

  // Build application state.
  let state = Arc::new(ApiState {
    catalog:  CatalogService::new(store.clone(), geocoder.clone()),
    notifier: SubscriptionNotifier::new(store, geocoder, LogMailer, notifier_cfg),
  });

  // Periodic notification batch.
  let worker = state.clone();
  let interval_secs = server_cfg.notify_interval_secs;
  tokio::spawn(async move {
    let mut interval = tokio::time::interval(Duration::from_secs(interval_secs));
    interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
    loop {
      interval.tick().await;
      if let Err(e) = worker.notifier.run_once().await {
        tracing::error!(error = %e, "notification batch failed");
      }
    }
  });

  let app = axum::Router::new()
    .nest("/api", remedy_api::api_router(state))
    .layer(TraceLayer::new_for_http());

  let address = format!("{}:{}", server_cfg.host, server_cfg.port);
  tracing::info!("Listening on http://{address}");
  let listener = TcpListener::bind(&address)
    .await
    .with_context(|| format!("failed to bind {address}"))?;

  axum::serve(listener, app).await.context("server error")?;

  Ok(())
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
