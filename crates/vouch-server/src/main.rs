//! vouch server binary.
//!
//! Reads `config.toml` (or the path given with `--config`) overlaid with
//! `VOUCH_*` environment variables, opens the SQLite store, and serves the
//! JSON API over HTTP.
//!
//! Run a single expiry sweep and exit with:
//!
//! ```sh
//! cargo run -p vouch-server -- --sweep-once
//! ```

use std::{
  path::{Path, PathBuf},
  sync::Arc,
};

use anyhow::Context as _;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use vouch_server::{Notifier, ServerConfig};
use vouch_service::ReferenceService;
use vouch_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "vouch reference-check server")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "config.toml")]
  config: PathBuf,

  /// Expire overdue requests once and exit.
  #[arg(long)]
  sweep_once: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let settings = config::Config::builder()
    .add_source(config::File::from(cli.config).required(false))
    .add_source(config::Environment::with_prefix("VOUCH"))
    .build()
    .context("failed to read config file")?;

  let server_cfg: ServerConfig = settings
    .try_deserialize()
    .context("failed to deserialise ServerConfig")?;

  let store_path = expand_tilde(&server_cfg.store_path);
  if let Some(parent) = store_path.parent()
    && !parent.as_os_str().is_empty()
  {
    tokio::fs::create_dir_all(parent)
      .await
      .with_context(|| format!("failed to create {parent:?}"))?;
  }

  let store = SqliteStore::open(&store_path)
    .await
    .with_context(|| format!("failed to open store at {store_path:?}"))?;

  let notifier = Notifier::from_config(&server_cfg).context("failed to build notifier")?;
  let service = Arc::new(ReferenceService::new(
    Arc::new(store),
    Arc::new(notifier),
    server_cfg.service_config(),
  ));

  if cli.sweep_once {
    let expired = service
      .sweep_expired()
      .await
      .context("expiry sweep failed")?;
    tracing::info!(expired, "expiry sweep complete");
    return Ok(());
  }

  if let Some(every) = server_cfg.sweep_interval() {
    vouch_server::spawn_expiry_sweeper(Arc::clone(&service), every);
  }

  let app = vouch_server::router(service);
  let address = server_cfg.address();

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
