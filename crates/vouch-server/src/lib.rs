//! HTTP server wiring for vouch.
//!
//! Mounts the JSON API under `/api`, adds request tracing that never records
//! raw paths (invite tokens travel in the path), and runs the periodic expiry
//! sweep.

pub mod config;
pub mod notify;

pub use config::ServerConfig;
pub use notify::{LogNotifier, Notifier, NotifyError, WebhookNotifier};

use std::{sync::Arc, time::Duration};

use axum::{
  Router,
  body::Body,
  extract::MatchedPath,
  http::Request,
  routing::get,
};
use tokio::{task::JoinHandle, time::MissedTickBehavior};
use tower_http::trace::TraceLayer;
use tracing::{info, info_span, warn};
use vouch_core::{notify::InviteNotifier, store::ReferenceStore};
use vouch_service::ReferenceService;

// ─── Router ──────────────────────────────────────────────────────────────────

/// Build the top-level [`Router`] for the server.
pub fn router<S, N>(service: Arc<ReferenceService<S, N>>) -> Router
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let trace = TraceLayer::new_for_http().make_span_with(|req: &Request<Body>| {
    let route = req
      .extensions()
      .get::<MatchedPath>()
      .map(MatchedPath::as_str)
      .unwrap_or("<unmatched>");
    info_span!("http", method = %req.method(), route)
  });

  Router::new()
    .route("/health", get(|| async { "ok" }))
    .nest("/api", vouch_api::api_router(service))
    .layer(trace)
}

// ─── Expiry sweep ────────────────────────────────────────────────────────────

/// Expire overdue pending requests every `every`, starting immediately.
pub fn spawn_expiry_sweeper<S, N>(
  service: Arc<ReferenceService<S, N>>,
  every: Duration,
) -> JoinHandle<()>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  tokio::spawn(async move {
    let mut ticker = tokio::time::interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
      ticker.tick().await;
      match service.sweep_expired().await {
        Ok(0) => {}
        Ok(expired) => info!(expired, "expiry sweep complete"),
        Err(err) => warn!(error = %err, "expiry sweep failed"),
      }
    }
  })
}
