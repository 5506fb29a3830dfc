//! JSON REST API for vouch.
//!
//! Exposes an axum [`Router`] backed by a [`ReferenceService`] over any
//! [`ReferenceStore`] and [`InviteNotifier`]. Auth, TLS, and transport
//! concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", vouch_api::api_router(service.clone()))
//! ```

pub mod candidates;
pub mod error;
pub mod kpi_sets;
pub mod references;
pub mod requests;

use std::sync::Arc;

use axum::{
  Router,
  routing::{get, post},
};
use vouch_core::{notify::InviteNotifier, store::ReferenceStore};
use vouch_service::ReferenceService;

pub use error::ApiError;

/// Shared handler state.
pub type ServiceState<S, N> = Arc<ReferenceService<S, N>>;

/// Build a fully-materialised API router for `service`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, N>(service: ServiceState<S, N>) -> Router<()>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Router::new()
    // Rubrics
    .route("/kpi-sets", post(kpi_sets::publish::<S, N>))
    .route("/kpi-sets/active", get(kpi_sets::active::<S, N>))
    .route("/kpi-sets/{id}", get(kpi_sets::get_one::<S, N>))
    .route("/kpi-sets/{id}/activate", post(kpi_sets::activate::<S, N>))
    // Request lifecycle
    .route("/reference-requests", post(requests::create::<S, N>))
    .route("/reference-requests/by-token/{token}", get(requests::resolve::<S, N>))
    .route(
      "/reference-requests/by-token/{token}/submit",
      post(requests::submit::<S, N>),
    )
    .route("/reference-requests/{id}/revoke", post(requests::revoke::<S, N>))
    // Integrity
    .route("/references/{id}/verify", get(references::verify::<S, N>))
    // Candidate views
    .route(
      "/candidates/{id}/reference-pack",
      get(candidates::reference_pack::<S, N>),
    )
    .route(
      "/candidates/{id}/kpi-aggregates",
      get(candidates::kpi_aggregates::<S, N>),
    )
    .route(
      "/candidates/{id}/reference-requests",
      get(candidates::reference_requests::<S, N>),
    )
    .with_state(service)
}
