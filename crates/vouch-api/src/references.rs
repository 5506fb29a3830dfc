//! `GET /references/{id}/verify`: recompute a stored reference's signature.
//!
//! A mismatch is reported as `200 {"valid": false, ...}`; 404 if the
//! reference does not exist.

use axum::{
  Json,
  extract::{Path, State},
};
use uuid::Uuid;
use vouch_core::{notify::InviteNotifier, signature::VerifyOutcome, store::ReferenceStore};

use crate::{ServiceState, error::ApiError};

pub async fn verify<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<VerifyOutcome>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.verify(id).await?))
}
