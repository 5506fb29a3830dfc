//! Handlers for `/candidates/{id}/...` read endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `GET`  | `/candidates/{id}/reference-pack` | `?includeEvidence&minConfidence&limit` |
//! | `GET`  | `/candidates/{id}/kpi-aggregates` | Cached path; `computedAt` is null on a miss |
//! | `GET`  | `/candidates/{id}/reference-requests` | Newest first |

use std::str::FromStr;

use axum::{
  Json,
  extract::{Path, Query, State},
};
use serde::Deserialize;
use uuid::Uuid;
use vouch_core::{
  aggregate::{CachedAggregates, PackOptions, ReferencePack},
  notify::InviteNotifier,
  reference::Confidence,
  request::ReferenceRequest,
  store::ReferenceStore,
};

use crate::{ServiceState, error::ApiError};

// ─── Reference pack ──────────────────────────────────────────────────────────

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PackParams {
  /// A bare `?includeEvidence` counts as `true`.
  pub include_evidence: Option<String>,
  pub min_confidence:   Option<String>,
  pub limit:            Option<usize>,
}

impl PackParams {
  fn into_options(self) -> Result<PackOptions, ApiError> {
    let min_confidence = self
      .min_confidence
      .as_deref()
      .map(|s| {
        Confidence::from_str(s).map_err(|_| {
          ApiError::BadRequest(format!("minConfidence must be one of high, medium, low; got {s:?}"))
        })
      })
      .transpose()?;
    let include_evidence = match self.include_evidence.as_deref().map(str::trim) {
      None | Some("false" | "0") => false,
      Some("" | "true" | "1") => true,
      Some(other) => {
        return Err(ApiError::BadRequest(format!(
          "includeEvidence must be true or false; got {other:?}"
        )));
      }
    };
    Ok(PackOptions {
      include_evidence,
      min_confidence,
      limit: self.limit,
    })
  }
}

/// `GET /candidates/{id}/reference-pack`
pub async fn reference_pack<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
  Query(params): Query<PackParams>,
) -> Result<Json<ReferencePack>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let options = params.into_options()?;
  Ok(Json(service.reference_pack(id, &options).await?))
}

// ─── Cached aggregates ───────────────────────────────────────────────────────

/// `GET /candidates/{id}/kpi-aggregates`
pub async fn kpi_aggregates<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<CachedAggregates>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.kpi_aggregates_fast(id).await?))
}

// ─── Requests ────────────────────────────────────────────────────────────────

/// `GET /candidates/{id}/reference-requests`
pub async fn reference_requests<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Vec<ReferenceRequest>>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.list_requests(id).await?))
}
