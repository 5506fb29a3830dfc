//! Handlers for `/reference-requests` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/reference-requests` | 201; 422 if no rubric is active |
//! | `GET`  | `/reference-requests/by-token/{token}` | 404 / 409 / 410 per token state |
//! | `POST` | `/reference-requests/by-token/{token}/submit` | 201; 400 with every validation error |
//! | `POST` | `/reference-requests/{id}/revoke` | Body: `{"candidateId": "<uuid>"}` |

use axum::{
  Json,
  extract::{Path, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use vouch_core::{
  notify::InviteNotifier,
  request::ReferenceRequest,
  store::ReferenceStore,
  submission::SubmissionPayload,
};
use vouch_service::{NewReferenceRequest, ResolvedRequest};

use crate::{ServiceState, error::ApiError};

// ─── Create ──────────────────────────────────────────────────────────────────

/// `POST /reference-requests`
pub async fn create<S, N>(
  State(service): State<ServiceState<S, N>>,
  body: Result<Json<NewReferenceRequest>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let Json(body) = body?;
  let created = service.create_request(body).await?;
  Ok((StatusCode::CREATED, Json(created)))
}

// ─── Resolve ─────────────────────────────────────────────────────────────────

/// `GET /reference-requests/by-token/{token}`
pub async fn resolve<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(token): Path<String>,
) -> Result<Json<ResolvedRequest>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.resolve_by_token(&token).await?))
}

// ─── Submit ──────────────────────────────────────────────────────────────────

/// `POST /reference-requests/by-token/{token}/submit`
pub async fn submit<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(token): Path<String>,
  payload: Result<Json<SubmissionPayload>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let Json(payload) = payload?;
  let receipt = service.submit(&token, &payload).await?;
  Ok((StatusCode::CREATED, Json(receipt)))
}

// ─── Revoke ──────────────────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RevokeBody {
  pub candidate_id: Uuid,
}

/// `POST /reference-requests/{id}/revoke`
pub async fn revoke<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
  body: Result<Json<RevokeBody>, JsonRejection>,
) -> Result<Json<ReferenceRequest>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let Json(body) = body?;
  Ok(Json(service.revoke(id, body.candidate_id).await?))
}
