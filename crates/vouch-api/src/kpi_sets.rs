//! Handlers for `/kpi-sets` endpoints.
//!
//! | Method | Path | Notes |
//! |--------|------|-------|
//! | `POST` | `/kpi-sets` | Publishes the next version and activates it |
//! | `GET`  | `/kpi-sets/active` | `?role=...&seniorityLevel=...`; 422 if none |
//! | `GET`  | `/kpi-sets/{id}` | Any version, active or not |
//! | `POST` | `/kpi-sets/{id}/activate` | Re-point the active index |

use axum::{
  Json,
  extract::{Path, Query, State, rejection::JsonRejection},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use uuid::Uuid;
use vouch_core::{
  notify::InviteNotifier,
  rubric::{KpiSet, NewKpiSet, Rubric},
  store::ReferenceStore,
};

use crate::{ServiceState, error::ApiError};

/// `POST /kpi-sets`
pub async fn publish<S, N>(
  State(service): State<ServiceState<S, N>>,
  body: Result<Json<NewKpiSet>, JsonRejection>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  let Json(body) = body?;
  let rubric = service.publish_kpi_set(body).await?;
  Ok((StatusCode::CREATED, Json(rubric)))
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ActiveParams {
  pub role:            String,
  pub seniority_level: String,
}

/// `GET /kpi-sets/active?role=<role>&seniorityLevel=<level>`
pub async fn active<S, N>(
  State(service): State<ServiceState<S, N>>,
  Query(params): Query<ActiveParams>,
) -> Result<Json<Rubric>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(
    service
      .active_rubric(&params.role, &params.seniority_level)
      .await?,
  ))
}

/// `GET /kpi-sets/{id}`
pub async fn get_one<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<Rubric>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.rubric(id).await?))
}

/// `POST /kpi-sets/{id}/activate`
pub async fn activate<S, N>(
  State(service): State<ServiceState<S, N>>,
  Path(id): Path<Uuid>,
) -> Result<Json<KpiSet>, ApiError>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier + 'static,
{
  Ok(Json(service.activate_kpi_set(id).await?))
}
