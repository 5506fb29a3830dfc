//! API error type and [`axum::response::IntoResponse`] implementation.
//!
//! Every error body carries a stable machine-readable `code` next to the
//! human-readable `error`. Validation failures add the full `errors` list.

use axum::{
  Json,
  extract::rejection::JsonRejection,
  http::StatusCode,
  response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use tracing::error;
use vouch_core::Error as CoreError;

/// An error returned by an API handler.
#[derive(Debug, Error)]
pub enum ApiError {
  #[error(transparent)]
  Core(#[from] CoreError),

  #[error("bad request: {0}")]
  BadRequest(String),

  /// The body was not JSON of the expected shape.
  #[error("malformed JSON body")]
  Json(#[from] JsonRejection),
}

impl ApiError {
  fn status_and_code(&self) -> (StatusCode, &'static str) {
    let err = match self {
      ApiError::Core(err) => err,
      ApiError::BadRequest(_) => return (StatusCode::BAD_REQUEST, "bad_request"),
      ApiError::Json(_) => return (StatusCode::BAD_REQUEST, "invalid_json"),
    };
    match err {
      CoreError::InvalidToken => (StatusCode::NOT_FOUND, "invalid_token"),
      CoreError::RequestNotFound(_) | CoreError::ReferenceNotFound(_) => {
        (StatusCode::NOT_FOUND, "not_found")
      }
      CoreError::KpiSetNotFound(_) => (StatusCode::NOT_FOUND, "kpi_set_not_found"),
      CoreError::AlreadySubmitted => (StatusCode::CONFLICT, "already_submitted"),
      CoreError::DuplicateSubmission => (StatusCode::CONFLICT, "duplicate_submission"),
      CoreError::IntegrityMismatch { .. } => (StatusCode::CONFLICT, "integrity_mismatch"),
      CoreError::Expired => (StatusCode::GONE, "expired"),
      CoreError::Revoked => (StatusCode::GONE, "revoked"),
      CoreError::Validation(_) => (StatusCode::BAD_REQUEST, "validation_failed"),
      CoreError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "invalid_request"),
      CoreError::NoActiveRubric { .. } => (StatusCode::UNPROCESSABLE_ENTITY, "no_active_rubric"),
      CoreError::NotRequestOwner(_) => (StatusCode::FORBIDDEN, "not_request_owner"),
      CoreError::Persistence(_) | CoreError::Serialization(_) => {
        (StatusCode::INTERNAL_SERVER_ERROR, "internal")
      }
    }
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let (status, code) = self.status_and_code();

    let body = match &self {
      ApiError::Core(CoreError::Validation(errors)) => json!({
        "error":  self.to_string(),
        "code":   code,
        "errors": errors,
      }),
      ApiError::Json(rejection) => json!({
        "error":  self.to_string(),
        "code":   code,
        "errors": [rejection.body_text()],
      }),
      _ if status.is_server_error() => {
        error!(error = %self, "internal error while handling request");
        json!({ "error": "internal server error", "code": code })
      }
      _ => json!({ "error": self.to_string(), "code": code }),
    };
    (status, Json(body)).into_response()
  }
}
