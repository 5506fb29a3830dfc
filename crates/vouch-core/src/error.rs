//! Error types for `vouch-core`.

use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum Error {
  // ── Token resolution ────────────────────────────────────────────────────
  #[error("invalid or unknown reference token")]
  InvalidToken,

  #[error("reference request has expired")]
  Expired,

  #[error("reference request has been revoked")]
  Revoked,

  #[error("reference has already been submitted")]
  AlreadySubmitted,

  // ── Rubric ──────────────────────────────────────────────────────────────
  #[error("no active KPI set for role {role:?} at seniority {seniority_level:?}")]
  NoActiveRubric {
    role:            String,
    seniority_level: String,
  },

  #[error("KPI set not found: {0}")]
  KpiSetNotFound(Uuid),

  // ── Submission ──────────────────────────────────────────────────────────
  /// Every violation found in a payload; never truncated to the first one.
  #[error("submission failed validation ({} problem(s))", .0.len())]
  Validation(Vec<String>),

  /// Lost the race on the one-reference-per-request uniqueness constraint.
  #[error("a reference for this request was submitted concurrently")]
  DuplicateSubmission,

  #[error("signature mismatch: computed {computed}, stored {stored}")]
  IntegrityMismatch { computed: String, stored: String },

  // ── Lookups and ownership ───────────────────────────────────────────────
  #[error("reference request not found: {0}")]
  RequestNotFound(Uuid),

  #[error("reference not found: {0}")]
  ReferenceNotFound(Uuid),

  #[error("reference request {0} belongs to another candidate")]
  NotRequestOwner(Uuid),

  #[error("invalid request: {0}")]
  InvalidRequest(String),

  // ── Infrastructure ──────────────────────────────────────────────────────
  #[error("persistence error: {0}")]
  Persistence(#[source] Box<dyn std::error::Error + Send + Sync>),

  #[error("serialization error: {0}")]
  Serialization(#[from] serde_json::Error),
}

impl Error {
  /// Wrap a backend error as [`Error::Persistence`].
  pub fn persistence<E>(err: E) -> Self
  where
    E: std::error::Error + Send + Sync + 'static,
  {
    Self::Persistence(Box::new(err))
  }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
