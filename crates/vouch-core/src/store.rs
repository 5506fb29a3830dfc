//! The `ReferenceStore` trait and supporting types.
//!
//! The trait is implemented by storage backends (e.g. `vouch-store-sqlite`).
//! Higher layers (`vouch-service`, `vouch-api`) depend on this abstraction,
//! not on any concrete backend.
//!
//! Cross-record consistency is carried by constraints, not transactions that
//! span calls: one reference per request, one score per (reference, KPI), one
//! active pointer per (role, seniority). Callers compose multi-step writes as
//! sagas with explicit compensation.

use std::future::Future;

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::{
  aggregate::KpiAggregate,
  reference::{Confidence, KpiScore, Reference},
  request::{ReferenceRequest, RequestStatus},
  rubric::{Kpi, KpiSet, NewKpiSet},
};

// ─── Errors ──────────────────────────────────────────────────────────────────

/// Backend errors must say whether they came from a uniqueness constraint.
pub trait StoreError: std::error::Error + Send + Sync + 'static {
  /// `true` if the write lost to an existing row under a unique constraint.
  fn is_conflict(&self) -> bool;
}

// ─── Query types ─────────────────────────────────────────────────────────────

/// Parameters for [`ReferenceStore::list_references`].
#[derive(Debug, Clone, Default)]
pub struct ReferenceQuery {
  pub candidate_id: Uuid,
  /// Reference-level confidence labels to admit; empty admits all.
  pub confidence:   Vec<Confidence>,
  pub limit:        Option<usize>,
}

/// A cached aggregate row set for one candidate.
#[derive(Debug, Clone)]
pub struct StoredAggregates {
  pub kpi_aggregates: Vec<KpiAggregate>,
  pub computed_at:    DateTime<Utc>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Abstraction over a vouch storage backend.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ReferenceStore: Send + Sync {
  type Error: StoreError;

  // ── Rubrics ───────────────────────────────────────────────────────────

  /// Write `input` as the next version for its (role, seniority) pair and
  /// point the active index at it. Both happen or neither does.
  fn publish_kpi_set(
    &self,
    input: NewKpiSet,
  ) -> impl Future<Output = Result<(KpiSet, Vec<Kpi>), Self::Error>> + Send + '_;

  /// Re-point the active index for the set's (role, seniority) at this set.
  /// Returns `None` if the set does not exist.
  fn activate_kpi_set(
    &self,
    kpi_set_id: Uuid,
  ) -> impl Future<Output = Result<Option<KpiSet>, Self::Error>> + Send + '_;

  /// The set the active index points at for (role, seniority), if any.
  fn active_kpi_set<'a>(
    &'a self,
    role: &'a str,
    seniority_level: &'a str,
  ) -> impl Future<Output = Result<Option<KpiSet>, Self::Error>> + Send + 'a;

  fn get_kpi_set(
    &self,
    kpi_set_id: Uuid,
  ) -> impl Future<Output = Result<Option<KpiSet>, Self::Error>> + Send + '_;

  /// KPIs of a set in definition order.
  fn list_kpis(
    &self,
    kpi_set_id: Uuid,
  ) -> impl Future<Output = Result<Vec<Kpi>, Self::Error>> + Send + '_;

  // ── Requests ──────────────────────────────────────────────────────────

  fn insert_request(
    &self,
    request: ReferenceRequest,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Option<ReferenceRequest>, Self::Error>> + Send + '_;

  /// Look a request up by the digest of its token. Backends must index the
  /// digest; they never see the plaintext.
  fn find_request_by_token_hash<'a>(
    &'a self,
    token_hash: &'a str,
  ) -> impl Future<Output = Result<Option<ReferenceRequest>, Self::Error>> + Send + 'a;

  /// A candidate's requests, newest first.
  fn list_requests(
    &self,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<Vec<ReferenceRequest>, Self::Error>> + Send + '_;

  /// Conditional status change: applies only if the current status is
  /// `from`. A request that already has a reference is never moved to
  /// `expired` or `revoked`. Returns whether a row changed.
  fn transition_request(
    &self,
    request_id: Uuid,
    from: RequestStatus,
    to: RequestStatus,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  /// Flip every pending request with `expires_at <= now` to `expired`,
  /// skipping requests that already have a reference.
  fn expire_overdue(
    &self,
    now: DateTime<Utc>,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── References ────────────────────────────────────────────────────────

  /// Insert a reference and advance the candidate's revision. A second
  /// reference for the same request must fail with an error whose
  /// [`StoreError::is_conflict`] is `true`.
  fn insert_reference(
    &self,
    reference: Reference,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Insert all scores for one reference as a single batch.
  fn insert_kpi_scores(
    &self,
    scores: Vec<KpiScore>,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Compensating delete for a submission that cannot stand. Advances the
  /// candidate's revision.
  fn delete_reference(
    &self,
    reference_id: Uuid,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  fn get_reference(
    &self,
    reference_id: Uuid,
  ) -> impl Future<Output = Result<Option<Reference>, Self::Error>> + Send + '_;

  /// The reference fulfilling a request, if one exists.
  fn reference_for_request(
    &self,
    request_id: Uuid,
  ) -> impl Future<Output = Result<Option<Uuid>, Self::Error>> + Send + '_;

  /// A candidate's references, newest first, filtered per `query`.
  fn list_references<'a>(
    &'a self,
    query: &'a ReferenceQuery,
  ) -> impl Future<Output = Result<Vec<Reference>, Self::Error>> + Send + 'a;

  /// Scores for any number of references.
  fn list_kpi_scores<'a>(
    &'a self,
    reference_ids: &'a [Uuid],
  ) -> impl Future<Output = Result<Vec<KpiScore>, Self::Error>> + Send + 'a;

  /// Monotonic counter of reference inserts and deletes for a candidate;
  /// `0` before the first.
  fn reference_revision(
    &self,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<u64, Self::Error>> + Send + '_;

  // ── Materialised aggregates ───────────────────────────────────────────

  /// Replace the cached aggregates for a candidate, unless the cached row
  /// was computed from a newer `revision`. Returns whether the write landed.
  fn put_kpi_aggregates(
    &self,
    candidate_id: Uuid,
    aggregates: Vec<KpiAggregate>,
    computed_at: DateTime<Utc>,
    revision: u64,
  ) -> impl Future<Output = Result<bool, Self::Error>> + Send + '_;

  fn get_kpi_aggregates(
    &self,
    candidate_id: Uuid,
  ) -> impl Future<Output = Result<Option<StoredAggregates>, Self::Error>> + Send + '_;
}
