//! [`ReferenceService`]: request lifecycle, submission saga and read paths.

use std::{str::FromStr, sync::Arc};

use chrono::{DateTime, Duration, SubsecRound as _, Utc};
use serde::{Deserialize, Serialize};
use strum::VariantNames;
use tracing::{error, info, warn};
use uuid::Uuid;
use vouch_core::{
  Error, Result,
  aggregate::{self, CachedAggregates, PackOptions, ReferencePack},
  notify::InviteNotifier,
  request::{Invite, ReferenceRequest, RelationshipType, RequestStatus, invite_url},
  rubric::{Kpi, KpiSet, NewKpiSet, Rubric},
  signature::{self, VerifyOutcome},
  store::{ReferenceQuery, ReferenceStore, StoreError},
  submission::{self, SubmissionPayload},
  token,
};

use crate::{
  config::{MAX_EXPIRY_DAYS, ServiceConfig},
  refresh,
};

/// Longest token accepted for lookup; anything larger cannot be ours.
const MAX_TOKEN_LEN: usize = 256;

// ─── Inputs and outputs ──────────────────────────────────────────────────────

/// Body of a create-request call.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewReferenceRequest {
  pub candidate_id:      Uuid,
  pub referee_email:     String,
  #[serde(default)]
  pub referee_name:      Option<String>,
  /// Checked against [`RelationshipType`] so the caller gets the allowed set.
  pub relationship_type: String,
  pub role:              String,
  pub seniority_level:   String,
  #[serde(default)]
  pub expires_in_days:   Option<i64>,
}

/// Result of [`ReferenceService::create_request`].
///
/// The plaintext `token` is handed back to the caller once and is not
/// serialised; the invite URL already carries it.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreatedRequest {
  pub request_id:      Uuid,
  #[serde(skip_serializing)]
  pub token:           String,
  pub invite_url:      String,
  pub expires_at:      DateTime<Utc>,
  pub kpi_set_version: u32,
}

/// A token resolved to its request and the rubric locked at creation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResolvedRequest {
  pub request: ReferenceRequest,
  pub kpi_set: KpiSet,
  pub kpis:    Vec<Kpi>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SubmissionReceipt {
  pub reference_id:   Uuid,
  pub signature_hash: String,
  pub submitted_at:   DateTime<Utc>,
}

// ─── Service ─────────────────────────────────────────────────────────────────

pub struct ReferenceService<S, N> {
  store:    Arc<S>,
  notifier: Arc<N>,
  config:   ServiceConfig,
}

impl<S, N> Clone for ReferenceService<S, N> {
  fn clone(&self) -> Self {
    Self {
      store:    Arc::clone(&self.store),
      notifier: Arc::clone(&self.notifier),
      config:   self.config.clone(),
    }
  }
}

impl<S, N> ReferenceService<S, N>
where
  S: ReferenceStore + 'static,
  N: InviteNotifier,
{
  pub fn new(store: Arc<S>, notifier: Arc<N>, config: ServiceConfig) -> Self {
    Self { store, notifier, config }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn config(&self) -> &ServiceConfig { &self.config }

  // ── Rubrics ───────────────────────────────────────────────────────────────

  /// Publish a new rubric version and make it the active one.
  pub async fn publish_kpi_set(&self, input: NewKpiSet) -> Result<Rubric> {
    input.check()?;
    let (kpi_set, kpis) = self
      .store
      .publish_kpi_set(input)
      .await
      .map_err(Error::persistence)?;
    Ok(Rubric { kpi_set, kpis })
  }

  /// Point the active index back (or forward) at an existing version.
  pub async fn activate_kpi_set(&self, kpi_set_id: Uuid) -> Result<KpiSet> {
    let kpi_set = self
      .store
      .activate_kpi_set(kpi_set_id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::KpiSetNotFound(kpi_set_id))?;
    info!(
      %kpi_set_id,
      role = %kpi_set.role,
      seniority_level = %kpi_set.seniority_level,
      version = kpi_set.version,
      "activated KPI set"
    );
    Ok(kpi_set)
  }

  pub async fn rubric(&self, kpi_set_id: Uuid) -> Result<Rubric> {
    let kpi_set = self
      .store
      .get_kpi_set(kpi_set_id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::KpiSetNotFound(kpi_set_id))?;
    let kpis = self
      .store
      .list_kpis(kpi_set_id)
      .await
      .map_err(Error::persistence)?;
    Ok(Rubric { kpi_set, kpis })
  }

  pub async fn active_rubric(&self, role: &str, seniority_level: &str) -> Result<Rubric> {
    let kpi_set = self.require_active(role, seniority_level).await?;
    self.rubric(kpi_set.kpi_set_id).await
  }

  async fn require_active(&self, role: &str, seniority_level: &str) -> Result<KpiSet> {
    self
      .store
      .active_kpi_set(role, seniority_level)
      .await
      .map_err(Error::persistence)?
      .ok_or_else(|| Error::NoActiveRubric {
        role:            role.to_owned(),
        seniority_level: seniority_level.to_owned(),
      })
  }

  // ── Request lifecycle ─────────────────────────────────────────────────────

  /// Create a request locked to the currently active rubric and send the
  /// invitation. A failed send is logged; the request still stands.
  pub async fn create_request(&self, input: NewReferenceRequest) -> Result<CreatedRequest> {
    let referee_email = input.referee_email.trim().to_owned();
    if !looks_like_email(&referee_email) {
      return Err(Error::InvalidRequest("referee_email must be an email address".into()));
    }
    let relationship_type = RelationshipType::from_str(input.relationship_type.trim())
      .map_err(|_| {
        Error::InvalidRequest(format!(
          "relationship_type must be one of: {}",
          RelationshipType::VARIANTS.join(", ")
        ))
      })?;
    let role = input.role.trim().to_owned();
    let seniority_level = input.seniority_level.trim().to_owned();
    if role.is_empty() || seniority_level.is_empty() {
      return Err(Error::InvalidRequest(
        "role and seniority_level must be non-empty".into(),
      ));
    }
    let days = input
      .expires_in_days
      .unwrap_or(i64::from(self.config.default_expiry_days));
    if !(1..=i64::from(MAX_EXPIRY_DAYS)).contains(&days) {
      return Err(Error::InvalidRequest(format!(
        "expires_in_days must be between 1 and {MAX_EXPIRY_DAYS}"
      )));
    }

    let kpi_set = self.require_active(&role, &seniority_level).await?;

    let issued = token::issue();
    let now = Utc::now().trunc_subsecs(6);
    let request = ReferenceRequest {
      request_id: Uuid::new_v4(),
      candidate_id: input.candidate_id,
      referee_email,
      referee_name: input
        .referee_name
        .map(|n| n.trim().to_owned())
        .filter(|n| !n.is_empty()),
      relationship_type,
      role,
      seniority_level,
      kpi_set_id: kpi_set.kpi_set_id,
      kpi_set_version: kpi_set.version,
      token_hash: issued.hash.clone(),
      expires_at: now + Duration::days(days),
      status: RequestStatus::Pending,
      created_at: now,
    };

    self
      .store
      .insert_request(request.clone())
      .await
      .map_err(|err| {
        error!(
          candidate_id = %request.candidate_id,
          error = %err,
          "failed to store reference request"
        );
        Error::persistence(err)
      })?;

    info!(
      request_id = %request.request_id,
      candidate_id = %request.candidate_id,
      kpi_set_version = request.kpi_set_version,
      token = token::hash_prefix(&issued.hash),
      "created reference request"
    );

    let invite = Invite {
      request_id:      request.request_id,
      candidate_id:    request.candidate_id,
      referee_email:   request.referee_email.clone(),
      referee_name:    request.referee_name.clone(),
      role:            request.role.clone(),
      seniority_level: request.seniority_level.clone(),
      invite_url:      invite_url(&self.config.frontend_base_url, &issued.plaintext),
      expires_at:      request.expires_at,
    };
    if let Err(err) = self.notifier.send_invite(&invite).await {
      warn!(
        request_id = %request.request_id,
        error = %err,
        "invite delivery failed; request kept"
      );
    }

    Ok(CreatedRequest {
      request_id:      request.request_id,
      invite_url:      invite.invite_url,
      token:           issued.plaintext,
      expires_at:      request.expires_at,
      kpi_set_version: request.kpi_set_version,
    })
  }

  /// Resolve a bearer token to its open request and the locked rubric.
  pub async fn resolve_by_token(&self, token: &str) -> Result<ResolvedRequest> {
    let request = self.open_request(self.lookup_token(token).await?).await?;
    let Rubric { kpi_set, kpis } = self.rubric(request.kpi_set_id).await?;
    Ok(ResolvedRequest { request, kpi_set, kpis })
  }

  /// Withdraw a pending request. Only the candidate who created it may do so;
  /// the rubric lock stays on the row.
  pub async fn revoke(&self, request_id: Uuid, candidate_id: Uuid) -> Result<ReferenceRequest> {
    let request = self
      .store
      .get_request(request_id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::RequestNotFound(request_id))?;
    if request.candidate_id != candidate_id {
      return Err(Error::NotRequestOwner(request_id));
    }
    let request = self.open_request(request).await?;

    let changed = self
      .store
      .transition_request(request_id, RequestStatus::Pending, RequestStatus::Revoked)
      .await
      .map_err(Error::persistence)?;
    if !changed {
      return Err(self.current_state_error(request_id).await);
    }

    info!(%request_id, %candidate_id, "revoked reference request");
    Ok(ReferenceRequest { status: RequestStatus::Revoked, ..request })
  }

  /// Flip every overdue pending request to expired.
  pub async fn sweep_expired(&self) -> Result<u64> {
    let expired = self
      .store
      .expire_overdue(Utc::now())
      .await
      .map_err(Error::persistence)?;
    if expired > 0 {
      info!(expired, "expiry sweep flipped overdue requests");
    }
    Ok(expired)
  }

  /// A candidate's requests, newest first.
  pub async fn list_requests(&self, candidate_id: Uuid) -> Result<Vec<ReferenceRequest>> {
    self
      .store
      .list_requests(candidate_id)
      .await
      .map_err(Error::persistence)
  }

  async fn lookup_token(&self, token: &str) -> Result<ReferenceRequest> {
    let token = token.trim();
    if token.is_empty() || token.len() > MAX_TOKEN_LEN {
      return Err(Error::InvalidToken);
    }
    let hash = token::hash_token(token);
    match self
      .store
      .find_request_by_token_hash(&hash)
      .await
      .map_err(Error::persistence)?
    {
      Some(request) if token::constant_time_eq(&request.token_hash, &hash) => Ok(request),
      _ => Err(Error::InvalidToken),
    }
  }

  /// Check that `request` can still be fulfilled, expiring it lazily if its
  /// deadline has passed.
  async fn open_request(&self, request: ReferenceRequest) -> Result<ReferenceRequest> {
    if let Some(err) = closed_error(request.status) {
      return Err(err);
    }

    // The reference row, not the status column, says whether the request
    // was fulfilled.
    if self
      .store
      .reference_for_request(request.request_id)
      .await
      .map_err(Error::persistence)?
      .is_some()
    {
      return Err(Error::AlreadySubmitted);
    }

    if request.is_overdue(Utc::now()) {
      let flipped = self
        .store
        .transition_request(request.request_id, RequestStatus::Pending, RequestStatus::Expired)
        .await
        .map_err(Error::persistence)?;
      if flipped {
        info!(request_id = %request.request_id, "reference request expired");
      }
      return Err(Error::Expired);
    }

    Ok(request)
  }

  /// The error matching a request's status after a conditional update lost.
  async fn current_state_error(&self, request_id: Uuid) -> Error {
    match self.store.get_request(request_id).await {
      Ok(Some(current)) => closed_error(current.status).unwrap_or(Error::AlreadySubmitted),
      Ok(None) => Error::RequestNotFound(request_id),
      Err(err) => Error::persistence(err),
    }
  }

  // ── Submission saga ───────────────────────────────────────────────────────

  /// Validate and store a referee's submission.
  ///
  /// Writes the reference, then its scores. If the score batch fails the
  /// reference is deleted again before the error is returned. If the request
  /// was revoked or expired while the rows were being written, the reference
  /// is deleted and the matching error returned. Otherwise the status flip
  /// and cache refresh that follow are best-effort.
  pub async fn submit(&self, token: &str, payload: &SubmissionPayload) -> Result<SubmissionReceipt> {
    let request = self.open_request(self.lookup_token(token).await?).await?;
    let request_id = request.request_id;

    let kpis = self
      .store
      .list_kpis(request.kpi_set_id)
      .await
      .map_err(Error::persistence)?;
    let validated = submission::accept(payload, &request, &kpis).inspect_err(|err| {
      if let Error::Validation(problems) = err {
        info!(%request_id, problems = problems.len(), "submission rejected");
      }
    })?;

    let reference_id = Uuid::new_v4();
    let submitted_at = Utc::now().trunc_subsecs(6);
    let (reference, scores) = validated.into_records(&request, reference_id, submitted_at)?;
    let signature_hash = reference.signature_hash.clone();

    if let Err(err) = self.store.insert_reference(reference).await {
      if err.is_conflict() {
        warn!(%request_id, "concurrent submission won the race");
        return Err(Error::DuplicateSubmission);
      }
      error!(%request_id, error = %err, "failed to insert reference");
      return Err(Error::persistence(err));
    }

    if let Err(err) = self.store.insert_kpi_scores(scores).await {
      error!(
        %request_id,
        %reference_id,
        error = %err,
        "failed to insert KPI scores; deleting reference"
      );
      self.undo_reference(request_id, reference_id).await;
      return Err(Error::persistence(err));
    }

    match self
      .store
      .transition_request(request_id, RequestStatus::Pending, RequestStatus::Submitted)
      .await
    {
      Ok(true) => {}
      Ok(false) => {
        if let Some(err) = self.closed_during_submit(request_id, reference_id).await {
          refresh::spawn_refresh(
            Arc::clone(&self.store),
            request.candidate_id,
            self.config.refresh.clone(),
          );
          return Err(err);
        }
      }
      Err(err) => warn!(%request_id, error = %err, "status flip failed; reference stands"),
    }

    info!(
      %request_id,
      %reference_id,
      candidate_id = %request.candidate_id,
      kpi_set_version = request.kpi_set_version,
      "reference submitted"
    );

    refresh::spawn_refresh(
      Arc::clone(&self.store),
      request.candidate_id,
      self.config.refresh.clone(),
    );

    Ok(SubmissionReceipt { reference_id, signature_hash, submitted_at })
  }

  /// Called when the flip to `submitted` lost. Deletes the reference and
  /// returns the error to report if the request was revoked or expired in
  /// the meantime; `None` means the reference stands.
  async fn closed_during_submit(&self, request_id: Uuid, reference_id: Uuid) -> Option<Error> {
    let status = match self.store.get_request(request_id).await {
      Ok(Some(current)) => current.status,
      Ok(None) => {
        warn!(%request_id, "request vanished at status flip; reference stands");
        return None;
      }
      Err(err) => {
        warn!(%request_id, error = %err, "status re-read failed; reference stands");
        return None;
      }
    };

    match status {
      RequestStatus::Expired | RequestStatus::Revoked => {
        warn!(
          %request_id,
          %reference_id,
          %status,
          "request closed during submission; deleting reference"
        );
        self.undo_reference(request_id, reference_id).await;
        closed_error(status)
      }
      RequestStatus::Pending | RequestStatus::Submitted => {
        warn!(%request_id, %status, "request was no longer pending at status flip");
        None
      }
    }
  }

  async fn undo_reference(&self, request_id: Uuid, reference_id: Uuid) {
    if let Err(undo) = self.store.delete_reference(reference_id).await {
      error!(
        %request_id,
        %reference_id,
        error = %undo,
        "compensating delete failed; reference left in place"
      );
    }
  }

  // ── Integrity ─────────────────────────────────────────────────────────────

  /// Recompute a stored reference's signature.
  pub async fn verify(&self, reference_id: Uuid) -> Result<VerifyOutcome> {
    let reference = self
      .store
      .get_reference(reference_id)
      .await
      .map_err(Error::persistence)?
      .ok_or(Error::ReferenceNotFound(reference_id))?;
    let scores = self
      .store
      .list_kpi_scores(&[reference_id])
      .await
      .map_err(Error::persistence)?;

    let outcome = signature::verify(&reference, &scores)?;
    if !outcome.valid {
      warn!(%reference_id, "stored reference fails signature check");
    }
    Ok(outcome)
  }

  // ── Aggregation ───────────────────────────────────────────────────────────

  /// The real-time path: load, filter and aggregate in one call. Every
  /// admitted reference feeds the aggregates; `limit` only trims the list.
  pub async fn reference_pack(
    &self,
    candidate_id: Uuid,
    options: &PackOptions,
  ) -> Result<ReferencePack> {
    let query = ReferenceQuery {
      candidate_id,
      confidence: options.admitted_confidence(),
      limit: None,
    };
    let references = self
      .store
      .list_references(&query)
      .await
      .map_err(Error::persistence)?;
    let ids: Vec<Uuid> = references.iter().map(|r| r.reference_id).collect();
    let scores = self
      .store
      .list_kpi_scores(&ids)
      .await
      .map_err(Error::persistence)?;

    Ok(aggregate::build_pack(candidate_id, references, scores, options))
  }

  /// The cached path. A candidate with no cache row yet is computed on the
  /// spot and reported with no `computed_at`.
  pub async fn kpi_aggregates_fast(&self, candidate_id: Uuid) -> Result<CachedAggregates> {
    let cached = self
      .store
      .get_kpi_aggregates(candidate_id)
      .await
      .map_err(Error::persistence)?;
    if let Some(stored) = cached {
      return Ok(CachedAggregates {
        candidate_id,
        kpi_aggregates: stored.kpi_aggregates,
        computed_at: Some(stored.computed_at),
      });
    }

    let kpi_aggregates = refresh::live_aggregates(self.store.as_ref(), candidate_id)
      .await
      .map_err(Error::persistence)?;
    Ok(CachedAggregates { candidate_id, kpi_aggregates, computed_at: None })
  }
}

/// The error a request in a terminal `status` resolves to.
fn closed_error(status: RequestStatus) -> Option<Error> {
  match status {
    RequestStatus::Pending => None,
    RequestStatus::Submitted => Some(Error::AlreadySubmitted),
    RequestStatus::Expired => Some(Error::Expired),
    RequestStatus::Revoked => Some(Error::Revoked),
  }
}

fn looks_like_email(s: &str) -> bool {
  match s.split_once('@') {
    Some((local, domain)) => {
      !local.is_empty()
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.')
        && !s.chars().any(char::is_whitespace)
    }
    None => false,
  }
}
