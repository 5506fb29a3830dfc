//! Materialised aggregate refresh.
//!
//! After a submission the service spawns [`spawn_refresh`] and returns without
//! waiting. The task recomputes the candidate's per-KPI aggregates from every
//! stored reference and replaces the cache row, retrying with backoff. A
//! refresh that exhausts its attempts is logged and dropped; the cached path
//! is allowed to lag.
//!
//! Each write is tagged with the candidate's reference revision as read
//! before loading, so a slow refresh never overwrites a newer one.

use std::sync::Arc;

use chrono::{SubsecRound as _, Utc};
use tokio::task::JoinHandle;
use tracing::{debug, warn};
use uuid::Uuid;
use vouch_core::{
  aggregate::{self, KpiAggregate},
  store::{ReferenceQuery, ReferenceStore},
};

use crate::config::RetryPolicy;

/// Compute a candidate's aggregates from all of their references.
pub async fn live_aggregates<S: ReferenceStore>(
  store: &S,
  candidate_id: Uuid,
) -> Result<Vec<KpiAggregate>, S::Error> {
  let query = ReferenceQuery { candidate_id, ..Default::default() };
  let references = store.list_references(&query).await?;
  let ids: Vec<Uuid> = references.iter().map(|r| r.reference_id).collect();
  let scores = store.list_kpi_scores(&ids).await?;
  Ok(aggregate::kpi_aggregates(&scores))
}

/// Recompute and store a candidate's aggregates. The cache keeps whichever
/// write saw the newer revision.
pub async fn recompute<S: ReferenceStore>(
  store: &S,
  candidate_id: Uuid,
) -> Result<Vec<KpiAggregate>, S::Error> {
  let revision = store.reference_revision(candidate_id).await?;
  let aggregates = live_aggregates(store, candidate_id).await?;
  let stored = store
    .put_kpi_aggregates(
      candidate_id,
      aggregates.clone(),
      Utc::now().trunc_subsecs(6),
      revision,
    )
    .await?;
  if !stored {
    debug!(%candidate_id, revision, "newer aggregates already cached");
  }
  Ok(aggregates)
}

/// Run [`recompute`] in a detached task under `policy`.
///
/// The handle resolves to `true` if an attempt succeeded. Callers normally
/// drop it.
pub fn spawn_refresh<S>(store: Arc<S>, candidate_id: Uuid, policy: RetryPolicy) -> JoinHandle<bool>
where
  S: ReferenceStore + 'static,
{
  tokio::spawn(async move {
    let attempts = policy.attempts();
    for attempt in 1..=attempts {
      match recompute(store.as_ref(), candidate_id).await {
        Ok(aggregates) => {
          debug!(%candidate_id, kpis = aggregates.len(), attempt, "refreshed cached aggregates");
          return true;
        }
        Err(err) if attempt < attempts => {
          let delay = policy.backoff(attempt);
          debug!(
            %candidate_id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %err,
            "aggregate refresh failed; retrying"
          );
          tokio::time::sleep(delay).await;
        }
        Err(err) => {
          warn!(%candidate_id, attempts, error = %err, "aggregate refresh abandoned");
        }
      }
    }
    false
  })
}
