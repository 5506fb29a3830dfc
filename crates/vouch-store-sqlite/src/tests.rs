//! Integration tests for `SqliteStore` against an in-memory database.

use chrono::{Duration, TimeZone, Utc};
use uuid::Uuid;
use vouch_core::{
  aggregate::{ConfidenceBreakdown, KpiAggregate},
  reference::{Confidence, KpiScore, Reference, RehireDecision},
  request::{ReferenceRequest, RelationshipType, RequestStatus},
  rubric::{Kpi, KpiSet, NewKpi, NewKpiSet},
  store::{ReferenceQuery, ReferenceStore, StoreError},
  token,
};

use crate::SqliteStore;

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

fn new_set(role: &str, keys: &[&str]) -> NewKpiSet {
  NewKpiSet {
    role:            role.into(),
    seniority_level: "senior".into(),
    kpis:            keys
      .iter()
      .map(|k| NewKpi {
        key:                 (*k).into(),
        name:                k.replace('_', " "),
        category:            None,
        required:            true,
        weight:              1.0,
        min_evidence_length: None,
      })
      .collect(),
  }
}

fn request_for(set: &KpiSet, candidate_id: Uuid) -> ReferenceRequest {
  let now = Utc::now();
  ReferenceRequest {
    request_id: Uuid::new_v4(),
    candidate_id,
    referee_email: "referee@example.com".into(),
    referee_name: Some("Ref Eree".into()),
    relationship_type: RelationshipType::Manager,
    role: set.role.clone(),
    seniority_level: set.seniority_level.clone(),
    kpi_set_id: set.kpi_set_id,
    kpi_set_version: set.version,
    token_hash: token::issue().hash,
    expires_at: now + Duration::days(30),
    status: RequestStatus::Pending,
    created_at: now,
  }
}

fn reference_for(request: &ReferenceRequest, confidence: Confidence) -> Reference {
  Reference {
    reference_id:           Uuid::new_v4(),
    reference_request_id:   request.request_id,
    candidate_id:           request.candidate_id,
    referee_id:             None,
    referee_email:          request.referee_email.clone(),
    relationship_type:      request.relationship_type,
    start_date:             None,
    end_date:               None,
    overall_recommendation: None,
    rehire_decision:        RehireDecision::Yes,
    rehire_reasoning:       None,
    confidence_level:       confidence,
    kpi_set_id:             request.kpi_set_id,
    kpi_set_version:        request.kpi_set_version,
    completeness_score:     Some(100.0),
    signature_hash:         "0".repeat(64),
    submitted_at:           Utc.with_ymd_and_hms(2024, 5, 1, 9, 30, 0).unwrap(),
  }
}

fn score_for(reference: &Reference, kpi: &Kpi, score: u8) -> KpiScore {
  KpiScore {
    score_id:          Uuid::new_v4(),
    reference_id:      reference.reference_id,
    kpi_id:            kpi.kpi_id,
    kpi_key:           kpi.key.clone(),
    kpi_name:          kpi.name.clone(),
    score,
    evidence_text:     "x".repeat(220),
    confidence_level:  reference.confidence_level,
    evidence_metadata: None,
  }
}

// ─── Rubrics ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn publish_assigns_increasing_versions() {
  let s = store().await;

  let (v1, kpis) = s
    .publish_kpi_set(new_set("backend_engineer", &["system_design", "code_quality"]))
    .await
    .unwrap();
  assert_eq!(v1.version, 1);
  assert!(v1.active);
  assert_eq!(kpis.len(), 2);

  let (v2, _) = s
    .publish_kpi_set(new_set("backend_engineer", &["system_design"]))
    .await
    .unwrap();
  assert_eq!(v2.version, 2);

  let (other, _) = s
    .publish_kpi_set(new_set("designer", &["craft"]))
    .await
    .unwrap();
  assert_eq!(other.version, 1);
}

#[tokio::test]
async fn publishing_moves_the_active_pointer() {
  let s = store().await;
  let (v1, _) = s.publish_kpi_set(new_set("pm", &["roadmap"])).await.unwrap();
  let (v2, _) = s.publish_kpi_set(new_set("pm", &["roadmap"])).await.unwrap();

  let active = s.active_kpi_set("pm", "senior").await.unwrap().unwrap();
  assert_eq!(active.kpi_set_id, v2.kpi_set_id);

  let old = s.get_kpi_set(v1.kpi_set_id).await.unwrap().unwrap();
  assert!(!old.active);
  assert_eq!(old.version, 1);
}

#[tokio::test]
async fn activate_re_points_to_an_older_version() {
  let s = store().await;
  let (v1, _) = s.publish_kpi_set(new_set("pm", &["roadmap"])).await.unwrap();
  s.publish_kpi_set(new_set("pm", &["roadmap"])).await.unwrap();

  let activated = s.activate_kpi_set(v1.kpi_set_id).await.unwrap().unwrap();
  assert!(activated.active);

  let active = s.active_kpi_set("pm", "senior").await.unwrap().unwrap();
  assert_eq!(active.kpi_set_id, v1.kpi_set_id);
  assert_eq!(active.version, 1);
}

#[tokio::test]
async fn activate_unknown_set_returns_none() {
  let s = store().await;
  assert!(s.activate_kpi_set(Uuid::new_v4()).await.unwrap().is_none());
}

#[tokio::test]
async fn missing_active_set_returns_none() {
  let s = store().await;
  assert!(s.active_kpi_set("nobody", "junior").await.unwrap().is_none());
}

#[tokio::test]
async fn kpis_keep_definition_order() {
  let s = store().await;
  let (set, _) = s
    .publish_kpi_set(new_set("sre", &["zeta", "alpha", "mid"]))
    .await
    .unwrap();

  let kpis = s.list_kpis(set.kpi_set_id).await.unwrap();
  let keys: Vec<_> = kpis.iter().map(|k| k.key.as_str()).collect();
  assert_eq!(keys, ["zeta", "alpha", "mid"]);
  assert!(kpis.iter().all(|k| k.min_evidence_length == 200));
}

#[tokio::test]
async fn invalid_kpi_set_is_rejected() {
  let s = store().await;
  let err = s.publish_kpi_set(new_set("sre", &[])).await.unwrap_err();
  assert!(matches!(
    err,
    crate::Error::Core(vouch_core::Error::InvalidRequest(_))
  ));
}

// ─── Requests ────────────────────────────────────────────────────────────────

#[tokio::test]
async fn request_round_trips_and_is_found_by_hash() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();

  let fetched = s.get_request(req.request_id).await.unwrap().unwrap();
  assert_eq!(fetched.kpi_set_version, 1);
  assert_eq!(fetched.status, RequestStatus::Pending);
  assert_eq!(fetched.token_hash, req.token_hash);

  let by_hash = s
    .find_request_by_token_hash(&req.token_hash)
    .await
    .unwrap()
    .unwrap();
  assert_eq!(by_hash.request_id, req.request_id);

  assert!(
    s.find_request_by_token_hash(&"f".repeat(64))
      .await
      .unwrap()
      .is_none()
  );
}

#[tokio::test]
async fn transition_is_conditional_on_current_status() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();

  let first = s
    .transition_request(req.request_id, RequestStatus::Pending, RequestStatus::Submitted)
    .await
    .unwrap();
  assert!(first);

  let second = s
    .transition_request(req.request_id, RequestStatus::Pending, RequestStatus::Revoked)
    .await
    .unwrap();
  assert!(!second);

  let fetched = s.get_request(req.request_id).await.unwrap().unwrap();
  assert_eq!(fetched.status, RequestStatus::Submitted);
}

#[tokio::test]
async fn expire_overdue_only_touches_pending_past_deadline() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let candidate = Uuid::new_v4();

  let mut overdue = request_for(&set, candidate);
  overdue.expires_at = Utc::now() - Duration::hours(1);
  let fresh = request_for(&set, candidate);
  let mut done = request_for(&set, candidate);
  done.expires_at = Utc::now() - Duration::hours(1);
  done.status = RequestStatus::Submitted;

  for r in [&overdue, &fresh, &done] {
    s.insert_request(r.clone()).await.unwrap();
  }

  assert_eq!(s.expire_overdue(Utc::now()).await.unwrap(), 1);
  let after = s.get_request(overdue.request_id).await.unwrap().unwrap();
  assert_eq!(after.status, RequestStatus::Expired);
  let untouched = s.get_request(done.request_id).await.unwrap().unwrap();
  assert_eq!(untouched.status, RequestStatus::Submitted);

  assert_eq!(s.expire_overdue(Utc::now()).await.unwrap(), 0);
}

#[tokio::test]
async fn request_with_a_reference_is_never_closed() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let mut req = request_for(&set, Uuid::new_v4());
  req.expires_at = Utc::now() - Duration::hours(1);
  s.insert_request(req.clone()).await.unwrap();
  s.insert_reference(reference_for(&req, Confidence::High))
    .await
    .unwrap();

  for to in [RequestStatus::Revoked, RequestStatus::Expired] {
    let closed = s
      .transition_request(req.request_id, RequestStatus::Pending, to)
      .await
      .unwrap();
    assert!(!closed, "{to} applied over a stored reference");
  }
  assert_eq!(s.expire_overdue(Utc::now()).await.unwrap(), 0);

  let submitted = s
    .transition_request(req.request_id, RequestStatus::Pending, RequestStatus::Submitted)
    .await
    .unwrap();
  assert!(submitted);
}

#[test]
fn label_columns_reject_unknown_values() {
  let conn = rusqlite::Connection::open_in_memory().unwrap();
  conn.execute_batch(crate::schema::SCHEMA).unwrap();
  conn
    .execute(
      "INSERT INTO kpi_sets VALUES ('set', 'sre', 'senior', 1, '2024-01-01T00:00:00Z')",
      [],
    )
    .unwrap();

  let insert_request = |id: &str, relationship: &str, status: &str| {
    conn.execute(
      "INSERT INTO reference_requests (
         request_id, candidate_id, referee_email, relationship_type, role,
         seniority_level, kpi_set_id, kpi_set_version, token_hash, expires_at,
         status, created_at
       ) VALUES (?1, 'c', 'r@example.com', ?2, 'sre', 'senior', 'set', 1, ?1,
                 '2024-02-01T00:00:00Z', ?3, '2024-01-01T00:00:00Z')",
      rusqlite::params![id, relationship, status],
    )
  };
  insert_request("ok", "manager", "pending").unwrap();
  assert!(insert_request("bad-status", "manager", "archived").is_err());
  assert!(insert_request("bad-relationship", "friend", "pending").is_err());

  let insert_reference = |id: &str, rehire: &str, confidence: &str, recommendation: Option<&str>| {
    conn.execute(
      "INSERT INTO submitted_references (
         reference_id, reference_request_id, candidate_id, referee_email,
         relationship_type, overall_recommendation, rehire_decision,
         confidence_level, kpi_set_id, kpi_set_version, signature_hash, submitted_at
       ) VALUES (?1, 'ok', 'c', 'r@example.com', 'manager', ?4, ?2, ?3, 'set', 1,
                 'sig', '2024-01-02T00:00:00Z')",
      rusqlite::params![id, rehire, confidence, recommendation],
    )
  };
  assert!(insert_reference("r1", "maybe", "high", None).is_err());
  assert!(insert_reference("r2", "yes", "certain", None).is_err());
  assert!(insert_reference("r3", "yes", "high", Some("adore")).is_err());
  insert_reference("r4", "conditional", "low", None).unwrap();
}

#[tokio::test]
async fn list_requests_newest_first() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let candidate = Uuid::new_v4();

  let mut older = request_for(&set, candidate);
  older.created_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  let newer = request_for(&set, candidate);
  s.insert_request(older.clone()).await.unwrap();
  s.insert_request(newer.clone()).await.unwrap();
  s.insert_request(request_for(&set, Uuid::new_v4())).await.unwrap();

  let listed = s.list_requests(candidate).await.unwrap();
  assert_eq!(listed.len(), 2);
  assert_eq!(listed[0].request_id, newer.request_id);
  assert_eq!(listed[1].request_id, older.request_id);
}

// ─── References ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn second_reference_for_a_request_is_a_conflict() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();

  s.insert_reference(reference_for(&req, Confidence::High))
    .await
    .unwrap();
  let err = s
    .insert_reference(reference_for(&req, Confidence::High))
    .await
    .unwrap_err();
  assert!(err.is_conflict());
}

#[tokio::test]
async fn score_out_of_range_fails_the_whole_batch() {
  let s = store().await;
  let (set, kpis) = s
    .publish_kpi_set(new_set("sre", &["oncall", "automation"]))
    .await
    .unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();
  let reference = reference_for(&req, Confidence::High);
  s.insert_reference(reference.clone()).await.unwrap();

  let good = score_for(&reference, &kpis[0], 4);
  let bad = score_for(&reference, &kpis[1], 9);
  let err = s.insert_kpi_scores(vec![good, bad]).await.unwrap_err();
  assert!(!err.is_conflict());

  let stored = s.list_kpi_scores(&[reference.reference_id]).await.unwrap();
  assert!(stored.is_empty());
}

#[tokio::test]
async fn delete_reference_removes_scores_and_frees_the_request() {
  let s = store().await;
  let (set, kpis) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();
  let reference = reference_for(&req, Confidence::High);
  s.insert_reference(reference.clone()).await.unwrap();
  s.insert_kpi_scores(vec![score_for(&reference, &kpis[0], 5)])
    .await
    .unwrap();

  s.delete_reference(reference.reference_id).await.unwrap();

  assert!(s.get_reference(reference.reference_id).await.unwrap().is_none());
  assert!(s.reference_for_request(req.request_id).await.unwrap().is_none());
  assert!(
    s.list_kpi_scores(&[reference.reference_id])
      .await
      .unwrap()
      .is_empty()
  );
}

#[tokio::test]
async fn reference_and_scores_round_trip() {
  let s = store().await;
  let (set, kpis) = s
    .publish_kpi_set(new_set("sre", &["oncall", "automation"]))
    .await
    .unwrap();
  let req = request_for(&set, Uuid::new_v4());
  s.insert_request(req.clone()).await.unwrap();
  let reference = reference_for(&req, Confidence::Low);
  s.insert_reference(reference.clone()).await.unwrap();

  let mut second = score_for(&reference, &kpis[1], 2);
  second.evidence_metadata = Some(serde_json::json!({ "source": "1:1 notes" }));
  s.insert_kpi_scores(vec![score_for(&reference, &kpis[0], 5), second.clone()])
    .await
    .unwrap();

  let fetched = s.get_reference(reference.reference_id).await.unwrap().unwrap();
  assert_eq!(fetched, reference);
  assert_eq!(
    s.reference_for_request(req.request_id).await.unwrap(),
    Some(reference.reference_id)
  );

  let scores = s.list_kpi_scores(&[reference.reference_id]).await.unwrap();
  assert_eq!(scores.len(), 2);
  assert_eq!(scores[0].kpi_key, "oncall");
  assert_eq!(scores[1], second);
}

#[tokio::test]
async fn list_references_filters_by_confidence_and_limits() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let candidate = Uuid::new_v4();

  let base = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
  for (i, confidence) in [Confidence::High, Confidence::Low, Confidence::Medium]
    .into_iter()
    .enumerate()
  {
    let req = request_for(&set, candidate);
    s.insert_request(req.clone()).await.unwrap();
    let mut reference = reference_for(&req, confidence);
    reference.submitted_at = base + Duration::days(i as i64);
    s.insert_reference(reference).await.unwrap();
  }

  let all = s
    .list_references(&ReferenceQuery {
      candidate_id: candidate,
      ..Default::default()
    })
    .await
    .unwrap();
  assert_eq!(all.len(), 3);
  assert_eq!(all[0].confidence_level, Confidence::Medium);

  let confident = s
    .list_references(&ReferenceQuery {
      candidate_id: candidate,
      confidence:   Confidence::Medium.at_least().to_vec(),
      limit:        None,
    })
    .await
    .unwrap();
  assert_eq!(confident.len(), 2);
  assert!(confident.iter().all(|r| r.confidence_level != Confidence::Low));

  let limited = s
    .list_references(&ReferenceQuery {
      candidate_id: candidate,
      confidence:   Vec::new(),
      limit:        Some(1),
    })
    .await
    .unwrap();
  assert_eq!(limited.len(), 1);
  assert_eq!(limited[0].submitted_at, base + Duration::days(2));
}

#[tokio::test]
async fn list_kpi_scores_with_no_ids_is_empty() {
  let s = store().await;
  assert!(s.list_kpi_scores(&[]).await.unwrap().is_empty());
}

// ─── Aggregate cache ─────────────────────────────────────────────────────────

#[tokio::test]
async fn cached_aggregates_are_replaced() {
  let s = store().await;
  let candidate = Uuid::new_v4();
  assert!(s.get_kpi_aggregates(candidate).await.unwrap().is_none());

  let aggregate = KpiAggregate {
    kpi_key:              "oncall".into(),
    kpi_name:             "oncall".into(),
    reference_count:      3,
    avg_score:            3.33,
    weighted_avg_score:   3.0,
    stddev:               1.7,
    min_score:            1,
    max_score:            5,
    confidence_breakdown: ConfidenceBreakdown { high: 1, medium: 1, low: 1 },
  };
  let first_at = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
  assert!(
    s.put_kpi_aggregates(candidate, vec![aggregate.clone()], first_at, 1)
      .await
      .unwrap()
  );

  let second_at = first_at + Duration::minutes(5);
  assert!(
    s.put_kpi_aggregates(candidate, Vec::new(), second_at, 2)
      .await
      .unwrap()
  );

  let cached = s.get_kpi_aggregates(candidate).await.unwrap().unwrap();
  assert!(cached.kpi_aggregates.is_empty());
  assert_eq!(cached.computed_at, second_at);

  // Computed from an older revision, finished later.
  let late_at = second_at + Duration::minutes(5);
  assert!(
    !s.put_kpi_aggregates(candidate, vec![aggregate], late_at, 1)
      .await
      .unwrap()
  );
  let cached = s.get_kpi_aggregates(candidate).await.unwrap().unwrap();
  assert!(cached.kpi_aggregates.is_empty());
  assert_eq!(cached.computed_at, second_at);
}

#[tokio::test]
async fn reference_writes_advance_the_revision() {
  let s = store().await;
  let (set, _) = s.publish_kpi_set(new_set("sre", &["oncall"])).await.unwrap();
  let candidate = Uuid::new_v4();
  assert_eq!(s.reference_revision(candidate).await.unwrap(), 0);

  let req = request_for(&set, candidate);
  s.insert_request(req.clone()).await.unwrap();
  let reference = reference_for(&req, Confidence::High);
  s.insert_reference(reference.clone()).await.unwrap();
  assert_eq!(s.reference_revision(candidate).await.unwrap(), 1);

  // A rejected insert leaves the revision alone.
  s.insert_reference(reference_for(&req, Confidence::Low))
    .await
    .unwrap_err();
  assert_eq!(s.reference_revision(candidate).await.unwrap(), 1);

  s.delete_reference(reference.reference_id).await.unwrap();
  assert_eq!(s.reference_revision(candidate).await.unwrap(), 2);
  s.delete_reference(reference.reference_id).await.unwrap();
  assert_eq!(s.reference_revision(candidate).await.unwrap(), 2);

  assert_eq!(s.reference_revision(Uuid::new_v4()).await.unwrap(), 0);
}

#[tokio::test]
async fn cache_table_without_revision_is_upgraded() {
  let path = std::env::temp_dir().join(format!("vouch-upgrade-{}.db", Uuid::new_v4()));
  {
    let conn = rusqlite::Connection::open(&path).unwrap();
    conn
      .execute_batch(
        "CREATE TABLE kpi_aggregates (
           candidate_id    TEXT PRIMARY KEY,
           aggregates_json TEXT NOT NULL,
           computed_at     TEXT NOT NULL
         );",
      )
      .unwrap();
  }

  let s = SqliteStore::open(&path).await.unwrap();
  let candidate = Uuid::new_v4();
  assert!(
    s.put_kpi_aggregates(candidate, Vec::new(), Utc::now(), 3)
      .await
      .unwrap()
  );
  assert!(s.get_kpi_aggregates(candidate).await.unwrap().is_some());
  drop(s);

  for suffix in ["", "-wal", "-shm"] {
    let _ = std::fs::remove_file(format!("{}{suffix}", path.display()));
  }
}
