//! [`SqliteStore`], the SQLite implementation of [`ReferenceStore`].

use std::path::Path;

use chrono::{DateTime, Utc};
use rusqlite::{OptionalExtension as _, types::Value};
use uuid::Uuid;

use vouch_core::{
  aggregate::KpiAggregate,
  reference::{KpiScore, Reference},
  request::{ReferenceRequest, RequestStatus},
  rubric::{Kpi, KpiSet, NewKpiSet},
  store::{ReferenceQuery, ReferenceStore, StoredAggregates},
};

use crate::{
  Result,
  encode::{
    RawKpi, RawKpiScore, RawKpiSet, RawReference, RawRequest, decode_dt, encode_date, encode_dt,
    encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A vouch store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store for tests.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        // Files created before cache writes were revision-tagged.
        let has_revision = conn
          .prepare("SELECT 1 FROM pragma_table_info('kpi_aggregates') WHERE name = 'revision'")?
          .exists([])?;
        if !has_revision {
          conn.execute_batch(
            "ALTER TABLE kpi_aggregates ADD COLUMN revision INTEGER NOT NULL DEFAULT 0",
          )?;
        }
        Ok(())
      })
      .await?;
    Ok(())
  }

  /// Upsert the active pointer for a (role, seniority) pair.
  fn point_active(
    conn: &rusqlite::Connection,
    role: &str,
    seniority_level: &str,
    kpi_set_id: &str,
    at: &str,
  ) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO active_kpi_sets (role, seniority_level, kpi_set_id, activated_at)
       VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT (role, seniority_level)
       DO UPDATE SET kpi_set_id = excluded.kpi_set_id, activated_at = excluded.activated_at",
      rusqlite::params![role, seniority_level, kpi_set_id, at],
    )?;
    Ok(())
  }

  /// Advance a candidate's reference revision by one.
  fn bump_revision(conn: &rusqlite::Connection, candidate_id: &str) -> rusqlite::Result<()> {
    conn.execute(
      "INSERT INTO candidate_revisions (candidate_id, revision) VALUES (?1, 1)
       ON CONFLICT (candidate_id) DO UPDATE SET revision = revision + 1",
      rusqlite::params![candidate_id],
    )?;
    Ok(())
  }

  async fn query_requests(
    &self,
    where_clause: &'static str,
    param: String,
  ) -> Result<Vec<ReferenceRequest>> {
    let raws: Vec<RawRequest> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM reference_requests {where_clause}",
          RawRequest::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![param], RawRequest::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawRequest::into_request).collect()
  }
}

// ─── ReferenceStore impl ─────────────────────────────────────────────────────

impl ReferenceStore for SqliteStore {
  type Error = crate::Error;

  // ── Rubrics ───────────────────────────────────────────────────────────────

  async fn publish_kpi_set(&self, input: NewKpiSet) -> Result<(KpiSet, Vec<Kpi>)> {
    input.check()?;

    let kpi_set_id      = Uuid::new_v4();
    let kpis            = input.build_kpis(kpi_set_id);
    let created_at      = Utc::now();
    let role            = input.role.trim().to_owned();
    let seniority_level = input.seniority_level.trim().to_owned();

    let id_str   = encode_uuid(kpi_set_id);
    let at_str   = encode_dt(created_at);
    let rows     = kpis.clone();
    let role_c   = role.clone();
    let senior_c = seniority_level.clone();

    let version: i64 = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;

        let next: i64 = tx.query_row(
          "SELECT COALESCE(MAX(version), 0) + 1 FROM kpi_sets
           WHERE role = ?1 AND seniority_level = ?2",
          rusqlite::params![role_c, senior_c],
          |r| r.get(0),
        )?;

        tx.execute(
          "INSERT INTO kpi_sets (kpi_set_id, role, seniority_level, version, created_at)
           VALUES (?1, ?2, ?3, ?4, ?5)",
          rusqlite::params![id_str, role_c, senior_c, next, at_str],
        )?;

        {
          let mut stmt = tx.prepare(
            "INSERT INTO kpis (
               kpi_id, kpi_set_id, position, key, name, category,
               required, weight, min_evidence_length
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
          )?;
          for (position, k) in rows.iter().enumerate() {
            stmt.execute(rusqlite::params![
              encode_uuid(k.kpi_id),
              id_str,
              position as i64,
              k.key,
              k.name,
              k.category,
              k.required,
              k.weight,
              k.min_evidence_length,
            ])?;
          }
        }

        Self::point_active(&tx, &role_c, &senior_c, &id_str, &at_str)?;
        tx.commit()?;
        Ok(next)
      })
      .await?;

    let kpi_set = KpiSet {
      kpi_set_id,
      role,
      seniority_level,
      version: u32::try_from(version)
        .map_err(|_| crate::Error::Decode(format!("version out of range: {version}")))?,
      active: true,
      created_at,
    };

    tracing::info!(
      kpi_set_id = %kpi_set.kpi_set_id,
      role = %kpi_set.role,
      seniority_level = %kpi_set.seniority_level,
      version = kpi_set.version,
      "published KPI set"
    );

    Ok((kpi_set, kpis))
  }

  async fn activate_kpi_set(&self, kpi_set_id: Uuid) -> Result<Option<KpiSet>> {
    let Some(set) = self.get_kpi_set(kpi_set_id).await? else {
      return Ok(None);
    };

    let id_str = encode_uuid(kpi_set_id);
    let at_str = encode_dt(Utc::now());
    let role   = set.role.clone();
    let senior = set.seniority_level.clone();

    self
      .conn
      .call(move |conn| {
        Self::point_active(conn, &role, &senior, &id_str, &at_str)?;
        Ok(())
      })
      .await?;

    Ok(Some(KpiSet { active: true, ..set }))
  }

  async fn active_kpi_set(&self, role: &str, seniority_level: &str) -> Result<Option<KpiSet>> {
    let role   = role.to_owned();
    let senior = seniority_level.to_owned();

    let raw: Option<RawKpiSet> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM active_kpi_sets a
           JOIN kpi_sets s ON s.kpi_set_id = a.kpi_set_id
           WHERE a.role = ?1 AND a.seniority_level = ?2",
          RawKpiSet::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![role, senior], RawKpiSet::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawKpiSet::into_kpi_set).transpose()
  }

  async fn get_kpi_set(&self, kpi_set_id: Uuid) -> Result<Option<KpiSet>> {
    let id_str = encode_uuid(kpi_set_id);

    let raw: Option<RawKpiSet> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM kpi_sets s
           LEFT JOIN active_kpi_sets a ON a.kpi_set_id = s.kpi_set_id
           WHERE s.kpi_set_id = ?1",
          RawKpiSet::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawKpiSet::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawKpiSet::into_kpi_set).transpose()
  }

  async fn list_kpis(&self, kpi_set_id: Uuid) -> Result<Vec<Kpi>> {
    let id_str = encode_uuid(kpi_set_id);

    let raws: Vec<RawKpi> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM kpis WHERE kpi_set_id = ?1 ORDER BY position",
          RawKpi::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params![id_str], RawKpi::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKpi::into_kpi).collect()
  }

  // ── Requests ──────────────────────────────────────────────────────────────

  async fn insert_request(&self, request: ReferenceRequest) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO reference_requests (
             request_id, candidate_id, referee_email, referee_name,
             relationship_type, role, seniority_level, kpi_set_id,
             kpi_set_version, token_hash, expires_at, status, created_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
          rusqlite::params![
            encode_uuid(request.request_id),
            encode_uuid(request.candidate_id),
            request.referee_email,
            request.referee_name,
            request.relationship_type.to_string(),
            request.role,
            request.seniority_level,
            encode_uuid(request.kpi_set_id),
            request.kpi_set_version,
            request.token_hash,
            encode_dt(request.expires_at),
            request.status.to_string(),
            encode_dt(request.created_at),
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_request(&self, request_id: Uuid) -> Result<Option<ReferenceRequest>> {
    Ok(
      self
        .query_requests("WHERE request_id = ?1", encode_uuid(request_id))
        .await?
        .pop(),
    )
  }

  async fn find_request_by_token_hash(&self, token_hash: &str) -> Result<Option<ReferenceRequest>> {
    Ok(
      self
        .query_requests("WHERE token_hash = ?1", token_hash.to_owned())
        .await?
        .pop(),
    )
  }

  async fn list_requests(&self, candidate_id: Uuid) -> Result<Vec<ReferenceRequest>> {
    self
      .query_requests(
        "WHERE candidate_id = ?1 ORDER BY created_at DESC, request_id",
        encode_uuid(candidate_id),
      )
      .await
  }

  async fn transition_request(
    &self,
    request_id: Uuid,
    from:       RequestStatus,
    to:         RequestStatus,
  ) -> Result<bool> {
    let id_str   = encode_uuid(request_id);
    let from_str = from.to_string();
    let to_str   = to.to_string();
    // A request that already holds a reference can only become `submitted`.
    let guard = match to {
      RequestStatus::Expired | RequestStatus::Revoked => {
        " AND NOT EXISTS (SELECT 1 FROM submitted_references
                          WHERE reference_request_id = ?1)"
      }
      RequestStatus::Pending | RequestStatus::Submitted => "",
    };

    let changed = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "UPDATE reference_requests SET status = ?3
           WHERE request_id = ?1 AND status = ?2{guard}"
        );
        Ok(conn.execute(&sql, rusqlite::params![id_str, from_str, to_str])?)
      })
      .await?;

    Ok(changed > 0)
  }

  async fn expire_overdue(&self, now: DateTime<Utc>) -> Result<u64> {
    let now_str = encode_dt(now);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "UPDATE reference_requests SET status = 'expired'
           WHERE status = 'pending' AND expires_at <= ?1
             AND NOT EXISTS (
               SELECT 1 FROM submitted_references sr
               WHERE sr.reference_request_id = reference_requests.request_id
             )",
          rusqlite::params![now_str],
        )?)
      })
      .await?;

    Ok(changed as u64)
  }

  // ── References ────────────────────────────────────────────────────────────

  async fn insert_reference(&self, reference: Reference) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        let r = reference;
        let tx = conn.transaction()?;
        tx.execute(
          "INSERT INTO submitted_references (
             reference_id, reference_request_id, candidate_id, referee_id,
             referee_email, relationship_type, start_date, end_date,
             overall_recommendation, rehire_decision, rehire_reasoning,
             confidence_level, kpi_set_id, kpi_set_version,
             completeness_score, signature_hash, submitted_at
           ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17)",
          rusqlite::params![
            encode_uuid(r.reference_id),
            encode_uuid(r.reference_request_id),
            encode_uuid(r.candidate_id),
            r.referee_id.map(encode_uuid),
            r.referee_email,
            r.relationship_type.to_string(),
            r.start_date.map(encode_date),
            r.end_date.map(encode_date),
            r.overall_recommendation.map(|o| o.to_string()),
            r.rehire_decision.to_string(),
            r.rehire_reasoning,
            r.confidence_level.to_string(),
            encode_uuid(r.kpi_set_id),
            r.kpi_set_version,
            r.completeness_score,
            r.signature_hash,
            encode_dt(r.submitted_at),
          ],
        )?;
        Self::bump_revision(&tx, &encode_uuid(r.candidate_id))?;
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn insert_kpi_scores(&self, scores: Vec<KpiScore>) -> Result<()> {
    let rows = scores
      .into_iter()
      .map(|s| {
        Ok((
          encode_uuid(s.score_id),
          encode_uuid(s.reference_id),
          encode_uuid(s.kpi_id),
          s.kpi_key,
          s.kpi_name,
          i64::from(s.score),
          s.evidence_text,
          s.confidence_level.to_string(),
          s.evidence_metadata
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?,
        ))
      })
      .collect::<Result<Vec<_>>>()?;

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        {
          let mut stmt = tx.prepare(
            "INSERT INTO kpi_scores (
               score_id, reference_id, position, kpi_id, kpi_key, kpi_name,
               score, evidence_text, confidence_level, evidence_metadata
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
          )?;
          for (position, (sid, rid, kid, key, name, score, evidence, conf, meta)) in
            rows.into_iter().enumerate()
          {
            stmt.execute(rusqlite::params![
              sid,
              rid,
              position as i64,
              kid,
              key,
              name,
              score,
              evidence,
              conf,
              meta,
            ])?;
          }
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn delete_reference(&self, reference_id: Uuid) -> Result<()> {
    let id_str = encode_uuid(reference_id);

    self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let candidate: Option<String> = tx
          .query_row(
            "SELECT candidate_id FROM submitted_references WHERE reference_id = ?1",
            rusqlite::params![id_str],
            |r| r.get(0),
          )
          .optional()?;
        tx.execute(
          "DELETE FROM kpi_scores WHERE reference_id = ?1",
          rusqlite::params![id_str],
        )?;
        tx.execute(
          "DELETE FROM submitted_references WHERE reference_id = ?1",
          rusqlite::params![id_str],
        )?;
        if let Some(candidate) = candidate {
          Self::bump_revision(&tx, &candidate)?;
        }
        tx.commit()?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn get_reference(&self, reference_id: Uuid) -> Result<Option<Reference>> {
    let id_str = encode_uuid(reference_id);

    let raw: Option<RawReference> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM submitted_references WHERE reference_id = ?1",
          RawReference::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, rusqlite::params![id_str], RawReference::from_row)
            .optional()?,
        )
      })
      .await?;

    raw.map(RawReference::into_reference).transpose()
  }

  async fn reference_for_request(&self, request_id: Uuid) -> Result<Option<Uuid>> {
    let id_str = encode_uuid(request_id);

    let found: Option<String> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT reference_id FROM submitted_references WHERE reference_request_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    found.as_deref().map(crate::encode::decode_uuid).transpose()
  }

  async fn list_references(&self, query: &ReferenceQuery) -> Result<Vec<Reference>> {
    let mut params = vec![Value::Text(encode_uuid(query.candidate_id))];
    let mut where_clause = String::from("WHERE candidate_id = ?");
    if !query.confidence.is_empty() {
      let marks = vec!["?"; query.confidence.len()].join(", ");
      where_clause.push_str(&format!(" AND confidence_level IN ({marks})"));
      params.extend(
        query
          .confidence
          .iter()
          .map(|c| Value::Text(c.to_string())),
      );
    }
    // SQLite treats a negative LIMIT as "no limit".
    let limit = query.limit.and_then(|l| i64::try_from(l).ok()).unwrap_or(-1);
    params.push(Value::Integer(limit));

    let raws: Vec<RawReference> = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM submitted_references {where_clause}
           ORDER BY submitted_at DESC, reference_id
           LIMIT ?",
          RawReference::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(params), RawReference::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawReference::into_reference).collect()
  }

  async fn list_kpi_scores(&self, reference_ids: &[Uuid]) -> Result<Vec<KpiScore>> {
    if reference_ids.is_empty() {
      return Ok(Vec::new());
    }
    let ids: Vec<String> = reference_ids.iter().copied().map(encode_uuid).collect();

    let raws: Vec<RawKpiScore> = self
      .conn
      .call(move |conn| {
        let marks = vec!["?"; ids.len()].join(", ");
        let sql = format!(
          "SELECT {} FROM kpi_scores WHERE reference_id IN ({marks})
           ORDER BY reference_id, position",
          RawKpiScore::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map(rusqlite::params_from_iter(ids.iter()), RawKpiScore::from_row)?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    raws.into_iter().map(RawKpiScore::into_score).collect()
  }

  async fn reference_revision(&self, candidate_id: Uuid) -> Result<u64> {
    let id_str = encode_uuid(candidate_id);

    let revision: Option<i64> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT revision FROM candidate_revisions WHERE candidate_id = ?1",
              rusqlite::params![id_str],
              |r| r.get(0),
            )
            .optional()?,
        )
      })
      .await?;

    Ok(revision.map_or(0, |r| r.max(0) as u64))
  }

  // ── Materialised aggregates ───────────────────────────────────────────────

  async fn put_kpi_aggregates(
    &self,
    candidate_id: Uuid,
    aggregates:   Vec<KpiAggregate>,
    computed_at:  DateTime<Utc>,
    revision:     u64,
  ) -> Result<bool> {
    let id_str   = encode_uuid(candidate_id);
    let json_str = serde_json::to_string(&aggregates)?;
    let at_str   = encode_dt(computed_at);
    let rev      = i64::try_from(revision).unwrap_or(i64::MAX);

    let changed = self
      .conn
      .call(move |conn| {
        Ok(conn.execute(
          "INSERT INTO kpi_aggregates (candidate_id, aggregates_json, computed_at, revision)
           VALUES (?1, ?2, ?3, ?4)
           ON CONFLICT (candidate_id)
           DO UPDATE SET aggregates_json = excluded.aggregates_json,
                         computed_at     = excluded.computed_at,
                         revision        = excluded.revision
           WHERE excluded.revision >= kpi_aggregates.revision",
          rusqlite::params![id_str, json_str, at_str, rev],
        )?)
      })
      .await?;
    Ok(changed > 0)
  }

  async fn get_kpi_aggregates(&self, candidate_id: Uuid) -> Result<Option<StoredAggregates>> {
    let id_str = encode_uuid(candidate_id);

    let row: Option<(String, String)> = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT aggregates_json, computed_at FROM kpi_aggregates WHERE candidate_id = ?1",
              rusqlite::params![id_str],
              |r| Ok((r.get(0)?, r.get(1)?)),
            )
            .optional()?,
        )
      })
      .await?;

    row
      .map(|(json, at)| {
        Ok(StoredAggregates {
          kpi_aggregates: serde_json::from_str(&json)?,
          computed_at:    decode_dt(&at)?,
        })
      })
      .transpose()
  }
}
