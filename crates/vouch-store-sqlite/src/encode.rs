//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings with microsecond
//! precision and a `Z` suffix, so lexical order equals chronological order.
//! Labels are stored as their snake_case names. UUIDs are stored as
//! hyphenated lowercase strings.

use std::str::FromStr;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tracing::warn;
use uuid::Uuid;
use vouch_core::{
  reference::{Confidence, KpiScore, Reference},
  request::{ReferenceRequest, RequestStatus},
  rubric::{Kpi, KpiSet},
};

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String { dt.to_rfc3339_opts(SecondsFormat::Micros, true) }

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::Decode(format!("timestamp {s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d").map_err(|e| Error::Decode(format!("date {s:?}: {e}")))
}

/// Parse a snake_case label into its enum.
pub fn decode_label<T: FromStr>(column: &str, s: &str) -> Result<T> {
  T::from_str(s).map_err(|_| Error::Decode(format!("unknown {column}: {s:?}")))
}

/// Confidence labels written by older code may not parse; they are read as
/// `medium`, the label whose weight matches the fallback weight.
pub fn decode_confidence_lossy(s: &str) -> Confidence {
  Confidence::from_str(s).unwrap_or_else(|_| {
    warn!(label = s, "unrecognised confidence label; treating as medium");
    Confidence::Medium
  })
}

fn decode_count(column: &str, n: i64) -> Result<u32> {
  u32::try_from(n).map_err(|_| Error::Decode(format!("{column} out of range: {n}")))
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw strings read directly from a `kpi_sets` row joined with the active
/// index.
pub struct RawKpiSet {
  pub kpi_set_id:      String,
  pub role:            String,
  pub seniority_level: String,
  pub version:         i64,
  pub created_at:      String,
  pub active:          bool,
}

impl RawKpiSet {
  pub const COLUMNS: &'static str = "s.kpi_set_id, s.role, s.seniority_level, s.version, \
                                     s.created_at, (a.kpi_set_id IS NOT NULL) AS active";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kpi_set_id:      row.get(0)?,
      role:            row.get(1)?,
      seniority_level: row.get(2)?,
      version:         row.get(3)?,
      created_at:      row.get(4)?,
      active:          row.get(5)?,
    })
  }

  pub fn into_kpi_set(self) -> Result<KpiSet> {
    Ok(KpiSet {
      kpi_set_id:      decode_uuid(&self.kpi_set_id)?,
      role:            self.role,
      seniority_level: self.seniority_level,
      version:         decode_count("version", self.version)?,
      active:          self.active,
      created_at:      decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawKpi {
  pub kpi_id:              String,
  pub kpi_set_id:          String,
  pub key:                 String,
  pub name:                String,
  pub category:            Option<String>,
  pub required:            bool,
  pub weight:              f64,
  pub min_evidence_length: i64,
}

impl RawKpi {
  pub const COLUMNS: &'static str =
    "kpi_id, kpi_set_id, key, name, category, required, weight, min_evidence_length";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      kpi_id:              row.get(0)?,
      kpi_set_id:          row.get(1)?,
      key:                 row.get(2)?,
      name:                row.get(3)?,
      category:            row.get(4)?,
      required:            row.get(5)?,
      weight:              row.get(6)?,
      min_evidence_length: row.get(7)?,
    })
  }

  pub fn into_kpi(self) -> Result<Kpi> {
    Ok(Kpi {
      kpi_id:              decode_uuid(&self.kpi_id)?,
      kpi_set_id:          decode_uuid(&self.kpi_set_id)?,
      key:                 self.key,
      name:                self.name,
      category:            self.category,
      required:            self.required,
      weight:              self.weight,
      min_evidence_length: decode_count("min_evidence_length", self.min_evidence_length)?,
    })
  }
}

pub struct RawRequest {
  pub request_id:        String,
  pub candidate_id:      String,
  pub referee_email:     String,
  pub referee_name:      Option<String>,
  pub relationship_type: String,
  pub role:              String,
  pub seniority_level:   String,
  pub kpi_set_id:        String,
  pub kpi_set_version:   i64,
  pub token_hash:        String,
  pub expires_at:        String,
  pub status:            String,
  pub created_at:        String,
}

impl RawRequest {
  pub const COLUMNS: &'static str = "request_id, candidate_id, referee_email, referee_name, \
                                     relationship_type, role, seniority_level, kpi_set_id, \
                                     kpi_set_version, token_hash, expires_at, status, created_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      request_id:        row.get(0)?,
      candidate_id:      row.get(1)?,
      referee_email:     row.get(2)?,
      referee_name:      row.get(3)?,
      relationship_type: row.get(4)?,
      role:              row.get(5)?,
      seniority_level:   row.get(6)?,
      kpi_set_id:        row.get(7)?,
      kpi_set_version:   row.get(8)?,
      token_hash:        row.get(9)?,
      expires_at:        row.get(10)?,
      status:            row.get(11)?,
      created_at:        row.get(12)?,
    })
  }

  pub fn into_request(self) -> Result<ReferenceRequest> {
    Ok(ReferenceRequest {
      request_id:        decode_uuid(&self.request_id)?,
      candidate_id:      decode_uuid(&self.candidate_id)?,
      referee_email:     self.referee_email,
      referee_name:      self.referee_name,
      relationship_type: decode_label("relationship_type", &self.relationship_type)?,
      role:              self.role,
      seniority_level:   self.seniority_level,
      kpi_set_id:        decode_uuid(&self.kpi_set_id)?,
      kpi_set_version:   decode_count("kpi_set_version", self.kpi_set_version)?,
      token_hash:        self.token_hash,
      expires_at:        decode_dt(&self.expires_at)?,
      status:            decode_label::<RequestStatus>("status", &self.status)?,
      created_at:        decode_dt(&self.created_at)?,
    })
  }
}

pub struct RawReference {
  pub reference_id:           String,
  pub reference_request_id:   String,
  pub candidate_id:           String,
  pub referee_id:             Option<String>,
  pub referee_email:          String,
  pub relationship_type:      String,
  pub start_date:             Option<String>,
  pub end_date:               Option<String>,
  pub overall_recommendation: Option<String>,
  pub rehire_decision:        String,
  pub rehire_reasoning:       Option<String>,
  pub confidence_level:       String,
  pub kpi_set_id:             String,
  pub kpi_set_version:        i64,
  pub completeness_score:     Option<f64>,
  pub signature_hash:         String,
  pub submitted_at:           String,
}

impl RawReference {
  pub const COLUMNS: &'static str =
    "reference_id, reference_request_id, candidate_id, referee_id, referee_email, \
     relationship_type, start_date, end_date, overall_recommendation, rehire_decision, \
     rehire_reasoning, confidence_level, kpi_set_id, kpi_set_version, completeness_score, \
     signature_hash, submitted_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      reference_id:           row.get(0)?,
      reference_request_id:   row.get(1)?,
      candidate_id:           row.get(2)?,
      referee_id:             row.get(3)?,
      referee_email:          row.get(4)?,
      relationship_type:      row.get(5)?,
      start_date:             row.get(6)?,
      end_date:               row.get(7)?,
      overall_recommendation: row.get(8)?,
      rehire_decision:        row.get(9)?,
      rehire_reasoning:       row.get(10)?,
      confidence_level:       row.get(11)?,
      kpi_set_id:             row.get(12)?,
      kpi_set_version:        row.get(13)?,
      completeness_score:     row.get(14)?,
      signature_hash:         row.get(15)?,
      submitted_at:           row.get(16)?,
    })
  }

  pub fn into_reference(self) -> Result<Reference> {
    Ok(Reference {
      reference_id:           decode_uuid(&self.reference_id)?,
      reference_request_id:   decode_uuid(&self.reference_request_id)?,
      candidate_id:           decode_uuid(&self.candidate_id)?,
      referee_id:             self.referee_id.as_deref().map(decode_uuid).transpose()?,
      referee_email:          self.referee_email,
      relationship_type:      decode_label("relationship_type", &self.relationship_type)?,
      start_date:             self.start_date.as_deref().map(decode_date).transpose()?,
      end_date:               self.end_date.as_deref().map(decode_date).transpose()?,
      overall_recommendation: self
        .overall_recommendation
        .as_deref()
        .map(|s| decode_label("overall_recommendation", s))
        .transpose()?,
      rehire_decision:        decode_label("rehire_decision", &self.rehire_decision)?,
      rehire_reasoning:       self.rehire_reasoning,
      confidence_level:       decode_confidence_lossy(&self.confidence_level),
      kpi_set_id:             decode_uuid(&self.kpi_set_id)?,
      kpi_set_version:        decode_count("kpi_set_version", self.kpi_set_version)?,
      completeness_score:     self.completeness_score,
      signature_hash:         self.signature_hash,
      submitted_at:           decode_dt(&self.submitted_at)?,
    })
  }
}

pub struct RawKpiScore {
  pub score_id:          String,
  pub reference_id:      String,
  pub kpi_id:            String,
  pub kpi_key:           String,
  pub kpi_name:          String,
  pub score:             i64,
  pub evidence_text:     String,
  pub confidence_level:  String,
  pub evidence_metadata: Option<String>,
}

impl RawKpiScore {
  pub const COLUMNS: &'static str = "score_id, reference_id, kpi_id, kpi_key, kpi_name, score, \
                                     evidence_text, confidence_level, evidence_metadata";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      score_id:          row.get(0)?,
      reference_id:      row.get(1)?,
      kpi_id:            row.get(2)?,
      kpi_key:           row.get(3)?,
      kpi_name:          row.get(4)?,
      score:             row.get(5)?,
      evidence_text:     row.get(6)?,
      confidence_level:  row.get(7)?,
      evidence_metadata: row.get(8)?,
    })
  }

  pub fn into_score(self) -> Result<KpiScore> {
    Ok(KpiScore {
      score_id:          decode_uuid(&self.score_id)?,
      reference_id:      decode_uuid(&self.reference_id)?,
      kpi_id:            decode_uuid(&self.kpi_id)?,
      kpi_key:           self.kpi_key,
      kpi_name:          self.kpi_name,
      score:             u8::try_from(self.score)
        .map_err(|_| Error::Decode(format!("score out of range: {}", self.score)))?,
      evidence_text:     self.evidence_text,
      confidence_level:  decode_confidence_lossy(&self.confidence_level),
      evidence_metadata: self
        .evidence_metadata
        .as_deref()
        .map(serde_json::from_str)
        .transpose()?,
    })
  }
}
