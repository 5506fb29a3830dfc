//! Submitted references and their per-KPI scores.
//!
//! Both are immutable once written. A correction requires a new request and a
//! new reference; there is no update or delete path outside the submission
//! saga's own compensation step.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use uuid::Uuid;

use crate::request::RelationshipType;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// Self-reported certainty, used as an aggregation weight.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Default,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Confidence {
  High,
  #[default]
  Medium,
  Low,
}

/// Weight applied to a label the current code does not recognise.
pub const FALLBACK_CONFIDENCE_WEIGHT: f64 = 0.8;

impl Confidence {
  pub fn weight(self) -> f64 {
    match self {
      Self::High => 1.0,
      Self::Medium => 0.8,
      Self::Low => 0.5,
    }
  }

  /// The labels accepted by a `min_confidence` floor, highest first.
  pub fn at_least(self) -> &'static [Confidence] {
    match self {
      Self::High => &[Self::High],
      Self::Medium => &[Self::High, Self::Medium],
      Self::Low => &[Self::High, Self::Medium, Self::Low],
    }
  }
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RehireDecision {
  Yes,
  No,
  Conditional,
}

#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Recommendation {
  StronglyRecommend,
  Recommend,
  Neutral,
  NotRecommend,
}

// ─── Reference ───────────────────────────────────────────────────────────────

/// The submitted evaluation, one per [`ReferenceRequest`](crate::request::ReferenceRequest).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reference {
  pub reference_id:           Uuid,
  /// Unique across all references; the single-use guarantee rests on it.
  pub reference_request_id:   Uuid,
  pub candidate_id:           Uuid,
  pub referee_id:             Option<Uuid>,
  pub referee_email:          String,
  pub relationship_type:      RelationshipType,
  pub start_date:             Option<NaiveDate>,
  pub end_date:               Option<NaiveDate>,
  pub overall_recommendation: Option<Recommendation>,
  pub rehire_decision:        RehireDecision,
  pub rehire_reasoning:       Option<String>,
  pub confidence_level:       Confidence,
  /// Copied from the request, never re-resolved.
  pub kpi_set_id:             Uuid,
  pub kpi_set_version:        u32,
  /// Share of the locked rubric's KPIs that were scored, 0 to 100.
  pub completeness_score:     Option<f64>,
  /// Hex SHA-256 over the canonical submission; see [`crate::signature`].
  pub signature_hash:         String,
  pub submitted_at:           DateTime<Utc>,
}

// ─── KpiScore ────────────────────────────────────────────────────────────────

/// One scored KPI within a [`Reference`].
///
/// `kpi_key` and `kpi_name` are denormalised at write time so the score stays
/// readable after the KPI definition is superseded by a newer rubric.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiScore {
  pub score_id:          Uuid,
  pub reference_id:      Uuid,
  pub kpi_id:            Uuid,
  pub kpi_key:           String,
  pub kpi_name:          String,
  /// Integer in `1..=5`.
  pub score:             u8,
  pub evidence_text:     String,
  pub confidence_level:  Confidence,
  pub evidence_metadata: Option<serde_json::Value>,
}
