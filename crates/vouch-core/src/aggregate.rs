//! Per-KPI and per-candidate statistics over submitted references.
//!
//! Everything here is pure: callers load references and scores from a store
//! and hand them over. The real-time reference pack and the cached aggregate
//! table both go through [`kpi_aggregates`], so their shapes cannot drift.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{
  reference::{Confidence, KpiScore, Reference, RehireDecision},
  request::RelationshipType,
};

/// Round to two decimals at the output boundary.
pub fn round2(x: f64) -> f64 { (x * 100.0).round() / 100.0 }

// ─── Output types ────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfidenceBreakdown {
  pub high:   u64,
  pub medium: u64,
  pub low:    u64,
}

impl ConfidenceBreakdown {
  fn add(&mut self, c: Confidence) {
    match c {
      Confidence::High => self.high += 1,
      Confidence::Medium => self.medium += 1,
      Confidence::Low => self.low += 1,
    }
  }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RehireBreakdown {
  pub yes:         u64,
  pub no:          u64,
  pub conditional: u64,
}

/// Statistics for one KPI key across a candidate's references.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiAggregate {
  pub kpi_key:              String,
  pub kpi_name:             String,
  pub reference_count:      u64,
  pub avg_score:            f64,
  /// Mean weighted by [`Confidence::weight`].
  pub weighted_avg_score:   f64,
  /// Population standard deviation of the raw scores.
  pub stddev:               f64,
  pub min_score:            u8,
  pub max_score:            u8,
  pub confidence_breakdown: ConfidenceBreakdown,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CandidateSummary {
  pub total_references:          u64,
  pub total_kpi_evaluations:     u64,
  pub overall_avg_score:         Option<f64>,
  pub most_recent_reference_at:  Option<DateTime<Utc>>,
  pub rehire_distribution:       RehireBreakdown,
  pub confidence_distribution:   ConfidenceBreakdown,
  pub relationship_distribution: BTreeMap<RelationshipType, u64>,
  pub avg_completeness_score:    Option<f64>,
}

// ─── KPI aggregation ─────────────────────────────────────────────────────────

#[derive(Default)]
struct Accumulator<'a> {
  name:       &'a str,
  raw:        Vec<f64>,
  weighted:   f64,
  weights:    f64,
  min:        u8,
  max:        u8,
  confidence: ConfidenceBreakdown,
}

/// Group scores by `kpi_key` and compute the statistics, ordered by key.
pub fn kpi_aggregates(scores: &[KpiScore]) -> Vec<KpiAggregate> {
  let mut groups: BTreeMap<&str, Accumulator<'_>> = BTreeMap::new();

  for s in scores {
    let acc = groups.entry(s.kpi_key.as_str()).or_insert_with(|| Accumulator {
      name: s.kpi_name.as_str(),
      min: u8::MAX,
      ..Default::default()
    });
    let score = f64::from(s.score);
    let weight = s.confidence_level.weight();
    acc.raw.push(score);
    acc.weighted += score * weight;
    acc.weights += weight;
    acc.min = acc.min.min(s.score);
    acc.max = acc.max.max(s.score);
    acc.confidence.add(s.confidence_level);
  }

  groups
    .into_iter()
    .map(|(key, acc)| {
      let n = acc.raw.len() as f64;
      let mean = acc.raw.iter().sum::<f64>() / n;
      let variance = acc.raw.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
      KpiAggregate {
        kpi_key:              key.to_owned(),
        kpi_name:             acc.name.to_owned(),
        reference_count:      acc.raw.len() as u64,
        avg_score:            round2(mean),
        weighted_avg_score:   round2(acc.weighted / acc.weights),
        stddev:               round2(variance.sqrt()),
        min_score:            acc.min,
        max_score:            acc.max,
        confidence_breakdown: acc.confidence,
      }
    })
    .collect()
}

// ─── Candidate summary ───────────────────────────────────────────────────────

pub fn summarize(references: &[Reference], scores: &[KpiScore]) -> CandidateSummary {
  let mut summary = CandidateSummary {
    total_references: references.len() as u64,
    total_kpi_evaluations: scores.len() as u64,
    ..Default::default()
  };

  if !scores.is_empty() {
    let total: f64 = scores.iter().map(|s| f64::from(s.score)).sum();
    summary.overall_avg_score = Some(round2(total / scores.len() as f64));
  }

  summary.most_recent_reference_at = references.iter().map(|r| r.submitted_at).max();

  let mut completeness = Vec::new();
  for r in references {
    match r.rehire_decision {
      RehireDecision::Yes => summary.rehire_distribution.yes += 1,
      RehireDecision::No => summary.rehire_distribution.no += 1,
      RehireDecision::Conditional => summary.rehire_distribution.conditional += 1,
    }
    summary.confidence_distribution.add(r.confidence_level);
    *summary
      .relationship_distribution
      .entry(r.relationship_type)
      .or_default() += 1;
    if let Some(c) = r.completeness_score {
      completeness.push(c);
    }
  }

  if !completeness.is_empty() {
    summary.avg_completeness_score =
      Some(round2(completeness.iter().sum::<f64>() / completeness.len() as f64));
  }

  summary
}

// ─── Reference pack ──────────────────────────────────────────────────────────

/// Query options for the real-time reference pack.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PackOptions {
  #[serde(default)]
  pub include_evidence: bool,
  /// Confidence floor; `medium` admits high and medium.
  #[serde(default)]
  pub min_confidence:   Option<Confidence>,
  /// Caps the `references` list only; aggregates and the summary always
  /// cover every admitted reference.
  #[serde(default)]
  pub limit:            Option<usize>,
}

impl PackOptions {
  /// Reference-level confidence labels admitted by the floor; empty when no
  /// floor is set, so rows with legacy labels are not filtered out.
  pub fn admitted_confidence(&self) -> Vec<Confidence> {
    self.min_confidence.map(|c| c.at_least().to_vec()).unwrap_or_default()
  }
}

/// A score as it appears in a pack; evidence is omitted unless requested.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedScore {
  pub kpi_id:            Uuid,
  pub kpi_key:           String,
  pub kpi_name:          String,
  pub score:             u8,
  pub confidence_level:  Confidence,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub evidence_text:     Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub evidence_metadata: Option<serde_json::Value>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PackedReference {
  #[serde(flatten)]
  pub reference:  Reference,
  pub kpi_scores: Vec<PackedScore>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferencePack {
  pub candidate_id:   Uuid,
  pub references:     Vec<PackedReference>,
  pub kpi_aggregates: Vec<KpiAggregate>,
  pub summary:        CandidateSummary,
}

/// Assemble a pack from already-filtered references (newest first) and all
/// their scores.
pub fn build_pack(
  candidate_id: Uuid,
  references: Vec<Reference>,
  scores: Vec<KpiScore>,
  options: &PackOptions,
) -> ReferencePack {
  let kpi_aggregates = kpi_aggregates(&scores);
  let summary = summarize(&references, &scores);

  let mut by_reference: HashMap<Uuid, Vec<PackedScore>> = HashMap::new();
  for s in scores {
    by_reference.entry(s.reference_id).or_default().push(PackedScore {
      kpi_id:            s.kpi_id,
      kpi_key:           s.kpi_key,
      kpi_name:          s.kpi_name,
      score:             s.score,
      confidence_level:  s.confidence_level,
      evidence_text:     options.include_evidence.then_some(s.evidence_text),
      evidence_metadata: if options.include_evidence { s.evidence_metadata } else { None },
    });
  }

  let shown = options.limit.unwrap_or(usize::MAX);
  let references = references
    .into_iter()
    .take(shown)
    .map(|reference| PackedReference {
      kpi_scores: by_reference.remove(&reference.reference_id).unwrap_or_default(),
      reference,
    })
    .collect();

  ReferencePack { candidate_id, references, kpi_aggregates, summary }
}

/// The cached aggregate path's response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CachedAggregates {
  pub candidate_id:   Uuid,
  pub kpi_aggregates: Vec<KpiAggregate>,
  /// When the cache row was computed; `None` if it was computed on the spot.
  pub computed_at:    Option<DateTime<Utc>>,
}
