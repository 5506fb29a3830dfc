//! Rubric types: versioned KPI sets and the KPIs they contain.
//!
//! A [`KpiSet`] is an immutable snapshot. Editing a rubric publishes a new
//! version; the "active" marker is a separate pointer per (role, seniority)
//! pair, so requests that locked an older version keep resolving to it.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Error, Result};

/// Evidence floor applied when a KPI definition does not specify one.
pub const DEFAULT_MIN_EVIDENCE_LENGTH: u32 = 200;

// ─── KpiSet ──────────────────────────────────────────────────────────────────

/// One immutable version of the rubric for a (role, seniority) pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KpiSet {
  pub kpi_set_id:      Uuid,
  pub role:            String,
  pub seniority_level: String,
  /// Monotonically increasing per (role, seniority), starting at 1.
  pub version:         u32,
  /// Whether the active-version pointer currently targets this set.
  /// Computed on read; not part of the immutable snapshot.
  pub active:          bool,
  pub created_at:      DateTime<Utc>,
}

/// A single scorable rubric item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kpi {
  pub kpi_id:              Uuid,
  pub kpi_set_id:          Uuid,
  /// Stable short name, e.g. `"ownership"`.
  pub key:                 String,
  pub name:                String,
  pub category:            Option<String>,
  pub required:            bool,
  pub weight:              f64,
  pub min_evidence_length: u32,
}

/// A resolved rubric: the set header and its KPIs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Rubric {
  pub kpi_set: KpiSet,
  pub kpis:    Vec<Kpi>,
}

// ─── Publication input ───────────────────────────────────────────────────────

/// Definition of a KPI inside a [`NewKpiSet`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKpi {
  pub key:                 String,
  pub name:                String,
  #[serde(default)]
  pub category:            Option<String>,
  #[serde(default)]
  pub required:            bool,
  #[serde(default = "default_weight")]
  pub weight:              f64,
  #[serde(default)]
  pub min_evidence_length: Option<u32>,
}

fn default_weight() -> f64 { 1.0 }

/// Input to [`crate::store::ReferenceStore::publish_kpi_set`].
///
/// The store assigns the version number and re-points the active index.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewKpiSet {
  pub role:            String,
  pub seniority_level: String,
  pub kpis:            Vec<NewKpi>,
}

impl NewKpiSet {
  /// Check the structural rules a rubric must satisfy before it is stored.
  pub fn check(&self) -> Result<()> {
    if self.role.trim().is_empty() || self.seniority_level.trim().is_empty() {
      return Err(Error::InvalidRequest(
        "role and seniority_level must be non-empty".into(),
      ));
    }
    if self.kpis.is_empty() {
      return Err(Error::InvalidRequest(
        "a KPI set must contain at least one KPI".into(),
      ));
    }

    let mut seen = HashSet::new();
    for kpi in &self.kpis {
      if kpi.key.trim().is_empty() || kpi.name.trim().is_empty() {
        return Err(Error::InvalidRequest("KPI key and name must be non-empty".into()));
      }
      if !seen.insert(kpi.key.as_str()) {
        return Err(Error::InvalidRequest(format!("duplicate KPI key {:?}", kpi.key)));
      }
      if !(kpi.weight.is_finite() && kpi.weight > 0.0) {
        return Err(Error::InvalidRequest(format!(
          "KPI {:?} must have a positive weight",
          kpi.key
        )));
      }
    }
    Ok(())
  }

  /// Materialise the KPI rows for a freshly-assigned set id.
  pub fn build_kpis(&self, kpi_set_id: Uuid) -> Vec<Kpi> {
    self
      .kpis
      .iter()
      .map(|k| Kpi {
        kpi_id: Uuid::new_v4(),
        kpi_set_id,
        key: k.key.trim().to_owned(),
        name: k.name.trim().to_owned(),
        category: k.category.clone(),
        required: k.required,
        weight: k.weight,
        min_evidence_length: k.min_evidence_length.unwrap_or(DEFAULT_MIN_EVIDENCE_LENGTH),
      })
      .collect()
  }
}
