//! Tamper-evidence hashing for submitted references.
//!
//! The signature is SHA-256 over a canonical JSON document built from the
//! reference and its scores. Evidence text enters the document as its own
//! SHA-256, which keeps the signed object small while still binding it to the
//! exact wording. Scores are ordered by `kpi_id` so the digest does not depend
//! on submission order.

use chrono::SecondsFormat;
use serde::Serialize;
use sha2::{Digest, Sha256};
use uuid::Uuid;

use crate::{
  Result,
  reference::{KpiScore, Reference},
  token::constant_time_eq,
};

// Field order is the serialisation order; keep it alphabetical.
#[derive(Serialize)]
struct CanonicalReference<'a> {
  candidate_id:           Uuid,
  end_date:               Option<String>,
  kpi_scores:             Vec<CanonicalScore>,
  overall_recommendation: Option<&'a str>,
  referee_email:          String,
  rehire_decision:        &'a str,
  relationship_type:      &'a str,
  start_date:             Option<String>,
  submitted_at:           String,
}

#[derive(Serialize)]
struct CanonicalScore {
  evidence_sha256: String,
  kpi_id:          Uuid,
  score:           u8,
}

fn sha256_hex(bytes: &[u8]) -> String { hex::encode(Sha256::digest(bytes)) }

/// Deterministic serialisation of the signed content.
pub fn canonical_bytes(reference: &Reference, scores: &[KpiScore]) -> Result<Vec<u8>> {
  let mut kpi_scores: Vec<CanonicalScore> = scores
    .iter()
    .map(|s| CanonicalScore {
      evidence_sha256: sha256_hex(s.evidence_text.as_bytes()),
      kpi_id:          s.kpi_id,
      score:           s.score,
    })
    .collect();
  kpi_scores.sort_by_key(|s| s.kpi_id);

  let doc = CanonicalReference {
    candidate_id: reference.candidate_id,
    end_date: reference.end_date.map(|d| d.to_string()),
    kpi_scores,
    overall_recommendation: reference.overall_recommendation.as_ref().map(|r| r.as_ref()),
    referee_email: reference.referee_email.trim().to_lowercase(),
    rehire_decision: reference.rehire_decision.as_ref(),
    relationship_type: reference.relationship_type.as_ref(),
    start_date: reference.start_date.map(|d| d.to_string()),
    submitted_at: reference
      .submitted_at
      .to_rfc3339_opts(SecondsFormat::Micros, true),
  };

  Ok(serde_json::to_vec(&doc)?)
}

/// Compute the 64-hex-character signature for a reference and its scores.
pub fn sign(reference: &Reference, scores: &[KpiScore]) -> Result<String> {
  Ok(sha256_hex(&canonical_bytes(reference, scores)?))
}

/// Result of recomputing a stored reference's signature.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyOutcome {
  pub valid:         bool,
  pub computed_hash: String,
  pub stored_hash:   String,
}

impl VerifyOutcome {
  /// Turn a mismatch into [`crate::Error::IntegrityMismatch`].
  pub fn ensure_intact(self) -> Result<Self> {
    if self.valid {
      Ok(self)
    } else {
      Err(crate::Error::IntegrityMismatch {
        computed: self.computed_hash,
        stored:   self.stored_hash,
      })
    }
  }
}

/// Recompute the signature from stored rows and compare with the stored hash.
pub fn verify(reference: &Reference, scores: &[KpiScore]) -> Result<VerifyOutcome> {
  let computed_hash = sign(reference, scores)?;
  Ok(VerifyOutcome {
    valid: constant_time_eq(&computed_hash, &reference.signature_hash),
    computed_hash,
    stored_hash: reference.signature_hash.clone(),
  })
}
