//! Submission payloads and their validation.
//!
//! The payload is deliberately loose (every field is raw JSON) so that every
//! problem, including a field of the wrong type, is reported in one pass
//! instead of failing on the first field serde cannot parse. [`validate`] runs all checks without
//! short-circuiting; [`accept`] turns a clean payload into typed records.

use std::{collections::HashSet, str::FromStr};

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use strum::VariantNames;
use uuid::Uuid;

use crate::{
  Error, Result,
  reference::{Confidence, KpiScore, Recommendation, Reference, RehireDecision},
  request::{ReferenceRequest, RelationshipType},
  rubric::{DEFAULT_MIN_EVIDENCE_LENGTH, Kpi},
  signature,
};

pub const MIN_SCORE: i64 = 1;
pub const MAX_SCORE: i64 = 5;

// ─── Payload ─────────────────────────────────────────────────────────────────

/// What a referee posts to the submit endpoint.
///
/// Every field is raw JSON; a field of the wrong type becomes a validation
/// error next to the others rather than a decode failure. `null` and absent
/// are the same.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmissionPayload {
  #[serde(default)]
  pub referee_id:             Value,
  #[serde(default)]
  pub relationship_type:      Value,
  /// `YYYY-MM-DD`.
  #[serde(default)]
  pub start_date:             Value,
  #[serde(default)]
  pub end_date:               Value,
  #[serde(default)]
  pub confidence_level:       Value,
  #[serde(default)]
  pub rehire_decision:        Value,
  #[serde(default)]
  pub rehire_reasoning:       Value,
  #[serde(default)]
  pub overall_recommendation: Value,
  /// A list of [`SubmittedKpi`] objects.
  #[serde(default)]
  pub kpis:                   Value,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SubmittedKpi {
  #[serde(default)]
  pub kpi_id:            Value,
  #[serde(default)]
  pub score:             Value,
  #[serde(default)]
  pub evidence_text:     Value,
  #[serde(default)]
  pub confidence_level:  Value,
  #[serde(default)]
  pub evidence_metadata: Value,
}

// ─── Report ──────────────────────────────────────────────────────────────────

/// Outcome of [`validate`].
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ValidationReport {
  pub valid:                 bool,
  pub errors:                Vec<String>,
  /// Names of required KPIs absent from the payload, in rubric order.
  pub missing_required_kpis: Vec<String>,
  /// Submitted ids that do not belong to the locked rubric.
  pub unknown_kpi_ids:       Vec<String>,
}

/// A payload that passed every check, with labels parsed into their types.
#[derive(Debug, Clone)]
pub struct ValidatedSubmission {
  pub referee_id:             Option<Uuid>,
  pub relationship_type:      RelationshipType,
  pub start_date:             Option<NaiveDate>,
  pub end_date:               Option<NaiveDate>,
  pub confidence_level:       Confidence,
  pub rehire_decision:        RehireDecision,
  pub rehire_reasoning:       Option<String>,
  pub overall_recommendation: Option<Recommendation>,
  pub scores:                 Vec<ValidatedScore>,
  pub completeness_score:     f64,
}

#[derive(Debug, Clone)]
pub struct ValidatedScore {
  pub kpi:               Kpi,
  pub score:             u8,
  /// Trimmed.
  pub evidence_text:     String,
  /// Falls back to the reference-level confidence when omitted.
  pub confidence_level:  Confidence,
  pub evidence_metadata: Option<serde_json::Value>,
}

// ─── Entry points ────────────────────────────────────────────────────────────

/// Run every check against `payload` and report all violations at once.
pub fn validate(
  payload: &SubmissionPayload,
  request: &ReferenceRequest,
  kpis: &[Kpi],
) -> ValidationReport {
  Checker::run(payload, request, kpis).report
}

/// Validate and, if clean, return the typed submission.
pub fn accept(
  payload: &SubmissionPayload,
  request: &ReferenceRequest,
  kpis: &[Kpi],
) -> Result<ValidatedSubmission> {
  let outcome = Checker::run(payload, request, kpis);
  match outcome.accepted {
    Some(submission) if outcome.report.valid => Ok(submission),
    _ => Err(Error::Validation(outcome.report.errors)),
  }
}

impl ValidatedSubmission {
  /// Build the signed reference row and its score rows.
  pub fn into_records(
    self,
    request: &ReferenceRequest,
    reference_id: Uuid,
    submitted_at: DateTime<Utc>,
  ) -> Result<(Reference, Vec<KpiScore>)> {
    let scores: Vec<KpiScore> = self
      .scores
      .into_iter()
      .map(|s| KpiScore {
        score_id: Uuid::new_v4(),
        reference_id,
        kpi_id: s.kpi.kpi_id,
        kpi_key: s.kpi.key,
        kpi_name: s.kpi.name,
        score: s.score,
        evidence_text: s.evidence_text,
        confidence_level: s.confidence_level,
        evidence_metadata: s.evidence_metadata,
      })
      .collect();

    let mut reference = Reference {
      reference_id,
      reference_request_id: request.request_id,
      candidate_id: request.candidate_id,
      referee_id: self.referee_id,
      referee_email: request.referee_email.clone(),
      relationship_type: self.relationship_type,
      start_date: self.start_date,
      end_date: self.end_date,
      overall_recommendation: self.overall_recommendation,
      rehire_decision: self.rehire_decision,
      rehire_reasoning: self.rehire_reasoning,
      confidence_level: self.confidence_level,
      kpi_set_id: request.kpi_set_id,
      kpi_set_version: request.kpi_set_version,
      completeness_score: Some(self.completeness_score),
      signature_hash: String::new(),
      submitted_at,
    };
    reference.signature_hash = signature::sign(&reference, &scores)?;

    Ok((reference, scores))
  }
}

// ─── Checker ─────────────────────────────────────────────────────────────────

struct Outcome {
  report:   ValidationReport,
  accepted: Option<ValidatedSubmission>,
}

#[derive(Default)]
struct Checker {
  errors:  Vec<String>,
  missing: Vec<String>,
  unknown: Vec<String>,
}

fn one_of(field: &str, allowed: &[&str]) -> String {
  format!("{field} must be one of: {}", allowed.join(", "))
}

impl Checker {
  fn run(payload: &SubmissionPayload, request: &ReferenceRequest, kpis: &[Kpi]) -> Outcome {
    let mut c = Checker::default();

    if kpis.iter().any(|k| k.kpi_set_id != request.kpi_set_id) {
      c.errors.push("rubric does not match the request's locked KPI set".into());
    }

    let referee_id = match c.text("referee_id", &payload.referee_id).flatten() {
      None => None,
      Some(raw) => match Uuid::parse_str(raw.trim()) {
        Ok(id) => Some(id),
        Err(_) => {
          c.errors.push("referee_id must be a UUID".into());
          None
        }
      },
    };

    // 1. relationship_type present (and recognised).
    let relationship_type =
      c.required_label::<RelationshipType>("relationship_type", &payload.relationship_type);

    // 2. Date ordering.
    let start_date = c.parse_date("start_date", &payload.start_date);
    let end_date = c.parse_date("end_date", &payload.end_date);
    if let (Some(Some(start)), Some(Some(end))) = (start_date, end_date)
      && end < start
    {
      c.errors.push("end_date must not be before start_date".into());
    }

    // 3. Overall confidence.
    let confidence_level = c
      .optional_label::<Confidence>("confidence_level", &payload.confidence_level)
      .map(Option::unwrap_or_default);

    // 4. Rehire decision.
    let rehire_decision =
      c.required_label::<RehireDecision>("rehire_decision", &payload.rehire_decision);

    let rehire_reasoning = c
      .text("rehire_reasoning", &payload.rehire_reasoning)
      .flatten()
      .map(str::trim)
      .filter(|s| !s.is_empty())
      .map(str::to_owned);

    // 5. Overall recommendation.
    let overall_recommendation = c.optional_label::<Recommendation>(
      "overall_recommendation",
      &payload.overall_recommendation,
    );

    // 6. Non-empty KPI list.
    let entries = c.kpi_entries(&payload.kpis);

    // 7 + 8 + 9. Rubric membership and per-KPI rules.
    let scores = c.check_kpis(&entries, kpis, confidence_level.unwrap_or_default());

    let report = ValidationReport {
      valid:                 c.errors.is_empty(),
      errors:                c.errors,
      missing_required_kpis: c.missing,
      unknown_kpi_ids:       c.unknown,
    };

    let accepted = match (
      report.valid,
      relationship_type,
      start_date,
      end_date,
      confidence_level,
      rehire_decision,
      overall_recommendation,
    ) {
      (
        true,
        Some(relationship_type),
        Some(start_date),
        Some(end_date),
        Some(confidence_level),
        Some(rehire_decision),
        Some(overall_recommendation),
      ) => Some(ValidatedSubmission {
        referee_id,
        relationship_type,
        start_date,
        end_date,
        confidence_level,
        rehire_decision,
        rehire_reasoning,
        overall_recommendation,
        completeness_score: completeness(scores.len(), kpis.len()),
        scores,
      }),
      _ => None,
    };

    Outcome { report, accepted }
  }

  /// `None` means the field was not a string (reported); `Some(None)` means
  /// it was absent or null.
  fn text<'p>(&mut self, field: &str, value: &'p Value) -> Option<Option<&'p str>> {
    match value {
      Value::Null => Some(None),
      Value::String(s) => Some(Some(s.as_str())),
      _ => {
        self.errors.push(format!("{field} must be a string"));
        None
      }
    }
  }

  fn required_label<T>(&mut self, field: &str, value: &Value) -> Option<T>
  where
    T: FromStr + VariantNames,
  {
    match self.text(field, value)?.map(str::trim) {
      None | Some("") => {
        self.errors.push(format!("{field} is required"));
        None
      }
      Some(raw) => self.parse_label(field, raw),
    }
  }

  /// Same contract as [`Checker::text`], parsed into `T`.
  fn optional_label<T>(&mut self, field: &str, value: &Value) -> Option<Option<T>>
  where
    T: FromStr + VariantNames,
  {
    match self.text(field, value)? {
      None => Some(None),
      Some(raw) => self.parse_label(field, raw).map(Some),
    }
  }

  fn parse_label<T>(&mut self, field: &str, raw: &str) -> Option<T>
  where
    T: FromStr + VariantNames,
  {
    match T::from_str(raw.trim()) {
      Ok(v) => Some(v),
      Err(_) => {
        self.errors.push(one_of(field, T::VARIANTS));
        None
      }
    }
  }

  /// `None` means the field was malformed; `Some(None)` means it was absent.
  fn parse_date(&mut self, field: &str, value: &Value) -> Option<Option<NaiveDate>> {
    match self.text(field, value)?.map(str::trim) {
      None | Some("") => Some(None),
      Some(s) => match NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        Ok(d) => Some(Some(d)),
        Err(_) => {
          self.errors.push(format!("{field} must be a YYYY-MM-DD date"));
          None
        }
      },
    }
  }

  /// Decode the list entry by entry, keeping each entry's original index.
  fn kpi_entries(&mut self, raw: &Value) -> Vec<(usize, SubmittedKpi)> {
    let items = match raw {
      Value::Array(items) if !items.is_empty() => items,
      _ => {
        self.errors.push("kpis must be a non-empty list".into());
        return Vec::new();
      }
    };
    items
      .iter()
      .enumerate()
      .filter_map(|(i, item)| match SubmittedKpi::deserialize(item) {
        Ok(entry) if item.is_object() => Some((i, entry)),
        _ => {
          self.errors.push(format!("kpis[{i}] must be an object"));
          None
        }
      })
      .collect()
  }

  fn check_kpis(
    &mut self,
    entries: &[(usize, SubmittedKpi)],
    kpis: &[Kpi],
    fallback_confidence: Confidence,
  ) -> Vec<ValidatedScore> {
    let submitted: HashSet<Uuid> = entries
      .iter()
      .filter_map(|(_, k)| k.kpi_id.as_str())
      .filter_map(|id| Uuid::parse_str(id.trim()).ok())
      .collect();

    // 7. Required KPIs present.
    self.missing = kpis
      .iter()
      .filter(|k| k.required && !submitted.contains(&k.kpi_id))
      .map(|k| k.name.clone())
      .collect();
    if !self.missing.is_empty() {
      self
        .errors
        .push(format!("missing required KPIs: {}", self.missing.join(", ")));
    }

    // 8. Submitted ids belong to the rubric.
    let mut seen_unknown = HashSet::new();
    for raw in entries.iter().filter_map(|(_, k)| k.kpi_id.as_str()) {
      let known = Uuid::parse_str(raw.trim())
        .ok()
        .is_some_and(|id| kpis.iter().any(|def| def.kpi_id == id));
      if !known && seen_unknown.insert(raw) {
        self.unknown.push(raw.to_owned());
      }
    }
    if !self.unknown.is_empty() {
      self.errors.push(format!(
        "KPIs not part of this rubric: {}",
        self.unknown.join(", ")
      ));
    }

    // 9. Per-KPI rules.
    let mut seen = HashSet::new();
    let mut scores = Vec::with_capacity(entries.len());
    for (i, k) in entries {
      let at = format!("kpis[{i}]");

      let raw_id = match &k.kpi_id {
        Value::Null => {
          self.errors.push(format!("{at}.kpi_id is required"));
          None
        }
        Value::String(s) => Some(s.trim()),
        _ => {
          self.errors.push(format!("{at}.kpi_id must be a string"));
          None
        }
      };
      let id = raw_id.and_then(|raw| Uuid::parse_str(raw).ok());
      let def = id.and_then(|id| kpis.iter().find(|d| d.kpi_id == id));

      if let Some(raw) = raw_id {
        let dedup_key = id.map_or_else(|| raw.to_owned(), |id| id.to_string());
        if !seen.insert(dedup_key) {
          self.errors.push(format!("{at}: duplicate kpi_id {raw}"));
        }
      }

      let score = match k.score.as_i64() {
        Some(n) if (MIN_SCORE..=MAX_SCORE).contains(&n) => u8::try_from(n).ok(),
        _ => None,
      };
      if score.is_none() {
        self.errors.push(format!(
          "{at}.score must be an integer between {MIN_SCORE} and {MAX_SCORE}"
        ));
      }

      let floor = def.map_or(DEFAULT_MIN_EVIDENCE_LENGTH, |d| d.min_evidence_length) as usize;
      let evidence = match &k.evidence_text {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim()),
        Value::Null | Value::String(_) => {
          self.errors.push(format!("{at}.evidence_text is required"));
          None
        }
        _ => {
          self.errors.push(format!("{at}.evidence_text must be a string"));
          None
        }
      };
      if let Some(text) = evidence
        && text.chars().count() < floor
      {
        self.errors.push(format!(
          "{at}.evidence_text must be at least {floor} characters (got {})",
          text.chars().count()
        ));
      }

      let confidence = self
        .optional_label::<Confidence>(&format!("{at}.confidence_level"), &k.confidence_level)
        .map(|c| c.unwrap_or(fallback_confidence));

      if let (Some(def), Some(score), Some(text), Some(confidence_level)) =
        (def, score, evidence, confidence)
      {
        scores.push(ValidatedScore {
          kpi: def.clone(),
          score,
          evidence_text: text.to_owned(),
          confidence_level,
          evidence_metadata: (!k.evidence_metadata.is_null()).then(|| k.evidence_metadata.clone()),
        });
      }
    }

    scores
  }
}

fn completeness(scored: usize, total: usize) -> f64 {
  if total == 0 {
    return 0.0;
  }
  let pct = scored as f64 / total as f64 * 100.0;
  (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
  use chrono::Duration;
  use serde_json::json;

  use super::*;
  use crate::request::RequestStatus;

  fn kpi(set: Uuid, key: &str, required: bool, min: u32) -> Kpi {
    Kpi {
      kpi_id: Uuid::new_v4(),
      kpi_set_id: set,
      key: key.into(),
      name: key.replace('_', " "),
      category: None,
      required,
      weight: 1.0,
      min_evidence_length: min,
    }
  }

  fn request(set: Uuid) -> ReferenceRequest {
    let now = Utc::now();
    ReferenceRequest {
      request_id: Uuid::new_v4(),
      candidate_id: Uuid::new_v4(),
      referee_email: "ref@example.com".into(),
      referee_name: None,
      relationship_type: RelationshipType::Manager,
      role: "backend_engineer".into(),
      seniority_level: "senior".into(),
      kpi_set_id: set,
      kpi_set_version: 3,
      token_hash: "0".repeat(64),
      expires_at: now + Duration::days(30),
      status: RequestStatus::Pending,
      created_at: now,
    }
  }

  fn scored(k: &Kpi, score: serde_json::Value, evidence_len: usize) -> SubmittedKpi {
    SubmittedKpi {
      kpi_id: json!(k.kpi_id),
      score,
      evidence_text: json!("e".repeat(evidence_len)),
      ..Default::default()
    }
  }

  fn base(kpis: Vec<SubmittedKpi>) -> SubmissionPayload {
    SubmissionPayload {
      relationship_type: json!("manager"),
      rehire_decision: json!("yes"),
      kpis: json!(kpis),
      ..Default::default()
    }
  }

  #[test]
  fn clean_payload_is_accepted() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 200);
    let del = kpi(set, "delivery", false, 200);
    let kpis = vec![own.clone(), del];
    let payload = base(vec![scored(&own, json!(5), 220)]);

    let report = validate(&payload, &request(set), &kpis);
    assert!(report.valid, "{:?}", report.errors);

    let accepted = accept(&payload, &request(set), &kpis).unwrap();
    assert_eq!(accepted.scores.len(), 1);
    assert_eq!(accepted.confidence_level, Confidence::Medium);
    assert_eq!(accepted.scores[0].confidence_level, Confidence::Medium);
    assert_eq!(accepted.completeness_score, 50.0);
  }

  #[test]
  fn evidence_floor_is_inclusive_after_trim() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 200);
    let kpis = vec![own.clone()];

    let mut short = scored(&own, json!(4), 199);
    short.evidence_text = json!(format!("   {}   ", "x".repeat(199)));
    let report = validate(&base(vec![short]), &request(set), &kpis);
    assert!(!report.valid);
    assert!(report.errors[0].contains("at least 200"));

    let mut exact = scored(&own, json!(4), 200);
    exact.evidence_text = json!(format!("\n{}\t", "x".repeat(200)));
    assert!(validate(&base(vec![exact]), &request(set), &kpis).valid);
  }

  #[test]
  fn missing_required_lists_exactly_the_missing_names() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 10);
    let com = kpi(set, "communication", true, 10);
    let opt = kpi(set, "mentoring", false, 10);
    let kpis = vec![own.clone(), com, opt.clone()];

    let payload = base(vec![scored(&own, json!(3), 20), scored(&opt, json!(4), 20)]);
    let report = validate(&payload, &request(set), &kpis);

    assert!(!report.valid);
    assert_eq!(report.missing_required_kpis, vec!["communication".to_string()]);
    assert_eq!(report.errors, vec!["missing required KPIs: communication".to_string()]);
  }

  #[test]
  fn reports_every_problem_at_once() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 10);
    let kpis = vec![own.clone()];

    let mut bad = scored(&own, json!(9), 0);
    bad.confidence_level = json!("certain");
    let dup = scored(&own, json!(2.5), 20);
    let stranger = SubmittedKpi {
      kpi_id: json!("not-a-uuid"),
      score: json!(3),
      evidence_text: json!("x".repeat(300)),
      ..Default::default()
    };

    let payload = SubmissionPayload {
      relationship_type: Value::Null,
      start_date: json!("2024-05-01"),
      end_date: json!("2023-01-01"),
      confidence_level: json!("sure"),
      rehire_decision: json!("maybe"),
      overall_recommendation: json!("love_them"),
      kpis: json!([bad, dup, stranger]),
      ..Default::default()
    };

    let report = validate(&payload, &request(set), &kpis);
    let all = report.errors.join("\n");
    assert!(!report.valid);
    for needle in [
      "relationship_type is required",
      "end_date must not be before start_date",
      "confidence_level must be one of: high, medium, low",
      "rehire_decision must be one of: yes, no, conditional",
      "overall_recommendation must be one of",
      "KPIs not part of this rubric: not-a-uuid",
      "kpis[0].score must be an integer",
      "kpis[0].evidence_text is required",
      "kpis[0].confidence_level must be one of",
      "kpis[1]: duplicate kpi_id",
      "kpis[1].score must be an integer",
    ] {
      assert!(all.contains(needle), "missing {needle:?} in:\n{all}");
    }
    assert_eq!(report.unknown_kpi_ids, vec!["not-a-uuid".to_string()]);
  }

  #[test]
  fn empty_kpi_list_is_rejected() {
    let set = Uuid::new_v4();
    let report = validate(&base(vec![]), &request(set), &[]);
    assert_eq!(report.errors, vec!["kpis must be a non-empty list".to_string()]);
    assert!(matches!(
      accept(&base(vec![]), &request(set), &[]),
      Err(Error::Validation(errs)) if errs.len() == 1
    ));
  }

  #[test]
  fn per_kpi_confidence_overrides_overall() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 5);
    let mut payload = base(vec![SubmittedKpi {
      confidence_level: json!("low"),
      ..scored(&own, json!(2), 10)
    }]);
    payload.confidence_level = json!("high");

    let accepted = accept(&payload, &request(set), &[own]).unwrap();
    assert_eq!(accepted.confidence_level, Confidence::High);
    assert_eq!(accepted.scores[0].confidence_level, Confidence::Low);
  }

  #[test]
  fn wrong_json_types_are_reported_with_everything_else() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 10);
    let payload: SubmissionPayload = serde_json::from_value(json!({
      "relationship_type": 7,
      "rehire_decision": ["yes"],
      "start_date": false,
      "kpis": [
        { "score": 5, "evidence_text": "x" },
        { "kpi_id": 42, "score": 3, "evidence_text": { "text": "nested" } },
        "ownership"
      ]
    }))
    .unwrap();

    let report = validate(&payload, &request(set), &[own]);
    let all = report.errors.join("\n");
    assert!(!report.valid);
    for needle in [
      "relationship_type must be a string",
      "rehire_decision must be a string",
      "start_date must be a string",
      "missing required KPIs: ownership",
      "kpis[0].kpi_id is required",
      "kpis[0].evidence_text must be at least 200 characters",
      "kpis[1].kpi_id must be a string",
      "kpis[1].evidence_text must be a string",
      "kpis[2] must be an object",
    ] {
      assert!(all.contains(needle), "missing {needle:?} in:\n{all}");
    }
  }

  #[test]
  fn kpis_must_be_a_list() {
    let set = Uuid::new_v4();
    let mut payload = base(vec![]);
    payload.kpis = json!({ "ownership": 5 });
    let report = validate(&payload, &request(set), &[]);
    assert_eq!(report.errors, vec!["kpis must be a non-empty list".to_string()]);
  }

  #[test]
  fn referee_id_and_metadata_are_carried() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 5);
    let referee = Uuid::new_v4();
    let mut payload = base(vec![SubmittedKpi {
      evidence_metadata: json!({ "source": "1:1 notes" }),
      ..scored(&own, json!(4), 10)
    }]);
    payload.referee_id = json!(referee);
    payload.rehire_reasoning = json!("  would hire again  ");

    let accepted = accept(&payload, &request(set), &[own]).unwrap();
    assert_eq!(accepted.referee_id, Some(referee));
    assert_eq!(accepted.rehire_reasoning.as_deref(), Some("would hire again"));
    assert_eq!(accepted.scores[0].evidence_metadata, Some(json!({ "source": "1:1 notes" })));

    payload.referee_id = json!("someone");
    let report = validate(&payload, &request(set), &[kpi(set, "other", false, 5)]);
    assert!(report.errors.contains(&"referee_id must be a UUID".to_string()));
  }

  #[test]
  fn records_copy_the_locked_version_and_are_signed() {
    let set = Uuid::new_v4();
    let own = kpi(set, "ownership", true, 5);
    let req = request(set);
    let accepted = accept(&base(vec![scored(&own, json!(5), 10)]), &req, &[own]).unwrap();

    let (reference, scores) = accepted
      .into_records(&req, Uuid::new_v4(), Utc::now())
      .unwrap();
    assert_eq!(reference.kpi_set_version, 3);
    assert_eq!(reference.kpi_set_id, set);
    assert_eq!(reference.signature_hash.len(), 64);
    assert_eq!(scores[0].kpi_key, "ownership");
    assert_eq!(scores[0].reference_id, reference.reference_id);
  }
}
