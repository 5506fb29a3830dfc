//! Reference requests, the invitations a candidate sends to referees.
//!
//! A request locks the rubric version that was active when it was created and
//! carries only the one-way digest of its bearer token. Requests are never
//! deleted; their status moves once from `pending` to a terminal state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString, VariantNames};
use uuid::Uuid;

// ─── Enums ───────────────────────────────────────────────────────────────────

/// How the referee knows the candidate.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  PartialOrd,
  Ord,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
  VariantNames,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RelationshipType {
  Manager,
  Peer,
  Report,
  Client,
  Mentor,
  Other,
}

/// Lifecycle state of a [`ReferenceRequest`].
///
/// `pending` is the only state with outgoing transitions; the other three
/// are terminal.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Serialize,
  Deserialize,
  AsRefStr,
  Display,
  EnumString,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RequestStatus {
  Pending,
  Submitted,
  Expired,
  Revoked,
}

impl RequestStatus {
  pub fn is_terminal(self) -> bool { !matches!(self, Self::Pending) }

  /// Whether `self -> next` is a legal transition.
  pub fn can_transition_to(self, next: RequestStatus) -> bool {
    self == Self::Pending && next != Self::Pending
  }
}

// ─── ReferenceRequest ────────────────────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReferenceRequest {
  pub request_id:        Uuid,
  pub candidate_id:      Uuid,
  pub referee_email:     String,
  pub referee_name:      Option<String>,
  pub relationship_type: RelationshipType,
  pub role:              String,
  pub seniority_level:   String,
  /// Rubric version locked at creation; never re-resolved.
  pub kpi_set_id:        Uuid,
  pub kpi_set_version:   u32,
  /// Hex SHA-256 of the bearer token. The plaintext is never stored.
  #[serde(skip_serializing)]
  pub token_hash:        String,
  pub expires_at:        DateTime<Utc>,
  pub status:            RequestStatus,
  pub created_at:        DateTime<Utc>,
}

impl ReferenceRequest {
  /// A pending request whose deadline has passed.
  pub fn is_overdue(&self, now: DateTime<Utc>) -> bool {
    self.status == RequestStatus::Pending && now >= self.expires_at
  }
}

// ─── Invite ──────────────────────────────────────────────────────────────────

/// Everything a notification transport needs to deliver an invitation.
///
/// `invite_url` embeds the bearer token; transports must not log it.
#[derive(Debug, Clone, Serialize)]
pub struct Invite {
  pub request_id:      Uuid,
  pub candidate_id:    Uuid,
  pub referee_email:   String,
  pub referee_name:    Option<String>,
  pub role:            String,
  pub seniority_level: String,
  pub invite_url:      String,
  pub expires_at:      DateTime<Utc>,
}

/// Build the referee-facing link for a token.
pub fn invite_url(frontend_base: &str, token: &str) -> String {
  format!("{}/references/submit/{token}", frontend_base.trim_end_matches('/'))
}
