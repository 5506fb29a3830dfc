//! Orchestration for the vouch reference engine.
//!
//! [`ReferenceService`] drives the request lifecycle, the submission saga and
//! both aggregate read paths over any
//! [`ReferenceStore`](vouch_core::store::ReferenceStore) and
//! [`InviteNotifier`](vouch_core::notify::InviteNotifier). It holds no mutable
//! state of its own; every consistency guarantee comes from the store's
//! constraints plus explicit compensation.

mod config;
mod service;

pub mod refresh;

pub use config::{MAX_EXPIRY_DAYS, RetryPolicy, ServiceConfig};
pub use service::{
  CreatedRequest, NewReferenceRequest, ReferenceService, ResolvedRequest, SubmissionReceipt,
};
