//! Invite transports.
//!
//! [`LogNotifier`] records that an invitation is ready without exposing the
//! link. [`WebhookNotifier`] POSTs the [`Invite`] as JSON to a configured URL
//! for an external mailer to pick up. [`Notifier`] selects between them at
//! startup.

use std::{convert::Infallible, time::Duration};

use thiserror::Error;
use tracing::{debug, info};
use vouch_core::{notify::InviteNotifier, request::Invite};

use crate::ServerConfig;

#[derive(Debug, Error)]
pub enum NotifyError {
  #[error("webhook request failed: {0}")]
  Http(#[from] reqwest::Error),

  #[error("webhook responded with {0}")]
  Status(reqwest::StatusCode),
}

// ─── Log ─────────────────────────────────────────────────────────────────────

/// Logs the request id and recipient. The invite URL is never written.
#[derive(Debug, Default, Clone)]
pub struct LogNotifier;

impl InviteNotifier for LogNotifier {
  type Error = Infallible;

  async fn send_invite(&self, invite: &Invite) -> Result<(), Infallible> {
    info!(
      request_id = %invite.request_id,
      referee = %invite.referee_email,
      expires_at = %invite.expires_at,
      "invitation ready; no delivery transport configured"
    );
    Ok(())
  }
}

// ─── Webhook ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct WebhookNotifier {
  client: reqwest::Client,
  url:    String,
}

impl WebhookNotifier {
  pub fn new(url: impl Into<String>) -> Result<Self, NotifyError> {
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(10))
      .build()?;
    Ok(Self { client, url: url.into() })
  }
}

impl InviteNotifier for WebhookNotifier {
  type Error = NotifyError;

  async fn send_invite(&self, invite: &Invite) -> Result<(), NotifyError> {
    let resp = self.client.post(&self.url).json(invite).send().await?;
    let status = resp.status();
    if !status.is_success() {
      return Err(NotifyError::Status(status));
    }
    debug!(request_id = %invite.request_id, %status, "invitation handed to webhook");
    Ok(())
  }
}

// ─── Selection ───────────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub enum Notifier {
  Log(LogNotifier),
  Webhook(WebhookNotifier),
}

impl Notifier {
  pub fn from_config(cfg: &ServerConfig) -> Result<Self, NotifyError> {
    Ok(match &cfg.notifier_webhook_url {
      Some(url) => Self::Webhook(WebhookNotifier::new(url.clone())?),
      None => Self::Log(LogNotifier),
    })
  }
}

impl InviteNotifier for Notifier {
  type Error = NotifyError;

  async fn send_invite(&self, invite: &Invite) -> Result<(), NotifyError> {
    match self {
      Self::Log(inner) => inner.send_invite(invite).await.map_err(|never| match never {}),
      Self::Webhook(inner) => inner.send_invite(invite).await,
    }
  }
}
