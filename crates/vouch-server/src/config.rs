//! Server configuration, deserialised from `config.toml` and `VOUCH_*`
//! environment variables.

use std::{path::PathBuf, time::Duration};

use serde::Deserialize;
use vouch_service::{RetryPolicy, ServiceConfig};

/// Runtime server configuration.
#[derive(Deserialize, Clone, Debug)]
pub struct ServerConfig {
  #[serde(default = "default_host")]
  pub host:                       String,
  #[serde(default = "default_port")]
  pub port:                       u16,
  #[serde(default = "default_store_path")]
  pub store_path:                 PathBuf,
  /// Base of the referee-facing invite link.
  pub frontend_base_url:          String,
  #[serde(default = "default_expiry_days")]
  pub default_expiry_days:        u32,
  /// Seconds between expiry sweeps; 0 disables the background sweeper.
  #[serde(default = "default_sweep_interval_secs")]
  pub sweep_interval_secs:        u64,
  /// When set, invitations are POSTed here as JSON. Otherwise they are only
  /// logged (without the link).
  #[serde(default)]
  pub notifier_webhook_url:       Option<String>,
  #[serde(default = "default_refresh_max_attempts")]
  pub refresh_max_attempts:       u32,
  #[serde(default = "default_refresh_initial_backoff_ms")]
  pub refresh_initial_backoff_ms: u64,
}

fn default_host() -> String { "127.0.0.1".into() }
fn default_port() -> u16 { 8080 }
fn default_store_path() -> PathBuf { PathBuf::from("~/.local/share/vouch/vouch.db") }
fn default_expiry_days() -> u32 { 30 }
fn default_sweep_interval_secs() -> u64 { 3600 }
fn default_refresh_max_attempts() -> u32 { 3 }
fn default_refresh_initial_backoff_ms() -> u64 { 250 }

impl ServerConfig {
  /// Settings handed to the domain service.
  pub fn service_config(&self) -> ServiceConfig {
    ServiceConfig {
      frontend_base_url:   self.frontend_base_url.clone(),
      default_expiry_days: self.default_expiry_days,
      refresh:             RetryPolicy {
        max_attempts:    self.refresh_max_attempts,
        initial_backoff: Duration::from_millis(self.refresh_initial_backoff_ms),
        ..Default::default()
      },
    }
  }

  pub fn sweep_interval(&self) -> Option<Duration> {
    (self.sweep_interval_secs > 0).then(|| Duration::from_secs(self.sweep_interval_secs))
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn parse(toml: &str) -> ServerConfig {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize()
      .unwrap()
  }

  #[test]
  fn minimal_config_fills_defaults() {
    let cfg = parse(r#"frontend_base_url = "https://app.example.com""#);
    assert_eq!(cfg.address(), "127.0.0.1:8080");
    assert_eq!(cfg.default_expiry_days, 30);
    assert_eq!(cfg.sweep_interval(), Some(Duration::from_secs(3600)));
    assert!(cfg.notifier_webhook_url.is_none());

    let service = cfg.service_config();
    assert_eq!(service.frontend_base_url, "https://app.example.com");
    assert_eq!(service.refresh.max_attempts, 3);
    assert_eq!(service.refresh.initial_backoff, Duration::from_millis(250));
  }

  #[test]
  fn overrides_reach_the_service() {
    let cfg = parse(
      r#"
        host = "0.0.0.0"
        port = 9000
        frontend_base_url = "https://hire.example.org/"
        default_expiry_days = 14
        sweep_interval_secs = 0
        notifier_webhook_url = "https://hooks.example.org/invites"
        refresh_max_attempts = 5
        refresh_initial_backoff_ms = 100
      "#,
    );
    assert_eq!(cfg.address(), "0.0.0.0:9000");
    assert_eq!(cfg.sweep_interval(), None);
    assert_eq!(cfg.notifier_webhook_url.as_deref(), Some("https://hooks.example.org/invites"));

    let service = cfg.service_config();
    assert_eq!(service.default_expiry_days, 14);
    assert_eq!(service.refresh.max_attempts, 5);
    assert_eq!(service.refresh.backoff(2), Duration::from_millis(200));
  }

  #[test]
  fn frontend_base_url_is_required() {
    let result = config::Config::builder()
      .add_source(config::File::from_str("port = 9000", config::FileFormat::Toml))
      .build()
      .unwrap()
      .try_deserialize::<ServerConfig>();
    assert!(result.is_err());
  }
}
