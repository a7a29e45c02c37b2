//! Hospital backend server: configuration, SMTP mail transport and the
//! notification outbox dispatcher.
//!
//! The binary in `src/bin/server.rs` wires these together with the HTTP API
//! from `hospital-api` and the SQLite store.

pub mod dispatch;
pub mod mailer;

use std::{
  path::{Path, PathBuf},
  sync::Arc,
  time::Duration,
};

use anyhow::Context as _;
use chrono::TimeDelta;
use hospital_api::{AppState, AuthConfig};
use serde::Deserialize;

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime server configuration, deserialised from `config.toml` and
/// `HOSPITAL_*` environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub host:            String,
  pub port:            u16,
  pub store_path:      PathBuf,
  pub jwt_secret:      String,
  #[serde(default = "default_token_ttl_hours")]
  pub token_ttl_hours: i64,
  #[serde(default)]
  pub smtp:            Option<SmtpConfig>,
  #[serde(default)]
  pub outbox:          OutboxConfig,
}

/// Outgoing mail relay. Without it, patient notices fail permanently.
#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
  pub host:         String,
  pub port:         u16,
  pub username:     String,
  pub password:     String,
  pub from_name:    String,
  pub from_address: String,
  #[serde(default = "default_starttls")]
  pub starttls:     bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutboxConfig {
  #[serde(default = "default_poll_interval_secs")]
  pub poll_interval_secs: u64,
  #[serde(default = "default_max_attempts")]
  pub max_attempts:       u32,
  #[serde(default = "default_batch_size")]
  pub batch_size:         usize,
}

impl Default for OutboxConfig {
  fn default() -> Self {
    Self {
      poll_interval_secs: default_poll_interval_secs(),
      max_attempts:       default_max_attempts(),
      batch_size:         default_batch_size(),
    }
  }
}

impl OutboxConfig {
  pub fn poll_interval(&self) -> Duration { Duration::from_secs(self.poll_interval_secs.max(1)) }
}

fn default_token_ttl_hours() -> i64 { 24 }
fn default_starttls() -> bool { true }
fn default_poll_interval_secs() -> u64 { 30 }
fn default_max_attempts() -> u32 { 5 }
fn default_batch_size() -> usize { 50 }

impl ServerConfig {
  /// Layer the optional TOML file at `path` under `HOSPITAL_*` environment
  /// variables (`__` separates nested keys, e.g. `HOSPITAL_SMTP__HOST`).
  pub fn load(path: &Path) -> anyhow::Result<Self> {
    let settings = config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(config::Environment::with_prefix("HOSPITAL").separator("__"))
      .build()
      .context("failed to read config file")?;
    let mut config: Self = settings
      .try_deserialize()
      .context("failed to deserialise ServerConfig")?;
    config.store_path = expand_tilde(&config.store_path);
    Ok(config)
  }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn auth(&self) -> anyhow::Result<AuthConfig> {
    anyhow::ensure!(!self.jwt_secret.is_empty(), "jwt_secret must not be empty");
    let token_ttl = TimeDelta::try_hours(self.token_ttl_hours)
      .filter(|ttl| *ttl > TimeDelta::zero())
      .context("token_ttl_hours must be a positive number of hours")?;
    Ok(AuthConfig { jwt_secret: self.jwt_secret.clone(), token_ttl })
  }

  /// Application state for the HTTP router.
  pub fn app_state<S>(&self, store: Arc<S>) -> anyhow::Result<AppState<S>> {
    Ok(AppState { store, auth: Arc::new(self.auth()?) })
  }
}

/// Expand a leading `~` to the user's home directory.
pub fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}
