//! Server configuration: an optional TOML file overlaid by `PR_REVIEWER_*`
//! environment variables.
//!
//! Nested keys use `__` in environment names, e.g.
//! `PR_REVIEWER_HTTP__PORT=9000` or `PR_REVIEWER_STORE__PATH=/data/pr.db`.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use config::{Config, ConfigError, Environment, File, builder::DefaultState};
use pr_reviewer_store_sqlite::StoreOptions;
use serde::Deserialize;

const ENV_PREFIX: &str = "PR_REVIEWER";

/// Deployment flavour; selects the log format and default level.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Env {
  #[default]
  Local,
  Dev,
  Prod,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
  pub env:   Env,
  pub http:  HttpConfig,
  pub store: StoreConfig,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct HttpConfig {
  pub host:                 String,
  pub port:                 u16,
  pub request_timeout_secs: u64,
}

impl Default for HttpConfig {
  fn default() -> Self {
    Self { host: "127.0.0.1".to_string(), port: 8080, request_timeout_secs: 5 }
  }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub path:                 PathBuf,
  pub busy_timeout_ms:      u64,
  pub operation_timeout_ms: Option<u64>,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      path:                 PathBuf::from("pr-reviewer.db"),
      busy_timeout_ms:      5000,
      operation_timeout_ms: None,
    }
  }
}

impl ServerConfig {
  /// Read `path` if it exists, then apply environment overrides.
  pub fn load(path: &Path) -> Result<Self, ConfigError> {
    Self::from_builder(Config::builder().add_source(File::from(path).required(false)))
  }

  fn from_builder(builder: config::ConfigBuilder<DefaultState>) -> Result<Self, ConfigError> {
    builder
      .add_source(
        Environment::with_prefix(ENV_PREFIX)
          .prefix_separator("_")
          .separator("__")
          .try_parsing(true),
      )
      .build()?
      .try_deserialize()
  }

  pub fn address(&self) -> String { format!("{}:{}", self.http.host, self.http.port) }

  pub fn request_timeout(&self) -> Duration { Duration::from_secs(self.http.request_timeout_secs) }
}

impl StoreConfig {
  pub fn options(&self) -> StoreOptions {
    StoreOptions {
      busy_timeout:      Duration::from_millis(self.busy_timeout_ms),
      operation_timeout: self.operation_timeout_ms.map(Duration::from_millis),
    }
  }
}
