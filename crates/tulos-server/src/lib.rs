//! Wiring for the `tulos` binary: configuration and the HTTP router.

use std::{
  path::{Path, PathBuf},
  time::Duration,
};

use axum::Router;
use serde::Deserialize;
use tower_http::trace::TraceLayer;
use tulos_core::{retry::RetryPolicy, source::ResultSource, store::ResultStore};
use tulos_feed::{DEFAULT_BASE_URL, FeedConfig};
use tulos_ingest::{IngestConfig, Ingestor};

// ─── Configuration ───────────────────────────────────────────────────────────

/// Runtime configuration, deserialised from `tulos.toml` and `TULOS_*`
/// environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
  pub database_path:            PathBuf,
  #[serde(default = "default_api_base_url")]
  pub api_base_url:             String,
  /// Only store results of this club.
  #[serde(default)]
  pub target_club:              Option<String>,
  #[serde(default = "default_workers")]
  pub workers:                  usize,
  /// Attempts per competition, including the first.
  #[serde(default = "default_max_attempts")]
  pub max_attempts:             u32,
  #[serde(default = "default_retry_delay_secs")]
  pub retry_delay_secs:         u64,
  #[serde(default = "default_request_timeout_secs")]
  pub request_timeout_secs:     u64,
  #[serde(default = "default_listing_timeout_secs")]
  pub listing_timeout_secs:     u64,
  #[serde(default = "default_range_probe_interval_ms")]
  pub range_probe_interval_ms:  u64,
  #[serde(default = "default_staleness_hours")]
  pub staleness_hours:          i64,
  /// Program and arguments run after every cycle.
  #[serde(default)]
  pub post_ingest_command:      Vec<String>,
  #[serde(default = "default_post_ingest_timeout_secs")]
  pub post_ingest_timeout_secs: u64,
  #[serde(default = "default_host")]
  pub host:                     String,
  #[serde(default = "default_port")]
  pub port:                     u16,
}

fn default_api_base_url() -> String { DEFAULT_BASE_URL.to_string() }
fn default_workers() -> usize { 3 }
fn default_max_attempts() -> u32 { 3 }
fn default_retry_delay_secs() -> u64 { 5 }
fn default_request_timeout_secs() -> u64 { 10 }
fn default_listing_timeout_secs() -> u64 { 30 }
fn default_range_probe_interval_ms() -> u64 { 300 }
fn default_staleness_hours() -> i64 { 24 }
fn default_post_ingest_timeout_secs() -> u64 { 500 }
fn default_host() -> String { "127.0.0.1".to_string() }
fn default_port() -> u16 { 5240 }

impl ServerConfig {
  /// Layer `TULOS_*` environment variables over the optional file at `path`.
  pub fn load(path: &Path) -> Result<Self, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from(path).required(false))
      .add_source(
        config::Environment::with_prefix("TULOS")
          .try_parsing(true)
          .list_separator(" ")
          .with_list_parse_key("post_ingest_command"),
      )
      .build()?
      .try_deserialize()
  }

  /// The database path with a leading `~` expanded.
  pub fn database_path(&self) -> PathBuf { expand_tilde(&self.database_path) }

  pub fn address(&self) -> String { format!("{}:{}", self.host, self.port) }

  pub fn feed_config(&self) -> FeedConfig {
    FeedConfig {
      base_url: self.api_base_url.clone(),
      request_timeout: Duration::from_secs(self.request_timeout_secs),
      listing_timeout: Duration::from_secs(self.listing_timeout_secs),
      ..FeedConfig::default()
    }
  }

  pub fn ingest_config(&self) -> IngestConfig {
    IngestConfig {
      target_club:          self.target_club.clone(),
      workers:              self.workers,
      competition_retry:    RetryPolicy::fixed(
        self.max_attempts,
        Duration::from_secs(self.retry_delay_secs),
      ),
      range_probe_interval: Duration::from_millis(self.range_probe_interval_ms),
      staleness:            chrono::Duration::hours(self.staleness_hours),
      post_ingest_command:  self.post_ingest_command.clone(),
      post_ingest_timeout:  Duration::from_secs(self.post_ingest_timeout_secs),
    }
  }
}

/// Expand a leading `~` to the user's home directory.
fn expand_tilde(path: &Path) -> PathBuf {
  let s = path.to_string_lossy();
  if let Some(rest) = s.strip_prefix("~/")
    && let Ok(home) = std::env::var("HOME")
  {
    return PathBuf::from(home).join(rest);
  }
  path.to_path_buf()
}

// ─── Router ──────────────────────────────────────────────────────────────────

/// The control API with request tracing.
pub fn router<S, F>(ingestor: Ingestor<S, F>) -> Router
where
  S: ResultStore + 'static,
  F: ResultSource + 'static,
{
  tulos_api::api_router(ingestor).layer(TraceLayer::new_for_http())
}

#[cfg(test)]
mod tests {
  use std::sync::Arc;

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use tower::ServiceExt as _;
  use tulos_feed::FeedClient;
  use tulos_store_sqlite::SqliteStore;

  use super::*;

  fn parse(toml: &str) -> Result<ServerConfig, config::ConfigError> {
    config::Config::builder()
      .add_source(config::File::from_str(toml, config::FileFormat::Toml))
      .build()?
      .try_deserialize()
  }

  #[test]
  fn minimal_config_uses_defaults() {
    let cfg = parse(r#"database_path = "/var/lib/tulos/results.db""#).unwrap();
    assert_eq!(cfg.api_base_url, DEFAULT_BASE_URL);
    assert_eq!(cfg.address(), "127.0.0.1:5240");
    assert_eq!(cfg.target_club, None);

    let ingest = cfg.ingest_config();
    assert_eq!(ingest.workers, 3);
    assert_eq!(ingest.competition_retry, RetryPolicy::fixed(3, Duration::from_secs(5)));
    assert_eq!(ingest.range_probe_interval, Duration::from_millis(300));
    assert_eq!(ingest.staleness, chrono::Duration::hours(24));
    assert!(ingest.post_ingest_command.is_empty());
    assert_eq!(ingest.post_ingest_timeout, Duration::from_secs(500));

    let feed = cfg.feed_config();
    assert_eq!(feed.request_timeout, Duration::from_secs(10));
    assert_eq!(feed.listing_timeout, Duration::from_secs(30));
  }

  #[test]
  fn database_path_is_required() {
    assert!(parse(r#"workers = 4"#).is_err());
  }

  #[test]
  fn overrides_are_applied() {
    let cfg = parse(
      r#"
        database_path       = "results.db"
        target_club         = "Porin Yleisurheilu"
        workers             = 6
        max_attempts        = 5
        staleness_hours     = 6
        post_ingest_command = ["/usr/local/bin/rebuild-site", "--quiet"]
        post_ingest_timeout_secs = 60
        port                = 8080
      "#,
    )
    .unwrap();
    let ingest = cfg.ingest_config();
    assert_eq!(ingest.target_club.as_deref(), Some("Porin Yleisurheilu"));
    assert_eq!(ingest.effective_workers(), 6);
    assert_eq!(ingest.competition_retry.max_attempts, 5);
    assert_eq!(ingest.staleness, chrono::Duration::hours(6));
    assert_eq!(ingest.post_ingest_command.len(), 2);
    assert_eq!(ingest.post_ingest_timeout, Duration::from_secs(60));
    assert_eq!(cfg.address(), "127.0.0.1:8080");
  }

  #[test]
  fn tilde_expands_to_home() {
    let Ok(home) = std::env::var("HOME") else { return };
    assert_eq!(expand_tilde(Path::new("~/tulos.db")), PathBuf::from(home).join("tulos.db"));
    assert_eq!(expand_tilde(Path::new("/tmp/tulos.db")), PathBuf::from("/tmp/tulos.db"));
  }

  #[tokio::test]
  async fn router_serves_status() {
    let cfg = parse(r#"database_path = ":memory:""#).unwrap();
    let store = SqliteStore::open_in_memory().await.unwrap();
    let feed = FeedClient::new(cfg.feed_config()).unwrap();
    let ingestor = Ingestor::new(Arc::new(store), Arc::new(feed), cfg.ingest_config());

    let req = Request::builder().uri("/status").body(Body::empty()).unwrap();
    let resp = router(ingestor).oneshot(req).await.unwrap();
    assert_eq!(resp.status(), StatusCode::OK);
  }
}
