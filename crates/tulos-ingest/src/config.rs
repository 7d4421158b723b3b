//! Runtime knobs for an ingestion cycle.

use std::time::Duration;

use tulos_core::{normalize::ClubFilter, retry::RetryPolicy};

pub const MAX_WORKERS: usize = 10;

#[derive(Debug, Clone)]
pub struct IngestConfig {
  /// Only store results of this club. `None` stores everything.
  pub target_club:          Option<String>,
  /// Competitions processed concurrently; clamped to `1..=MAX_WORKERS`.
  pub workers:              usize,
  /// Retry applied to a whole competition.
  pub competition_retry:    RetryPolicy,
  /// Pause between overview probes in range mode.
  pub range_probe_interval: Duration,
  /// Age after which the last successful refresh counts as stale.
  pub staleness:            chrono::Duration,
  /// Program and arguments run after every cycle. Empty disables it.
  pub post_ingest_command:  Vec<String>,
  /// The post-ingest command is killed after this long.
  pub post_ingest_timeout:  Duration,
}

impl Default for IngestConfig {
  fn default() -> Self {
    Self {
      target_club:          None,
      workers:              3,
      competition_retry:    RetryPolicy::fixed(3, Duration::from_secs(5)),
      range_probe_interval: Duration::from_millis(300),
      staleness:            chrono::Duration::hours(24),
      post_ingest_command:  Vec::new(),
      post_ingest_timeout:  Duration::from_secs(500),
    }
  }
}

impl IngestConfig {
  pub fn effective_workers(&self) -> usize { self.workers.clamp(1, MAX_WORKERS) }

  pub fn club_filter(&self) -> ClubFilter { ClubFilter::from(self.target_club.clone()) }
}
