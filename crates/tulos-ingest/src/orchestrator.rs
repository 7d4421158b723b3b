//! The ingestion cycle: discovery, bounded parallel processing, inference.
//!
//! [`Ingestor`] owns the store, the source and a [`RunState`] that allows at
//! most one cycle at a time. A cycle never fails past this module: every
//! problem ends up in the returned [`CycleSummary`] and the run log.

use std::sync::{
  Arc, Mutex, PoisonError,
  atomic::{AtomicBool, Ordering},
};

use chrono::{DateTime, Local, NaiveDate, Utc};
use futures::{StreamExt as _, stream};
use serde::{Deserialize, Serialize};
use tulos_core::{
  model::{CompetitionId, ProcessedEntry, RunRecord},
  normalize::ClubFilter,
  source::ResultSource,
  store::ResultStore,
};
use uuid::Uuid;

use crate::{
  Error, Result,
  config::IngestConfig,
  discovery::{Candidate, DiscoveryReport, discover_from_feed, discover_from_range},
  hook::run_post_ingest,
  inference::{InferenceReport, run_inference_pass},
  pipeline::{CompetitionReport, process_competition},
};

// ─── Cycle types ─────────────────────────────────────────────────────────────

/// Where a cycle gets its candidate competitions from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CycleMode {
  /// The public competition listing.
  Feed,
  /// Every id in `from..=to`.
  Range { from: CompetitionId, to: CompetitionId },
}

/// The outcome of one finished cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CycleSummary {
  pub cycle_id:               Uuid,
  pub mode:                   CycleMode,
  pub started_at:             DateTime<Utc>,
  pub finished_at:            DateTime<Utc>,
  /// False only when discovery or the inference pass failed.
  pub succeeded:              bool,
  /// The most recent failure, for display.
  pub message:                Option<String>,
  pub discovery:              DiscoveryReport,
  pub competitions_succeeded: u32,
  pub competitions_failed:    u32,
  pub results_written:        usize,
  pub inference:              Option<InferenceReport>,
}

impl CycleSummary {
  pub fn to_run_record(&self) -> RunRecord {
    RunRecord {
      cycle_id:               self.cycle_id,
      started_at:             self.started_at,
      finished_at:            self.finished_at,
      succeeded:              self.succeeded,
      message:                self.message.clone(),
      competitions_succeeded: self.competitions_succeeded,
      competitions_failed:    self.competitions_failed,
    }
  }
}

/// What the run-state cell currently holds.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum CycleStatus {
  /// No cycle has run since startup.
  Idle,
  Running {
    cycle_id:   Uuid,
    mode:       CycleMode,
    started_at: DateTime<Utc>,
  },
  Finished(CycleSummary),
}

/// Result of asking for a new cycle.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum TriggerOutcome {
  Started { cycle_id: Uuid },
  /// A cycle is already in progress; nothing was queued.
  AlreadyRunning(CycleStatus),
}

// ─── Run state ───────────────────────────────────────────────────────────────

/// Single-slot "cycle in progress" cell plus the latest status.
#[derive(Debug)]
pub struct RunState {
  running: AtomicBool,
  status:  Mutex<CycleStatus>,
}

impl Default for RunState {
  fn default() -> Self {
    Self { running: AtomicBool::new(false), status: Mutex::new(CycleStatus::Idle) }
  }
}

impl RunState {
  pub fn is_running(&self) -> bool { self.running.load(Ordering::Acquire) }

  pub fn status(&self) -> CycleStatus {
    self.status.lock().unwrap_or_else(PoisonError::into_inner).clone()
  }

  /// Claim the slot, or report what currently holds it.
  fn begin(self: &Arc<Self>, mode: CycleMode) -> Result<RunGuard, CycleStatus> {
    let mut status = self.status.lock().unwrap_or_else(PoisonError::into_inner);
    if self
      .running
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .is_err()
    {
      return Err(status.clone());
    }

    let cycle_id = Uuid::new_v4();
    let started_at = Utc::now();
    *status = CycleStatus::Running { cycle_id, mode, started_at };
    Ok(RunGuard { state: Arc::clone(self), cycle_id, mode, started_at, finished: false })
  }
}

/// Holds the run slot; releases it when finished or dropped.
struct RunGuard {
  state:      Arc<RunState>,
  cycle_id:   Uuid,
  mode:       CycleMode,
  started_at: DateTime<Utc>,
  finished:   bool,
}

impl RunGuard {
  fn finish(mut self, summary: CycleSummary) {
    *self.state.status.lock().unwrap_or_else(PoisonError::into_inner) =
      CycleStatus::Finished(summary);
    self.state.running.store(false, Ordering::Release);
    self.finished = true;
  }
}

impl Drop for RunGuard {
  fn drop(&mut self) {
    if !self.finished {
      // The cycle task died before finishing; free the slot.
      *self.state.status.lock().unwrap_or_else(PoisonError::into_inner) = CycleStatus::Idle;
      self.state.running.store(false, Ordering::Release);
    }
  }
}

// ─── Ingestor ────────────────────────────────────────────────────────────────

struct CompetitionOutcome {
  competition_id: CompetitionId,
  report:         Option<CompetitionReport>,
  error:          Option<String>,
}

/// Drives ingestion cycles against a store and an upstream source.
pub struct Ingestor<S, F> {
  store:  Arc<S>,
  source: Arc<F>,
  config: Arc<IngestConfig>,
  state:  Arc<RunState>,
}

impl<S, F> Clone for Ingestor<S, F> {
  fn clone(&self) -> Self {
    Self {
      store:  Arc::clone(&self.store),
      source: Arc::clone(&self.source),
      config: Arc::clone(&self.config),
      state:  Arc::clone(&self.state),
    }
  }
}

impl<S, F> Ingestor<S, F>
where
  S: ResultStore + 'static,
  F: ResultSource + 'static,
{
  pub fn new(store: Arc<S>, source: Arc<F>, config: IngestConfig) -> Self {
    Self {
      store,
      source,
      config: Arc::new(config),
      state: Arc::new(RunState::default()),
    }
  }

  pub fn store(&self) -> &Arc<S> { &self.store }

  pub fn source(&self) -> &Arc<F> { &self.source }

  pub fn config(&self) -> &IngestConfig { &self.config }

  pub fn status(&self) -> CycleStatus { self.state.status() }

  pub fn is_running(&self) -> bool { self.state.is_running() }

  /// Start a cycle in the background unless one is already running.
  pub fn trigger(&self, mode: CycleMode) -> TriggerOutcome {
    let guard = match self.state.begin(mode) {
      Ok(guard) => guard,
      Err(status) => {
        tracing::info!("refresh requested while a cycle is running; ignored");
        return TriggerOutcome::AlreadyRunning(status);
      }
    };
    let cycle_id = guard.cycle_id;

    let this = self.clone();
    tokio::spawn(async move {
      let summary = this
        .run_cycle(guard.cycle_id, guard.mode, guard.started_at, local_today())
        .await;
      guard.finish(summary);
    });

    TriggerOutcome::Started { cycle_id }
  }

  /// Run a cycle to completion on the calling task.
  ///
  /// Returns the current status instead if another cycle holds the slot.
  pub async fn run_exclusive(&self, mode: CycleMode) -> Result<CycleSummary, CycleStatus> {
    self.run_exclusive_on(mode, local_today()).await
  }

  /// [`Self::run_exclusive`] with an explicit notion of "today".
  pub async fn run_exclusive_on(
    &self,
    mode: CycleMode,
    today: NaiveDate,
  ) -> Result<CycleSummary, CycleStatus> {
    let guard = self.state.begin(mode)?;
    let summary = self
      .run_cycle(guard.cycle_id, guard.mode, guard.started_at, today)
      .await;
    guard.finish(summary.clone());
    Ok(summary)
  }

  /// Run only the inference pass.
  pub async fn infer(&self) -> Result<InferenceReport> {
    run_inference_pass(self.store.as_ref()).await
  }

  pub async fn last_successful_refresh(&self) -> Result<Option<DateTime<Utc>>> {
    self.store.last_successful_refresh().await.map_err(Error::store)
  }

  /// Whether the data is strictly older than the staleness threshold, or
  /// was never refreshed at all.
  pub async fn needs_refresh(&self, now: DateTime<Utc>) -> Result<bool> {
    Ok(match self.last_successful_refresh().await? {
      Some(at) => now - at > self.config.staleness,
      None => true,
    })
  }

  async fn run_cycle(
    &self,
    cycle_id: Uuid,
    mode: CycleMode,
    started_at: DateTime<Utc>,
    today: NaiveDate,
  ) -> CycleSummary {
    tracing::info!(%cycle_id, ?mode, %today, "ingestion cycle started");
    let mut succeeded = true;
    let mut message = None;

    let discovery = match mode {
      CycleMode::Feed => discover_from_feed(self.source.as_ref(), self.store.as_ref(), today).await,
      CycleMode::Range { from, to } => {
        discover_from_range(
          self.source.as_ref(),
          self.store.as_ref(),
          from,
          to,
          today,
          self.config.range_probe_interval,
        )
        .await
      }
    };
    let (candidates, discovery) = match discovery {
      Ok(d) => (d.candidates, d.report),
      Err(e) => {
        tracing::error!(%cycle_id, error = %e, "discovery failed");
        succeeded = false;
        message = Some(format!("discovery failed: {e}"));
        (Vec::new(), DiscoveryReport::default())
      }
    };

    let filter = self.config.club_filter();
    let pending: Vec<_> = candidates
      .into_iter()
      .map(|candidate| self.process_candidate(candidate, &filter))
      .collect();
    let outcomes: Vec<CompetitionOutcome> = stream::iter(pending)
      .buffer_unordered(self.config.effective_workers())
      .collect()
      .await;

    let mut competitions_succeeded = 0;
    let mut competitions_failed = 0;
    let mut results_written = 0;
    for outcome in &outcomes {
      match (&outcome.report, &outcome.error) {
        (Some(report), _) => {
          competitions_succeeded += 1;
          results_written += report.results_written;
        }
        (None, error) => {
          competitions_failed += 1;
          message = Some(format!(
            "competition {}: {}",
            outcome.competition_id,
            error.as_deref().unwrap_or("unknown error")
          ));
        }
      }
    }

    let inference = match run_inference_pass(self.store.as_ref()).await {
      Ok(report) => Some(report),
      Err(e) => {
        tracing::error!(%cycle_id, error = %e, "inference pass failed");
        succeeded = false;
        message = Some(format!("inference failed: {e}"));
        None
      }
    };

    let hook = run_post_ingest(&self.config.post_ingest_command, self.config.post_ingest_timeout);
    if let Err(e) = hook.await {
      tracing::warn!(%cycle_id, error = %e, "post-ingest command failed");
    }

    let summary = CycleSummary {
      cycle_id,
      mode,
      started_at,
      finished_at: Utc::now(),
      succeeded,
      message,
      discovery,
      competitions_succeeded,
      competitions_failed,
      results_written,
      inference,
    };

    if let Err(e) = self.store.record_run(summary.to_run_record()).await {
      tracing::error!(%cycle_id, error = %e, "could not record run");
    }

    tracing::info!(
      %cycle_id,
      succeeded = summary.succeeded,
      competitions_succeeded,
      competitions_failed,
      results_written,
      "ingestion cycle finished"
    );
    summary
  }

  async fn process_candidate(
    &self,
    candidate: Candidate,
    filter: &ClubFilter,
  ) -> CompetitionOutcome {
    let id = candidate.competition_id;
    let operation = format!("competition {id}");

    let result = self
      .config
      .competition_retry
      .run(&operation, Error::is_retryable, |attempt| {
        tracing::debug!(competition_id = id, attempt, name = ?candidate.name, "processing competition");
        process_competition(self.source.as_ref(), self.store.as_ref(), id, filter)
      })
      .await;

    let (entry, outcome) = match result {
      Ok(done) => (
        ProcessedEntry {
          competition_id: id,
          succeeded:      true,
          attempts:       done.attempts,
          last_error:     None,
          updated_at:     Utc::now(),
        },
        CompetitionOutcome { competition_id: id, report: Some(done.value), error: None },
      ),
      Err(failed) => {
        let error = failed.error.to_string();
        tracing::error!(competition_id = id, attempts = failed.attempts, %error, "competition failed");
        (
          ProcessedEntry {
            competition_id: id,
            succeeded:      false,
            attempts:       failed.attempts,
            last_error:     Some(error.clone()),
            updated_at:     Utc::now(),
          },
          CompetitionOutcome { competition_id: id, report: None, error: Some(error) },
        )
      }
    };

    if let Err(e) = self.store.record_processed(entry).await {
      tracing::warn!(competition_id = id, error = %e, "could not record processing outcome");
    }
    outcome
  }
}

fn local_today() -> NaiveDate { Local::now().date_naive() }
