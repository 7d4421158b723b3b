//! The `ResultStore` trait.
//!
//! Implemented by storage backends (e.g. `tulos-store-sqlite`). The ingest
//! pipeline and the HTTP API depend on this abstraction, not on any concrete
//! backend.

use std::{collections::HashSet, future::Future};

use chrono::{DateTime, Utc};

use crate::{
  inference::InferredDemographics,
  model::{
    Athlete, AthleteHistory, BatchOutcome, Club, Competition, CompetitionId,
    CompetitionMeta, Discipline, EventBatch, ProcessedEntry, RunRecord,
    StoredResult,
  },
};

/// Abstraction over a results store backend.
///
/// Writes are idempotent: applying the same batch twice leaves the same rows
/// behind, refresh timestamps aside. Athlete demographics are only ever
/// enriched, never overwritten.
///
/// All methods return `Send` futures so the trait can be used in
/// multi-threaded async runtimes (e.g. tokio with `axum`).
pub trait ResultStore: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  // ── Ingestion ─────────────────────────────────────────────────────────

  /// Insert or overwrite competition metadata and bump its refresh time.
  fn upsert_competition(
    &self,
    meta: CompetitionMeta,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// Persist one event's results in a single transaction.
  ///
  /// The competition is always upserted. The discipline and its results are
  /// only written when at least one result is present. A failing result is
  /// rolled back on its own and counted, the rest of the batch continues.
  fn upsert_event_batch(
    &self,
    batch: EventBatch,
  ) -> impl Future<Output = Result<BatchOutcome, Self::Error>> + Send + '_;

  // ── Processed-set ─────────────────────────────────────────────────────

  /// Ids of competitions whose last processing succeeded.
  fn succeeded_competitions(
    &self,
  ) -> impl Future<Output = Result<HashSet<CompetitionId>, Self::Error>> + Send + '_;

  fn processed_entry(
    &self,
    id: CompetitionId,
  ) -> impl Future<Output = Result<Option<ProcessedEntry>, Self::Error>> + Send + '_;

  /// Insert or replace the processing outcome of a competition.
  fn record_processed(
    &self,
    entry: ProcessedEntry,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  // ── Inference ─────────────────────────────────────────────────────────

  /// Every athlete with at least one result, with participations ordered by
  /// competition date.
  fn athlete_histories(
    &self,
  ) -> impl Future<Output = Result<Vec<AthleteHistory>, Self::Error>> + Send + '_;

  /// Write inferred demographics. The write itself refuses to lower a birth
  /// year or replace a gender. Returns which fields actually changed.
  fn apply_inference(
    &self,
    athlete_id: i64,
    change: InferredDemographics,
  ) -> impl Future<Output = Result<InferredDemographics, Self::Error>> + Send + '_;

  // ── Run log ───────────────────────────────────────────────────────────

  fn record_run(
    &self,
    run: RunRecord,
  ) -> impl Future<Output = Result<(), Self::Error>> + Send + '_;

  /// The most recently finished cycle, successful or not.
  fn last_run(
    &self,
  ) -> impl Future<Output = Result<Option<RunRecord>, Self::Error>> + Send + '_;

  /// Finish time of the most recent successful cycle.
  fn last_successful_refresh(
    &self,
  ) -> impl Future<Output = Result<Option<DateTime<Utc>>, Self::Error>> + Send + '_;

  // ── Reads ─────────────────────────────────────────────────────────────

  fn get_competition(
    &self,
    id: CompetitionId,
  ) -> impl Future<Output = Result<Option<Competition>, Self::Error>> + Send + '_;

  fn list_disciplines(
    &self,
    competition_id: CompetitionId,
  ) -> impl Future<Output = Result<Vec<Discipline>, Self::Error>> + Send + '_;

  fn list_clubs(
    &self,
  ) -> impl Future<Output = Result<Vec<Club>, Self::Error>> + Send + '_;

  fn list_athletes(
    &self,
  ) -> impl Future<Output = Result<Vec<Athlete>, Self::Error>> + Send + '_;

  fn find_athlete(
    &self,
    first_name: String,
    last_name: String,
  ) -> impl Future<Output = Result<Option<Athlete>, Self::Error>> + Send + '_;

  fn list_results(
    &self,
    competition_id: CompetitionId,
  ) -> impl Future<Output = Result<Vec<StoredResult>, Self::Error>> + Send + '_;
}
