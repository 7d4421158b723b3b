//! One competition: fetch, normalize, upsert.

use serde::Serialize;
use tulos_core::{
  model::CompetitionId, normalize::ClubFilter, source::ResultSource,
  store::ResultStore,
};

use crate::{
  Error, Result,
  fetch::{fetch_competition_meta, fetch_event},
};

/// What processing a competition achieved.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CompetitionReport {
  pub competition_id:      CompetitionId,
  pub events_total:        usize,
  /// Events whose fetch or store failed.
  pub events_skipped:      usize,
  pub disciplines_written: usize,
  pub results_written:     usize,
  pub results_rejected:    usize,
  pub results_failed:      usize,
}

/// Process one competition.
///
/// Errors only when the competition itself could not be fetched or its
/// metadata could not be stored. Events are fetched one after another and a
/// failing event is skipped.
pub async fn process_competition<F, S>(
  source: &F,
  store: &S,
  id: CompetitionId,
  filter: &ClubFilter,
) -> Result<CompetitionReport>
where
  F: ResultSource,
  S: ResultStore,
{
  let plan = fetch_competition_meta(source, id).await?;
  store
    .upsert_competition(plan.meta.clone())
    .await
    .map_err(Error::store)?;

  let mut report = CompetitionReport {
    competition_id: id,
    events_total: plan.event_ids.len(),
    ..Default::default()
  };

  for &event_id in &plan.event_ids {
    let Some(batch) = fetch_event(source, &plan.meta, event_id, filter).await else {
      report.events_skipped += 1;
      continue;
    };

    match store.upsert_event_batch(batch).await {
      Ok(outcome) => {
        report.disciplines_written += usize::from(outcome.discipline_written);
        report.results_written += outcome.results_written;
        report.results_rejected += outcome.results_rejected;
        report.results_failed += outcome.results_failed;
      }
      Err(e) => {
        tracing::warn!(competition_id = id, event_id, error = %e, "event not stored");
        report.events_skipped += 1;
      }
    }
  }

  tracing::info!(
    competition_id = id,
    name = %plan.meta.name,
    events = report.events_total,
    skipped = report.events_skipped,
    results = report.results_written,
    "competition processed"
  );
  Ok(report)
}
