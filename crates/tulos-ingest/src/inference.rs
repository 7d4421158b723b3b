//! The demographic inference pass over all athletes.

use serde::Serialize;
use tulos_core::{inference::InferredDemographics, store::ResultStore};

use crate::{Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct InferenceReport {
  pub athletes_scanned:    usize,
  pub birth_years_updated: usize,
  pub genders_updated:     usize,
}

/// Infer birth years and genders from age-group participations.
///
/// Must not run concurrently with ingestion: it reads each athlete's full
/// history once and writes back only what changed.
pub async fn run_inference_pass<S: ResultStore>(store: &S) -> Result<InferenceReport> {
  let histories = store.athlete_histories().await.map_err(Error::store)?;
  let mut report = InferenceReport { athletes_scanned: histories.len(), ..Default::default() };

  for history in &histories {
    let change = InferredDemographics::for_athlete(&history.athlete, &history.participations);
    if change.is_empty() {
      continue;
    }

    let applied = store
      .apply_inference(history.athlete.athlete_id, change)
      .await
      .map_err(Error::store)?;
    report.birth_years_updated += usize::from(applied.birth_year.is_some());
    report.genders_updated += usize::from(applied.gender.is_some());
  }

  tracing::info!(
    athletes = report.athletes_scanned,
    birth_years = report.birth_years_updated,
    genders = report.genders_updated,
    "inference pass finished"
  );
  Ok(report)
}
