//! Event discovery: decide which competitions a cycle should attempt.
//!
//! Two inputs are supported: the public competition listing, and an
//! operator-supplied range of ids. Either way a competition is only eligible
//! once its date lies before yesterday-inclusive, and competitions whose
//! last processing succeeded are skipped.

use std::time::Duration;

use chrono::NaiveDate;
use serde::Serialize;
use tulos_core::{
  model::CompetitionId,
  normalize::parse_upstream_date,
  source::ResultSource,
  store::ResultStore,
};

use crate::{Error, Result};

/// A competition the cycle should process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Candidate {
  pub competition_id: CompetitionId,
  pub name:           Option<String>,
  pub date:           NaiveDate,
}

/// Why competitions were or were not selected.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct DiscoveryReport {
  /// Ids considered: listing entries or ids in the range.
  pub considered:        usize,
  pub selected:          usize,
  /// Dated today or later.
  pub too_recent:        usize,
  pub already_processed: usize,
  /// No usable date.
  pub undated:           usize,
  /// Range mode only: the id does not exist upstream.
  pub missing:           usize,
  /// Range mode only: the overview request failed; retried next cycle.
  pub probe_failed:      usize,
}

#[derive(Debug, Clone, Default)]
pub struct Discovery {
  pub candidates: Vec<Candidate>,
  pub report:     DiscoveryReport,
}

/// Whether a competition on `date` has settled results as of `today`.
///
/// Only competitions up to and including yesterday qualify; live events
/// still change.
pub fn is_settled(date: NaiveDate, today: NaiveDate) -> bool {
  today.pred_opt().is_some_and(|yesterday| date <= yesterday)
}

/// Candidates from the upstream competition listing.
pub async fn discover_from_feed<F, S>(
  source: &F,
  store: &S,
  today: NaiveDate,
) -> Result<Discovery>
where
  F: ResultSource,
  S: ResultStore,
{
  let listing = source.list_competitions().await.map_err(Error::upstream)?;
  let done = store.succeeded_competitions().await.map_err(Error::store)?;

  let mut discovery = Discovery::default();
  discovery.report.considered = listing.len();

  for entry in listing {
    let id = entry.competition_id;
    let Some(date) = entry.date.as_deref().and_then(parse_upstream_date) else {
      tracing::debug!(competition_id = id, date = ?entry.date, "listing entry has no usable date");
      discovery.report.undated += 1;
      continue;
    };
    if !is_settled(date, today) {
      tracing::debug!(competition_id = id, %date, "competition too recent");
      discovery.report.too_recent += 1;
      continue;
    }
    if done.contains(&id) {
      discovery.report.already_processed += 1;
      continue;
    }
    discovery.candidates.push(Candidate { competition_id: id, name: entry.name, date });
  }

  discovery.report.selected = discovery.candidates.len();
  tracing::info!(
    listed = discovery.report.considered,
    selected = discovery.report.selected,
    too_recent = discovery.report.too_recent,
    already_processed = discovery.report.already_processed,
    "discovered competitions from listing"
  );
  Ok(discovery)
}

/// Candidates from a contiguous id range, probing each unknown id upstream.
///
/// Known-successful ids are skipped without a request. `probe_interval` is
/// slept between probes to go easy on the upstream.
pub async fn discover_from_range<F, S>(
  source: &F,
  store: &S,
  from: CompetitionId,
  to: CompetitionId,
  today: NaiveDate,
  probe_interval: Duration,
) -> Result<Discovery>
where
  F: ResultSource,
  S: ResultStore,
{
  if from > to {
    return Err(tulos_core::Error::InvalidRange { from, to }.into());
  }
  let done = store.succeeded_competitions().await.map_err(Error::store)?;

  let mut discovery = Discovery::default();
  let mut probed = false;

  for id in from..=to {
    discovery.report.considered += 1;
    if done.contains(&id) {
      discovery.report.already_processed += 1;
      continue;
    }

    if probed && !probe_interval.is_zero() {
      tokio::time::sleep(probe_interval).await;
    }
    probed = true;

    let overview = match source.competition_overview(id).await {
      Ok(Some(overview)) => overview,
      Ok(None) => {
        tracing::debug!(competition_id = id, "no such competition");
        discovery.report.missing += 1;
        continue;
      }
      Err(e) => {
        tracing::warn!(competition_id = id, error = %e, "probe failed; skipping id");
        discovery.report.probe_failed += 1;
        continue;
      }
    };

    let Some(date) = overview.first_official_date() else {
      discovery.report.undated += 1;
      continue;
    };
    if !is_settled(date, today) {
      discovery.report.too_recent += 1;
      continue;
    }
    discovery.candidates.push(Candidate { competition_id: id, name: None, date });
  }

  discovery.report.selected = discovery.candidates.len();
  tracing::info!(
    from,
    to,
    selected = discovery.report.selected,
    missing = discovery.report.missing,
    probe_failed = discovery.report.probe_failed,
    already_processed = discovery.report.already_processed,
    "discovered competitions from id range"
  );
  Ok(discovery)
}

#[cfg(test)]
mod tests {
  use super::*;

  fn d(y: i32, m: u32, day: u32) -> NaiveDate { NaiveDate::from_ymd_opt(y, m, day).unwrap() }

  #[test]
  fn only_yesterday_and_earlier_are_settled() {
    let today = d(2024, 6, 10);
    assert!(is_settled(d(2024, 6, 9), today));
    assert!(is_settled(d(2023, 1, 1), today));
    assert!(!is_settled(today, today));
    assert!(!is_settled(d(2024, 6, 11), today));
  }

  #[test]
  fn month_boundaries() {
    assert!(is_settled(d(2024, 2, 29), d(2024, 3, 1)));
    assert!(!is_settled(d(2024, 3, 1), d(2024, 3, 1)));
  }
}
