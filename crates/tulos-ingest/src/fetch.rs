//! Competition-level fetching on top of a [`ResultSource`].

use tulos_core::{
  model::{CompetitionId, CompetitionMeta, EventBatch, EventId},
  normalize::{ClubFilter, normalize_event},
  source::ResultSource,
};

use crate::{Error, Result};

/// Metadata plus the official events to fetch, in schedule order.
#[derive(Debug, Clone)]
pub struct CompetitionPlan {
  pub meta:      CompetitionMeta,
  pub event_ids: Vec<EventId>,
}

/// Fetch a competition's schedule and properties.
///
/// The schedule is required; without it there is nothing to fetch. Failing
/// properties only cost the name and location: a placeholder name is used.
pub async fn fetch_competition_meta<F: ResultSource>(
  source: &F,
  id: CompetitionId,
) -> Result<CompetitionPlan> {
  let overview = source
    .competition_overview(id)
    .await
    .map_err(Error::upstream)?
    .ok_or(Error::CompetitionNotFound(id))?;

  let mut meta = match source.competition_properties(id).await {
    Ok(props) => {
      let mut meta = CompetitionMeta::placeholder(id);
      if let Some(name) = props.name {
        meta.name = name;
      }
      meta.location = props.location;
      meta
    }
    Err(e) => {
      tracing::warn!(competition_id = id, error = %e, "properties unavailable; using placeholder name");
      CompetitionMeta::placeholder(id)
    }
  };
  meta.start_date = overview.first_official_date();
  meta.end_date = overview.last_official_date();

  Ok(CompetitionPlan { meta, event_ids: overview.official_event_ids() })
}

/// Fetch and normalize one event. Failures are logged and yield `None`.
pub async fn fetch_event<F: ResultSource>(
  source: &F,
  meta: &CompetitionMeta,
  event_id: EventId,
  filter: &ClubFilter,
) -> Option<EventBatch> {
  let id = meta.competition_id;
  let event = match source.event_results(id, event_id).await {
    Ok(event) => event,
    Err(e) => {
      tracing::warn!(competition_id = id, event_id, error = %e, "event fetch failed; skipping event");
      return None;
    }
  };

  let batch = normalize_event(meta, event_id, &event, filter);
  if batch.is_none() {
    tracing::warn!(competition_id = id, event_id, "event payload has no name; skipping event");
  }
  batch
}
