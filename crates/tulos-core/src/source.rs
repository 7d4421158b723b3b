//! The `ResultSource` trait and the upstream shapes it yields.
//!
//! Implemented by `tulos-feed` over HTTP and by in-memory fakes in tests.
//! Values here are already decoded from JSON but not yet normalized: every
//! scalar is kept as text, exactly as published.

use std::future::Future;

use chrono::NaiveDate;

use crate::model::{CompetitionId, EventId};

// ─── Upstream shapes ─────────────────────────────────────────────────────────

/// One entry of the public competition listing.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionListing {
  pub competition_id: CompetitionId,
  pub name:           Option<String>,
  /// Date text as published: ISO or `DD.MM.YYYY`.
  pub date:           Option<String>,
}

/// One round within a competition day.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundSummary {
  pub event_id:   Option<EventId>,
  pub event_name: Option<String>,
  pub status:     Option<String>,
}

impl RoundSummary {
  pub fn is_official(&self) -> bool { self.status.as_deref() == Some("Official") }
}

/// Rounds grouped by the competition day they belong to.
#[derive(Debug, Clone, PartialEq)]
pub struct CompetitionDay {
  pub date:   NaiveDate,
  pub rounds: Vec<RoundSummary>,
}

/// The per-competition schedule.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitionOverview {
  /// Sorted by date.
  pub days: Vec<CompetitionDay>,
}

impl CompetitionOverview {
  /// Days that carry at least one official round.
  pub fn official_days(&self) -> impl Iterator<Item = &CompetitionDay> {
    self.days.iter().filter(|d| d.rounds.iter().any(RoundSummary::is_official))
  }

  pub fn first_official_date(&self) -> Option<NaiveDate> {
    self.official_days().map(|d| d.date).min()
  }

  pub fn last_official_date(&self) -> Option<NaiveDate> {
    self.official_days().map(|d| d.date).max()
  }

  /// Ids of official events in schedule order, without duplicates.
  pub fn official_event_ids(&self) -> Vec<EventId> {
    let mut ids = Vec::new();
    for round in self.days.iter().flat_map(|d| &d.rounds) {
      if let Some(id) = round.event_id.filter(|_| round.is_official()) {
        if !ids.contains(&id) {
          ids.push(id);
        }
      }
    }
    ids
  }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CompetitionProperties {
  pub name:     Option<String>,
  pub location: Option<String>,
}

/// One published result row.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawResult {
  pub rank:       Option<String>,
  pub name:       Option<String>,
  pub club:       Option<String>,
  pub result:     Option<String>,
  pub gender:     Option<String>,
  pub birth_year: Option<String>,
}

/// An event's name and the rows of every round, flattened.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct EventResults {
  pub name: Option<String>,
  pub rows: Vec<RawResult>,
}

// ─── Trait ───────────────────────────────────────────────────────────────────

/// Read access to the upstream results service.
pub trait ResultSource: Send + Sync {
  type Error: std::error::Error + Send + Sync + 'static;

  /// The public listing of competitions.
  fn list_competitions(
    &self,
  ) -> impl Future<Output = Result<Vec<CompetitionListing>, Self::Error>> + Send + '_;

  /// The schedule of a competition. `None` if the id does not exist.
  fn competition_overview(
    &self,
    id: CompetitionId,
  ) -> impl Future<Output = Result<Option<CompetitionOverview>, Self::Error>> + Send + '_;

  fn competition_properties(
    &self,
    id: CompetitionId,
  ) -> impl Future<Output = Result<CompetitionProperties, Self::Error>> + Send + '_;

  fn event_results(
    &self,
    id: CompetitionId,
    event_id: EventId,
  ) -> impl Future<Output = Result<EventResults, Self::Error>> + Send + '_;
}
