//! Domain types: the rows the ingester writes and the batches it writes
//! them from.
//!
//! Competitions and disciplines are keyed by identifiers assigned upstream.
//! Clubs, athletes and results get surrogate keys from the store. Athletes
//! have no upstream identifier at all: they are resolved by
//! `(first_name, last_name)`, see [`crate::normalize::split_name`].

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Upstream competition identifier. Not generated locally.
pub type CompetitionId = i64;

/// Upstream event identifier. Only unique within one competition.
pub type EventId = i64;

/// Placeholder club name used when a result row carries no organisation.
pub const NO_CLUB: &str = "-";

// ─── Gender ──────────────────────────────────────────────────────────────────

/// Two-letter domain gender code: `M` for men, `N` for women.
#[derive(
  Debug,
  Clone,
  Copy,
  PartialEq,
  Eq,
  Hash,
  Serialize,
  Deserialize,
  strum::AsRefStr,
  strum::Display,
  strum::EnumString,
)]
pub enum Gender {
  #[serde(rename = "M")]
  #[strum(serialize = "M")]
  Male,
  #[serde(rename = "N")]
  #[strum(serialize = "N")]
  Female,
}

impl Gender {
  /// Map the upstream `MALE` / `FEMALE` vocabulary; anything else is `None`.
  pub fn from_upstream(s: &str) -> Option<Self> {
    match s.trim().to_ascii_uppercase().as_str() {
      "MALE" => Some(Self::Male),
      "FEMALE" => Some(Self::Female),
      _ => None,
    }
  }

  /// The gender implied by the leading letter of an age-group code.
  ///
  /// `P` (boys) and `M` (men) are male, `T` (girls) and `N` (women) female.
  pub fn from_age_group_letter(c: char) -> Option<Self> {
    match c.to_ascii_uppercase() {
      'P' | 'M' => Some(Self::Male),
      'T' | 'N' => Some(Self::Female),
      _ => None,
    }
  }
}

// ─── Competition ─────────────────────────────────────────────────────────────

/// Competition metadata as fetched from upstream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompetitionMeta {
  pub competition_id: CompetitionId,
  pub name:           String,
  pub location:       Option<String>,
  pub start_date:     Option<NaiveDate>,
  pub end_date:       Option<NaiveDate>,
}

impl CompetitionMeta {
  /// Metadata used when upstream properties are unavailable.
  pub fn placeholder(competition_id: CompetitionId) -> Self {
    Self {
      competition_id,
      name: format!("Competition {competition_id}"),
      location: None,
      start_date: None,
      end_date: None,
    }
  }
}

/// A persisted competition row.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Competition {
  pub meta:         CompetitionMeta,
  /// Bumped on every upsert.
  pub refreshed_at: DateTime<Utc>,
}

// ─── Discipline, club, athlete, result ───────────────────────────────────────

/// One contested event within a competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Discipline {
  pub event_id:       EventId,
  pub competition_id: CompetitionId,
  pub name:           String,
  pub age_group:      Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Club {
  pub club_id:      i64,
  pub name:         String,
  pub location:     Option<String>,
  pub abbreviation: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Athlete {
  pub athlete_id: i64,
  pub first_name: String,
  pub last_name:  String,
  pub birth_year: Option<i32>,
  pub gender:     Option<Gender>,
  pub club_id:    Option<i64>,
}

/// A persisted result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredResult {
  pub result_id:      i64,
  pub event_id:       EventId,
  pub competition_id: CompetitionId,
  pub athlete_id:     i64,
  pub rank:           i64,
  pub value:          Option<f64>,
  pub raw_result:     String,
}

// ─── Normalized input ────────────────────────────────────────────────────────

/// One upstream result row after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedResult {
  /// `0` when upstream rank is missing or not a number.
  pub rank:       i64,
  /// Display name as published, e.g. `"Anna Maria Virtanen"`.
  pub name:       String,
  /// Club name, or [`NO_CLUB`].
  pub club:       String,
  /// Comparable numeric value; `None` for DNS/DNF and free text.
  pub value:      Option<f64>,
  pub raw_result: String,
  pub age_group:  Option<String>,
  pub gender:     Option<Gender>,
  pub birth_year: Option<i32>,
}

impl NormalizedResult {
  pub fn club_name(&self) -> Option<&str> {
    (self.club != NO_CLUB && !self.club.is_empty()).then_some(self.club.as_str())
  }
}

/// Everything the upsert engine needs for one `(competition, event)` pair.
#[derive(Debug, Clone)]
pub struct EventBatch {
  pub competition: CompetitionMeta,
  pub event_id:    EventId,
  /// Canonical discipline name.
  pub discipline:  String,
  pub age_group:   Option<String>,
  pub results:     Vec<NormalizedResult>,
}

/// What one [`EventBatch`] upsert actually wrote.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BatchOutcome {
  pub discipline_written: bool,
  pub results_written:    usize,
  /// Rows whose name could not be split into given name and surname.
  pub results_rejected:   usize,
  /// Rows that hit a store error and were rolled back individually.
  pub results_failed:     usize,
}

// ─── Processed-set ───────────────────────────────────────────────────────────

/// Discovery skip bookkeeping for one competition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProcessedEntry {
  pub competition_id: CompetitionId,
  pub succeeded:      bool,
  /// Attempts used by the most recent processing.
  pub attempts:       u32,
  pub last_error:     Option<String>,
  pub updated_at:     DateTime<Utc>,
}

// ─── Inference input ─────────────────────────────────────────────────────────

/// One result of an athlete, reduced to what inference looks at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Participation {
  pub age_group:        Option<String>,
  pub competition_date: Option<NaiveDate>,
}

/// An athlete together with every participation, oldest competition first.
#[derive(Debug, Clone)]
pub struct AthleteHistory {
  pub athlete:        Athlete,
  pub participations: Vec<Participation>,
}

// ─── Run log ─────────────────────────────────────────────────────────────────

/// A finished ingestion cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
  pub cycle_id:               Uuid,
  pub started_at:             DateTime<Utc>,
  pub finished_at:            DateTime<Utc>,
  pub succeeded:              bool,
  /// Human-readable message from the most recent failure, if any.
  pub message:                Option<String>,
  pub competitions_succeeded: u32,
  pub competitions_failed:    u32,
}

#[cfg(test)]
mod tests {
  use std::str::FromStr as _;

  use super::*;

  #[test]
  fn gender_codes_round_trip_through_strum() {
    assert_eq!(Gender::Male.as_ref(), "M");
    assert_eq!(Gender::Female.to_string(), "N");
    assert_eq!(Gender::from_str("N").unwrap(), Gender::Female);
    assert!(Gender::from_str("X").is_err());
  }

  #[test]
  fn upstream_gender_vocabulary() {
    assert_eq!(Gender::from_upstream("MALE"), Some(Gender::Male));
    assert_eq!(Gender::from_upstream("female"), Some(Gender::Female));
    assert_eq!(Gender::from_upstream("MIXED"), None);
  }

  #[test]
  fn age_group_letters() {
    assert_eq!(Gender::from_age_group_letter('T'), Some(Gender::Female));
    assert_eq!(Gender::from_age_group_letter('n'), Some(Gender::Female));
    assert_eq!(Gender::from_age_group_letter('P'), Some(Gender::Male));
    assert_eq!(Gender::from_age_group_letter('M'), Some(Gender::Male));
    assert_eq!(Gender::from_age_group_letter('X'), None);
  }

  #[test]
  fn gender_serializes_as_code() {
    assert_eq!(serde_json::to_string(&Gender::Female).unwrap(), "\"N\"");
  }

  #[test]
  fn placeholder_club_is_not_a_club() {
    let mut r = NormalizedResult {
      rank:       1,
      name:       "Anna Virtanen".into(),
      club:       NO_CLUB.into(),
      value:      None,
      raw_result: "DNS".into(),
      age_group:  None,
      gender:     None,
      birth_year: None,
    };
    assert_eq!(r.club_name(), None);
    r.club = "Noormarkun Nopsa".into();
    assert_eq!(r.club_name(), Some("Noormarkun Nopsa"));
  }
}
