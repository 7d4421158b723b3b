//! Encoding and decoding helpers between Rust domain types and the plain-text
//! representations stored in SQLite columns.
//!
//! Timestamps are stored as fixed-width RFC 3339 strings (microseconds, `Z`)
//! so they sort lexically. Dates are `YYYY-MM-DD`. UUIDs are hyphenated
//! lowercase strings.

use std::str::FromStr as _;

use chrono::{DateTime, NaiveDate, SecondsFormat, Utc};
use tulos_core::model::{
  Athlete, Competition, CompetitionMeta, Gender, ProcessedEntry, RunRecord,
};
use uuid::Uuid;

use crate::{Error, Result};

// ─── Scalars ─────────────────────────────────────────────────────────────────

pub fn encode_uuid(id: Uuid) -> String { id.hyphenated().to_string() }

pub fn decode_uuid(s: &str) -> Result<Uuid> { Ok(Uuid::parse_str(s)?) }

pub fn encode_dt(dt: DateTime<Utc>) -> String {
  dt.to_rfc3339_opts(SecondsFormat::Micros, true)
}

pub fn decode_dt(s: &str) -> Result<DateTime<Utc>> {
  DateTime::parse_from_rfc3339(s)
    .map(|dt| dt.with_timezone(&Utc))
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

pub fn encode_date(d: NaiveDate) -> String { d.format("%Y-%m-%d").to_string() }

pub fn decode_date(s: &str) -> Result<NaiveDate> {
  NaiveDate::parse_from_str(s, "%Y-%m-%d")
    .map_err(|e| Error::DateParse(format!("{s:?}: {e}")))
}

fn decode_opt_date(s: Option<String>) -> Result<Option<NaiveDate>> {
  s.as_deref().map(decode_date).transpose()
}

pub fn encode_gender(g: Gender) -> &'static str {
  match g {
    Gender::Male => "M",
    Gender::Female => "N",
  }
}

pub fn decode_gender(s: &str) -> Result<Gender> {
  Gender::from_str(s).map_err(|_| tulos_core::Error::UnknownGender(s.to_string()).into())
}

// ─── Row types ───────────────────────────────────────────────────────────────

/// Raw values read directly from a `competitions` row.
pub struct RawCompetition {
  pub competition_id: i64,
  pub name:           String,
  pub location:       Option<String>,
  pub start_date:     Option<String>,
  pub end_date:       Option<String>,
  pub refreshed_at:   String,
}

impl RawCompetition {
  pub const COLUMNS: &'static str =
    "competition_id, name, location, start_date, end_date, refreshed_at";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      competition_id: row.get(0)?,
      name:           row.get(1)?,
      location:       row.get(2)?,
      start_date:     row.get(3)?,
      end_date:       row.get(4)?,
      refreshed_at:   row.get(5)?,
    })
  }

  pub fn into_competition(self) -> Result<Competition> {
    Ok(Competition {
      meta:         CompetitionMeta {
        competition_id: self.competition_id,
        name:           self.name,
        location:       self.location,
        start_date:     decode_opt_date(self.start_date)?,
        end_date:       decode_opt_date(self.end_date)?,
      },
      refreshed_at: decode_dt(&self.refreshed_at)?,
    })
  }
}

/// Raw values read directly from an `athletes` row.
pub struct RawAthlete {
  pub athlete_id: i64,
  pub first_name: String,
  pub last_name:  String,
  pub birth_year: Option<i32>,
  pub gender:     Option<String>,
  pub club_id:    Option<i64>,
}

impl RawAthlete {
  pub const COLUMNS: &'static str =
    "athlete_id, first_name, last_name, birth_year, gender, club_id";

  /// Reads the six athlete columns starting at `offset`.
  pub fn from_row_at(row: &rusqlite::Row<'_>, offset: usize) -> rusqlite::Result<Self> {
    Ok(Self {
      athlete_id: row.get(offset)?,
      first_name: row.get(offset + 1)?,
      last_name:  row.get(offset + 2)?,
      birth_year: row.get(offset + 3)?,
      gender:     row.get(offset + 4)?,
      club_id:    row.get(offset + 5)?,
    })
  }

  pub fn into_athlete(self) -> Result<Athlete> {
    Ok(Athlete {
      athlete_id: self.athlete_id,
      first_name: self.first_name,
      last_name:  self.last_name,
      birth_year: self.birth_year,
      gender:     self.gender.as_deref().map(decode_gender).transpose()?,
      club_id:    self.club_id,
    })
  }
}

/// Raw values read directly from a `processed_competitions` row.
pub struct RawProcessed {
  pub competition_id: i64,
  pub succeeded:      bool,
  pub attempts:       u32,
  pub last_error:     Option<String>,
  pub updated_at:     String,
}

impl RawProcessed {
  pub fn into_entry(self) -> Result<ProcessedEntry> {
    Ok(ProcessedEntry {
      competition_id: self.competition_id,
      succeeded:      self.succeeded,
      attempts:       self.attempts,
      last_error:     self.last_error,
      updated_at:     decode_dt(&self.updated_at)?,
    })
  }
}

/// Raw values read directly from an `ingest_runs` row.
pub struct RawRun {
  pub cycle_id:               String,
  pub started_at:             String,
  pub finished_at:            String,
  pub succeeded:              bool,
  pub message:                Option<String>,
  pub competitions_succeeded: u32,
  pub competitions_failed:    u32,
}

impl RawRun {
  pub const COLUMNS: &'static str = "cycle_id, started_at, finished_at, succeeded, message, \
                                     competitions_succeeded, competitions_failed";

  pub fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
    Ok(Self {
      cycle_id:               row.get(0)?,
      started_at:             row.get(1)?,
      finished_at:            row.get(2)?,
      succeeded:              row.get(3)?,
      message:                row.get(4)?,
      competitions_succeeded: row.get(5)?,
      competitions_failed:    row.get(6)?,
    })
  }

  pub fn into_run(self) -> Result<RunRecord> {
    Ok(RunRecord {
      cycle_id:               decode_uuid(&self.cycle_id)?,
      started_at:             decode_dt(&self.started_at)?,
      finished_at:            decode_dt(&self.finished_at)?,
      succeeded:              self.succeeded,
      message:                self.message,
      competitions_succeeded: self.competitions_succeeded,
      competitions_failed:    self.competitions_failed,
    })
  }
}

#[cfg(test)]
mod tests {
  use chrono::TimeZone as _;

  use super::*;

  #[test]
  fn timestamps_are_fixed_width() {
    let a = Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap();
    let b = a + chrono::Duration::milliseconds(500);
    assert_eq!(encode_dt(a).len(), encode_dt(b).len());
    assert!(encode_dt(a) < encode_dt(b));
    assert_eq!(decode_dt(&encode_dt(b)).unwrap(), b);
  }

  #[test]
  fn unknown_gender_is_an_error() {
    assert!(decode_gender("X").is_err());
    assert_eq!(decode_gender(encode_gender(Gender::Female)).unwrap(), Gender::Female);
  }
}
