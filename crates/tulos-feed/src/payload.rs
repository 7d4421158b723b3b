//! Upstream JSON shapes and their conversion into `tulos_core::source` types.
//!
//! The feed is loosely typed: ids and ranks arrive as numbers or strings,
//! objects are sometimes `null`, and bodies may carry `#` comment lines or a
//! byte-order mark. Every field is therefore optional here, and stray values
//! are tolerated rather than failing the whole payload.

use std::collections::BTreeMap;

use serde::{Deserialize, de::DeserializeOwned};
use tulos_core::{
  normalize::parse_upstream_date,
  source::{
    CompetitionDay, CompetitionListing, CompetitionOverview,
    CompetitionProperties, EventResults, RawResult, RoundSummary,
  },
};

use crate::Result;

/// Strip a leading BOM and every `#` comment line, then decode JSON.
pub fn decode_payload<T: DeserializeOwned>(body: &str) -> Result<T> {
  let body = body.trim_start_matches('\u{feff}');
  let cleaned = body
    .lines()
    .filter(|line| !line.trim_start().starts_with('#'))
    .collect::<Vec<_>>()
    .join("\n");
  Ok(serde_json::from_str(&cleaned)?)
}

// ─── Scalars ─────────────────────────────────────────────────────────────────

/// A JSON scalar the feed may publish as either a number or a string.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum Scalar {
  Int(i64),
  Float(f64),
  Text(String),
  Bool(bool),
}

impl Scalar {
  pub fn to_text(&self) -> String {
    match self {
      Self::Int(i) => i.to_string(),
      Self::Float(f) => f.to_string(),
      Self::Text(s) => s.clone(),
      Self::Bool(b) => b.to_string(),
    }
  }

  pub fn as_i64(&self) -> Option<i64> {
    match self {
      Self::Int(i) => Some(*i),
      Self::Text(s) => s.trim().parse().ok(),
      Self::Float(_) | Self::Bool(_) => None,
    }
  }
}

fn text(value: &Option<Scalar>) -> Option<String> { value.as_ref().map(Scalar::to_text) }

/// Either the expected object or something else entirely.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum Loose<T> {
  Value(T),
  Other(serde_json::Value),
}

impl<T> Loose<T> {
  fn value(&self) -> Option<&T> {
    match self {
      Self::Value(v) => Some(v),
      Self::Other(_) => None,
    }
  }
}

// ─── Listing ─────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ListingEntryPayload {
  pub id:   Option<Scalar>,
  pub name: Option<Scalar>,
  pub date: Option<Scalar>,
}

/// `GET /competition`
pub type ListingPayload = Vec<Loose<ListingEntryPayload>>;

pub fn listing_from_payload(payload: ListingPayload) -> Vec<CompetitionListing> {
  payload
    .iter()
    .filter_map(Loose::value)
    .filter_map(|entry| {
      let competition_id = entry.id.as_ref()?.as_i64()?;
      Some(CompetitionListing {
        competition_id,
        name: text(&entry.name),
        date: text(&entry.date),
      })
    })
    .collect()
}

// ─── Overview ────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoundPayload {
  pub event_id:   Option<Scalar>,
  pub event_name: Option<Scalar>,
  pub status:     Option<Scalar>,
}

/// `GET /competition/{id}`: day keys mapping to rounds, plus a
/// `Competition` entry that is not a day.
#[derive(Debug, Clone, Deserialize)]
#[serde(transparent)]
pub struct OverviewPayload(pub BTreeMap<String, serde_json::Value>);

pub fn overview_from_payload(payload: OverviewPayload) -> CompetitionOverview {
  let mut days: Vec<CompetitionDay> = payload
    .0
    .into_iter()
    .filter(|(key, _)| key != "Competition")
    .filter_map(|(key, value)| {
      let date = parse_upstream_date(&key)?;
      let rounds: Vec<Loose<RoundPayload>> = serde_json::from_value(value).ok()?;
      let rounds = rounds
        .iter()
        .filter_map(Loose::value)
        .map(|r| RoundSummary {
          event_id:   r.event_id.as_ref().and_then(Scalar::as_i64),
          event_name: text(&r.event_name),
          status:     text(&r.status),
        })
        .collect();
      Some(CompetitionDay { date, rounds })
    })
    .collect();
  days.sort_by_key(|d| d.date);
  CompetitionOverview { days }
}

// ─── Properties ──────────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertiesCompetitionPayload {
  pub name:     Option<Scalar>,
  pub location: Option<Scalar>,
}

/// `GET /competition/{id}/properties`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct PropertiesPayload {
  pub competition: Option<Loose<PropertiesCompetitionPayload>>,
}

pub fn properties_from_payload(payload: PropertiesPayload) -> CompetitionProperties {
  let Some(c) = payload.competition.as_ref().and_then(Loose::value) else {
    return CompetitionProperties::default();
  };
  let non_blank = |s: String| (!s.trim().is_empty()).then_some(s);
  CompetitionProperties {
    name:     text(&c.name).and_then(non_blank),
    location: text(&c.location).and_then(non_blank),
  }
}

// ─── Event results ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct OrganizationPayload {
  pub name: Option<Scalar>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct ResultRowPayload {
  pub result_rank:  Option<Scalar>,
  pub name:         Option<Scalar>,
  pub organization: Option<Loose<OrganizationPayload>>,
  pub result:       Option<Scalar>,
  pub gender:       Option<Scalar>,
  pub birth_year:   Option<Scalar>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoundResultsPayload {
  pub total_results: Option<Vec<Loose<ResultRowPayload>>>,
}

/// `GET /results/{competition_id}/{event_id}`
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct EventResultsPayload {
  pub name:   Option<Scalar>,
  pub rounds: Option<Vec<Loose<RoundResultsPayload>>>,
}

pub fn event_results_from_payload(payload: EventResultsPayload) -> EventResults {
  let rows = payload
    .rounds
    .iter()
    .flatten()
    .filter_map(Loose::value)
    .flat_map(|round| round.total_results.iter().flatten())
    .filter_map(Loose::value)
    .map(|row| RawResult {
      rank:       text(&row.result_rank),
      name:       text(&row.name),
      club:       row
        .organization
        .as_ref()
        .and_then(Loose::value)
        .and_then(|o| text(&o.name)),
      result:     text(&row.result),
      gender:     text(&row.gender),
      birth_year: text(&row.birth_year),
    })
    .collect();

  EventResults { name: text(&payload.name), rows }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  #[test]
  fn comments_and_bom_are_stripped() {
    let body = "\u{feff}# generated 2024-06-01\n  # cache hit\n{\"Competition\": {\"Name\": \"Kalevan kisat\"}}\n";
    let payload: PropertiesPayload = decode_payload(body).unwrap();
    let props = properties_from_payload(payload);
    assert_eq!(props.name.as_deref(), Some("Kalevan kisat"));
    assert_eq!(props.location, None);
  }

  #[test]
  fn garbage_is_a_json_error() {
    let err = decode_payload::<PropertiesPayload>("# only a comment\n").unwrap_err();
    assert!(matches!(err, crate::Error::Json(_)));
  }

  #[test]
  fn listing_accepts_string_and_numeric_ids() {
    let body = r#"[
      {"Id": 101, "Name": "Seuran kisat", "Date": "2024-06-01"},
      {"Id": "102", "Name": "Piirinmestaruus", "Date": "02.06.2024"},
      {"Name": "no id"},
      "stray"
    ]"#;
    let listing = listing_from_payload(decode_payload(body).unwrap());
    assert_eq!(listing.len(), 2);
    assert_eq!(listing[0].competition_id, 101);
    assert_eq!(listing[1].competition_id, 102);
    assert_eq!(listing[1].date.as_deref(), Some("02.06.2024"));
  }

  #[test]
  fn overview_groups_rounds_by_day() {
    let body = r#"{
      "Competition": {"Name": "ignored"},
      "2024-06-02": [
        {"EventId": 7, "EventName": "T15 60m", "Status": "Official"},
        {"EventId": 8, "EventName": "P15 60m", "Status": "Progress"}
      ],
      "2024-06-01": [
        {"EventId": "5", "EventName": "T15 Pituus", "Status": "Official"},
        null
      ],
      "notes": "not a day"
    }"#;
    let overview = overview_from_payload(decode_payload(body).unwrap());
    assert_eq!(overview.days.len(), 2);
    assert_eq!(overview.days[0].date, NaiveDate::from_ymd_opt(2024, 6, 1).unwrap());
    assert_eq!(overview.official_event_ids(), vec![5, 7]);
    assert_eq!(overview.last_official_date(), NaiveDate::from_ymd_opt(2024, 6, 2));
  }

  #[test]
  fn event_rows_are_flattened_across_rounds() {
    let body = r#"{
      "Name": "T15 60m",
      "Rounds": [
        {"TotalResults": [
          {"ResultRank": 1, "Name": "Anna Virtanen", "Organization": {"Name": "Nopsa"},
           "Result": "8.91", "Gender": "FEMALE", "BirthYear": 2009},
          {"ResultRank": "", "Name": "Bea Lahti", "Organization": null, "Result": "DNS"}
        ]},
        {"TotalResults": null},
        {"TotalResults": [{"ResultRank": 2, "Name": "Cilla Koski", "Result": 9.1}]}
      ]
    }"#;
    let event = event_results_from_payload(decode_payload(body).unwrap());
    assert_eq!(event.name.as_deref(), Some("T15 60m"));
    assert_eq!(event.rows.len(), 3);
    assert_eq!(event.rows[0].club.as_deref(), Some("Nopsa"));
    assert_eq!(event.rows[0].birth_year.as_deref(), Some("2009"));
    assert_eq!(event.rows[1].club, None);
    assert_eq!(event.rows[2].result.as_deref(), Some("9.1"));
  }

  #[test]
  fn missing_event_name_survives_decoding() {
    let event = event_results_from_payload(decode_payload(r#"{"Rounds": []}"#).unwrap());
    assert_eq!(event.name, None);
    assert!(event.rows.is_empty());
  }
}
