//! Result normalization: raw upstream rows in, [`NormalizedResult`]s out.
//!
//! Everything in here is pure. The parsing rules are deliberately narrow and
//! must stay stable, because stored values are compared across years of
//! ingested competitions.

use std::sync::LazyLock;

use chrono::NaiveDate;
use regex::Regex;

use crate::{
  model::{
    CompetitionMeta, EventBatch, EventId, Gender, NO_CLUB, NormalizedResult,
  },
  source::{EventResults, RawResult},
};

static AGE_GROUP: LazyLock<Regex> = LazyLock::new(|| {
  Regex::new(r"\b([PTNM]\d{1,2})\b").expect("age group pattern is valid")
});

/// Known field-event variants, matched as substrings of the lowercased name.
const DISCIPLINE_SYNONYMS: &[(&str, &str)] = &[
  ("pituus", "Pituus"),
  ("kuula", "Kuula"),
  ("keihäs", "Keihäs"),
  ("korkeus", "Korkeus"),
  ("seiväs", "Seiväs"),
];

const HEAT_MARKERS: &[&str] = &["erä", "paikka"];

// ─── Values ──────────────────────────────────────────────────────────────────

/// Parse a raw result into a comparable number.
///
/// `M.SS.hh` is read as minutes, seconds and hundredths. A plain decimal
/// (comma or period) is read as-is. Everything else, including `DNS`, `DNF`
/// and negative numbers, is `None`.
pub fn parse_result_value(raw: &str) -> Option<f64> {
  let text = raw.trim().replace(',', ".");

  if text.matches('.').count() > 1 {
    let parts: Vec<&str> = text.split('.').collect();
    let [minutes, seconds, hundredths] = parts.as_slice() else {
      return None;
    };
    let minutes: i64 = minutes.parse().ok()?;
    let seconds: f64 = format!("{seconds}.{hundredths}").parse().ok()?;
    return Some(minutes as f64 * 60.0 + seconds);
  }

  let digits = text.replacen('.', "", 1);
  if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
    return None;
  }
  text.parse().ok()
}

// ─── Age groups & disciplines ────────────────────────────────────────────────

/// First age-group code (`P15`, `N`, `T9`, ...) in an event name.
pub fn extract_age_group(event_name: &str) -> Option<String> {
  AGE_GROUP
    .captures(&event_name.to_uppercase())
    .map(|c| c[1].to_string())
}

fn is_category_token(word: &str) -> bool {
  let mut chars = word.chars();
  match chars.next() {
    Some(c) if matches!(c.to_ascii_uppercase(), 'M' | 'N' | 'T' | 'P') => {
      let rest = chars.as_str();
      rest.is_empty() || rest.chars().all(|c| c.is_ascii_digit())
    }
    _ => false,
  }
}

fn is_number_token(word: &str) -> bool {
  let word = word.trim_end_matches(['.', ',', ':']);
  !word.is_empty() && word.chars().all(|c| c.is_ascii_digit())
}

fn is_heat_marker(word: &str) -> bool {
  let lower = word.to_lowercase();
  HEAT_MARKERS.iter().any(|m| {
    lower
      .strip_prefix(m)
      .is_some_and(|rest| rest.chars().all(|c| c.is_ascii_digit() || c == '.' || c == ':'))
  })
}

/// Drop `erä` / `paikka` words together with the number next to them.
fn strip_heat_markers(words: Vec<&str>) -> Vec<&str> {
  let mut keep = vec![true; words.len()];
  for (i, word) in words.iter().enumerate() {
    if !is_heat_marker(word) {
      continue;
    }
    keep[i] = false;
    if words.get(i + 1).is_some_and(|w| is_number_token(w)) {
      keep[i + 1] = false;
    } else if i > 0 && words[i - 1].ends_with('.') && is_number_token(words[i - 1]) {
      keep[i - 1] = false;
    }
  }
  words
    .into_iter()
    .zip(keep)
    .filter_map(|(w, k)| k.then_some(w))
    .collect()
}

/// Reduce a raw event name to its canonical discipline name.
///
/// Never returns an empty string for non-blank input: when cleanup would
/// erase everything, the trimmed original is returned.
pub fn clean_discipline_name(event_name: &str) -> String {
  let original = event_name.trim();
  if original.is_empty() {
    return String::new();
  }

  let lower = original.to_lowercase();
  if let Some((_, canonical)) =
    DISCIPLINE_SYNONYMS.iter().find(|(needle, _)| lower.contains(needle))
  {
    return canonical.to_string();
  }

  let without_categories = original
    .split_whitespace()
    .map(|w| w.trim_end_matches(','))
    .filter(|w| !is_category_token(w))
    .collect::<Vec<_>>()
    .join(" ");

  let without_parens = match without_categories.split_once('(') {
    Some((head, _)) => head,
    None => without_categories.as_str(),
  };

  let mut words = strip_heat_markers(without_parens.split_whitespace().collect());

  if without_parens.to_lowercase().contains("ottelu") {
    words.retain(|w| {
      if w.to_lowercase().contains("ottelu") {
        return false;
      }
      match w.split_once('-') {
        Some((head, _)) => !head.chars().any(|c| c.is_ascii_digit()),
        None => true,
      }
    });
  }

  let cleaned = words.join(" ");
  if cleaned.is_empty() {
    original.to_string()
  } else {
    cleaned
  }
}

// ─── Row fields ──────────────────────────────────────────────────────────────

/// Split a display name into `(given, surname)`.
///
/// The last whitespace-separated token is the surname; everything before it
/// is the given name. Multi-word surnames are mis-split and two people with
/// the same name collapse into one athlete. Returns `None` when either part
/// would be empty.
pub fn split_name(display: &str) -> Option<(String, String)> {
  let mut words: Vec<&str> = display.split_whitespace().collect();
  let surname = words.pop()?;
  if words.is_empty() {
    return None;
  }
  Some((words.join(" "), surname.to_string()))
}

/// Upstream rank, or `0` when it is absent or not a plain number.
pub fn parse_rank(raw: Option<&str>) -> i64 {
  raw
    .map(str::trim)
    .filter(|r| !r.is_empty() && r.chars().all(|c| c.is_ascii_digit()))
    .and_then(|r| r.parse().ok())
    .unwrap_or(0)
}

pub fn parse_birth_year(raw: Option<&str>) -> Option<i32> {
  raw
    .map(str::trim)
    .filter(|r| !r.is_empty() && r.chars().all(|c| c.is_ascii_digit()))
    .and_then(|r| r.parse().ok())
}

/// Parse `YYYY-MM-DD` (optionally followed by `T...`) or `DD.MM.YYYY`.
pub fn parse_upstream_date(raw: &str) -> Option<NaiveDate> {
  let raw = raw.trim();
  let date_part = raw.split('T').next().unwrap_or(raw);
  NaiveDate::parse_from_str(date_part, "%Y-%m-%d")
    .or_else(|_| NaiveDate::parse_from_str(raw, "%d.%m.%Y"))
    .ok()
}

// ─── Club filter ─────────────────────────────────────────────────────────────

/// Optional restriction of ingestion to a single club.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClubFilter(Option<String>);

impl ClubFilter {
  pub fn all() -> Self { Self(None) }

  pub fn only(club: impl Into<String>) -> Self { Self(Some(club.into())) }

  pub fn target(&self) -> Option<&str> { self.0.as_deref() }

  /// Whether a row with this club name should be kept.
  pub fn accepts(&self, club: &str) -> bool {
    match &self.0 {
      None => true,
      Some(target) => club != NO_CLUB && club == target,
    }
  }
}

impl From<Option<String>> for ClubFilter {
  fn from(value: Option<String>) -> Self {
    Self(value.filter(|v| !v.trim().is_empty()))
  }
}

// ─── Rows & events ───────────────────────────────────────────────────────────

/// Normalize one raw row. `age_group` comes from the event name.
pub fn normalize_result(
  raw: &RawResult,
  age_group: Option<&str>,
) -> NormalizedResult {
  let raw_result = raw.result.as_deref().unwrap_or_default().trim().to_string();
  let club = raw
    .club
    .as_deref()
    .map(str::trim)
    .filter(|c| !c.is_empty())
    .unwrap_or(NO_CLUB)
    .to_string();

  NormalizedResult {
    rank: parse_rank(raw.rank.as_deref()),
    name: raw.name.as_deref().unwrap_or_default().trim().to_string(),
    club,
    value: parse_result_value(&raw_result),
    raw_result,
    age_group: age_group.map(str::to_string),
    gender: raw.gender.as_deref().and_then(Gender::from_upstream),
    birth_year: parse_birth_year(raw.birth_year.as_deref()),
  }
}

/// Turn a fetched event into a batch ready for the upsert engine.
///
/// Returns `None` when the payload has no event name. Rows rejected by the
/// club filter never reach the batch.
pub fn normalize_event(
  competition: &CompetitionMeta,
  event_id: EventId,
  event: &EventResults,
  filter: &ClubFilter,
) -> Option<EventBatch> {
  let name = event.name.as_deref().map(str::trim).filter(|n| !n.is_empty())?;
  let age_group = extract_age_group(name);

  let results = event
    .rows
    .iter()
    .map(|raw| normalize_result(raw, age_group.as_deref()))
    .filter(|r| filter.accepts(&r.club))
    .collect();

  Some(EventBatch {
    competition: competition.clone(),
    event_id,
    discipline: clean_discipline_name(name),
    age_group,
    results,
  })
}
