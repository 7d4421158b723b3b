//! Demographic inference rules.
//!
//! An athlete's age-group participations say something about gender (the
//! category letter) and birth year (competition year minus the category
//! age). These functions turn a participation history into the values that
//! should be stored. They never weaken what is already known: a stored
//! gender is kept and a stored birth year only moves upward.

use chrono::Datelike as _;
use serde::{Deserialize, Serialize};

use crate::model::{Athlete, Gender, Participation};

/// A parsed age-group code such as `T15` or `M40`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AgeGroup {
  pub gender: Option<Gender>,
  pub age:    Option<u32>,
}

impl AgeGroup {
  /// Parse a code. The leading letter gives the gender, the first run of
  /// one or two digits the age.
  pub fn parse(code: &str) -> Option<Self> {
    let code = code.trim();
    let first = code.chars().next()?;
    let gender = Gender::from_age_group_letter(first);

    let age = code
      .find(|c: char| c.is_ascii_digit())
      .map(|start| {
        code[start..]
          .chars()
          .take_while(char::is_ascii_digit)
          .take(2)
          .collect::<String>()
      })
      .and_then(|digits| digits.parse().ok());

    Some(Self { gender, age })
  }
}

/// Gender implied by the participation history.
///
/// A known gender is returned unchanged. Otherwise the category letters
/// vote; the majority wins and a tie goes to whichever gender was seen
/// first.
pub fn infer_gender(
  current: Option<Gender>,
  participations: &[Participation],
) -> Option<Gender> {
  if current.is_some() {
    return current;
  }

  let votes: Vec<Gender> = participations
    .iter()
    .filter_map(|p| p.age_group.as_deref())
    .filter_map(AgeGroup::parse)
    .filter_map(|g| g.gender)
    .collect();

  let first = *votes.first()?;
  let other = match first {
    Gender::Male => Gender::Female,
    Gender::Female => Gender::Male,
  };
  let first_count = votes.iter().filter(|g| **g == first).count();
  let other_count = votes.len() - first_count;

  Some(if other_count > first_count { other } else { first })
}

/// Birth year implied by the participation history.
///
/// Each participation with both an age group and a competition date gives a
/// candidate `year - age`; the latest candidate is taken. It replaces the
/// stored value only when that is absent or strictly earlier.
pub fn infer_birth_year(
  current: Option<i32>,
  participations: &[Participation],
) -> Option<i32> {
  let candidate = participations
    .iter()
    .filter_map(|p| {
      let date = p.competition_date?;
      let age = AgeGroup::parse(p.age_group.as_deref()?)?.age?;
      Some(date.year() - age as i32)
    })
    .max();

  match (current, candidate) {
    (Some(stored), Some(c)) if c > stored => Some(c),
    (None, c) => c,
    (stored, _) => stored,
  }
}

/// Fields that inference would change for one athlete.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InferredDemographics {
  pub birth_year: Option<i32>,
  pub gender:     Option<Gender>,
}

impl InferredDemographics {
  /// Compare the inferred values against the stored athlete and keep only
  /// the fields that differ.
  pub fn for_athlete(athlete: &Athlete, participations: &[Participation]) -> Self {
    let birth_year = infer_birth_year(athlete.birth_year, participations)
      .filter(|y| Some(*y) != athlete.birth_year);
    let gender = infer_gender(athlete.gender, participations)
      .filter(|g| Some(*g) != athlete.gender);
    Self { birth_year, gender }
  }

  pub fn is_empty(&self) -> bool {
    self.birth_year.is_none() && self.gender.is_none()
  }
}

#[cfg(test)]
mod tests {
  use chrono::NaiveDate;

  use super::*;

  fn p(group: &str, year: i32) -> Participation {
    Participation {
      age_group:        Some(group.to_string()),
      competition_date: NaiveDate::from_ymd_opt(year, 6, 1),
    }
  }

  fn athlete(birth_year: Option<i32>, gender: Option<Gender>) -> Athlete {
    Athlete {
      athlete_id: 1,
      first_name: "Anna".into(),
      last_name: "Virtanen".into(),
      birth_year,
      gender,
      club_id: None,
    }
  }

  #[test]
  fn parses_age_group_codes() {
    assert_eq!(
      AgeGroup::parse("T15"),
      Some(AgeGroup { gender: Some(Gender::Female), age: Some(15) })
    );
    assert_eq!(
      AgeGroup::parse("p9"),
      Some(AgeGroup { gender: Some(Gender::Male), age: Some(9) })
    );
    assert_eq!(
      AgeGroup::parse("N"),
      Some(AgeGroup { gender: Some(Gender::Female), age: None })
    );
    assert_eq!(AgeGroup::parse("M355").and_then(|g| g.age), Some(35));
    assert_eq!(AgeGroup::parse(""), None);
  }

  #[test]
  fn t15_in_2022_means_2007_and_female() {
    let history = [p("T15", 2022)];
    assert_eq!(infer_birth_year(None, &history), Some(2007));
    assert_eq!(infer_gender(None, &history), Some(Gender::Female));
  }

  #[test]
  fn birth_year_only_moves_upward() {
    let history = [p("T17", 2020)];
    assert_eq!(infer_birth_year(Some(2005), &history), Some(2005));
    let history = [p("T15", 2022)];
    assert_eq!(infer_birth_year(Some(2005), &history), Some(2007));
  }

  #[test]
  fn latest_candidate_wins() {
    let history = [p("P13", 2019), p("P15", 2022), p("M", 2023)];
    assert_eq!(infer_birth_year(None, &history), Some(2007));
  }

  #[test]
  fn participations_without_dates_are_ignored() {
    let history = [Participation {
      age_group:        Some("T15".into()),
      competition_date: None,
    }];
    assert_eq!(infer_birth_year(None, &history), None);
  }

  #[test]
  fn known_gender_is_never_changed() {
    let history = [p("P15", 2022), p("P15", 2023)];
    assert_eq!(infer_gender(Some(Gender::Female), &history), Some(Gender::Female));
  }

  #[test]
  fn gender_majority_and_tie_break() {
    let history = [p("P15", 2020), p("T15", 2021), p("T15", 2022)];
    assert_eq!(infer_gender(None, &history), Some(Gender::Female));

    let history = [p("P15", 2020), p("T15", 2021)];
    assert_eq!(infer_gender(None, &history), Some(Gender::Male));

    assert_eq!(infer_gender(None, &[]), None);
  }

  #[test]
  fn only_changed_fields_are_reported() {
    let history = [p("T15", 2022)];

    let change = InferredDemographics::for_athlete(&athlete(None, None), &history);
    assert_eq!(change.birth_year, Some(2007));
    assert_eq!(change.gender, Some(Gender::Female));

    let settled = athlete(Some(2007), Some(Gender::Female));
    assert!(InferredDemographics::for_athlete(&settled, &history).is_empty());
  }
}
