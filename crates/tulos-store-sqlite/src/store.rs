//! [`SqliteStore`]: the SQLite implementation of [`ResultStore`].

use std::{collections::HashSet, path::Path};

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension as _};
use tulos_core::{
  inference::InferredDemographics,
  model::{
    Athlete, AthleteHistory, BatchOutcome, Club, Competition, CompetitionId,
    CompetitionMeta, Discipline, EventBatch, EventId, NormalizedResult,
    Participation, ProcessedEntry, RunRecord, StoredResult,
  },
  normalize::split_name,
  store::ResultStore,
};

use crate::{
  Result,
  encode::{
    RawAthlete, RawCompetition, RawProcessed, RawRun, decode_date, decode_dt,
    encode_date, encode_dt, encode_gender, encode_uuid,
  },
  schema::SCHEMA,
};

// ─── Store ───────────────────────────────────────────────────────────────────

/// A results store backed by a single SQLite file.
///
/// Cloning is cheap; the inner connection is reference-counted.
#[derive(Clone)]
pub struct SqliteStore {
  conn: tokio_rusqlite::Connection,
}

impl SqliteStore {
  /// Open (or create) a store at `path` and run schema initialisation.
  pub async fn open(path: impl AsRef<Path>) -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open(path).await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  /// Open an in-memory store, useful for testing.
  pub async fn open_in_memory() -> Result<Self> {
    let conn = tokio_rusqlite::Connection::open_in_memory().await?;
    let store = Self { conn };
    store.init_schema().await?;
    Ok(store)
  }

  async fn init_schema(&self) -> Result<()> {
    self
      .conn
      .call(|conn| {
        conn.execute_batch(SCHEMA)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  #[cfg(test)]
  pub(crate) async fn execute_raw(&self, sql: &'static str) -> Result<()> {
    self
      .conn
      .call(move |conn| {
        conn.execute_batch(sql)?;
        Ok(())
      })
      .await?;
    Ok(())
  }
}

// ─── Row writers ─────────────────────────────────────────────────────────────
//
// Plain synchronous helpers run inside `Connection::call`. They take
// `&Connection` so they work on transactions and savepoints alike.

fn upsert_competition_row(
  conn: &Connection,
  meta: &CompetitionMeta,
  refreshed_at: &str,
) -> rusqlite::Result<()> {
  conn.execute(
    "INSERT INTO competitions
       (competition_id, name, location, start_date, end_date, refreshed_at)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (competition_id) DO UPDATE SET
       name         = excluded.name,
       location     = excluded.location,
       start_date   = excluded.start_date,
       end_date     = excluded.end_date,
       refreshed_at = excluded.refreshed_at",
    rusqlite::params![
      meta.competition_id,
      meta.name,
      meta.location,
      meta.start_date.map(encode_date),
      meta.end_date.map(encode_date),
      refreshed_at,
    ],
  )?;
  Ok(())
}

fn resolve_club(conn: &Connection, name: &str) -> rusqlite::Result<i64> {
  conn.execute(
    "INSERT INTO clubs (name) VALUES (?1) ON CONFLICT (name) DO NOTHING",
    [name],
  )?;
  conn.query_row("SELECT club_id FROM clubs WHERE name = ?1", [name], |r| r.get(0))
}

/// Find or create the athlete; an existing athlete only has null fields
/// filled in.
fn resolve_athlete(
  conn: &Connection,
  first_name: &str,
  last_name: &str,
  result: &NormalizedResult,
  club_id: Option<i64>,
) -> rusqlite::Result<i64> {
  conn.query_row(
    "INSERT INTO athletes (first_name, last_name, birth_year, gender, club_id)
     VALUES (?1, ?2, ?3, ?4, ?5)
     ON CONFLICT (first_name, last_name) DO UPDATE SET
       birth_year = COALESCE(athletes.birth_year, excluded.birth_year),
       gender     = COALESCE(athletes.gender, excluded.gender),
       club_id    = COALESCE(athletes.club_id, excluded.club_id)
     RETURNING athlete_id",
    rusqlite::params![
      first_name,
      last_name,
      result.birth_year,
      result.gender.map(encode_gender),
      club_id,
    ],
    |r| r.get(0),
  )
}

fn write_result(
  conn: &Connection,
  competition_id: CompetitionId,
  event_id: EventId,
  first_name: &str,
  last_name: &str,
  result: &NormalizedResult,
) -> rusqlite::Result<()> {
  let club_id = result.club_name().map(|c| resolve_club(conn, c)).transpose()?;
  let athlete_id = resolve_athlete(conn, first_name, last_name, result, club_id)?;

  conn.execute(
    "INSERT INTO results
       (event_id, competition_id, athlete_id, rank, value, raw_result)
     VALUES (?1, ?2, ?3, ?4, ?5, ?6)
     ON CONFLICT (event_id, competition_id, athlete_id) DO UPDATE SET
       rank       = excluded.rank,
       value      = excluded.value,
       raw_result = excluded.raw_result",
    rusqlite::params![
      event_id,
      competition_id,
      athlete_id,
      result.rank,
      result.value,
      result.raw_result,
    ],
  )?;
  Ok(())
}

fn write_event_batch(
  conn: &mut Connection,
  batch: &EventBatch,
  refreshed_at: &str,
) -> rusqlite::Result<BatchOutcome> {
  let competition_id = batch.competition.competition_id;
  let mut outcome = BatchOutcome::default();

  let rows: Vec<(String, String, &NormalizedResult)> = batch
    .results
    .iter()
    .filter_map(|r| match split_name(&r.name) {
      Some((first, last)) => Some((first, last, r)),
      None => {
        tracing::debug!(
          competition_id,
          event_id = batch.event_id,
          name = %r.name,
          "name has no given name and surname; result skipped"
        );
        outcome.results_rejected += 1;
        None
      }
    })
    .collect();

  let mut tx = conn.transaction()?;
  upsert_competition_row(&tx, &batch.competition, refreshed_at)?;

  if !rows.is_empty() {
    let mut event = tx.savepoint()?;
    event.execute(
      "INSERT INTO disciplines (event_id, competition_id, name, age_group)
       VALUES (?1, ?2, ?3, ?4)
       ON CONFLICT (event_id, competition_id) DO UPDATE SET
         name      = excluded.name,
         age_group = excluded.age_group",
      rusqlite::params![batch.event_id, competition_id, batch.discipline, batch.age_group],
    )?;

    for (first, last, result) in rows {
      let row = event.savepoint()?;
      match write_result(&row, competition_id, batch.event_id, &first, &last, result) {
        Ok(()) => {
          row.commit()?;
          outcome.results_written += 1;
        }
        Err(e) => {
          tracing::warn!(
            competition_id,
            event_id = batch.event_id,
            name = %result.name,
            error = %e,
            "result not stored"
          );
          outcome.results_failed += 1;
        }
      }
    }

    // A discipline without any stored result is not kept.
    if outcome.results_written > 0 {
      event.commit()?;
      outcome.discipline_written = true;
    }
  }

  tx.commit()?;
  Ok(outcome)
}

// ─── ResultStore impl ────────────────────────────────────────────────────────

impl ResultStore for SqliteStore {
  type Error = crate::Error;

  // ── Ingestion ─────────────────────────────────────────────────────────────

  async fn upsert_competition(&self, meta: CompetitionMeta) -> Result<()> {
    let now = encode_dt(Utc::now());
    self
      .conn
      .call(move |conn| {
        upsert_competition_row(conn, &meta, &now)?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn upsert_event_batch(&self, batch: EventBatch) -> Result<BatchOutcome> {
    let now = encode_dt(Utc::now());
    let outcome = self
      .conn
      .call(move |conn| Ok(write_event_batch(conn, &batch, &now)?))
      .await?;
    Ok(outcome)
  }

  // ── Processed-set ─────────────────────────────────────────────────────────

  async fn succeeded_competitions(&self) -> Result<HashSet<CompetitionId>> {
    let ids = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT competition_id FROM processed_competitions WHERE succeeded = 1",
        )?;
        let ids = stmt
          .query_map([], |r| r.get(0))?
          .collect::<rusqlite::Result<HashSet<CompetitionId>>>()?;
        Ok(ids)
      })
      .await?;
    Ok(ids)
  }

  async fn processed_entry(&self, id: CompetitionId) -> Result<Option<ProcessedEntry>> {
    let raw = self
      .conn
      .call(move |conn| {
        Ok(
          conn
            .query_row(
              "SELECT competition_id, succeeded, attempts, last_error, updated_at
               FROM processed_competitions WHERE competition_id = ?1",
              [id],
              |r| {
                Ok(RawProcessed {
                  competition_id: r.get(0)?,
                  succeeded:      r.get(1)?,
                  attempts:       r.get(2)?,
                  last_error:     r.get(3)?,
                  updated_at:     r.get(4)?,
                })
              },
            )
            .optional()?,
        )
      })
      .await?;
    raw.map(RawProcessed::into_entry).transpose()
  }

  async fn record_processed(&self, entry: ProcessedEntry) -> Result<()> {
    let at = encode_dt(entry.updated_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO processed_competitions
             (competition_id, succeeded, attempts, last_error, updated_at)
           VALUES (?1, ?2, ?3, ?4, ?5)
           ON CONFLICT (competition_id) DO UPDATE SET
             succeeded  = excluded.succeeded,
             attempts   = excluded.attempts,
             last_error = excluded.last_error,
             updated_at = excluded.updated_at",
          rusqlite::params![
            entry.competition_id,
            entry.succeeded,
            entry.attempts,
            entry.last_error,
            at,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  // ── Inference ─────────────────────────────────────────────────────────────

  async fn athlete_histories(&self) -> Result<Vec<AthleteHistory>> {
    let rows = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {}, d.age_group, c.start_date
           FROM results r
           JOIN athletes a     ON a.athlete_id = r.athlete_id
           JOIN disciplines d  ON d.event_id = r.event_id
                              AND d.competition_id = r.competition_id
           JOIN competitions c ON c.competition_id = r.competition_id
           ORDER BY a.athlete_id, c.start_date, r.result_id",
          prefixed("a", RawAthlete::COLUMNS),
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |r| {
            Ok((
              RawAthlete::from_row_at(r, 0)?,
              r.get::<_, Option<String>>(6)?,
              r.get::<_, Option<String>>(7)?,
            ))
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;

    let mut histories: Vec<AthleteHistory> = Vec::new();
    for (raw, age_group, start_date) in rows {
      let participation = Participation {
        age_group,
        competition_date: start_date.as_deref().map(decode_date).transpose()?,
      };
      match histories.last_mut() {
        Some(h) if h.athlete.athlete_id == raw.athlete_id => {
          h.participations.push(participation);
        }
        _ => histories.push(AthleteHistory {
          athlete:        raw.into_athlete()?,
          participations: vec![participation],
        }),
      }
    }
    Ok(histories)
  }

  async fn apply_inference(
    &self,
    athlete_id: i64,
    change: InferredDemographics,
  ) -> Result<InferredDemographics> {
    let applied = self
      .conn
      .call(move |conn| {
        let tx = conn.transaction()?;
        let mut applied = InferredDemographics::default();

        if let Some(year) = change.birth_year {
          let n = tx.execute(
            "UPDATE athletes SET birth_year = ?1
             WHERE athlete_id = ?2 AND (birth_year IS NULL OR birth_year < ?1)",
            rusqlite::params![year, athlete_id],
          )?;
          if n > 0 {
            applied.birth_year = Some(year);
          }
        }

        if let Some(gender) = change.gender {
          let n = tx.execute(
            "UPDATE athletes SET gender = ?1 WHERE athlete_id = ?2 AND gender IS NULL",
            rusqlite::params![encode_gender(gender), athlete_id],
          )?;
          if n > 0 {
            applied.gender = Some(gender);
          }
        }

        tx.commit()?;
        Ok(applied)
      })
      .await?;
    Ok(applied)
  }

  // ── Run log ───────────────────────────────────────────────────────────────

  async fn record_run(&self, run: RunRecord) -> Result<()> {
    let id = encode_uuid(run.cycle_id);
    let started = encode_dt(run.started_at);
    let finished = encode_dt(run.finished_at);
    self
      .conn
      .call(move |conn| {
        conn.execute(
          "INSERT INTO ingest_runs
             (cycle_id, started_at, finished_at, succeeded, message,
              competitions_succeeded, competitions_failed)
           VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
          rusqlite::params![
            id,
            started,
            finished,
            run.succeeded,
            run.message,
            run.competitions_succeeded,
            run.competitions_failed,
          ],
        )?;
        Ok(())
      })
      .await?;
    Ok(())
  }

  async fn last_run(&self) -> Result<Option<RunRecord>> {
    let raw = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM ingest_runs ORDER BY finished_at DESC LIMIT 1",
          RawRun::COLUMNS
        );
        Ok(conn.query_row(&sql, [], RawRun::from_row).optional()?)
      })
      .await?;
    raw.map(RawRun::into_run).transpose()
  }

  async fn last_successful_refresh(&self) -> Result<Option<DateTime<Utc>>> {
    let raw: Option<String> = self
      .conn
      .call(|conn| {
        Ok(conn.query_row(
          "SELECT MAX(finished_at) FROM ingest_runs WHERE succeeded = 1",
          [],
          |r| r.get(0),
        )?)
      })
      .await?;
    raw.as_deref().map(decode_dt).transpose()
  }

  // ── Reads ─────────────────────────────────────────────────────────────────

  async fn get_competition(&self, id: CompetitionId) -> Result<Option<Competition>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM competitions WHERE competition_id = ?1",
          RawCompetition::COLUMNS
        );
        Ok(conn.query_row(&sql, [id], RawCompetition::from_row).optional()?)
      })
      .await?;
    raw.map(RawCompetition::into_competition).transpose()
  }

  async fn list_disciplines(&self, competition_id: CompetitionId) -> Result<Vec<Discipline>> {
    let disciplines = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT event_id, competition_id, name, age_group FROM disciplines
           WHERE competition_id = ?1 ORDER BY event_id",
        )?;
        let rows = stmt
          .query_map([competition_id], |r| {
            Ok(Discipline {
              event_id:       r.get(0)?,
              competition_id: r.get(1)?,
              name:           r.get(2)?,
              age_group:      r.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(disciplines)
  }

  async fn list_clubs(&self) -> Result<Vec<Club>> {
    let clubs = self
      .conn
      .call(|conn| {
        let mut stmt = conn.prepare(
          "SELECT club_id, name, location, abbreviation FROM clubs ORDER BY name",
        )?;
        let rows = stmt
          .query_map([], |r| {
            Ok(Club {
              club_id:      r.get(0)?,
              name:         r.get(1)?,
              location:     r.get(2)?,
              abbreviation: r.get(3)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(clubs)
  }

  async fn list_athletes(&self) -> Result<Vec<Athlete>> {
    let raws = self
      .conn
      .call(|conn| {
        let sql = format!(
          "SELECT {} FROM athletes ORDER BY last_name, first_name",
          RawAthlete::COLUMNS
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
          .query_map([], |r| RawAthlete::from_row_at(r, 0))?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    raws.into_iter().map(RawAthlete::into_athlete).collect()
  }

  async fn find_athlete(
    &self,
    first_name: String,
    last_name: String,
  ) -> Result<Option<Athlete>> {
    let raw = self
      .conn
      .call(move |conn| {
        let sql = format!(
          "SELECT {} FROM athletes WHERE first_name = ?1 AND last_name = ?2",
          RawAthlete::COLUMNS
        );
        Ok(
          conn
            .query_row(&sql, [first_name, last_name], |r| RawAthlete::from_row_at(r, 0))
            .optional()?,
        )
      })
      .await?;
    raw.map(RawAthlete::into_athlete).transpose()
  }

  async fn list_results(&self, competition_id: CompetitionId) -> Result<Vec<StoredResult>> {
    let results = self
      .conn
      .call(move |conn| {
        let mut stmt = conn.prepare(
          "SELECT result_id, event_id, competition_id, athlete_id, rank, value, raw_result
           FROM results WHERE competition_id = ?1 ORDER BY event_id, rank, result_id",
        )?;
        let rows = stmt
          .query_map([competition_id], |r| {
            Ok(StoredResult {
              result_id:      r.get(0)?,
              event_id:       r.get(1)?,
              competition_id: r.get(2)?,
              athlete_id:     r.get(3)?,
              rank:           r.get(4)?,
              value:          r.get(5)?,
              raw_result:     r.get(6)?,
            })
          })?
          .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
      })
      .await?;
    Ok(results)
  }
}

/// `"a, b"` with `"t"` becomes `"t.a, t.b"`.
fn prefixed(table: &str, columns: &str) -> String {
  columns
    .split(',')
    .map(|c| format!("{table}.{}", c.trim()))
    .collect::<Vec<_>>()
    .join(", ")
}
