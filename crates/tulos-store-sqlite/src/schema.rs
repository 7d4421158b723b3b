//! SQL schema for the Tulos SQLite store.
//!
//! Executed once at connection startup. Future migrations will be gated on
//! `PRAGMA user_version`.

/// Full schema DDL; idempotent thanks to `CREATE TABLE IF NOT EXISTS`.
pub const SCHEMA: &str = "
PRAGMA journal_mode = WAL;
PRAGMA foreign_keys = ON;

-- Keyed by the upstream id. Overwritten on every fetch, never deleted.
CREATE TABLE IF NOT EXISTS competitions (
    competition_id INTEGER PRIMARY KEY,
    name           TEXT NOT NULL,
    location       TEXT,
    start_date     TEXT,            -- YYYY-MM-DD
    end_date       TEXT,            -- YYYY-MM-DD
    refreshed_at   TEXT NOT NULL    -- RFC 3339 UTC
);

-- Only present once at least one result has been stored for the event.
CREATE TABLE IF NOT EXISTS disciplines (
    event_id       INTEGER NOT NULL,
    competition_id INTEGER NOT NULL REFERENCES competitions(competition_id),
    name           TEXT NOT NULL,
    age_group      TEXT,
    PRIMARY KEY (event_id, competition_id)
);

CREATE TABLE IF NOT EXISTS clubs (
    club_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    name         TEXT NOT NULL UNIQUE,
    location     TEXT,
    abbreviation TEXT
);

-- Resolved by exact (first_name, last_name). Demographics are only filled
-- in, never replaced.
CREATE TABLE IF NOT EXISTS athletes (
    athlete_id INTEGER PRIMARY KEY AUTOINCREMENT,
    first_name TEXT NOT NULL,
    last_name  TEXT NOT NULL,
    birth_year INTEGER,
    gender     TEXT CHECK (gender IN ('M', 'N')),
    club_id    INTEGER REFERENCES clubs(club_id),
    UNIQUE (first_name, last_name)
);

CREATE TABLE IF NOT EXISTS results (
    result_id      INTEGER PRIMARY KEY AUTOINCREMENT,
    event_id       INTEGER NOT NULL,
    competition_id INTEGER NOT NULL,
    athlete_id     INTEGER NOT NULL REFERENCES athletes(athlete_id),
    rank           INTEGER NOT NULL DEFAULT 0,
    value          REAL,
    raw_result     TEXT NOT NULL,
    UNIQUE (event_id, competition_id, athlete_id),
    FOREIGN KEY (event_id, competition_id)
        REFERENCES disciplines(event_id, competition_id)
);

-- Discovery skips competitions whose last processing succeeded.
CREATE TABLE IF NOT EXISTS processed_competitions (
    competition_id INTEGER PRIMARY KEY,
    succeeded      INTEGER NOT NULL,
    attempts       INTEGER NOT NULL,
    last_error     TEXT,
    updated_at     TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS ingest_runs (
    cycle_id               TEXT PRIMARY KEY,
    started_at             TEXT NOT NULL,
    finished_at            TEXT NOT NULL,
    succeeded              INTEGER NOT NULL,
    message                TEXT,
    competitions_succeeded INTEGER NOT NULL DEFAULT 0,
    competitions_failed    INTEGER NOT NULL DEFAULT 0
);

CREATE INDEX IF NOT EXISTS results_athlete_idx     ON results(athlete_id);
CREATE INDEX IF NOT EXISTS results_competition_idx ON results(competition_id);
CREATE INDEX IF NOT EXISTS runs_finished_idx       ON ingest_runs(finished_at);

PRAGMA user_version = 1;
";
