//! `POST /refresh`: start an ingestion cycle in the background.
//!
//! | Query | Mode |
//! |-------|------|
//! | none | competition listing |
//! | `?from=N&to=M` | id range `N..=M` |

use axum::{
  Json,
  extract::{Query, State},
  http::StatusCode,
  response::IntoResponse,
};
use serde::Deserialize;
use serde_json::json;
use tulos_core::{model::CompetitionId, source::ResultSource, store::ResultStore};
use tulos_ingest::{CycleMode, Ingestor, TriggerOutcome};

use crate::error::ApiError;

#[derive(Debug, Default, Deserialize)]
pub struct RefreshParams {
  pub from: Option<CompetitionId>,
  pub to:   Option<CompetitionId>,
}

impl RefreshParams {
  fn mode(&self) -> Result<CycleMode, ApiError> {
    match (self.from, self.to) {
      (None, None) => Ok(CycleMode::Feed),
      (Some(from), Some(to)) if from <= to => Ok(CycleMode::Range { from, to }),
      (Some(from), Some(to)) => Err(ApiError::BadRequest(format!("empty range {from}..={to}"))),
      _ => Err(ApiError::BadRequest("`from` and `to` must be given together".into())),
    }
  }
}

/// `202 {"status":"started","cycle_id":…}` or, if a cycle is already in
/// progress, `200 {"status":"already_running","cycle":…}`.
pub async fn trigger<S, F>(
  State(ingestor): State<Ingestor<S, F>>,
  Query(params): Query<RefreshParams>,
) -> Result<impl IntoResponse, ApiError>
where
  S: ResultStore + 'static,
  F: ResultSource + 'static,
{
  let mode = params.mode()?;
  Ok(match ingestor.trigger(mode) {
    TriggerOutcome::Started { cycle_id } => {
      tracing::info!(%cycle_id, ?mode, "refresh started");
      (StatusCode::ACCEPTED, Json(json!({ "status": "started", "cycle_id": cycle_id })))
    }
    TriggerOutcome::AlreadyRunning(cycle) => {
      (StatusCode::OK, Json(json!({ "status": "already_running", "cycle": cycle })))
    }
  })
}
