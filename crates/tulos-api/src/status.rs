//! `GET /status`: what the ingester is doing and how fresh the data is.

use axum::{Json, extract::State};
use chrono::{DateTime, Utc};
use serde::Serialize;
use tulos_core::{model::RunRecord, source::ResultSource, store::ResultStore};
use tulos_ingest::{CycleStatus, Ingestor};

use crate::error::ApiError;

#[derive(Debug, Serialize)]
pub struct StatusBody {
  /// In-memory state of the current or most recent cycle since startup.
  pub cycle:                   CycleStatus,
  /// Most recent cycle from the run log, possibly from an earlier process.
  pub last_run:                Option<RunRecord>,
  pub last_successful_refresh: Option<DateTime<Utc>>,
  pub needs_refresh:           bool,
}

pub async fn handler<S, F>(
  State(ingestor): State<Ingestor<S, F>>,
) -> Result<Json<StatusBody>, ApiError>
where
  S: ResultStore + 'static,
  F: ResultSource + 'static,
{
  let last_run = ingestor.store().last_run().await.map_err(ApiError::store)?;
  let last_successful_refresh = ingestor.last_successful_refresh().await.map_err(ApiError::store)?;
  let needs_refresh = ingestor.needs_refresh(Utc::now()).await.map_err(ApiError::store)?;

  Ok(Json(StatusBody {
    cycle: ingestor.status(),
    last_run,
    last_successful_refresh,
    needs_refresh,
  }))
}
