//! JSON control API for the Tulos ingester.
//!
//! Exposes an axum [`Router`] backed by a [`tulos_ingest::Ingestor`]. Auth,
//! TLS, and transport concerns are the caller's responsibility.
//!
//! # Mounting
//!
//! ```rust,ignore
//! .nest("/api", tulos_api::api_router(ingestor.clone()))
//! ```

pub mod error;
pub mod refresh;
pub mod status;

use axum::{
  Router,
  routing::{get, post},
};
use tulos_core::{source::ResultSource, store::ResultStore};
use tulos_ingest::Ingestor;

pub use error::ApiError;

/// Build the API router for `ingestor`.
///
/// The returned `Router<()>` can be nested into any parent router regardless
/// of its own state type.
pub fn api_router<S, F>(ingestor: Ingestor<S, F>) -> Router<()>
where
  S: ResultStore + 'static,
  F: ResultSource + 'static,
{
  Router::new()
    .route("/refresh", post(refresh::trigger::<S, F>))
    .route("/status", get(status::handler::<S, F>))
    .with_state(ingestor)
}

#[cfg(test)]
mod tests {
  use std::{convert::Infallible, sync::Arc, time::Duration};

  use axum::{
    body::Body,
    http::{Request, StatusCode},
  };
  use serde_json::Value;
  use tokio::sync::Notify;
  use tower::ServiceExt as _;
  use tulos_core::{
    model::{CompetitionId, EventId},
    source::{CompetitionListing, CompetitionOverview, CompetitionProperties, EventResults},
  };
  use tulos_ingest::IngestConfig;
  use tulos_store_sqlite::SqliteStore;

  use super::*;

  /// Upstream with no competitions. Listing waits on `gate` when set.
  #[derive(Default)]
  struct EmptySource {
    gate: Option<Arc<Notify>>,
  }

  impl ResultSource for EmptySource {
    type Error = Infallible;

    async fn list_competitions(&self) -> Result<Vec<CompetitionListing>, Infallible> {
      if let Some(gate) = &self.gate {
        gate.notified().await;
      }
      Ok(Vec::new())
    }

    async fn competition_overview(
      &self,
      _id: CompetitionId,
    ) -> Result<Option<CompetitionOverview>, Infallible> {
      Ok(None)
    }

    async fn competition_properties(
      &self,
      _id: CompetitionId,
    ) -> Result<CompetitionProperties, Infallible> {
      Ok(CompetitionProperties::default())
    }

    async fn event_results(
      &self,
      _id: CompetitionId,
      _event_id: EventId,
    ) -> Result<EventResults, Infallible> {
      Ok(EventResults::default())
    }
  }

  async fn make_ingestor(source: EmptySource) -> Ingestor<SqliteStore, EmptySource> {
    let store = SqliteStore::open_in_memory().await.unwrap();
    Ingestor::new(Arc::new(store), Arc::new(source), IngestConfig::default())
  }

  async fn send(
    ingestor: &Ingestor<SqliteStore, EmptySource>,
    method: &str,
    uri: &str,
  ) -> (StatusCode, Value) {
    let req = Request::builder().method(method).uri(uri).body(Body::empty()).unwrap();
    let resp = api_router(ingestor.clone()).oneshot(req).await.unwrap();
    let status = resp.status();
    let bytes = axum::body::to_bytes(resp.into_body(), usize::MAX).await.unwrap();
    (status, serde_json::from_slice(&bytes).unwrap())
  }

  async fn wait_idle(ingestor: &Ingestor<SqliteStore, EmptySource>) {
    for _ in 0..200 {
      if !ingestor.is_running() {
        return;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("cycle did not finish");
  }

  #[tokio::test]
  async fn status_before_any_cycle() {
    let ingestor = make_ingestor(EmptySource::default()).await;
    let (status, body) = send(&ingestor, "GET", "/status").await;

    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["cycle"]["state"], "idle");
    assert!(body["last_run"].is_null());
    assert!(body["last_successful_refresh"].is_null());
    assert_eq!(body["needs_refresh"], true);
  }

  #[tokio::test]
  async fn refresh_starts_a_cycle_and_status_reports_it() {
    let ingestor = make_ingestor(EmptySource::default()).await;
    let (status, body) = send(&ingestor, "POST", "/refresh").await;
    assert_eq!(status, StatusCode::ACCEPTED);
    assert_eq!(body["status"], "started");
    let cycle_id = body["cycle_id"].as_str().unwrap().to_string();

    wait_idle(&ingestor).await;

    let (_, body) = send(&ingestor, "GET", "/status").await;
    assert_eq!(body["cycle"]["state"], "finished");
    assert_eq!(body["cycle"]["cycle_id"], cycle_id.as_str());
    assert_eq!(body["last_run"]["succeeded"], true);
    assert_eq!(body["needs_refresh"], false);
  }

  #[tokio::test]
  async fn second_refresh_reports_running_cycle() {
    let gate = Arc::new(Notify::new());
    let ingestor = make_ingestor(EmptySource { gate: Some(Arc::clone(&gate)) }).await;

    let (first, _) = send(&ingestor, "POST", "/refresh").await;
    assert_eq!(first, StatusCode::ACCEPTED);

    let (second, body) = send(&ingestor, "POST", "/refresh?from=1&to=5").await;
    assert_eq!(second, StatusCode::OK);
    assert_eq!(body["status"], "already_running");
    assert_eq!(body["cycle"]["state"], "running");
    assert_eq!(body["cycle"]["mode"]["kind"], "feed");

    gate.notify_one();
    wait_idle(&ingestor).await;
  }

  #[tokio::test]
  async fn refresh_range_must_be_complete_and_ordered() {
    let ingestor = make_ingestor(EmptySource::default()).await;

    let (status, body) = send(&ingestor, "POST", "/refresh?from=10").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].as_str().unwrap().contains("together"));

    let (status, _) = send(&ingestor, "POST", "/refresh?from=10&to=3").await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(!ingestor.is_running());
  }

  #[tokio::test]
  async fn refresh_range_runs_in_range_mode() {
    let ingestor = make_ingestor(EmptySource::default()).await;
    let (status, _) = send(&ingestor, "POST", "/refresh?from=3&to=4").await;
    assert_eq!(status, StatusCode::ACCEPTED);

    wait_idle(&ingestor).await;
    let (_, body) = send(&ingestor, "GET", "/status").await;
    assert_eq!(body["cycle"]["mode"]["kind"], "range");
    assert_eq!(body["cycle"]["discovery"]["missing"], 2);
  }
}
