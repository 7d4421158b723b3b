//! [`FeedClient`]: the HTTP implementation of [`ResultSource`].

use std::time::Duration;

use serde::de::DeserializeOwned;
use tulos_core::{
  model::{CompetitionId, EventId},
  retry::RetryPolicy,
  source::{
    CompetitionListing, CompetitionOverview, CompetitionProperties,
    EventResults, ResultSource,
  },
};

use crate::{
  Error, Result,
  payload::{
    EventResultsPayload, ListingPayload, OverviewPayload, PropertiesPayload,
    decode_payload, event_results_from_payload, listing_from_payload,
    overview_from_payload, properties_from_payload,
  },
};

pub const DEFAULT_BASE_URL: &str = "https://cached-public-api.tuloslista.com/live/v1";
const USER_AGENT: &str = concat!("tulos/", env!("CARGO_PKG_VERSION"));

/// Connection settings for [`FeedClient`].
#[derive(Debug, Clone)]
pub struct FeedConfig {
  pub base_url:        String,
  /// Timeout for per-competition and per-event calls.
  pub request_timeout: Duration,
  /// Timeout for the competition listing, which can be slow.
  pub listing_timeout: Duration,
  /// Applied to every individual call; only transient failures are retried.
  pub retry:           RetryPolicy,
}

impl Default for FeedConfig {
  fn default() -> Self {
    Self {
      base_url:        DEFAULT_BASE_URL.to_string(),
      request_timeout: Duration::from_secs(10),
      listing_timeout: Duration::from_secs(30),
      retry:           RetryPolicy::exponential(
        2,
        Duration::from_secs(1),
        Duration::from_secs(8),
      ),
    }
  }
}

/// Client for the public live-results feed.
///
/// Cloning is cheap; the underlying connection pool is shared.
#[derive(Debug, Clone)]
pub struct FeedClient {
  http:   reqwest::Client,
  config: FeedConfig,
}

impl FeedClient {
  pub fn new(config: FeedConfig) -> Result<Self> {
    let http = reqwest::Client::builder().user_agent(USER_AGENT).build()?;
    Ok(Self { http, config })
  }

  pub fn config(&self) -> &FeedConfig { &self.config }

  fn url(&self, path: &str) -> String {
    format!("{}{}", self.config.base_url.trim_end_matches('/'), path)
  }

  async fn get_once<T: DeserializeOwned>(&self, url: &str, timeout: Duration) -> Result<T> {
    tracing::debug!(url, "fetching");

    let response = self
      .http
      .get(url)
      .timeout(timeout)
      .send()
      .await
      .map_err(|e| classify(e, url))?;

    let status = response.status();
    if status == reqwest::StatusCode::NOT_FOUND {
      return Err(Error::NotFound(url.to_string()));
    }
    if !status.is_success() {
      return Err(Error::Status { status: status.as_u16(), url: url.to_string() });
    }

    let body = response.text().await.map_err(|e| classify(e, url))?;
    decode_payload(&body)
  }

  async fn get<T: DeserializeOwned>(&self, path: &str, timeout: Duration) -> Result<T> {
    let url = self.url(path);
    self
      .config
      .retry
      .run(&url, Error::is_transient, |_| self.get_once(&url, timeout))
      .await
      .map(|r| r.value)
      .map_err(|e| e.error)
  }
}

fn classify(e: reqwest::Error, url: &str) -> Error {
  if e.is_timeout() { Error::Timeout(url.to_string()) } else { Error::Http(e) }
}

impl ResultSource for FeedClient {
  type Error = Error;

  async fn list_competitions(&self) -> Result<Vec<CompetitionListing>> {
    let payload: ListingPayload = self.get("/competition", self.config.listing_timeout).await?;
    Ok(listing_from_payload(payload))
  }

  async fn competition_overview(
    &self,
    id: CompetitionId,
  ) -> Result<Option<CompetitionOverview>> {
    let path = format!("/competition/{id}");
    match self.get::<OverviewPayload>(&path, self.config.request_timeout).await {
      Ok(payload) => Ok(Some(overview_from_payload(payload))),
      Err(Error::NotFound(_)) => Ok(None),
      Err(e) => Err(e),
    }
  }

  async fn competition_properties(&self, id: CompetitionId) -> Result<CompetitionProperties> {
    let path = format!("/competition/{id}/properties");
    let payload: PropertiesPayload = self.get(&path, self.config.request_timeout).await?;
    Ok(properties_from_payload(payload))
  }

  async fn event_results(&self, id: CompetitionId, event_id: EventId) -> Result<EventResults> {
    let path = format!("/results/{id}/{event_id}");
    let payload: EventResultsPayload = self.get(&path, self.config.request_timeout).await?;
    Ok(event_results_from_payload(payload))
  }
}

#[cfg(test)]
mod tests {
  use std::sync::{
    Arc,
    atomic::{AtomicU32, Ordering},
  };

  use axum::{
    Router, extract::State, http::StatusCode, response::IntoResponse as _,
    routing::get,
  };

  use super::*;

  async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, router).await.unwrap() });
    format!("http://{addr}")
  }

  fn client(base_url: String) -> FeedClient {
    FeedClient::new(FeedConfig {
      base_url,
      request_timeout: Duration::from_millis(300),
      listing_timeout: Duration::from_millis(300),
      retry: RetryPolicy::fixed(2, Duration::ZERO),
    })
    .unwrap()
  }

  #[tokio::test]
  async fn decodes_commented_bodies() {
    let router = Router::new()
      .route(
        "/competition",
        get(|| async { "# cached\n[{\"Id\": 1, \"Name\": \"Kisat\", \"Date\": \"2024-06-01\"}]" }),
      )
      .route(
        "/results/1/5",
        get(|| async {
          "\u{feff}{\"Name\": \"T15 60m\", \"Rounds\": [{\"TotalResults\": [{\"Name\": \"Anna Virtanen\", \"Result\": \"8.91\"}]}]}"
        }),
      );
    let feed = client(serve(router).await);

    let listing = feed.list_competitions().await.unwrap();
    assert_eq!(listing[0].competition_id, 1);

    let event = feed.event_results(1, 5).await.unwrap();
    assert_eq!(event.rows.len(), 1);
  }

  #[tokio::test]
  async fn missing_competition_is_none() {
    let feed = client(serve(Router::new()).await);
    assert!(feed.competition_overview(42).await.unwrap().is_none());
    assert!(matches!(
      feed.competition_properties(42).await.unwrap_err(),
      Error::NotFound(_)
    ));
  }

  #[tokio::test]
  async fn server_errors_are_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let router = Router::new()
      .route(
        "/competition/{id}/properties",
        get(|State(hits): State<Arc<AtomicU32>>| async move {
          if hits.fetch_add(1, Ordering::SeqCst) == 0 {
            (StatusCode::BAD_GATEWAY, "").into_response()
          } else {
            "{\"Competition\": {\"Name\": \"Kisat\", \"Location\": \"Pori\"}}".into_response()
          }
        }),
      )
      .with_state(hits.clone());
    let feed = client(serve(router).await);

    let props = feed.competition_properties(9).await.unwrap();
    assert_eq!(props.location.as_deref(), Some("Pori"));
    assert_eq!(hits.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn malformed_json_is_not_retried() {
    let hits = Arc::new(AtomicU32::new(0));
    let router = Router::new()
      .route(
        "/results/{id}/{event}",
        get(|State(hits): State<Arc<AtomicU32>>| async move {
          hits.fetch_add(1, Ordering::SeqCst);
          "{ not json"
        }),
      )
      .with_state(hits.clone());
    let feed = client(serve(router).await);

    let err = feed.event_results(1, 2).await.unwrap_err();
    assert!(matches!(err, Error::Json(_)));
    assert_eq!(hits.load(Ordering::SeqCst), 1);
  }

  #[tokio::test]
  async fn slow_responses_time_out() {
    let router = Router::new().route(
      "/results/{id}/{event}",
      get(|| async {
        tokio::time::sleep(Duration::from_secs(2)).await;
        "{}"
      }),
    );
    let feed = client(serve(router).await);

    let err = feed.event_results(1, 2).await.unwrap_err();
    assert!(matches!(err, Error::Timeout(_)), "{err:?}");
  }
}
