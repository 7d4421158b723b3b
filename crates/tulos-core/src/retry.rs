//! Retry policy shared by upstream calls and per-competition processing.

use std::{fmt::Display, future::Future, time::Duration};

use serde::{Deserialize, Serialize};

/// How the delay between attempts grows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Backoff {
  /// The same delay before every retry.
  Fixed,
  /// Doubling delay, capped at `max`.
  Exponential { max: Duration },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
  /// Total attempts including the first. Zero is treated as one.
  pub max_attempts: u32,
  pub delay:        Duration,
  pub backoff:      Backoff,
}

/// A successful value together with the attempts it took.
#[derive(Debug, Clone, PartialEq)]
pub struct Retried<T> {
  pub value:    T,
  pub attempts: u32,
}

/// The last error once retries were exhausted or a permanent error was hit.
#[derive(Debug, Clone, PartialEq)]
pub struct Exhausted<E> {
  pub error:    E,
  pub attempts: u32,
}

impl RetryPolicy {
  pub const fn fixed(max_attempts: u32, delay: Duration) -> Self {
    Self { max_attempts, delay, backoff: Backoff::Fixed }
  }

  pub const fn exponential(max_attempts: u32, initial: Duration, max: Duration) -> Self {
    Self { max_attempts, delay: initial, backoff: Backoff::Exponential { max } }
  }

  /// A single attempt, no retries.
  pub const fn none() -> Self { Self::fixed(1, Duration::ZERO) }

  /// Delay before retry number `retry` (1-based).
  pub fn delay_for(&self, retry: u32) -> Duration {
    match self.backoff {
      Backoff::Fixed => self.delay,
      Backoff::Exponential { max } => {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.delay.saturating_mul(factor).min(max)
      }
    }
  }

  /// Run `f` until it succeeds, returns an error `retryable` rejects, or the
  /// attempts run out.
  pub async fn run<T, E, F, Fut>(
    &self,
    operation: &str,
    retryable: impl Fn(&E) -> bool,
    mut f: F,
  ) -> Result<Retried<T>, Exhausted<E>>
  where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
  {
    let max_attempts = self.max_attempts.max(1);
    let mut attempt = 0;

    loop {
      attempt += 1;
      match f(attempt).await {
        Ok(value) => {
          if attempt > 1 {
            tracing::debug!(operation, attempt, "succeeded after retry");
          }
          return Ok(Retried { value, attempts: attempt });
        }
        Err(error) if attempt < max_attempts && retryable(&error) => {
          let delay = self.delay_for(attempt);
          tracing::warn!(
            operation,
            attempt,
            max_attempts,
            delay_ms = millis(delay),
            error = %error,
            "attempt failed, retrying"
          );
          tokio::time::sleep(delay).await;
        }
        Err(error) => {
          tracing::debug!(operation, attempt, error = %error, "giving up");
          return Err(Exhausted { error, attempts: attempt });
        }
      }
    }
  }
}

/// Whole milliseconds, saturating at `u64::MAX`.
fn millis(delay: Duration) -> u64 { u64::try_from(delay.as_millis()).unwrap_or(u64::MAX) }

#[cfg(test)]
mod tests {
  use std::sync::atomic::{AtomicU32, Ordering};

  use super::*;

  fn instant(max_attempts: u32) -> RetryPolicy {
    RetryPolicy::fixed(max_attempts, Duration::ZERO)
  }

  #[test]
  fn exponential_delay_doubles_up_to_cap() {
    let p = RetryPolicy::exponential(5, Duration::from_secs(1), Duration::from_secs(3));
    assert_eq!(p.delay_for(1), Duration::from_secs(1));
    assert_eq!(p.delay_for(2), Duration::from_secs(2));
    assert_eq!(p.delay_for(3), Duration::from_secs(3));
    assert_eq!(p.delay_for(40), Duration::from_secs(3));
  }

  #[test]
  fn millis_saturate_instead_of_wrapping() {
    assert_eq!(millis(Duration::from_millis(1500)), 1500);
    assert_eq!(millis(Duration::MAX), u64::MAX);
  }

  #[test]
  fn fixed_delay_is_constant() {
    let p = RetryPolicy::fixed(3, Duration::from_secs(5));
    assert_eq!(p.delay_for(1), p.delay_for(2));
  }

  #[tokio::test]
  async fn retries_until_success() {
    let calls = AtomicU32::new(0);
    let out = instant(3)
      .run("op", |_: &String| true, |_| async {
        let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
        if n < 3 { Err(format!("fail {n}")) } else { Ok(n) }
      })
      .await
      .unwrap();
    assert_eq!(out, Retried { value: 3, attempts: 3 });
  }

  #[tokio::test]
  async fn stops_after_max_attempts() {
    let calls = AtomicU32::new(0);
    let err = instant(2)
      .run("op", |_: &String| true, |_| async {
        calls.fetch_add(1, Ordering::SeqCst);
        Err::<(), _>("nope".to_string())
      })
      .await
      .unwrap_err();
    assert_eq!(err.attempts, 2);
    assert_eq!(calls.load(Ordering::SeqCst), 2);
  }

  #[tokio::test]
  async fn permanent_errors_are_not_retried() {
    let err = instant(5)
      .run("op", |e: &String| e != "permanent", |_| async {
        Err::<(), _>("permanent".to_string())
      })
      .await
      .unwrap_err();
    assert_eq!(err.attempts, 1);
  }

  #[tokio::test]
  async fn zero_attempts_still_runs_once() {
    let out = instant(0)
      .run("op", |_: &String| true, |attempt| async move { Ok::<_, String>(attempt) })
      .await
      .unwrap();
    assert_eq!(out.value, 1);
  }
}
