//! Optional external command run after each cycle.

use std::time::Duration;

use tokio::process::Command;

use crate::{Error, Result};

/// Run `argv` and wait at most `limit` for it. An empty `argv` does nothing.
///
/// On timeout the child is killed.
pub async fn run_post_ingest(argv: &[String], limit: Duration) -> Result<()> {
  let Some((program, args)) = argv.split_first() else {
    return Ok(());
  };

  tracing::info!(%program, "running post-ingest command");
  let output = Command::new(program).args(args).kill_on_drop(true).output();
  let output = tokio::time::timeout(limit, output)
    .await
    .map_err(|_| Error::Hook(format!("{program} did not finish within {limit:?}")))?
    .map_err(|e| Error::Hook(format!("{program}: {e}")))?;

  if output.status.success() {
    Ok(())
  } else {
    let stderr = String::from_utf8_lossy(&output.stderr);
    Err(Error::Hook(format!("{program} exited with {}: {}", output.status, stderr.trim())))
  }
}

#[cfg(test)]
mod tests {
  use std::time::Instant;

  use super::*;

  const LIMIT: Duration = Duration::from_secs(5);

  fn argv(parts: &[&str]) -> Vec<String> { parts.iter().map(|p| p.to_string()).collect() }

  #[tokio::test]
  async fn empty_command_is_a_no_op() {
    run_post_ingest(&[], LIMIT).await.unwrap();
  }

  #[tokio::test]
  async fn missing_program_is_an_error() {
    let err = run_post_ingest(&argv(&["/nonexistent/tulos-hook"]), LIMIT).await.unwrap_err();
    assert!(matches!(err, Error::Hook(_)));
  }

  #[tokio::test]
  async fn hanging_command_is_cut_off() {
    let started = Instant::now();
    let err = run_post_ingest(&argv(&["sleep", "3600"]), Duration::from_millis(200))
      .await
      .unwrap_err();

    assert!(started.elapsed() < Duration::from_secs(3), "took {:?}", started.elapsed());
    match err {
      Error::Hook(message) => assert!(message.contains("did not finish"), "{message}"),
      other => panic!("unexpected error: {other:?}"),
    }
  }
}
