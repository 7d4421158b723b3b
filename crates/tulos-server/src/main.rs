//! `tulos` binary.
//!
//! Reads `tulos.toml` (or the path given with `--config`) layered under
//! `TULOS_*` environment variables, opens the SQLite store and either runs
//! one ingestion step or serves the control API.
//!
//! ```text
//! tulos run                      # one cycle over the competition listing
//! tulos range --from 9000 --to 9100
//! tulos infer                    # inference pass only
//! tulos serve                    # POST /refresh, GET /status
//! ```

use std::{path::PathBuf, sync::Arc};

use anyhow::Context as _;
use clap::{Parser, Subcommand};
use serde::Serialize;
use tokio::net::TcpListener;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::EnvFilter;
use tulos_core::model::CompetitionId;
use tulos_feed::FeedClient;
use tulos_ingest::{CycleMode, CycleSummary, Ingestor};
use tulos_server::ServerConfig;
use tulos_store_sqlite::SqliteStore;

#[derive(Parser)]
#[command(author, version, about = "Athletics results ingester")]
struct Cli {
  /// Path to the TOML configuration file.
  #[arg(short, long, default_value = "tulos.toml")]
  config: PathBuf,

  #[command(subcommand)]
  command: Command,
}

#[derive(Subcommand)]
enum Command {
  /// Ingest settled competitions from the public listing.
  Run,
  /// Ingest competitions by id, probing each id upstream.
  Range {
    #[arg(long)]
    from: CompetitionId,
    #[arg(long)]
    to:   CompetitionId,
  },
  /// Infer athlete birth years and genders from stored results.
  Infer,
  /// Serve the control API.
  Serve,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(
      EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy(),
    )
    .init();

  let cli = Cli::parse();

  let server_cfg = ServerConfig::load(&cli.config)
    .with_context(|| format!("failed to load configuration from {:?}", cli.config))?;

  let database_path = server_cfg.database_path();
  let store = SqliteStore::open(&database_path)
    .await
    .with_context(|| format!("failed to open store at {database_path:?}"))?;
  let feed = FeedClient::new(server_cfg.feed_config()).context("failed to build HTTP client")?;
  let ingestor = Ingestor::new(Arc::new(store), Arc::new(feed), server_cfg.ingest_config());

  match cli.command {
    Command::Run => run_cycle(&ingestor, CycleMode::Feed).await,
    Command::Range { from, to } => {
      anyhow::ensure!(from <= to, "empty range: --from {from} is after --to {to}");
      run_cycle(&ingestor, CycleMode::Range { from, to }).await
    }
    Command::Infer => {
      let report = ingestor.infer().await.context("inference failed")?;
      print_json(&report)
    }
    Command::Serve => {
      let address = server_cfg.address();
      tracing::info!("Listening on http://{address}");
      let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind {address}"))?;

      axum::serve(listener, tulos_server::router(ingestor))
        .await
        .context("server error")?;
      Ok(())
    }
  }
}

async fn run_cycle(
  ingestor: &Ingestor<SqliteStore, FeedClient>,
  mode: CycleMode,
) -> anyhow::Result<()> {
  let summary: CycleSummary = ingestor
    .run_exclusive(mode)
    .await
    .map_err(|status| anyhow::anyhow!("a cycle is already running: {status:?}"))?;
  print_json(&summary)?;

  if !summary.succeeded {
    anyhow::bail!(
      "ingestion cycle failed: {}",
      summary.message.as_deref().unwrap_or("no details")
    );
  }
  Ok(())
}

fn print_json(value: &impl Serialize) -> anyhow::Result<()> {
  println!("{}", serde_json::to_string_pretty(value)?);
  Ok(())
}
