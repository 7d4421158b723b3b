//! Ingestion cycles for the Tulos results store.
//!
//! Generic over any [`tulos_core::source::ResultSource`] and
//! [`tulos_core::store::ResultStore`]: the binary wires the HTTP feed and the
//! SQLite store, tests wire in-memory fakes.
//!
//! A cycle runs in four steps:
//!
//! 1. [`discovery`] picks competitions that are settled and not yet
//!    successfully processed.
//! 2. [`pipeline`] processes each of them, a bounded number at a time, with a
//!    per-competition retry.
//! 3. [`inference`] fills in birth years and genders from age groups.
//! 4. An optional post-ingest command runs and the cycle is logged.

pub mod config;
pub mod discovery;
pub mod error;
pub mod fetch;
pub mod hook;
pub mod inference;
pub mod orchestrator;
pub mod pipeline;

pub use config::IngestConfig;
pub use error::{Error, Result};
pub use orchestrator::{CycleMode, CycleStatus, CycleSummary, Ingestor, TriggerOutcome};
