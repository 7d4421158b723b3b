//! Core types and trait definitions for the Tulos results ingester.
//!
//! This crate is deliberately free of HTTP and database dependencies. The
//! feed client, the SQLite store and the orchestrator all depend on it; it
//! depends on nothing project-specific.

#![allow(async_fn_in_trait)]

pub mod error;
pub mod inference;
pub mod model;
pub mod normalize;
pub mod retry;
pub mod source;
pub mod store;

pub use error::{Error, Result};
