//! Client for the public live-results feed.
//!
//! Decodes the loosely typed upstream JSON into [`tulos_core::source`] types
//! and implements [`tulos_core::source::ResultSource`] over HTTP.
//!
//! # Quick start
//!
//! ```no_run
//! use tulos_core::source::ResultSource as _;
//! use tulos_feed::{FeedClient, FeedConfig};
//!
//! # async fn run() -> tulos_feed::Result<()> {
//! let feed = FeedClient::new(FeedConfig::default())?;
//! for listing in feed.list_competitions().await? {
//!   println!("{} {:?}", listing.competition_id, listing.name);
//! }
//! # Ok(())
//! # }
//! ```

mod client;
pub mod error;
pub mod payload;

pub use client::{DEFAULT_BASE_URL, FeedClient, FeedConfig};
pub use error::{Error, Result};
pub use payload::decode_payload;
