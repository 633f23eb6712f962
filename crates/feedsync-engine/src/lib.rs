//! Feedsync Engine Library
//!
//! Synchronizes supplier product feeds into a destination catalog.
//!
//! # Overview
//!
//! One sync run moves through a fixed pipeline:
//!
//! - **Feed acquisition**: ranked sources tried in order, first usable feed wins
//! - **Normalization**: loose supplier fields mapped onto one canonical product shape
//! - **Validation**: pricing and image policies applied, rejects counted by reason
//! - **Reconciliation**: per-SKU search against the destination decides create vs update
//! - **Reporting**: counters, error tail and timing assembled into a run report
//!
//! Records are processed in fixed-size batches with intra-batch concurrency,
//! while a run-wide call spacer keeps the destination API within its rate
//! tolerance. Destination failures are retried with exponential backoff;
//! definitive rejections (auth, validation) are not.
//!
//! # Example
//!
//! ```no_run
//! use feedsync_engine::{SyncConfig, SyncEngine};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let config = SyncConfig::from_env()?;
//!     let engine = SyncEngine::new(config)?;
//!     let report = engine.run().await?;
//!     println!("{}", serde_json::to_string_pretty(&report)?);
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod destination;
pub mod error;
pub mod executor;
pub mod feed;
pub mod models;
pub mod normalize;
pub mod probe;
pub mod progress;
pub mod reconcile;
pub mod report;
pub mod retry;
pub mod throttle;
pub mod validate;

// Re-export commonly used types
pub use config::{FeedFormat, FeedSource, SyncConfig};
pub use error::{EngineError, Result};
pub use executor::SyncEngine;
pub use models::{ProgressEvent, RunState};
pub use report::{RunReport, StatsSnapshot};
