//! Feedsync Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared foundation for the feedsync workspace members:
//!
//! - **Error Handling**: common error and result types
//! - **Logging**: tracing subscriber setup (console/file, text/JSON)
//! - **Checksums**: payload fingerprinting for downloaded feeds
//!
//! # Example
//!
//! ```no_run
//! use feedsync_common::logging::{LogConfig, init_logging};
//! use tracing::info;
//!
//! fn main() -> anyhow::Result<()> {
//!     let config = LogConfig::from_env()?;
//!     init_logging(&config)?;
//!     info!("ready");
//!     Ok(())
//! }
//! ```

pub mod checksum;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use error::{CommonError, Result};
