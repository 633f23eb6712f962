//! # Feedsync Server Library
//!
//! HTTP surface for the synchronization engine. The server owns a single
//! [`SyncEngine`](feedsync_engine::SyncEngine) instance, exposes trigger and
//! read endpoints over axum, and optionally drives runs from a background
//! scheduler. Only the most recent finished report is kept; there is no
//! durable run history.
//!
//! ## Endpoints
//!
//! - `GET /health` - liveness probe
//! - `POST /api/v1/sync` - trigger a run (409 while one is active)
//! - `GET /api/v1/sync/status` - engine state and live counters
//! - `GET /api/v1/sync/report` - last completed run report

pub mod config;
pub mod error;
pub mod middleware;
pub mod routes;
pub mod scheduler;
pub mod state;

pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use routes::create_router;
pub use state::AppState;
