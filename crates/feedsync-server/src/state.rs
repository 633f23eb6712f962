//! Shared application state
//!
//! One [`SyncEngine`] lives for the whole server process; the run slot
//! inside it is what makes the HTTP trigger and the scheduler mutually
//! exclusive. The server additionally keeps the most recent finished
//! report, and the last run-fatal error, for the read endpoints.

use feedsync_engine::{EngineError, RunReport, SyncEngine};
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::Instrument;
use uuid::Uuid;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    pub engine: Arc<SyncEngine>,
    pub last_report: Arc<RwLock<Option<RunReport>>>,
    pub last_error: Arc<RwLock<Option<String>>>,
}

impl AppState {
    pub fn new(engine: Arc<SyncEngine>) -> Self {
        Self {
            engine,
            last_report: Arc::new(RwLock::new(None)),
            last_error: Arc::new(RwLock::new(None)),
        }
    }

    /// Claim the engine's run slot and execute the run on a background
    /// task. Returns the run id immediately; the report (or the run-fatal
    /// error) lands in the shared state when the run finishes.
    pub fn start_background_run(&self) -> Result<Uuid, EngineError> {
        self.engine.try_reserve()?;

        let run_id = Uuid::new_v4();
        let state = self.clone();
        let span = tracing::info_span!("sync_run", %run_id);
        tokio::spawn(
            async move {
                match state.engine.run_reserved().await {
                    Ok(report) => {
                        *state.last_report.write().await = Some(report);
                        *state.last_error.write().await = None;
                    },
                    Err(e) => {
                        *state.last_error.write().await = Some(e.to_string());
                    },
                }
            }
            .instrument(span),
        );

        Ok(run_id)
    }
}
