//! Periodic sync trigger
//!
//! The scheduler claims the same run slot as the HTTP trigger, so a
//! scheduled cycle that lands during an active run is skipped rather
//! than queued.

use crate::config::SchedulerConfig;
use crate::state::AppState;
use feedsync_engine::EngineError;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Spawn the scheduler loop when enabled. The first cycle fires one full
/// interval after startup, not immediately.
pub fn spawn(state: AppState, config: SchedulerConfig) -> Option<JoinHandle<()>> {
    if !config.enabled {
        debug!("Scheduler disabled");
        return None;
    }

    info!(
        interval_secs = config.interval_secs,
        "Scheduler enabled, sync runs will be triggered periodically"
    );

    let interval = Duration::from_secs(config.interval_secs);
    Some(tokio::spawn(async move {
        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick of a tokio interval completes immediately
        ticker.tick().await;

        loop {
            ticker.tick().await;
            match state.start_background_run() {
                Ok(run_id) => info!(%run_id, "Scheduled sync run dispatched"),
                Err(EngineError::AlreadyRunning) => {
                    info!("Scheduled cycle skipped, a run is already active");
                },
                Err(e) => warn!(error = %e, "Scheduled trigger failed"),
            }
        }
    }))
}

#[cfg(test)]
mod tests {
    use super::*;
    use feedsync_engine::{SyncConfig, SyncEngine};
    use std::sync::Arc;

    #[tokio::test]
    async fn test_disabled_scheduler_spawns_nothing() {
        let engine = Arc::new(SyncEngine::new(SyncConfig::default()).unwrap());
        let state = AppState::new(engine);
        let config = SchedulerConfig {
            enabled: false,
            interval_secs: 1,
        };

        assert!(spawn(state, config).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn test_enabled_scheduler_skips_while_slot_is_held() {
        let engine = Arc::new(SyncEngine::new(SyncConfig::default()).unwrap());
        let state = AppState::new(engine);
        state.engine.try_reserve().unwrap();

        let config = SchedulerConfig {
            enabled: true,
            interval_secs: 5,
        };
        let handle = spawn(state.clone(), config).unwrap();

        // Two cycles elapse; both find the slot held and skip
        tokio::time::sleep(Duration::from_secs(11)).await;
        handle.abort();

        assert!(state.last_report.read().await.is_none());
        assert!(state.last_error.read().await.is_none());
    }
}
