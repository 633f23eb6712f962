//! Run orchestration
//!
//! [`SyncEngine`] drives one sync run end to end: acquire the feed, verify
//! destination connectivity, then push records through normalization,
//! validation and reconciliation in fixed-size batches. Records inside a
//! batch run concurrently; batches run strictly in feed order with a
//! jittered pause between them. One engine instance carries the run state,
//! so a trigger that arrives while a run is active is rejected instead of
//! queued.

use crate::config::SyncConfig;
use crate::destination::{CatalogPort, CategoryResolver, DestinationClient, DryRunCatalog};
use crate::error::{EngineError, Result};
use crate::feed::FeedReader;
use crate::models::{
    AcceptedProduct, ProgressEvent, RawRecord, RejectReason, RunState, SyncOutcome, ValidationResult,
};
use crate::normalize::normalize;
use crate::probe::ImageProber;
use crate::reconcile::Reconciler;
use crate::report::{Reporter, RunReport, RunStats, StatsSnapshot};
use crate::throttle::CallSpacer;
use crate::validate::validate;
use chrono::Utc;
use rand::Rng;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

pub struct SyncEngine {
    config: Arc<SyncConfig>,
    port: Arc<dyn CatalogPort>,
    state: Mutex<RunState>,
    stats: Arc<RunStats>,
    reporter: Arc<Reporter>,
    progress: Mutex<Option<mpsc::Sender<ProgressEvent>>>,
}

impl SyncEngine {
    /// Engine wired to the real destination API.
    pub fn new(config: SyncConfig) -> Result<Self> {
        let port = Arc::new(DestinationClient::new(&config.destination)?);
        Ok(Self::with_port(config, port))
    }

    /// Engine that searches the real destination but never writes to it.
    pub fn new_dry_run(config: SyncConfig) -> Result<Self> {
        let client = DestinationClient::new(&config.destination)?;
        Ok(Self::with_port(config, Arc::new(DryRunCatalog::new(client))))
    }

    /// Engine with a caller-provided catalog port.
    pub fn with_port(config: SyncConfig, port: Arc<dyn CatalogPort>) -> Self {
        let reporter = Reporter::new(config.log_cap, config.error_tail_cap);
        Self {
            stats: Arc::new(RunStats::new()),
            reporter: Arc::new(reporter),
            config: Arc::new(config),
            port,
            state: Mutex::new(RunState::Idle),
            progress: Mutex::new(None),
        }
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    pub fn state(&self) -> RunState {
        *lock(&self.state)
    }

    pub fn stats_snapshot(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    /// Register the progress listener. Only one listener is kept; a new
    /// subscription replaces the previous sender.
    pub fn subscribe(&self) -> mpsc::Receiver<ProgressEvent> {
        let (tx, rx) = mpsc::channel(self.config.progress_buffer);
        *lock(&self.progress) = Some(tx);
        rx
    }

    /// Claim the run slot, failing when a run is already active. The caller
    /// must follow up with [`run_reserved`](Self::run_reserved).
    pub fn try_reserve(&self) -> Result<()> {
        let mut state = lock(&self.state);
        if state.is_active() {
            return Err(EngineError::AlreadyRunning);
        }
        *state = RunState::Fetching;
        Ok(())
    }

    /// Trigger one full run.
    pub async fn run(&self) -> Result<RunReport> {
        self.try_reserve()?;
        self.run_reserved().await
    }

    /// Execute a run whose slot was already claimed with
    /// [`try_reserve`](Self::try_reserve).
    pub async fn run_reserved(&self) -> Result<RunReport> {
        let started_at = Utc::now();
        let started = std::time::Instant::now();
        self.stats.reset();
        self.reporter.clear();

        let result = self.execute().await;
        // Dropping the sender ends the progress stream for this run
        *lock(&self.progress) = None;

        match result {
            Ok(source) => {
                self.set_state(RunState::Completed);
                let snapshot = self.stats.snapshot();
                let report = self.reporter.build(
                    snapshot,
                    started_at,
                    started.elapsed().as_secs_f64(),
                    Some(source),
                );
                info!(
                    duration_seconds = report.duration_seconds,
                    success = report.success,
                    "sync run finished"
                );
                Ok(report)
            },
            Err(e) => {
                self.set_state(RunState::Failed);
                error!(error = %e, "sync run aborted");
                Err(e)
            },
        }
    }

    async fn execute(&self) -> Result<String> {
        info!("Step 1/4: fetching product feed");
        let reader = FeedReader::new(self.config.feed_timeout())?;
        let feed = reader.fetch(&self.config.sources).await?;
        self.stats.set_total(feed.records.len() as u64);

        self.set_state(RunState::Processing);

        info!("Step 2/4: checking destination connectivity");
        self.port.check_connectivity().await?;

        let batch_size = self.config.batch_size;
        let batch_count = feed.records.len().div_ceil(batch_size);
        info!(
            records = feed.records.len(),
            batch_size,
            batches = batch_count,
            "Step 3/4: reconciling records"
        );

        let ctx = Arc::new(self.run_context()?);
        for (batch_index, batch) in feed.records.chunks(batch_size).enumerate() {
            debug!(batch = batch_index + 1, batches = batch_count, size = batch.len(), "processing batch");

            let mut tasks = JoinSet::new();
            for record in batch {
                let ctx = Arc::clone(&ctx);
                let record = record.clone();
                tasks.spawn(async move { process_record(ctx, record, batch_index).await });
            }
            while let Some(joined) = tasks.join_next().await {
                if let Err(e) = joined {
                    // A panicked record task still counts against the run
                    self.stats.record_failure();
                    self.reporter.log_line(format!("record task panicked: {}", e));
                    warn!(error = %e, "record task panicked");
                }
            }

            if batch_index + 1 < batch_count {
                let pause = self.batch_pause();
                if !pause.is_zero() {
                    debug!(pause_ms = pause.as_millis() as u64, "pausing between batches");
                    tokio::time::sleep(pause).await;
                }
            }
        }

        let snapshot = self.stats.snapshot();
        info!(
            created = snapshot.created,
            updated = snapshot.updated,
            ignored = snapshot.ignored,
            errors = snapshot.errors,
            success_rate = format!("{:.1}%", snapshot.success_rate()),
            "Step 4/4: destination sync complete"
        );

        Ok(feed.source)
    }

    fn run_context(&self) -> Result<RunContext> {
        let resolver = CategoryResolver::new(
            &self.config.destination.category_map,
            self.config.destination.default_category_id,
        );
        let spacer = Arc::new(CallSpacer::new(self.config.call_spacing()));
        let reconciler = Reconciler::new(
            Arc::clone(&self.port),
            resolver,
            self.config.retry.clone(),
            spacer,
        );
        let prober = if self.config.images.probe_enabled {
            Some(ImageProber::new(self.config.images.clone())?)
        } else {
            None
        };
        Ok(RunContext {
            config: Arc::clone(&self.config),
            reconciler,
            prober,
            stats: Arc::clone(&self.stats),
            reporter: Arc::clone(&self.reporter),
            progress: lock(&self.progress).clone(),
        })
    }

    fn batch_pause(&self) -> Duration {
        let jitter = if self.config.batch_pause_jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=self.config.batch_pause_jitter_ms)
        } else {
            0
        };
        Duration::from_millis(self.config.batch_pause_ms + jitter)
    }

    fn set_state(&self, state: RunState) {
        *lock(&self.state) = state;
    }
}

/// Everything a spawned record task needs, cloned once per run.
struct RunContext {
    config: Arc<SyncConfig>,
    reconciler: Reconciler,
    prober: Option<ImageProber>,
    stats: Arc<RunStats>,
    reporter: Arc<Reporter>,
    progress: Option<mpsc::Sender<ProgressEvent>>,
}

impl RunContext {
    /// Best-effort progress telemetry. Events are dropped when the buffer
    /// is full or the listener is gone.
    fn emit_progress(&self, sku: &str, batch_index: usize) {
        let Some(sender) = &self.progress else {
            return;
        };
        let snapshot = self.stats.snapshot();
        let event = ProgressEvent {
            processed: snapshot.processed + snapshot.ignored + snapshot.errors,
            succeeded: snapshot.processed,
            skipped: snapshot.ignored,
            total: snapshot.total,
            current_sku: sku.to_string(),
            batch_index,
        };
        let _ = sender.try_send(event);
    }
}

async fn process_record(ctx: Arc<RunContext>, record: RawRecord, batch_index: usize) {
    let Some(product) = normalize(&record) else {
        ctx.stats.record_ignored();
        ctx.reporter.log_line("ignored record without resolvable SKU");
        debug!("ignoring record without resolvable SKU");
        ctx.emit_progress("", batch_index);
        return;
    };
    let sku = product.sku.clone();

    let outcome = match validate(&product, &ctx.config.price, &ctx.config.images) {
        ValidationResult::Rejected { reason, detail } => {
            warn!(sku = %sku, reason = reason.as_str(), %detail, "record filtered");
            ctx.reporter
                .log_line(format!("{}: filtered {} ({})", sku, reason.as_str(), detail));
            SyncOutcome::Filtered { reason }
        },
        ValidationResult::Accepted { computed_price, quantity, validated_images } => {
            let images = match &ctx.prober {
                Some(prober) => prober.filter_reachable(&validated_images).await,
                None => validated_images,
            };
            if ctx.config.images.required && images.is_empty() {
                warn!(sku = %sku, "no image candidate survived probing");
                ctx.reporter
                    .log_line(format!("{}: filtered NO_IMAGES (all candidates unreachable)", sku));
                SyncOutcome::Filtered { reason: RejectReason::NoImages }
            } else {
                let accepted = AcceptedProduct { product, computed_price, quantity, images };
                match ctx.reconciler.reconcile(&accepted).await {
                    Ok(outcome) => outcome,
                    Err(failure) => SyncOutcome::Failed {
                        step: failure.step,
                        error: failure.error.to_string(),
                        timestamp: Utc::now(),
                    },
                }
            }
        },
    };

    match &outcome {
        SyncOutcome::Created { id } => {
            ctx.stats.record_created();
            info!(sku = %sku, id, "product created");
            ctx.reporter.log_line(format!("{}: created as {}", sku, id));
        },
        SyncOutcome::Updated { id } => {
            ctx.stats.record_updated();
            info!(sku = %sku, id, "product updated");
            ctx.reporter.log_line(format!("{}: updated {}", sku, id));
        },
        SyncOutcome::Filtered { reason } => {
            ctx.stats.record_filtered(*reason);
        },
        SyncOutcome::Failed { step, error, .. } => {
            ctx.stats.record_failure();
            ctx.reporter.record_error(&sku, *step, error);
            ctx.reporter
                .log_line(format!("{}: failed during {}: {}", sku, step.as_str(), error));
            warn!(sku = %sku, step = step.as_str(), error = %error, "record failed at destination");
        },
    }

    ctx.emit_progress(&sku, batch_index);
}

/// Lock a run-state mutex, tolerating poisoning. State and progress are
/// plain values; a panicked holder cannot leave them inconsistent.
fn lock<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(|p| p.into_inner())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::config::FeedSource;
    use crate::destination::ProductPayload;
    use crate::models::DestinationEntity;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicI64, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    struct MockPort {
        existing: Mutex<HashMap<String, i64>>,
        next_id: AtomicI64,
        fail_create_definitively: bool,
        connectivity_ok: bool,
    }

    impl Default for MockPort {
        fn default() -> Self {
            Self {
                existing: Mutex::new(HashMap::new()),
                next_id: AtomicI64::new(100),
                fail_create_definitively: false,
                connectivity_ok: true,
            }
        }
    }

    impl MockPort {
        fn with_existing(skus: &[(&str, i64)]) -> Self {
            let port = Self::default();
            let mut existing = port.existing.lock().unwrap();
            for (sku, id) in skus {
                existing.insert(sku.to_string(), *id);
            }
            drop(existing);
            port
        }
    }

    #[async_trait]
    impl CatalogPort for MockPort {
        async fn search_by_sku(&self, sku: &str) -> crate::error::Result<Vec<DestinationEntity>> {
            let existing = self.existing.lock().unwrap();
            Ok(existing
                .get(sku)
                .map(|&id| DestinationEntity {
                    id,
                    sku: sku.to_string(),
                    extra: serde_json::Map::new(),
                })
                .into_iter()
                .collect())
        }

        async fn create(&self, payload: &ProductPayload) -> crate::error::Result<DestinationEntity> {
            if self.fail_create_definitively {
                return Err(EngineError::DefinitiveApi {
                    status: 422,
                    message: "rejected by destination".to_string(),
                });
            }
            let id = self.next_id.fetch_add(1, Ordering::SeqCst);
            self.existing.lock().unwrap().insert(payload.sku.clone(), id);
            Ok(DestinationEntity {
                id,
                sku: payload.sku.clone(),
                extra: serde_json::Map::new(),
            })
        }

        async fn update(&self, id: i64, payload: &ProductPayload) -> crate::error::Result<DestinationEntity> {
            Ok(DestinationEntity {
                id,
                sku: payload.sku.clone(),
                extra: serde_json::Map::new(),
            })
        }

        async fn check_connectivity(&self) -> crate::error::Result<()> {
            if self.connectivity_ok {
                Ok(())
            } else {
                Err(EngineError::Connectivity("destination refused".to_string()))
            }
        }
    }

    async fn feed_server(body: &str) -> MockServer {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/feed.csv"))
            .respond_with(ResponseTemplate::new(200).set_body_string(body.to_string()))
            .mount(&server)
            .await;
        server
    }

    fn fast_config(server: &MockServer) -> SyncConfig {
        let mut config = SyncConfig::default();
        config.sources = vec![FeedSource::csv("primary", format!("{}/feed.csv", server.uri()))];
        config.destination.token = "test-token".to_string();
        config.batch_size = 2;
        config.call_spacing_ms = 0;
        config.batch_pause_ms = 0;
        config.batch_pause_jitter_ms = 0;
        config.retry.max_attempts = 2;
        config.retry.base_delay_ms = 1;
        config.retry.max_delay_ms = 2;
        config
    }

    #[tokio::test]
    async fn test_run_partitions_every_record() {
        let server = feed_server(
            "sku;name;price;stock\n\
             NEW-1;Widget;10.00;3\n\
             OLD-1;Gadget;12.00;1\n\
             ;Orphan;5.00;2\n\
             BAD-1;Broken;0;4\n",
        )
        .await;

        let port = Arc::new(MockPort::with_existing(&[("OLD-1", 42)]));
        let engine = SyncEngine::with_port(fast_config(&server), port);

        let report = engine.run().await.unwrap();

        assert!(report.success);
        assert_eq!(report.source_used.as_deref(), Some("primary"));
        assert_eq!(report.stats.total, 4);
        assert_eq!(report.stats.created, 1);
        assert_eq!(report.stats.updated, 1);
        assert_eq!(report.stats.ignored, 2);
        assert_eq!(report.stats.errors, 0);
        assert_eq!(report.stats.reasons.invalid_data, 1);
        assert_eq!(
            report.stats.total,
            report.stats.processed + report.stats.ignored + report.stats.errors
        );
        assert_eq!(engine.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_record_failures_do_not_abort_the_run() {
        let server = feed_server("sku;name;price\nA-1;Widget;10.00\nA-2;Gadget;11.00\n").await;

        let port = Arc::new(MockPort {
            fail_create_definitively: true,
            ..MockPort::default()
        });
        let engine = SyncEngine::with_port(fast_config(&server), port);

        let report = engine.run().await.unwrap();

        assert!(!report.success);
        assert_eq!(report.stats.errors, 2);
        assert_eq!(report.stats.processed, 0);
        assert_eq!(report.error_records.len(), 2);
        assert_eq!(report.error_records[0].step, crate::models::SyncStep::Create);
        assert_eq!(engine.state(), RunState::Completed);
    }

    #[tokio::test]
    async fn test_feed_failure_aborts_the_run() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let engine = SyncEngine::with_port(fast_config(&server), Arc::new(MockPort::default()));

        let err = engine.run().await.unwrap_err();
        assert!(matches!(err, EngineError::FeedUnavailable { .. }));
        assert_eq!(engine.state(), RunState::Failed);
    }

    #[tokio::test]
    async fn test_connectivity_failure_aborts_the_run() {
        let server = feed_server("sku;name;price\nA-1;Widget;10.00\n").await;

        let port = Arc::new(MockPort {
            connectivity_ok: false,
            ..MockPort::default()
        });
        let engine = SyncEngine::with_port(fast_config(&server), port);

        let err = engine.run().await.unwrap_err();
        assert!(err.is_run_fatal());
        assert_eq!(engine.state(), RunState::Failed);
        assert_eq!(engine.stats_snapshot().processed, 0);
    }

    #[tokio::test]
    async fn test_concurrent_trigger_is_rejected() {
        let server = feed_server("sku;name;price\nA-1;Widget;10.00\n").await;
        let engine = SyncEngine::with_port(fast_config(&server), Arc::new(MockPort::default()));

        engine.try_reserve().unwrap();
        let err = engine.try_reserve().unwrap_err();
        assert!(matches!(err, EngineError::AlreadyRunning));

        // finishing the reserved run frees the slot again
        engine.run_reserved().await.unwrap();
        assert!(engine.try_reserve().is_ok());
    }

    #[tokio::test]
    async fn test_progress_events_reach_subscriber() {
        let server = feed_server("sku;name;price\nA-1;Widget;10.00\nA-2;Gadget;11.00\n").await;
        let engine = SyncEngine::with_port(fast_config(&server), Arc::new(MockPort::default()));

        let mut events = engine.subscribe();
        engine.run().await.unwrap();

        let mut last = None;
        while let Ok(event) = events.try_recv() {
            last = Some(event);
        }
        let last = last.expect("no progress events received");
        assert_eq!(last.total, 2);
        assert_eq!(last.processed, 2);
        assert_eq!(last.succeeded, 2);
    }

    #[tokio::test]
    async fn test_batches_preserve_feed_order() {
        let server = feed_server(
            "sku;name;price\nB-1;P1;1.00\nB-2;P2;1.00\nB-3;P3;1.00\nB-4;P4;1.00\nB-5;P5;1.00\n",
        )
        .await;
        let engine = SyncEngine::with_port(fast_config(&server), Arc::new(MockPort::default()));

        let mut events = engine.subscribe();
        engine.run().await.unwrap();

        let mut batch_indices = Vec::new();
        while let Ok(event) = events.try_recv() {
            batch_indices.push(event.batch_index);
        }
        // batch_size 2 over 5 records: batches 0, 0, 1, 1, 2
        assert_eq!(batch_indices.len(), 5);
        let mut sorted = batch_indices.clone();
        sorted.sort();
        assert_eq!(batch_indices, sorted);
        assert_eq!(sorted.last(), Some(&2));
    }
}
