//! Run statistics and reporting
//!
//! [`RunStats`] counts outcomes with atomics so concurrently processed
//! records can record results without locking. Error details and log lines
//! go into fixed-capacity buffers that evict oldest-first, keeping memory
//! bounded regardless of feed size. [`RunReport`] is the serialized summary
//! handed to API consumers after a run.

use crate::models::{RejectReason, SyncStep};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

// ============================================================================
// Counters
// ============================================================================

/// Lock-free outcome counters for one run.
#[derive(Debug, Default)]
pub struct RunStats {
    total: AtomicU64,
    processed: AtomicU64,
    created: AtomicU64,
    updated: AtomicU64,
    ignored: AtomicU64,
    errors: AtomicU64,
    no_images: AtomicU64,
    low_price: AtomicU64,
    invalid_data: AtomicU64,
    api_errors: AtomicU64,
}

impl RunStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clear all counters at the start of a run.
    pub fn reset(&self) {
        self.total.store(0, Ordering::Relaxed);
        self.processed.store(0, Ordering::Relaxed);
        self.created.store(0, Ordering::Relaxed);
        self.updated.store(0, Ordering::Relaxed);
        self.ignored.store(0, Ordering::Relaxed);
        self.errors.store(0, Ordering::Relaxed);
        self.no_images.store(0, Ordering::Relaxed);
        self.low_price.store(0, Ordering::Relaxed);
        self.invalid_data.store(0, Ordering::Relaxed);
        self.api_errors.store(0, Ordering::Relaxed);
    }

    pub fn set_total(&self, total: u64) {
        self.total.store(total, Ordering::Relaxed);
    }

    pub fn record_created(&self) {
        self.created.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_updated(&self) {
        self.updated.fetch_add(1, Ordering::Relaxed);
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    /// A record dropped before validation (no resolvable SKU).
    pub fn record_ignored(&self) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
    }

    /// A record filtered by a validation rule.
    pub fn record_filtered(&self, reason: RejectReason) {
        self.ignored.fetch_add(1, Ordering::Relaxed);
        match reason {
            RejectReason::NoImages => self.no_images.fetch_add(1, Ordering::Relaxed),
            RejectReason::PriceTooLow => self.low_price.fetch_add(1, Ordering::Relaxed),
            RejectReason::InvalidData => self.invalid_data.fetch_add(1, Ordering::Relaxed),
            RejectReason::ApiError => self.api_errors.fetch_add(1, Ordering::Relaxed),
        };
    }

    /// A record that failed at the destination after validation passed.
    pub fn record_failure(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
        self.api_errors.fetch_add(1, Ordering::Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            total: self.total.load(Ordering::Relaxed),
            processed: self.processed.load(Ordering::Relaxed),
            created: self.created.load(Ordering::Relaxed),
            updated: self.updated.load(Ordering::Relaxed),
            ignored: self.ignored.load(Ordering::Relaxed),
            errors: self.errors.load(Ordering::Relaxed),
            reasons: ReasonCounts {
                no_images: self.no_images.load(Ordering::Relaxed),
                low_price: self.low_price.load(Ordering::Relaxed),
                invalid_data: self.invalid_data.load(Ordering::Relaxed),
                api_error: self.api_errors.load(Ordering::Relaxed),
            },
        }
    }
}

/// Point-in-time view of the counters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub total: u64,
    pub processed: u64,
    pub created: u64,
    pub updated: u64,
    pub ignored: u64,
    pub errors: u64,
    pub reasons: ReasonCounts,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasonCounts {
    pub no_images: u64,
    pub low_price: u64,
    pub invalid_data: u64,
    pub api_error: u64,
}

impl StatsSnapshot {
    /// Share of attempted writes that succeeded, in percent. An empty run
    /// counts as fully successful.
    pub fn success_rate(&self) -> f64 {
        let attempted = self.created + self.updated + self.errors;
        if attempted == 0 {
            return 100.0;
        }
        (self.created + self.updated) as f64 / attempted as f64 * 100.0
    }
}

// ============================================================================
// Bounded retention
// ============================================================================

/// Fixed-capacity FIFO buffer; pushing past capacity evicts the oldest entry.
#[derive(Debug)]
pub struct BoundedBuffer<T> {
    cap: usize,
    entries: Mutex<VecDeque<T>>,
}

impl<T: Clone> BoundedBuffer<T> {
    pub fn new(cap: usize) -> Self {
        Self {
            cap,
            entries: Mutex::new(VecDeque::with_capacity(cap.min(64))),
        }
    }

    pub fn push(&self, entry: T) {
        let mut entries = self.lock();
        if entries.len() == self.cap {
            entries.pop_front();
        }
        entries.push_back(entry);
    }

    pub fn drain(&self) -> Vec<T> {
        self.lock().drain(..).collect()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, VecDeque<T>> {
        // A poisoned buffer only means a writer panicked mid-push; the
        // queue itself is still usable.
        self.entries.lock().unwrap_or_else(|p| p.into_inner())
    }
}

// ============================================================================
// Report
// ============================================================================

/// One failed record in the report's error tail.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorRecord {
    pub sku: String,
    pub step: SyncStep,
    pub error: String,
}

/// Collects run-scoped detail that the counters cannot carry.
#[derive(Debug)]
pub struct Reporter {
    log: BoundedBuffer<String>,
    error_tail: BoundedBuffer<ErrorRecord>,
}

impl Reporter {
    pub fn new(log_cap: usize, error_tail_cap: usize) -> Self {
        Self {
            log: BoundedBuffer::new(log_cap),
            error_tail: BoundedBuffer::new(error_tail_cap),
        }
    }

    pub fn log_line(&self, line: impl Into<String>) {
        self.log.push(line.into());
    }

    pub fn record_error(&self, sku: impl Into<String>, step: SyncStep, error: impl ToString) {
        self.error_tail.push(ErrorRecord {
            sku: sku.into(),
            step,
            error: error.to_string(),
        });
    }

    pub fn clear(&self) {
        self.log.clear();
        self.error_tail.clear();
    }

    /// Assemble the final report, draining the retained error tail.
    pub fn build(
        &self,
        stats: StatsSnapshot,
        started_at: DateTime<Utc>,
        duration_seconds: f64,
        source_used: Option<String>,
    ) -> RunReport {
        RunReport {
            success: stats.errors == 0,
            timestamp: started_at,
            duration_seconds,
            source_used,
            stats,
            error_records: self.error_tail.drain(),
        }
    }
}

/// Serialized summary of one sync run.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunReport {
    /// True when no record-level destination failures occurred
    pub success: bool,
    /// Run start time
    pub timestamp: DateTime<Utc>,
    pub duration_seconds: f64,
    /// Feed source the records came from, absent when the feed never loaded
    pub source_used: Option<String>,
    pub stats: StatsSnapshot,
    /// Most recent failures, capped at the configured tail size
    pub error_records: Vec<ErrorRecord>,
}
