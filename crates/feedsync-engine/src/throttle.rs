//! Destination call spacing
//!
//! The destination API tolerates only a limited call rate, so every call
//! goes through a [`CallSpacer`] that enforces a minimum gap between calls
//! across the whole run, including calls from concurrently processed
//! records. Each waiter reserves the next free slot under a brief lock and
//! sleeps outside it, so waiters line up instead of stampeding.

use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;

pub struct CallSpacer {
    min_spacing: Duration,
    next_slot: Mutex<Option<Instant>>,
}

impl CallSpacer {
    pub fn new(min_spacing: Duration) -> Self {
        Self {
            min_spacing,
            next_slot: Mutex::new(None),
        }
    }

    /// Wait until this caller's reserved slot arrives.
    pub async fn wait(&self) {
        if self.min_spacing.is_zero() {
            return;
        }

        let slot = {
            let mut next = self.next_slot.lock().await;
            let now = Instant::now();
            let slot = match *next {
                Some(reserved) if reserved > now => reserved,
                _ => now,
            };
            *next = Some(slot + self.min_spacing);
            slot
        };

        tokio::time::sleep_until(slot).await;
    }
}
