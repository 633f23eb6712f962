//! Retry with exponential backoff
//!
//! Wraps destination calls in a bounded retry loop. Definitive errors (auth
//! failures, duplicates, bad requests) return immediately; transient ones
//! back off exponentially with jitter up to a ceiling. The last transient
//! error is returned once attempts are exhausted.

use crate::config::RetryConfig;
use crate::error::{EngineError, Result};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `call` up to `config.max_attempts` times.
pub async fn with_retry<T, F, Fut>(operation: &str, config: &RetryConfig, mut call: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    let mut last_error = EngineError::Api(format!("{}: no attempts made", operation));

    for attempt in 1..=config.max_attempts {
        match call().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_definitive() => return Err(e),
            Err(e) => {
                if attempt < config.max_attempts {
                    let delay = backoff_delay(config, attempt);
                    warn!(
                        operation,
                        attempt,
                        max_attempts = config.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "transient failure, retrying"
                    );
                    tokio::time::sleep(delay).await;
                } else {
                    warn!(
                        operation,
                        attempts = config.max_attempts,
                        error = %e,
                        "retries exhausted"
                    );
                }
                last_error = e;
            },
        }
    }

    Err(last_error)
}

/// Exponential backoff with jitter: base * 2^(attempt-1), capped at the
/// configured ceiling, plus up to a quarter of that in random jitter.
fn backoff_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exponent = attempt.saturating_sub(1).min(16);
    let capped = config
        .base_delay_ms
        .saturating_mul(1u64 << exponent)
        .min(config.max_delay_ms);
    let jitter = if capped > 0 {
        rand::thread_rng().gen_range(0..=capped / 4)
    } else {
        0
    };
    Duration::from_millis(capped + jitter)
}
