//! Engine configuration
//!
//! One immutable `SyncConfig` bundle is constructed per process (from the
//! environment or by hand) and passed explicitly into every component; the
//! engine has no ambient globals.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

// ============================================================================
// Configuration Constants
// ============================================================================

/// Default feed download timeout in seconds
pub const DEFAULT_FEED_TIMEOUT_SECS: u64 = 30;

/// Default CSV field delimiter
pub const DEFAULT_CSV_DELIMITER: u8 = b';';

/// Default top-level array field for JSON feeds
pub const DEFAULT_JSON_ARRAY_FIELD: &str = "products";

/// Default destination request timeout in seconds
pub const DEFAULT_DESTINATION_TIMEOUT_SECS: u64 = 30;

/// Default number of records processed concurrently per batch
pub const DEFAULT_BATCH_SIZE: usize = 5;

/// Default minimum spacing between destination calls in milliseconds
pub const DEFAULT_CALL_SPACING_MS: u64 = 600;

/// Default pause between batches in milliseconds
pub const DEFAULT_BATCH_PAUSE_MS: u64 = 3000;

/// Default upper bound for the random jitter added to the batch pause
pub const DEFAULT_BATCH_PAUSE_JITTER_MS: u64 = 1000;

/// Default maximum attempts per destination call (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for exponential backoff in milliseconds
pub const DEFAULT_RETRY_BASE_DELAY_MS: u64 = 500;

/// Default backoff delay ceiling in milliseconds
pub const DEFAULT_RETRY_MAX_DELAY_MS: u64 = 8000;

/// Default image probe timeout per candidate in seconds
pub const DEFAULT_PROBE_TIMEOUT_SECS: u64 = 5;

/// Default image size ceiling for the probe in bytes (10 MB)
pub const DEFAULT_MAX_IMAGE_BYTES: u64 = 10_485_760;

/// Default progress channel capacity
pub const DEFAULT_PROGRESS_BUFFER: usize = 64;

/// Default cap on retained error records
pub const DEFAULT_ERROR_TAIL_CAP: usize = 50;

/// Default cap on retained run log lines
pub const DEFAULT_LOG_CAP: usize = 200;

// ============================================================================
// Feed Sources
// ============================================================================

/// Wire format of one feed source
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum FeedFormat {
    #[default]
    Csv,
    Json,
}

impl FeedFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            FeedFormat::Csv => "csv",
            FeedFormat::Json => "json",
        }
    }
}

impl std::str::FromStr for FeedFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "csv" => Ok(FeedFormat::Csv),
            "json" => Ok(FeedFormat::Json),
            _ => Err(anyhow::anyhow!("Invalid feed format: {}", s)),
        }
    }
}

impl std::fmt::Display for FeedFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// One ranked feed source. Sources are tried strictly in list order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FeedSource {
    pub name: String,
    pub url: String,
    pub format: FeedFormat,
    /// Field delimiter for CSV sources
    pub delimiter: u8,
    /// Top-level array field for JSON sources
    pub array_field: String,
}

impl FeedSource {
    pub fn csv(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format: FeedFormat::Csv,
            delimiter: DEFAULT_CSV_DELIMITER,
            array_field: DEFAULT_JSON_ARRAY_FIELD.to_string(),
        }
    }

    pub fn json(name: impl Into<String>, url: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url: url.into(),
            format: FeedFormat::Json,
            delimiter: DEFAULT_CSV_DELIMITER,
            array_field: DEFAULT_JSON_ARRAY_FIELD.to_string(),
        }
    }
}

// ============================================================================
// Policies
// ============================================================================

/// Price transformation and minimum-price filtering
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PricePolicy {
    /// Markup applied to every source price
    pub multiplier: Decimal,
    /// Minimum acceptable price, compared against the price after markup
    pub min_price: Decimal,
}

impl Default for PricePolicy {
    fn default() -> Self {
        Self {
            multiplier: Decimal::ONE,
            min_price: Decimal::ZERO,
        }
    }
}

/// Image requirement and optional reachability probing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImagePolicy {
    /// Reject records that end up with zero usable images
    pub required: bool,
    /// Probe each candidate with an HTTP HEAD before accepting it
    pub probe_enabled: bool,
    /// Per-candidate probe timeout in seconds
    pub probe_timeout_secs: u64,
    /// Candidates with a declared size above this are dropped
    pub max_image_bytes: u64,
}

impl Default for ImagePolicy {
    fn default() -> Self {
        Self {
            required: false,
            probe_enabled: false,
            probe_timeout_secs: DEFAULT_PROBE_TIMEOUT_SECS,
            max_image_bytes: DEFAULT_MAX_IMAGE_BYTES,
        }
    }
}

impl ImagePolicy {
    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs)
    }
}

// ============================================================================
// Destination
// ============================================================================

/// Destination catalog connection settings and category mapping
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationConfig {
    /// Base URL of the destination REST API
    pub base_url: String,
    /// Bearer token for authenticated calls
    pub token: String,
    /// Request timeout in seconds
    pub timeout_secs: u64,
    /// Category id assigned when a feed category has no mapping
    pub default_category_id: i64,
    /// Free-text feed category -> destination category id
    pub category_map: HashMap<String, i64>,
}

impl Default for DestinationConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/api".to_string(),
            token: String::new(),
            timeout_secs: DEFAULT_DESTINATION_TIMEOUT_SECS,
            default_category_id: 0,
            category_map: HashMap::new(),
        }
    }
}

impl DestinationConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

// ============================================================================
// Retry
// ============================================================================

/// Exponential backoff settings for destination calls
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RetryConfig {
    /// Maximum attempts per call, the first try included
    pub max_attempts: u32,
    /// Base delay doubled on every subsequent attempt
    pub base_delay_ms: u64,
    /// Backoff ceiling
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay_ms: DEFAULT_RETRY_BASE_DELAY_MS,
            max_delay_ms: DEFAULT_RETRY_MAX_DELAY_MS,
        }
    }
}

// ============================================================================
// Sync Configuration
// ============================================================================

/// Complete engine configuration for one deployment
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SyncConfig {
    /// Ranked feed sources, tried in order
    pub sources: Vec<FeedSource>,
    /// Feed download timeout in seconds
    pub feed_timeout_secs: u64,
    pub price: PricePolicy,
    pub images: ImagePolicy,
    pub destination: DestinationConfig,
    pub retry: RetryConfig,
    /// Records per batch; also the intra-batch concurrency width
    pub batch_size: usize,
    /// Minimum spacing between destination calls in milliseconds
    pub call_spacing_ms: u64,
    /// Pause between batches in milliseconds (before jitter)
    pub batch_pause_ms: u64,
    /// Upper bound of the random jitter added to the batch pause
    pub batch_pause_jitter_ms: u64,
    /// Progress channel capacity
    pub progress_buffer: usize,
    /// Cap on retained error records in the report
    pub error_tail_cap: usize,
    /// Cap on retained run log lines
    pub log_cap: usize,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            sources: vec![FeedSource::csv(
                "primary",
                "http://localhost:8080/feed.csv",
            )],
            feed_timeout_secs: DEFAULT_FEED_TIMEOUT_SECS,
            price: PricePolicy::default(),
            images: ImagePolicy::default(),
            destination: DestinationConfig::default(),
            retry: RetryConfig::default(),
            batch_size: DEFAULT_BATCH_SIZE,
            call_spacing_ms: DEFAULT_CALL_SPACING_MS,
            batch_pause_ms: DEFAULT_BATCH_PAUSE_MS,
            batch_pause_jitter_ms: DEFAULT_BATCH_PAUSE_JITTER_MS,
            progress_buffer: DEFAULT_PROGRESS_BUFFER,
            error_tail_cap: DEFAULT_ERROR_TAIL_CAP,
            log_cap: DEFAULT_LOG_CAP,
        }
    }
}

impl SyncConfig {
    /// Load configuration from environment variables
    ///
    /// Environment variables:
    /// - `FEEDSYNC_FEED_URL`: primary feed URL (required)
    /// - `FEEDSYNC_FEED_FORMAT`: primary feed format, csv or json (default csv)
    /// - `FEEDSYNC_FEED_DELIMITER`: CSV delimiter character (default ";")
    /// - `FEEDSYNC_FEED_ARRAY_FIELD`: JSON top-level array field (default "products")
    /// - `FEEDSYNC_FALLBACK_URL`: optional secondary feed URL
    /// - `FEEDSYNC_FALLBACK_FORMAT`: secondary feed format (default json)
    /// - `FEEDSYNC_FEED_TIMEOUT_SECS`: feed download timeout
    /// - `FEEDSYNC_PRICE_MULTIPLIER`: markup multiplier (default 1.0)
    /// - `FEEDSYNC_MIN_PRICE`: minimum computed price (default 0)
    /// - `FEEDSYNC_IMAGES_REQUIRED`: reject records without images (default false)
    /// - `FEEDSYNC_IMAGE_PROBE`: enable HEAD reachability probing (default false)
    /// - `FEEDSYNC_IMAGE_PROBE_TIMEOUT_SECS`: per-candidate probe timeout
    /// - `FEEDSYNC_IMAGE_MAX_BYTES`: probe size ceiling
    /// - `FEEDSYNC_DESTINATION_URL`: destination API base URL (required)
    /// - `FEEDSYNC_DESTINATION_TOKEN`: destination bearer token (required)
    /// - `FEEDSYNC_DESTINATION_TIMEOUT_SECS`: destination request timeout
    /// - `FEEDSYNC_DEFAULT_CATEGORY_ID`: fallback category id (default 0)
    /// - `FEEDSYNC_CATEGORY_MAP`: comma-separated `name:id` pairs
    /// - `FEEDSYNC_MAX_ATTEMPTS`: attempts per destination call
    /// - `FEEDSYNC_RETRY_BASE_DELAY_MS` / `FEEDSYNC_RETRY_MAX_DELAY_MS`: backoff
    /// - `FEEDSYNC_BATCH_SIZE`: records per batch
    /// - `FEEDSYNC_CALL_SPACING_MS`: minimum spacing between destination calls
    /// - `FEEDSYNC_BATCH_PAUSE_MS` / `FEEDSYNC_BATCH_PAUSE_JITTER_MS`: batch pacing
    /// - `FEEDSYNC_PROGRESS_BUFFER`: progress channel capacity
    /// - `FEEDSYNC_ERROR_TAIL_CAP` / `FEEDSYNC_LOG_CAP`: report retention caps
    pub fn from_env() -> anyhow::Result<Self> {
        let mut sources = Vec::new();

        if let Ok(url) = std::env::var("FEEDSYNC_FEED_URL") {
            let format = std::env::var("FEEDSYNC_FEED_FORMAT")
                .unwrap_or_else(|_| "csv".to_string())
                .parse()
                .unwrap_or(FeedFormat::Csv);
            let delimiter = std::env::var("FEEDSYNC_FEED_DELIMITER")
                .ok()
                .and_then(|s| s.bytes().next())
                .unwrap_or(DEFAULT_CSV_DELIMITER);
            let array_field = std::env::var("FEEDSYNC_FEED_ARRAY_FIELD")
                .unwrap_or_else(|_| DEFAULT_JSON_ARRAY_FIELD.to_string());
            sources.push(FeedSource {
                name: "primary".to_string(),
                url,
                format,
                delimiter,
                array_field,
            });
        }

        if let Ok(url) = std::env::var("FEEDSYNC_FALLBACK_URL") {
            let format = std::env::var("FEEDSYNC_FALLBACK_FORMAT")
                .unwrap_or_else(|_| "json".to_string())
                .parse()
                .unwrap_or(FeedFormat::Json);
            let array_field = std::env::var("FEEDSYNC_FEED_ARRAY_FIELD")
                .unwrap_or_else(|_| DEFAULT_JSON_ARRAY_FIELD.to_string());
            sources.push(FeedSource {
                name: "secondary".to_string(),
                url,
                format,
                delimiter: DEFAULT_CSV_DELIMITER,
                array_field,
            });
        }

        let config = Self {
            sources,
            feed_timeout_secs: env_parse("FEEDSYNC_FEED_TIMEOUT_SECS", DEFAULT_FEED_TIMEOUT_SECS),
            price: PricePolicy {
                multiplier: env_parse("FEEDSYNC_PRICE_MULTIPLIER", Decimal::ONE),
                min_price: env_parse("FEEDSYNC_MIN_PRICE", Decimal::ZERO),
            },
            images: ImagePolicy {
                required: env_parse("FEEDSYNC_IMAGES_REQUIRED", false),
                probe_enabled: env_parse("FEEDSYNC_IMAGE_PROBE", false),
                probe_timeout_secs: env_parse(
                    "FEEDSYNC_IMAGE_PROBE_TIMEOUT_SECS",
                    DEFAULT_PROBE_TIMEOUT_SECS,
                ),
                max_image_bytes: env_parse("FEEDSYNC_IMAGE_MAX_BYTES", DEFAULT_MAX_IMAGE_BYTES),
            },
            destination: DestinationConfig {
                base_url: std::env::var("FEEDSYNC_DESTINATION_URL").unwrap_or_default(),
                token: std::env::var("FEEDSYNC_DESTINATION_TOKEN").unwrap_or_default(),
                timeout_secs: env_parse(
                    "FEEDSYNC_DESTINATION_TIMEOUT_SECS",
                    DEFAULT_DESTINATION_TIMEOUT_SECS,
                ),
                default_category_id: env_parse("FEEDSYNC_DEFAULT_CATEGORY_ID", 0),
                category_map: std::env::var("FEEDSYNC_CATEGORY_MAP")
                    .map(|s| parse_category_map(&s))
                    .unwrap_or_default(),
            },
            retry: RetryConfig {
                max_attempts: env_parse("FEEDSYNC_MAX_ATTEMPTS", DEFAULT_MAX_ATTEMPTS),
                base_delay_ms: env_parse(
                    "FEEDSYNC_RETRY_BASE_DELAY_MS",
                    DEFAULT_RETRY_BASE_DELAY_MS,
                ),
                max_delay_ms: env_parse("FEEDSYNC_RETRY_MAX_DELAY_MS", DEFAULT_RETRY_MAX_DELAY_MS),
            },
            batch_size: env_parse("FEEDSYNC_BATCH_SIZE", DEFAULT_BATCH_SIZE),
            call_spacing_ms: env_parse("FEEDSYNC_CALL_SPACING_MS", DEFAULT_CALL_SPACING_MS),
            batch_pause_ms: env_parse("FEEDSYNC_BATCH_PAUSE_MS", DEFAULT_BATCH_PAUSE_MS),
            batch_pause_jitter_ms: env_parse(
                "FEEDSYNC_BATCH_PAUSE_JITTER_MS",
                DEFAULT_BATCH_PAUSE_JITTER_MS,
            ),
            progress_buffer: env_parse("FEEDSYNC_PROGRESS_BUFFER", DEFAULT_PROGRESS_BUFFER),
            error_tail_cap: env_parse("FEEDSYNC_ERROR_TAIL_CAP", DEFAULT_ERROR_TAIL_CAP),
            log_cap: env_parse("FEEDSYNC_LOG_CAP", DEFAULT_LOG_CAP),
        };

        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.sources.is_empty() {
            anyhow::bail!("at least one feed source is required (set FEEDSYNC_FEED_URL)");
        }
        for source in &self.sources {
            if source.name.is_empty() {
                anyhow::bail!("feed source name cannot be empty");
            }
            if source.url.is_empty() {
                anyhow::bail!("feed source '{}' has an empty URL", source.name);
            }
            if source.format == FeedFormat::Json && source.array_field.is_empty() {
                anyhow::bail!("feed source '{}' needs a JSON array field", source.name);
            }
        }
        if self.feed_timeout_secs == 0 {
            anyhow::bail!("FEEDSYNC_FEED_TIMEOUT_SECS must be greater than 0");
        }
        if self.price.multiplier <= Decimal::ZERO {
            anyhow::bail!("FEEDSYNC_PRICE_MULTIPLIER must be greater than 0");
        }
        if self.price.min_price < Decimal::ZERO {
            anyhow::bail!("FEEDSYNC_MIN_PRICE cannot be negative");
        }
        if self.images.probe_enabled {
            if self.images.probe_timeout_secs == 0 {
                anyhow::bail!("FEEDSYNC_IMAGE_PROBE_TIMEOUT_SECS must be greater than 0");
            }
            if self.images.max_image_bytes == 0 {
                anyhow::bail!("FEEDSYNC_IMAGE_MAX_BYTES must be greater than 0");
            }
        }
        if self.destination.base_url.is_empty() {
            anyhow::bail!("FEEDSYNC_DESTINATION_URL must be set");
        }
        if self.destination.token.is_empty() {
            anyhow::bail!("FEEDSYNC_DESTINATION_TOKEN must be set");
        }
        if self.destination.timeout_secs == 0 {
            anyhow::bail!("FEEDSYNC_DESTINATION_TIMEOUT_SECS must be greater than 0");
        }
        if self.retry.max_attempts == 0 {
            anyhow::bail!("FEEDSYNC_MAX_ATTEMPTS must be at least 1");
        }
        if self.retry.max_delay_ms < self.retry.base_delay_ms {
            anyhow::bail!("FEEDSYNC_RETRY_MAX_DELAY_MS cannot be below the base delay");
        }
        if self.batch_size == 0 {
            anyhow::bail!("FEEDSYNC_BATCH_SIZE must be greater than 0");
        }
        if self.progress_buffer == 0 {
            anyhow::bail!("FEEDSYNC_PROGRESS_BUFFER must be greater than 0");
        }
        if self.error_tail_cap == 0 || self.log_cap == 0 {
            anyhow::bail!("report retention caps must be greater than 0");
        }
        Ok(())
    }

    pub fn feed_timeout(&self) -> Duration {
        Duration::from_secs(self.feed_timeout_secs)
    }

    pub fn call_spacing(&self) -> Duration {
        Duration::from_millis(self.call_spacing_ms)
    }

    pub fn batch_pause(&self) -> Duration {
        Duration::from_millis(self.batch_pause_ms)
    }
}

/// Parse an environment variable, falling back to the default on absence
/// or parse failure
fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

/// Parse comma-separated `name:id` pairs; malformed entries are skipped
fn parse_category_map(raw: &str) -> HashMap<String, i64> {
    let mut map = HashMap::new();
    for entry in raw.split(',') {
        let entry = entry.trim();
        if entry.is_empty() {
            continue;
        }
        match entry.rsplit_once(':') {
            Some((name, id)) => match id.trim().parse::<i64>() {
                Ok(id) => {
                    map.insert(name.trim().to_string(), id);
                },
                Err(_) => {
                    tracing::warn!(entry, "skipping category mapping with non-numeric id");
                },
            },
            None => {
                tracing::warn!(entry, "skipping malformed category mapping");
            },
        }
    }
    map
}
