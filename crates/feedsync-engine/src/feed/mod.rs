//! Feed acquisition
//!
//! Downloads the supplier feed from a ranked list of sources and parses it
//! into [`RawRecord`]s. Sources are tried strictly in order; the first one
//! that both downloads and parses to a non-empty record set wins, and later
//! sources are never contacted. Transparent gzip decompression is applied
//! when the payload carries the gzip magic bytes regardless of headers.

mod csv;
mod json;

pub use csv::canonical_header;

use crate::config::{FeedFormat, FeedSource};
use crate::error::{EngineError, Result};
use crate::models::RawRecord;
use feedsync_common::checksum::sha256_hex_bytes;
use flate2::read::GzDecoder;
use std::io::Read;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Gzip stream magic bytes
const GZIP_MAGIC: [u8; 2] = [0x1f, 0x8b];

/// A successfully acquired and parsed feed
#[derive(Debug)]
pub struct FetchedFeed {
    pub records: Vec<RawRecord>,
    /// Name of the source that produced the records
    pub source: String,
}

/// Downloads and parses feeds from ranked sources
pub struct FeedReader {
    client: reqwest::Client,
}

impl FeedReader {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self { client })
    }

    /// Try each source in order and return the first that yields records.
    ///
    /// Only when every source has failed does this return an error, and that
    /// error carries the name and failure of each attempted source.
    pub async fn fetch(&self, sources: &[FeedSource]) -> Result<FetchedFeed> {
        if sources.is_empty() {
            return Err(EngineError::FeedUnavailable {
                tried: Vec::new(),
                errors: vec!["no feed sources configured".to_string()],
            });
        }

        let mut tried = Vec::new();
        let mut errors = Vec::new();

        for source in sources {
            tried.push(source.name.clone());
            match self.fetch_source(source).await {
                Ok(records) => {
                    info!(
                        source = %source.name,
                        records = records.len(),
                        "feed acquired"
                    );
                    return Ok(FetchedFeed {
                        records,
                        source: source.name.clone(),
                    });
                },
                Err(e) => {
                    warn!(source = %source.name, error = %e, "feed source failed");
                    errors.push(format!("{}: {}", source.name, e));
                },
            }
        }

        Err(EngineError::FeedUnavailable { tried, errors })
    }

    async fn fetch_source(&self, source: &FeedSource) -> Result<Vec<RawRecord>> {
        let response = self
            .client
            .get(&source.url)
            .send()
            .await
            .map_err(|e| EngineError::Source(format!("request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            return Err(EngineError::Source(format!("HTTP error: {}", status)));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<mime::Mime>().ok());
        if let Some(mime) = content_type {
            check_content_type(source.format, &mime)?;
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| EngineError::Source(format!("body read failed: {}", e)))?;

        let data = decompress_if_gzip(&body)?;
        debug!(
            source = %source.name,
            bytes = data.len(),
            sha256 = %sha256_hex_bytes(&data),
            "feed payload received"
        );

        let records = match source.format {
            FeedFormat::Csv => csv::parse_csv(&data, source)?,
            FeedFormat::Json => json::parse_json(&data, source)?,
        };

        if records.is_empty() {
            return Err(EngineError::Source("parsed zero valid records".to_string()));
        }

        Ok(records)
    }
}

/// Reject payloads whose declared content type contradicts the expected
/// format. A missing or generic content type is accepted as-is.
fn check_content_type(expected: FeedFormat, mime: &mime::Mime) -> Result<()> {
    let essence = mime.essence_str();
    let contradicts = match expected {
        FeedFormat::Csv => essence == "application/json" || essence == "text/html",
        FeedFormat::Json => essence == "text/csv" || essence == "text/html",
    };
    if contradicts {
        return Err(EngineError::Source(format!(
            "content type '{}' contradicts expected {} feed",
            essence, expected
        )));
    }
    Ok(())
}

/// Decompress the payload when it starts with the gzip magic bytes,
/// otherwise return it unchanged.
fn decompress_if_gzip(body: &[u8]) -> Result<Vec<u8>> {
    if body.len() >= 2 && body[..2] == GZIP_MAGIC {
        let mut decoder = GzDecoder::new(body);
        let mut decompressed = Vec::new();
        decoder
            .read_to_end(&mut decompressed)
            .map_err(|e| EngineError::Source(format!("gzip decompression failed: {}", e)))?;
        debug!(
            compressed = body.len(),
            decompressed = decompressed.len(),
            "decompressed gzip feed payload"
        );
        Ok(decompressed)
    } else {
        Ok(body.to_vec())
    }
}
