//! Destination REST client
//!
//! Thin HTTP wrapper over the destination catalog API. Every response is
//! classified into the engine's error taxonomy here so the retry layer only
//! has to look at the error kind: auth and not-found failures are definitive,
//! server errors and malformed bodies are transient.

use super::{CatalogPort, ProductPayload};
use crate::config::DestinationConfig;
use crate::error::{EngineError, Result};
use crate::models::DestinationEntity;
use async_trait::async_trait;
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

pub struct DestinationClient {
    client: reqwest::Client,
    base_url: Url,
    token: String,
}

impl DestinationClient {
    pub fn new(config: &DestinationConfig) -> Result<Self> {
        let base_url = Url::parse(&config.base_url)
            .map_err(|e| EngineError::Config(format!("invalid destination URL: {}", e)))?;
        let client = reqwest::Client::builder()
            .timeout(config.timeout())
            .user_agent(concat!("feedsync/", env!("CARGO_PKG_VERSION")))
            .build()?;
        Ok(Self {
            client,
            base_url,
            token: config.token.clone(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| EngineError::Config("destination URL cannot be a base".to_string()))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Read a response body as JSON, classifying failures by status code.
    async fn read_json<T: DeserializeOwned>(response: reqwest::Response) -> Result<T> {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();

        if status.is_success() {
            return serde_json::from_str(&body).map_err(|e| {
                EngineError::Api(format!("malformed destination response: {}", e))
            });
        }

        let message = extract_error_message(&body);
        let code = status.as_u16();
        match code {
            401 | 403 | 404 => Err(EngineError::DefinitiveApi { status: code, message }),
            409 => Err(EngineError::DuplicateKey(message)),
            400 if message.to_lowercase().contains("exist") => {
                Err(EngineError::DuplicateKey(message))
            },
            400..=499 => Err(EngineError::DefinitiveApi { status: code, message }),
            _ => Err(EngineError::Api(format!("HTTP {}: {}", code, message))),
        }
    }
}

#[async_trait]
impl CatalogPort for DestinationClient {
    async fn search_by_sku(&self, sku: &str) -> Result<Vec<DestinationEntity>> {
        let url = self.endpoint(&["products"])?;
        debug!(sku, "searching destination catalog");
        let response = self
            .client
            .get(url)
            .query(&[("sku", sku)])
            .bearer_auth(&self.token)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn create(&self, payload: &ProductPayload) -> Result<DestinationEntity> {
        let url = self.endpoint(&["products"])?;
        debug!(sku = %payload.sku, "creating destination product");
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn update(&self, id: i64, payload: &ProductPayload) -> Result<DestinationEntity> {
        let url = self.endpoint(&["products", &id.to_string()])?;
        debug!(sku = %payload.sku, id, "updating destination product");
        let response = self
            .client
            .put(url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await?;
        Self::read_json(response).await
    }

    async fn check_connectivity(&self) -> Result<()> {
        let url = self.endpoint(&["products"])?;
        let response = self
            .client
            .get(url)
            .query(&[("limit", "1")])
            .bearer_auth(&self.token)
            .send()
            .await
            .map_err(|e| EngineError::Connectivity(format!("destination unreachable: {}", e)))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(EngineError::Connectivity(format!(
                "destination returned {} during connectivity check",
                status
            )))
        }
    }
}

/// Pull a human-readable message out of an error body. Destination errors
/// come as JSON with one of a few message fields; anything else is passed
/// through truncated.
fn extract_error_message(body: &str) -> String {
    if let Ok(value) = serde_json::from_str::<serde_json::Value>(body) {
        for field in ["errorMessage", "message", "error"] {
            if let Some(message) = value.get(field).and_then(|v| v.as_str()) {
                return message.to_string();
            }
        }
    }
    let trimmed = body.trim();
    if trimmed.is_empty() {
        "no error details".to_string()
    } else {
        trimmed.chars().take(200).collect()
    }
}
