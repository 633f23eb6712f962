//! Destination catalog access
//!
//! [`CatalogPort`] is the seam between the engine and the destination REST
//! API. The real HTTP client lives in [`client`]; [`DryRunCatalog`] wraps any
//! port to turn writes into no-ops for rehearsal runs.

mod categories;
mod client;

pub use categories::CategoryResolver;
pub use client::DestinationClient;

use crate::error::Result;
use crate::models::DestinationEntity;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::info;

/// Outbound product representation. These are exactly the fields the engine
/// owns on a destination entity; updates must never send anything else so
/// manually curated fields survive.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProductPayload {
    pub sku: String,
    pub name: String,
    pub price: Decimal,
    pub quantity: u32,
    pub description: String,
    pub brand: String,
    pub category_id: i64,
    pub image_urls: Vec<String>,
}

/// Destination catalog operations used by the reconciler.
#[async_trait]
pub trait CatalogPort: Send + Sync {
    /// Look up entities by exact SKU. The destination may return several;
    /// callers treat the first as authoritative.
    async fn search_by_sku(&self, sku: &str) -> Result<Vec<DestinationEntity>>;

    async fn create(&self, payload: &ProductPayload) -> Result<DestinationEntity>;

    async fn update(&self, id: i64, payload: &ProductPayload) -> Result<DestinationEntity>;

    /// Cheap authenticated call to verify the destination is reachable
    /// before a run starts mutating it.
    async fn check_connectivity(&self) -> Result<()>;
}

/// Decorator that keeps reads real but swallows writes.
///
/// Created and updated entities are synthesized locally so the run proceeds
/// normally and the report shows what a live run would have done.
pub struct DryRunCatalog<P> {
    inner: P,
    synthetic_id: AtomicU64,
}

impl<P: CatalogPort> DryRunCatalog<P> {
    pub fn new(inner: P) -> Self {
        Self {
            inner,
            synthetic_id: AtomicU64::new(1),
        }
    }
}

#[async_trait]
impl<P: CatalogPort> CatalogPort for DryRunCatalog<P> {
    async fn search_by_sku(&self, sku: &str) -> Result<Vec<DestinationEntity>> {
        self.inner.search_by_sku(sku).await
    }

    async fn create(&self, payload: &ProductPayload) -> Result<DestinationEntity> {
        let id = self.synthetic_id.fetch_add(1, Ordering::Relaxed) as i64;
        info!(sku = %payload.sku, "dry run: would create product");
        Ok(DestinationEntity {
            id: -id,
            sku: payload.sku.clone(),
            extra: serde_json::Map::new(),
        })
    }

    async fn update(&self, id: i64, payload: &ProductPayload) -> Result<DestinationEntity> {
        info!(sku = %payload.sku, id, "dry run: would update product");
        Ok(DestinationEntity {
            id,
            sku: payload.sku.clone(),
            extra: serde_json::Map::new(),
        })
    }

    async fn check_connectivity(&self) -> Result<()> {
        self.inner.check_connectivity().await
    }
}
