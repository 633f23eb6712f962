//! Record reconciliation
//!
//! Decides per record whether the destination needs a create or an update.
//! The catalog is always consulted fresh by SKU; nothing is cached between
//! records, so a record changed mid-run by another writer is still seen.
//! A duplicate-key rejection on create means the record appeared between
//! search and create; the reconciler recovers by re-searching and updating.

use crate::config::RetryConfig;
use crate::destination::{CatalogPort, CategoryResolver, ProductPayload};
use crate::models::{AcceptedProduct, StepError, SyncOutcome, SyncStep};
use crate::retry::with_retry;
use crate::throttle::CallSpacer;
use std::sync::Arc;
use tracing::{debug, info};

pub struct Reconciler {
    port: Arc<dyn CatalogPort>,
    resolver: CategoryResolver,
    retry: RetryConfig,
    spacer: Arc<CallSpacer>,
}

impl Reconciler {
    pub fn new(
        port: Arc<dyn CatalogPort>,
        resolver: CategoryResolver,
        retry: RetryConfig,
        spacer: Arc<CallSpacer>,
    ) -> Self {
        Self { port, resolver, retry, spacer }
    }

    /// Sync one accepted product into the destination catalog.
    pub async fn reconcile(
        &self,
        accepted: &AcceptedProduct,
    ) -> std::result::Result<SyncOutcome, StepError> {
        let sku = accepted.product.sku.as_str();

        self.spacer.wait().await;
        let found = with_retry("search", &self.retry, || self.port.search_by_sku(sku))
            .await
            .map_err(|e| StepError::new(SyncStep::Search, e))?;

        let payload = self.build_payload(accepted);

        if let Some(existing) = found.first() {
            debug!(sku, id = existing.id, "product exists, updating");
            return self.update_existing(existing.id, &payload).await;
        }

        self.spacer.wait().await;
        match with_retry("create", &self.retry, || self.port.create(&payload)).await {
            Ok(entity) => Ok(SyncOutcome::Created { id: entity.id }),
            Err(crate::error::EngineError::DuplicateKey(_)) => {
                // Lost the race against another writer; the record exists
                // now, so fall back to updating it.
                info!(sku, "duplicate on create, re-searching");
                self.spacer.wait().await;
                let found = with_retry("search", &self.retry, || self.port.search_by_sku(sku))
                    .await
                    .map_err(|e| StepError::new(SyncStep::Search, e))?;
                match found.first() {
                    Some(existing) => self.update_existing(existing.id, &payload).await,
                    None => Err(StepError::new(
                        SyncStep::Create,
                        crate::error::EngineError::Api(format!(
                            "destination reported duplicate SKU '{}' but re-search found nothing",
                            sku
                        )),
                    )),
                }
            },
            Err(e) => Err(StepError::new(SyncStep::Create, e)),
        }
    }

    async fn update_existing(
        &self,
        id: i64,
        payload: &ProductPayload,
    ) -> std::result::Result<SyncOutcome, StepError> {
        self.spacer.wait().await;
        with_retry("update", &self.retry, || self.port.update(id, payload))
            .await
            .map(|entity| SyncOutcome::Updated { id: entity.id })
            .map_err(|e| StepError::new(SyncStep::Update, e))
    }

    /// Build the outbound payload. Only engine-owned fields are included;
    /// anything else on the destination entity stays untouched.
    fn build_payload(&self, accepted: &AcceptedProduct) -> ProductPayload {
        let product = &accepted.product;
        ProductPayload {
            sku: product.sku.clone(),
            name: product.name.clone(),
            price: accepted.computed_price,
            quantity: accepted.quantity,
            description: product.description.clone(),
            brand: product.brand.clone(),
            category_id: self.resolver.resolve(&product.category),
            image_urls: accepted.images.clone(),
        }
    }
}
