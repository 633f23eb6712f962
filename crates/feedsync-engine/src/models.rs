//! Core data model for the synchronization pipeline
//!
//! `RawRecord` exists only at the parsing boundary; the normalizer converts
//! it into the strongly-typed `CanonicalProduct` and nothing downstream
//! touches untyped data again.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

// ============================================================================
// Raw Records
// ============================================================================

/// Untyped key/value record as parsed from one feed source.
///
/// Keys are case-folded to lowercase on insert so that the normalizer's
/// field lookups behave the same for CSV and JSON sources.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawRecord {
    fields: HashMap<String, Value>,
}

impl RawRecord {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl AsRef<str>, value: Value) {
        self.fields.insert(key.as_ref().to_lowercase(), value);
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.fields.get(key)
    }

    /// Fetch a field as a string, stringifying scalar JSON values.
    /// Arrays, objects, and nulls yield `None`.
    pub fn get_str(&self, key: &str) -> Option<String> {
        match self.fields.get(key)? {
            Value::String(s) => Some(s.clone()),
            Value::Number(n) => Some(n.to_string()),
            Value::Bool(b) => Some(b.to_string()),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }
}

impl From<serde_json::Map<String, Value>> for RawRecord {
    fn from(map: serde_json::Map<String, Value>) -> Self {
        let mut record = RawRecord::new();
        for (key, value) in map {
            record.insert(key, value);
        }
        record
    }
}

// ============================================================================
// Canonical Products
// ============================================================================

/// The engine's normalized representation of one product, independent of
/// source format. Immutable once built.
#[derive(Debug, Clone, PartialEq)]
pub struct CanonicalProduct {
    /// Natural key; guaranteed non-empty by the normalizer
    pub sku: String,
    pub name: String,
    /// Source price before the multiplier is applied
    pub raw_price: Decimal,
    /// Source stock before sanitation (may be negative or fractional)
    pub raw_stock: Decimal,
    pub description: String,
    pub category: String,
    pub brand: String,
    /// Absolute HTTP(S) URLs in gallery order; the first is the main image
    pub images: Vec<String>,
}

/// A product that passed validation, bundled with its computed fields.
/// This is the reconciler's input.
#[derive(Debug, Clone, PartialEq)]
pub struct AcceptedProduct {
    pub product: CanonicalProduct,
    pub computed_price: Decimal,
    pub quantity: u32,
    pub images: Vec<String>,
}

// ============================================================================
// Validation
// ============================================================================

/// Reason a record was rejected by policy or failed at the destination
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RejectReason {
    InvalidData,
    PriceTooLow,
    NoImages,
    ApiError,
}

impl RejectReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            RejectReason::InvalidData => "INVALID_DATA",
            RejectReason::PriceTooLow => "PRICE_TOO_LOW",
            RejectReason::NoImages => "NO_IMAGES",
            RejectReason::ApiError => "API_ERROR",
        }
    }
}

/// Outcome of validating one canonical product. Produced once, never mutated.
#[derive(Debug, Clone, PartialEq)]
pub enum ValidationResult {
    Accepted {
        computed_price: Decimal,
        quantity: u32,
        validated_images: Vec<String>,
    },
    Rejected {
        reason: RejectReason,
        detail: String,
    },
}

// ============================================================================
// Destination Entities
// ============================================================================

/// An existing destination catalog record for a SKU. Always fetched fresh;
/// never cached across records or runs.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DestinationEntity {
    pub id: i64,
    #[serde(default)]
    pub sku: String,
    /// Fields the destination owns; carried for context, never written back
    #[serde(flatten)]
    pub extra: serde_json::Map<String, Value>,
}

// ============================================================================
// Outcomes and Run State
// ============================================================================

/// The destination call during which a record failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncStep {
    Search,
    Create,
    Update,
}

impl SyncStep {
    pub fn as_str(&self) -> &'static str {
        match self {
            SyncStep::Search => "search",
            SyncStep::Create => "create",
            SyncStep::Update => "update",
        }
    }
}

/// A per-record destination failure annotated with the step it happened in
#[derive(Debug)]
pub struct StepError {
    pub step: SyncStep,
    pub error: crate::error::EngineError,
}

impl StepError {
    pub fn new(step: SyncStep, error: crate::error::EngineError) -> Self {
        Self { step, error }
    }
}

/// Per-record terminal result; appended to the run's outcome accounting,
/// never revised.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum SyncOutcome {
    Created { id: i64 },
    Updated { id: i64 },
    Filtered { reason: RejectReason },
    Failed {
        step: SyncStep,
        error: String,
        timestamp: DateTime<Utc>,
    },
}

/// Run lifecycle: `Idle -> Fetching -> Processing -> Completed | Failed`.
/// Terminal states return the slot to triggerable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RunState {
    #[default]
    Idle,
    Fetching,
    Processing,
    Completed,
    Failed,
}

impl RunState {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunState::Idle => "idle",
            RunState::Fetching => "fetching",
            RunState::Processing => "processing",
            RunState::Completed => "completed",
            RunState::Failed => "failed",
        }
    }

    /// A trigger received while a run is active is rejected
    pub fn is_active(&self) -> bool {
        matches!(self, RunState::Fetching | RunState::Processing)
    }
}

// ============================================================================
// Progress
// ============================================================================

/// Telemetry event published per record over a bounded channel.
/// Dropped when nobody listens or the buffer is full; never correctness.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ProgressEvent {
    /// Records handled so far (synced + ignored + failed)
    pub processed: u64,
    /// Records created or updated so far
    pub succeeded: u64,
    /// Records ignored or filtered so far
    pub skipped: u64,
    pub total: u64,
    pub current_sku: String,
    pub batch_index: usize,
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_raw_record_case_folds_keys() {
        let mut record = RawRecord::new();
        record.insert("Price", json!("19.90"));
        assert_eq!(record.get_str("price"), Some("19.90".to_string()));
        assert!(record.get("Price").is_none());
    }

    #[test]
    fn test_raw_record_stringifies_scalars() {
        let mut record = RawRecord::new();
        record.insert("stock", json!(7));
        record.insert("active", json!(true));
        record.insert("images", json!(["http://a/1.jpg"]));
        record.insert("missing", Value::Null);

        assert_eq!(record.get_str("stock"), Some("7".to_string()));
        assert_eq!(record.get_str("active"), Some("true".to_string()));
        assert_eq!(record.get_str("images"), None);
        assert_eq!(record.get_str("missing"), None);
    }

    #[test]
    fn test_raw_record_from_json_map() {
        let Value::Object(map) = json!({"SKU": "A-1", "Name": "Boot"}) else {
            panic!("expected object");
        };
        let record = RawRecord::from(map);
        assert_eq!(record.len(), 2);
        assert_eq!(record.get_str("sku"), Some("A-1".to_string()));
    }

    #[test]
    fn test_run_state_activity() {
        assert!(RunState::Fetching.is_active());
        assert!(RunState::Processing.is_active());
        assert!(!RunState::Idle.is_active());
        assert!(!RunState::Completed.is_active());
        assert!(!RunState::Failed.is_active());
    }

    #[test]
    fn test_reject_reason_codes() {
        assert_eq!(RejectReason::InvalidData.as_str(), "INVALID_DATA");
        assert_eq!(RejectReason::PriceTooLow.as_str(), "PRICE_TOO_LOW");
        assert_eq!(RejectReason::NoImages.as_str(), "NO_IMAGES");
        assert_eq!(RejectReason::ApiError.as_str(), "API_ERROR");
    }

    #[test]
    fn test_destination_entity_tolerates_extra_fields() {
        let entity: DestinationEntity = serde_json::from_value(json!({
            "id": 42,
            "sku": "A-1",
            "enabled": true,
            "featured": "yes"
        }))
        .unwrap();
        assert_eq!(entity.id, 42);
        assert_eq!(entity.sku, "A-1");
        assert_eq!(entity.extra.get("featured"), Some(&json!("yes")));
    }
}
