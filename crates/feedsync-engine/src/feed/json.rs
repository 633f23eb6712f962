//! JSON feed parsing
//!
//! JSON feeds wrap their products in a top-level array field whose name is
//! configured per source. A bare top-level array is accepted as well. Array
//! elements that are not objects are skipped with a warning.

use crate::config::FeedSource;
use crate::error::{EngineError, Result};
use crate::models::RawRecord;
use serde_json::Value;
use tracing::warn;

pub(super) fn parse_json(data: &[u8], source: &FeedSource) -> Result<Vec<RawRecord>> {
    let doc: Value = serde_json::from_slice(data)
        .map_err(|e| EngineError::Parse(format!("JSON feed parse failed: {}", e)))?;

    let items = match &doc {
        Value::Object(map) => map.get(&source.array_field).and_then(Value::as_array),
        Value::Array(items) => Some(items),
        _ => None,
    };

    let items = items.ok_or_else(|| {
        EngineError::Parse(format!(
            "JSON feed '{}' is missing a top-level '{}' array",
            source.name, source.array_field
        ))
    })?;

    let mut records = Vec::new();
    for (index, item) in items.iter().enumerate() {
        match item {
            Value::Object(map) => records.push(RawRecord::from(map.clone())),
            other => {
                warn!(
                    source = %source.name,
                    index,
                    kind = json_kind(other),
                    "skipping non-object feed entry"
                );
            },
        }
    }

    Ok(records)
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "bool",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    fn source_with_field(field: &str) -> FeedSource {
        let mut source = FeedSource::json("test", "http://example.test/feed.json");
        source.array_field = field.to_string();
        source
    }

    #[test]
    fn test_parse_json_reads_configured_array_field() {
        let data = br#"{"items": [{"sku": "A-1", "price": 10.5}, {"sku": "A-2"}]}"#;
        let records = parse_json(data, &source_with_field("items")).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].get_str("sku").as_deref(), Some("A-1"));
        assert_eq!(records[0].get_str("price").as_deref(), Some("10.5"));
    }

    #[test]
    fn test_parse_json_accepts_bare_array() {
        let data = br#"[{"sku": "B-1"}]"#;
        let records = parse_json(data, &source_with_field("products")).unwrap();
        assert_eq!(records.len(), 1);
    }

    #[test]
    fn test_parse_json_missing_array_field() {
        let data = br#"{"data": []}"#;
        let err = parse_json(data, &source_with_field("products")).unwrap_err();
        assert!(err.to_string().contains("missing a top-level 'products' array"));
    }

    #[test]
    fn test_parse_json_skips_non_object_entries() {
        let data = br#"{"products": [{"sku": "C-1"}, "stray", 42, null]}"#;
        let records = parse_json(data, &source_with_field("products")).unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].get_str("sku").as_deref(), Some("C-1"));
    }

    #[test]
    fn test_parse_json_invalid_document() {
        let data = b"{not json";
        let err = parse_json(data, &source_with_field("products")).unwrap_err();
        assert!(matches!(err, EngineError::Parse(_)));
    }
}
