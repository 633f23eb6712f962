//! CSV feed parsing
//!
//! Suppliers name their columns freely, so headers go through a translation
//! step: each raw header is slugged and mapped to a canonical field name
//! where a known alias matches, and passed through as its slug otherwise.
//! Rows that fail to parse are skipped with a warning rather than failing
//! the whole feed.

use crate::config::FeedSource;
use crate::error::{EngineError, Result};
use crate::models::RawRecord;
use crate::normalize::SKU_FIELDS;
use csv::{ReaderBuilder, Trim};
use tracing::warn;

/// Translate a raw CSV header into its canonical field name.
///
/// The header is slugged first (lowercased, runs of non-alphanumerics
/// collapsed to single underscores) and then matched against known supplier
/// aliases. Unrecognized headers keep their slug so no column is lost.
pub fn canonical_header(raw: &str) -> String {
    let slug = slugify(raw);
    match slug.as_str() {
        "article" | "artikul" | "product_code" | "item_code" | "code" => "sku".to_string(),
        "item_name" | "product_name" | "title" => "name".to_string(),
        "unit_price" | "price_eur" | "retail_price" | "cost" => "price".to_string(),
        "qty" | "quantity" | "in_stock" | "stock_quantity" => "stock".to_string(),
        "manufacturer" | "vendor" => "brand".to_string(),
        "group" | "section" | "product_group" => "category".to_string(),
        _ => slug,
    }
}

fn slugify(raw: &str) -> String {
    let mut slug = String::with_capacity(raw.len());
    let mut last_was_sep = true;
    for c in raw.trim().chars() {
        if c.is_alphanumeric() {
            slug.extend(c.to_lowercase());
            last_was_sep = false;
        } else if !last_was_sep {
            slug.push('_');
            last_was_sep = true;
        }
    }
    if slug.ends_with('_') {
        slug.pop();
    }
    slug
}

/// Parse CSV bytes into raw records using the source's delimiter.
pub(super) fn parse_csv(data: &[u8], source: &FeedSource) -> Result<Vec<RawRecord>> {
    let mut reader = ReaderBuilder::new()
        .delimiter(source.delimiter)
        .flexible(true)
        .trim(Trim::All)
        .from_reader(data);

    let headers: Vec<String> = reader
        .headers()
        .map_err(|e| EngineError::Parse(format!("CSV header read failed: {}", e)))?
        .iter()
        .map(canonical_header)
        .collect();

    if !headers.iter().any(|h| SKU_FIELDS.contains(&h.as_str())) {
        return Err(EngineError::Parse(format!(
            "CSV feed '{}' has no recognizable SKU column (headers: {})",
            source.name,
            headers.join(", ")
        )));
    }

    let mut records = Vec::new();
    for (index, row) in reader.records().enumerate() {
        let row = match row {
            Ok(row) => row,
            Err(e) => {
                warn!(source = %source.name, row = index + 1, error = %e, "skipping malformed CSV row");
                continue;
            },
        };

        let mut record = RawRecord::new();
        for (header, field) in headers.iter().zip(row.iter()) {
            if field.is_empty() {
                continue;
            }
            record.insert(header, serde_json::Value::String(field.to_string()));
        }
        if !record.is_empty() {
            records.push(record);
        }
    }

    Ok(records)
}
