//! Record normalization
//!
//! Maps loosely-structured feed records onto [`CanonicalProduct`]. This layer
//! is pure: no I/O, no policy decisions. A record that cannot yield a SKU is
//! the only thing normalization drops; every other defect is preserved and
//! left for validation to judge.

use crate::models::{CanonicalProduct, RawRecord};
use regex::Regex;
use rust_decimal::Decimal;
use std::collections::HashSet;
use std::sync::LazyLock;
use tracing::debug;

/// Recognized SKU fields, in precedence order. The first field present with
/// a non-empty value wins; later aliases are ignored for that record.
pub(crate) const SKU_FIELDS: [&str; 8] = [
    "sku",
    "article",
    "articul",
    "articlenumber",
    "article_number",
    "code",
    "product_code",
    "ean",
];

const NAME_FIELDS: [&str; 4] = ["name", "title", "product_name", "item_name"];
const PRICE_FIELDS: [&str; 4] = ["price", "unit_price", "retail_price", "cost"];
const STOCK_FIELDS: [&str; 4] = ["stock", "quantity", "qty", "in_stock"];
const DESCRIPTION_FIELDS: [&str; 3] = ["description", "details", "long_description"];
const CATEGORY_FIELDS: [&str; 3] = ["category", "group", "section"];
const BRAND_FIELDS: [&str; 3] = ["brand", "manufacturer", "vendor"];

/// Ordered single-image fields. Position in this list is the gallery order,
/// so `photo_1` style fields come before the generic fallbacks.
const IMAGE_FIELDS: [&str; 14] = [
    "photo_1", "photo_2", "photo_3", "photo_4", "photo_5", "image_1", "image_2", "image_3",
    "image_4", "image_5", "photo", "image", "main_image", "images",
];

static NON_NUMERIC: LazyLock<Regex> = LazyLock::new(|| {
    #[allow(clippy::unwrap_used)]
    Regex::new(r"[^0-9.,\-]+").unwrap()
});

/// Normalize one feed record into a canonical product.
///
/// Returns `None` only when no SKU can be resolved; such records are counted
/// as ignored by the caller.
pub fn normalize(record: &RawRecord) -> Option<CanonicalProduct> {
    let sku = first_field(record, &SKU_FIELDS)?;

    let name = first_field(record, &NAME_FIELDS).unwrap_or_else(|| sku.clone());
    let raw_price = first_field(record, &PRICE_FIELDS)
        .map(|s| parse_decimal(&s))
        .unwrap_or(Decimal::ZERO);
    let raw_stock = first_field(record, &STOCK_FIELDS)
        .map(|s| parse_decimal(&s))
        .unwrap_or(Decimal::ZERO);
    let description = first_field(record, &DESCRIPTION_FIELDS).unwrap_or_default();
    let category = first_field(record, &CATEGORY_FIELDS).unwrap_or_default();
    let brand = first_field(record, &BRAND_FIELDS).unwrap_or_default();
    let images = collect_images(record);

    Some(CanonicalProduct {
        sku,
        name,
        raw_price,
        raw_stock,
        description,
        category,
        brand,
        images,
    })
}

/// First non-empty value among the aliases, in precedence order.
fn first_field(record: &RawRecord, fields: &[&str]) -> Option<String> {
    for field in fields {
        if let Some(value) = record.get_str(field) {
            let trimmed = value.trim();
            if !trimmed.is_empty() {
                return Some(trimmed.to_string());
            }
        }
    }
    None
}

/// Parse a numeric string defensively.
///
/// Currency symbols, spaces and units are stripped; the last `.` or `,` is
/// treated as the decimal separator and earlier ones as grouping. Anything
/// still unparseable becomes zero so one bad cell never kills a record.
pub fn parse_decimal(raw: &str) -> Decimal {
    let cleaned = NON_NUMERIC.replace_all(raw, "");
    if cleaned.is_empty() {
        return Decimal::ZERO;
    }

    let last_dot = cleaned.rfind('.');
    let last_comma = cleaned.rfind(',');
    let normalized: String = match (last_dot, last_comma) {
        (Some(d), Some(c)) => {
            let decimal_at = d.max(c);
            cleaned
                .char_indices()
                .filter_map(|(i, ch)| match ch {
                    '.' | ',' if i != decimal_at => None,
                    '.' | ',' => Some('.'),
                    _ => Some(ch),
                })
                .collect()
        },
        (None, Some(c)) => cleaned
            .char_indices()
            .filter_map(|(i, ch)| match ch {
                ',' if i != c => None,
                ',' => Some('.'),
                _ => Some(ch),
            })
            .collect(),
        (Some(d), None) => cleaned
            .char_indices()
            .filter_map(|(i, ch)| match ch {
                '.' if i != d => None,
                _ => Some(ch),
            })
            .collect(),
        (None, None) => cleaned.into_owned(),
    };

    normalized.parse().unwrap_or_else(|_| {
        debug!(raw, "unparseable numeric value coerced to zero");
        Decimal::ZERO
    })
}

/// Collect image URL candidates in gallery order.
///
/// Only values starting with `http://` or `https://` survive, and duplicates
/// keep their first position. The `images` field may itself hold an array.
fn collect_images(record: &RawRecord) -> Vec<String> {
    let mut seen = HashSet::new();
    let mut images = Vec::new();

    let mut push = |candidate: &str| {
        let candidate = candidate.trim();
        if (candidate.starts_with("http://") || candidate.starts_with("https://"))
            && seen.insert(candidate.to_string())
        {
            images.push(candidate.to_string());
        }
    };

    for field in &IMAGE_FIELDS {
        match record.get(field) {
            Some(serde_json::Value::Array(items)) => {
                for item in items {
                    if let Some(url) = item.as_str() {
                        push(url);
                    }
                }
            },
            _ => {
                if let Some(value) = record.get_str(field) {
                    push(&value);
                }
            },
        }
    }

    images
}
