//! Record validation
//!
//! Applies the pricing and image policies to a canonical product. Rules run
//! in a fixed order (data integrity, then price floor, then images) and the
//! first failing rule decides the rejection reason. Stock defects never
//! reject a record; quantity is coerced instead.

use crate::config::{ImagePolicy, PricePolicy};
use crate::models::{CanonicalProduct, RejectReason, ValidationResult};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::{Decimal, RoundingStrategy};

/// Validate one product against the configured policies.
pub fn validate(
    product: &CanonicalProduct,
    price: &PricePolicy,
    images: &ImagePolicy,
) -> ValidationResult {
    if product.raw_price <= Decimal::ZERO {
        return ValidationResult::Rejected {
            reason: RejectReason::InvalidData,
            detail: format!("non-positive price {}", product.raw_price),
        };
    }

    let computed_price = (product.raw_price * price.multiplier)
        .round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);

    // The floor applies after markup, so a cheap source price can survive
    // when the multiplier lifts it over the minimum.
    if computed_price < price.min_price {
        return ValidationResult::Rejected {
            reason: RejectReason::PriceTooLow,
            detail: format!(
                "computed price {} below minimum {}",
                computed_price, price.min_price
            ),
        };
    }

    if images.required && product.images.is_empty() {
        return ValidationResult::Rejected {
            reason: RejectReason::NoImages,
            detail: "no usable image candidates".to_string(),
        };
    }

    ValidationResult::Accepted {
        computed_price,
        quantity: sanitize_quantity(product.raw_stock),
        validated_images: product.images.clone(),
    }
}

/// Coerce a raw stock value into a non-negative whole quantity.
///
/// Negative and unparseable values become zero, fractional values are
/// floored.
pub fn sanitize_quantity(raw_stock: Decimal) -> u32 {
    if raw_stock <= Decimal::ZERO {
        return 0;
    }
    raw_stock.floor().to_u32().unwrap_or(0)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn product(raw_price: Decimal, raw_stock: Decimal, images: Vec<String>) -> CanonicalProduct {
        CanonicalProduct {
            sku: "T-1".to_string(),
            name: "Test".to_string(),
            raw_price,
            raw_stock,
            description: String::new(),
            category: String::new(),
            brand: String::new(),
            images,
        }
    }

    fn price_policy(multiplier: Decimal, min_price: Decimal) -> PricePolicy {
        PricePolicy { multiplier, min_price }
    }

    #[test]
    fn test_markup_lifts_price_over_minimum() {
        let p = product(dec!(12), dec!(1), vec![]);
        let result = validate(&p, &price_policy(dec!(2), dec!(20)), &ImagePolicy::default());
        match result {
            ValidationResult::Accepted { computed_price, .. } => {
                assert_eq!(computed_price, dec!(24.00));
            },
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_price_below_minimum_after_markup() {
        let p = product(dec!(9), dec!(1), vec![]);
        let result = validate(&p, &price_policy(dec!(2), dec!(20)), &ImagePolicy::default());
        match result {
            ValidationResult::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::PriceTooLow);
            },
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_non_positive_price_is_invalid_data() {
        for raw in [Decimal::ZERO, dec!(-1.50)] {
            let p = product(raw, dec!(1), vec![]);
            let result = validate(&p, &PricePolicy::default(), &ImagePolicy::default());
            match result {
                ValidationResult::Rejected { reason, .. } => {
                    assert_eq!(reason, RejectReason::InvalidData);
                },
                other => panic!("expected rejection, got {:?}", other),
            }
        }
    }

    #[test]
    fn test_invalid_data_wins_over_later_rules() {
        // zero price and no images: the data rule fires first
        let p = product(Decimal::ZERO, dec!(1), vec![]);
        let images = ImagePolicy { required: true, ..ImagePolicy::default() };
        let result = validate(&p, &PricePolicy::default(), &images);
        match result {
            ValidationResult::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::InvalidData);
            },
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_missing_images_rejected_only_when_required() {
        let p = product(dec!(5), dec!(1), vec![]);

        let optional = ImagePolicy::default();
        assert!(matches!(
            validate(&p, &PricePolicy::default(), &optional),
            ValidationResult::Accepted { .. }
        ));

        let required = ImagePolicy { required: true, ..ImagePolicy::default() };
        match validate(&p, &PricePolicy::default(), &required) {
            ValidationResult::Rejected { reason, .. } => {
                assert_eq!(reason, RejectReason::NoImages);
            },
            other => panic!("expected rejection, got {:?}", other),
        }
    }

    #[test]
    fn test_rounding_is_half_up() {
        let p = product(dec!(1.005), dec!(1), vec![]);
        let result = validate(&p, &PricePolicy::default(), &ImagePolicy::default());
        match result {
            ValidationResult::Accepted { computed_price, .. } => {
                assert_eq!(computed_price, dec!(1.01));
            },
            other => panic!("expected acceptance, got {:?}", other),
        }
    }

    #[test]
    fn test_sanitize_quantity() {
        assert_eq!(sanitize_quantity(dec!(-5)), 0);
        assert_eq!(sanitize_quantity(Decimal::ZERO), 0);
        assert_eq!(sanitize_quantity(dec!(7.9)), 7);
        assert_eq!(sanitize_quantity(dec!(3)), 3);
    }

    #[test]
    fn test_stock_defects_never_reject() {
        let p = product(dec!(5), dec!(-10), vec!["https://img.example/a.jpg".to_string()]);
        match validate(&p, &PricePolicy::default(), &ImagePolicy::default()) {
            ValidationResult::Accepted { quantity, .. } => assert_eq!(quantity, 0),
            other => panic!("expected acceptance, got {:?}", other),
        }
    }
}
