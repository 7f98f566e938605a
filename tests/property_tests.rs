//! Property-based tests for the pure parts of order placement and caching.

use ecommerce_api::{
    cache::{cache_key, glob_match},
    entities::DeliveryMethod,
    services::orders::{
        check_totals, normalize_delivery_method, split_full_name, DeliveryMethodInput,
        OrderItemInput,
    },
};
use proptest::prelude::*;
use rust_decimal::Decimal;

fn item_strategy() -> impl Strategy<Value = OrderItemInput> {
    (1i32..10_000, 1i32..100, 1i64..10_000_000, 0u32..3).prop_map(
        |(product_id, quantity, units, scale)| OrderItemInput {
            product_id,
            quantity,
            price: Decimal::new(units, scale),
        },
    )
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(500))]

    #[test]
    fn consistent_totals_always_pass(
        items in prop::collection::vec(item_strategy(), 1..8),
        tax_cents in 0i64..1_000_000,
        shipping_cents in 0i64..100_000,
    ) {
        let subtotal: Decimal = items.iter().map(OrderItemInput::line_total).sum();
        let tax = Decimal::new(tax_cents, 2);
        let shipping = Decimal::new(shipping_cents, 2);
        prop_assert!(check_totals(&items, subtotal, tax, shipping, subtotal + tax + shipping).is_ok());
    }

    #[test]
    fn any_total_drift_is_rejected(
        items in prop::collection::vec(item_strategy(), 1..8),
        drift_cents in 1i64..1_000,
    ) {
        let subtotal: Decimal = items.iter().map(OrderItemInput::line_total).sum();
        let drift = Decimal::new(drift_cents, 2);
        prop_assert!(check_totals(&items, subtotal, Decimal::ZERO, Decimal::ZERO, subtotal + drift).is_err());
        prop_assert!(check_totals(&items, subtotal + drift, Decimal::ZERO, Decimal::ZERO, subtotal + drift).is_err());
    }

    #[test]
    fn split_names_rejoin_to_the_normalized_input(
        first in "[A-Za-z]{1,12}",
        rest in prop::collection::vec("[A-Za-z]{1,12}", 0..3),
    ) {
        let full = std::iter::once(first.clone()).chain(rest.iter().cloned()).collect::<Vec<_>>().join(" ");
        let (name, lastname) = split_full_name(&format!("  {full} ")).unwrap();
        prop_assert_eq!(&name, &first);
        if rest.is_empty() {
            prop_assert_eq!(lastname, first);
        } else {
            prop_assert_eq!(lastname, rest.join(" "));
        }
    }

    #[test]
    fn unrecognized_codes_mean_home_delivery(code in prop::num::i64::ANY) {
        let method = normalize_delivery_method(Some(&DeliveryMethodInput::Code(code)));
        let expected = match code {
            1 => DeliveryMethod::DriveThru,
            2 => DeliveryMethod::OnHand,
            _ => DeliveryMethod::HomeDelivery,
        };
        prop_assert_eq!(method, expected);
    }

    #[test]
    fn cache_keys_ignore_parameter_order(skip in 0u64..1_000, limit in 1u64..100) {
        let a = cache_key("products", "list", &[("skip", skip.to_string()), ("limit", limit.to_string())]);
        let b = cache_key("products", "list", &[("limit", limit.to_string()), ("skip", skip.to_string())]);
        prop_assert_eq!(&a, &b);
        prop_assert!(glob_match("products:list*", &a));
        prop_assert!(!glob_match("products:category*", &a));
    }
}
