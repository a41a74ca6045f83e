use common_money::Money;
use proptest::prelude::*;
use storefront_service::billing::{compute, BillLine, GST_RATE_BPS};
use uuid::Uuid;

fn line(price_cents: i64, qty: i32) -> BillLine {
    BillLine {
        spare_part_id: Uuid::new_v4(),
        name: "part".into(),
        unit_price: Money::from_cents(price_cents),
        quantity: qty,
    }
}

#[test]
fn worked_example_two_lines_no_discount() {
    // {100.00 x 2, 50.00 x 1}, discount 0, 18% GST
    let lines = [line(10_000, 2), line(5_000, 1)];
    let totals = compute(&lines, Money::zero(), GST_RATE_BPS);
    assert_eq!(totals.subtotal.cents(), 25_000);
    assert_eq!(totals.gst.cents(), 4_500);
    assert_eq!(totals.grand_total.cents(), 29_500);
}

#[test]
fn discount_reduces_the_taxable_base() {
    let lines = [line(10_000, 1)];
    let totals = compute(&lines, Money::from_cents(2_000), GST_RATE_BPS);
    assert_eq!(totals.discount.cents(), 2_000);
    // GST on 80.00, not 100.00
    assert_eq!(totals.gst.cents(), 1_440);
    assert_eq!(totals.grand_total.cents(), 9_440);
}

#[test]
fn excess_discount_clamps_and_zeroes_gst() {
    let lines = [line(1_000, 2)];
    let totals = compute(&lines, Money::from_cents(99_999), GST_RATE_BPS);
    assert_eq!(totals.discount.cents(), 2_000);
    assert_eq!(totals.gst.cents(), 0);
    assert_eq!(totals.grand_total.cents(), 0);
}

#[test]
fn empty_bill_computes_to_zero() {
    let totals = compute(&[], Money::from_cents(500), GST_RATE_BPS);
    assert_eq!(totals.subtotal.cents(), 0);
    assert_eq!(totals.discount.cents(), 0);
    assert_eq!(totals.grand_total.cents(), 0);
}

proptest! {
    // grand_total == subtotal - d + (subtotal - d) * rate for every in-range
    // discount, exactly, no matter how often it is recomputed.
    #[test]
    fn totals_follow_the_formula(
        prices in proptest::collection::vec((1i64..1_000_000, 1i32..20), 1..8),
        discount_seed in 0u64..=10_000,
    ) {
        let lines: Vec<BillLine> = prices.iter().map(|&(p, q)| line(p, q)).collect();
        let subtotal: i64 = lines.iter().map(|l| l.line_total().cents()).sum();
        // scale the seed into [0, subtotal] so the discount is always in range
        let discount = (subtotal as u128 * discount_seed as u128 / 10_000) as i64;

        let totals = compute(&lines, Money::from_cents(discount), GST_RATE_BPS);
        let taxable = subtotal - discount;
        let expected_gst = (taxable as i128 * GST_RATE_BPS as i128 + 5_000) / 10_000;

        prop_assert_eq!(totals.subtotal.cents(), subtotal);
        prop_assert_eq!(totals.discount.cents(), discount);
        prop_assert_eq!(totals.gst.cents() as i128, expected_gst);
        prop_assert_eq!(totals.grand_total.cents() as i128, taxable as i128 + expected_gst);

        // recomputation is idempotent
        let again = compute(&lines, Money::from_cents(discount), GST_RATE_BPS);
        prop_assert_eq!(totals, again);
    }

    // oversized discounts clamp to the subtotal and can never push any
    // figure negative
    #[test]
    fn oversized_discount_never_goes_negative(
        prices in proptest::collection::vec((1i64..100_000, 1i32..10), 1..5),
        excess in 1i64..1_000_000,
    ) {
        let lines: Vec<BillLine> = prices.iter().map(|&(p, q)| line(p, q)).collect();
        let subtotal: i64 = lines.iter().map(|l| l.line_total().cents()).sum();

        let totals = compute(&lines, Money::from_cents(subtotal + excess), GST_RATE_BPS);
        prop_assert_eq!(totals.discount.cents(), subtotal);
        prop_assert_eq!(totals.gst.cents(), 0);
        prop_assert_eq!(totals.grand_total.cents(), 0);
        prop_assert!(!totals.grand_total.is_negative());
    }
}
