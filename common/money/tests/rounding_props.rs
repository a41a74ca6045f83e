use common_money::Money;
use proptest::prelude::*;

proptest! {
    // Half-up rounding stays within half a unit of the exact rational share.
    #[test]
    fn bps_share_error_bound(cents in 0i64..100_000_000, bps in 0i64..=10_000) {
        let share = Money::from_cents(cents).percent_bps(bps).cents() as i128;
        let exact_numerator = cents as i128 * bps as i128;
        let err = share * 10_000 - exact_numerator;
        prop_assert!(err >= -5_000 && err <= 5_000, "share={share} cents={cents} bps={bps}");
    }

    // A bigger amount never produces a smaller share at the same rate.
    #[test]
    fn bps_share_monotonic(a in 0i64..50_000_000, delta in 0i64..50_000_000, bps in 0i64..=10_000) {
        let small = Money::from_cents(a).percent_bps(bps);
        let large = Money::from_cents(a + delta).percent_bps(bps);
        prop_assert!(large >= small);
    }

    // Summing line totals equals multiplying once (no drift across items).
    #[test]
    fn quantity_multiplication_matches_addition(price in 0i64..1_000_000, qty in 1i64..50) {
        let unit = Money::from_cents(price);
        let repeated: Money = std::iter::repeat(unit).take(qty as usize).sum();
        prop_assert_eq!(unit.multiply_quantity(qty), repeated);
    }
}
