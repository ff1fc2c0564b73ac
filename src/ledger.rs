//! Fee split for a completed order.
//!
//! The gateway takes 2.5% of the gig price, the platform takes 7.5% of what is
//! left, the seller gets the rest. All arithmetic is exact decimal; the three
//! outputs are rounded half-up to cents only at the very end.

use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;

/// 2.5%
pub const GATEWAY_FEE_RATE: Decimal = Decimal::from_parts(25, 0, 0, false, 3);
/// 7.5%
pub const PLATFORM_FEE_RATE: Decimal = Decimal::from_parts(75, 0, 0, false, 3);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FeeSplit {
    pub gateway_fee: Decimal,
    pub platform_fee: Decimal,
    pub seller_payout: Decimal,
}

pub fn compute_split(gig_price: Decimal) -> FeeSplit {
    let gateway_fee = gig_price * GATEWAY_FEE_RATE;
    let after_gateway = gig_price - gateway_fee;
    let platform_fee = after_gateway * PLATFORM_FEE_RATE;
    let seller_payout = after_gateway - platform_fee;

    FeeSplit {
        gateway_fee: to_cents(gateway_fee),
        platform_fee: to_cents(platform_fee),
        seller_payout: to_cents(seller_payout),
    }
}

/// Round half-up (away from zero) to two decimal places.
pub fn to_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Amount in minor currency units (cents/agorot), as the gateway expects it.
/// `None` when the amount does not fit in an `i64`.
pub fn to_minor_units(amount: Decimal) -> Option<i64> {
    use rust_decimal::prelude::ToPrimitive;
    to_cents(amount)
        .checked_mul(Decimal::ONE_HUNDRED)?
        .to_i64()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cents(n: i64) -> Decimal {
        Decimal::new(n, 2)
    }

    #[test]
    fn hundred_splits_into_known_values() {
        let split = compute_split(cents(10_000));
        assert_eq!(split.gateway_fee, cents(250));
        assert_eq!(split.platform_fee, cents(731));
        assert_eq!(split.seller_payout, cents(9019));
    }

    #[test]
    fn zero_price_splits_to_zero() {
        let split = compute_split(Decimal::ZERO);
        assert_eq!(split.gateway_fee, Decimal::ZERO);
        assert_eq!(split.platform_fee, Decimal::ZERO);
        assert_eq!(split.seller_payout, Decimal::ZERO);
    }

    #[test]
    fn parts_sum_to_price_within_a_cent() {
        let tolerance = cents(1);
        for price_cents in (0..200_000).step_by(7) {
            let price = cents(price_cents);
            let split = compute_split(price);

            assert!(split.gateway_fee >= Decimal::ZERO);
            assert!(split.platform_fee >= Decimal::ZERO);
            assert!(split.seller_payout >= Decimal::ZERO);

            let total = split.gateway_fee + split.platform_fee + split.seller_payout;
            assert!(
                (total - price).abs() <= tolerance,
                "price {price} split into {split:?}"
            );
        }
    }

    #[test]
    fn rounding_is_half_up() {
        assert_eq!(to_cents(Decimal::new(7_3125, 4)), cents(731));
        assert_eq!(to_cents(Decimal::new(125, 3)), cents(13));
        assert_eq!(to_cents(Decimal::new(135, 3)), cents(14));
    }

    #[test]
    fn minor_units_are_whole_cents() {
        assert_eq!(to_minor_units(cents(10_000)), Some(10_000));
        assert_eq!(to_minor_units(cents(1_999)), Some(1_999));
        assert_eq!(to_minor_units(Decimal::new(5, 0)), Some(500));
    }

    #[test]
    fn minor_units_out_of_range_is_none() {
        assert_eq!(to_minor_units(Decimal::MAX), None);
        assert_eq!(to_minor_units(Decimal::from(i64::MAX)), None);
    }
}
