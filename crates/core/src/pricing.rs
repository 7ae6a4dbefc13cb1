use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;

use crate::domain::order::Redemption;

/// Pure pricing and loyalty-point arithmetic. All functions are total over
/// their documented domains; callers are responsible for domain validity.

pub const MIN_QUANTITY: u8 = 1;
pub const MAX_QUANTITY: u8 = 9;

/// 1 loyalty point is worth 0.1 currency units of discount.
fn point_value() -> Decimal {
    Decimal::new(1, 1)
}

/// Earn rate: 5% of the final spend, floored to whole points.
fn earn_rate() -> Decimal {
    Decimal::new(5, 2)
}

pub fn line_total(unit_price: Decimal, quantity: u8) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Largest discount the balance can cover against the cart total:
/// `min(balance * 0.1, cart_total)`, with the equivalent whole points
/// consumed (`floor(discount * 10)`).
pub fn redeemable_discount(balance_points: i64, cart_total: Decimal) -> Redemption {
    if balance_points <= 0 || cart_total <= Decimal::ZERO {
        return Redemption::default();
    }

    let ceiling = Decimal::from(balance_points) * point_value();
    let value = ceiling.min(cart_total);
    let points_used = (value * Decimal::from(10)).floor().to_i64().unwrap_or(0);

    Redemption { points_used, value }
}

pub fn points_earned(spend: Decimal) -> i64 {
    if spend <= Decimal::ZERO {
        return 0;
    }
    (spend * earn_rate()).floor().to_i64().unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use rust_decimal::Decimal;

    use super::{line_total, points_earned, redeemable_discount, MAX_QUANTITY, MIN_QUANTITY};

    #[test]
    fn line_total_multiplies_over_the_whole_quantity_range() {
        for quantity in MIN_QUANTITY..=MAX_QUANTITY {
            assert_eq!(
                line_total(Decimal::from(65), quantity),
                Decimal::from(65) * Decimal::from(quantity)
            );
        }
    }

    #[test]
    fn discount_is_bounded_by_cart_total_and_point_value() {
        for balance in [0_i64, 1, 10, 649, 650, 1000, 100_000] {
            for total in [0_i64, 1, 65, 200, 999] {
                let redemption = redeemable_discount(balance, Decimal::from(total));
                assert!(redemption.value <= Decimal::from(total));
                assert!(redemption.value <= Decimal::from(balance) * Decimal::new(1, 1));
                assert!(redemption.points_used >= 0);
                assert!(redemption.points_used <= balance.max(0));
            }
        }
    }

    #[test]
    fn large_balance_covers_the_full_cart() {
        // 1000 points cap out at 100 units of discount; a 65-unit cart is free.
        let redemption = redeemable_discount(1000, Decimal::from(65));

        assert_eq!(redemption.value, Decimal::from(65));
        assert_eq!(redemption.points_used, 650);
    }

    #[test]
    fn small_balance_is_spent_whole() {
        let redemption = redeemable_discount(40, Decimal::from(65));

        assert_eq!(redemption.value, Decimal::from(4));
        assert_eq!(redemption.points_used, 40);
    }

    #[test]
    fn zero_balance_redeems_nothing() {
        let redemption = redeemable_discount(0, Decimal::from(65));

        assert_eq!(redemption.points_used, 0);
        assert_eq!(redemption.value, Decimal::ZERO);
    }

    #[test]
    fn earn_rate_is_five_percent_floored() {
        assert_eq!(points_earned(Decimal::from(200)), 10);
        assert_eq!(points_earned(Decimal::from(65)), 3);
        assert_eq!(points_earned(Decimal::from(19)), 0);
        assert_eq!(points_earned(Decimal::ZERO), 0);
        assert_eq!(points_earned(Decimal::from(-10)), 0);
    }
}
