//! Order money math: line totals, the free-shipping rule and tax.
//!
//! Everything here is pure `Decimal` arithmetic. Subtotals are exact sums
//! of captured cart prices, which are already in minor units. Only tax is
//! rounded (2 dp, half away from zero), so
//! `total == subtotal + shipping_cost + tax` holds exactly.

use rust_decimal::{Decimal, RoundingStrategy};
use std::{fmt, sync::Arc};

use crate::config::CheckoutConfig;

/// Round to currency minor units.
pub fn round_money(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Render an amount with exactly two decimals, e.g. `"105.00"`.
pub fn format_money(amount: Decimal) -> String {
    let mut rounded = round_money(amount);
    rounded.rescale(2);
    rounded.to_string()
}

pub fn line_total(unit_price: Decimal, quantity: i32) -> Decimal {
    unit_price * Decimal::from(quantity)
}

/// Flat-rate shipping that becomes free strictly above a threshold.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ShippingPolicy {
    pub free_shipping_threshold: Decimal,
    pub flat_rate: Decimal,
}

impl ShippingPolicy {
    pub fn cost(&self, subtotal: Decimal) -> Decimal {
        if subtotal > self.free_shipping_threshold {
            Decimal::ZERO
        } else {
            self.flat_rate
        }
    }
}

/// Tax strategy. Implementations must never return a negative amount.
pub trait TaxCalculator: Send + Sync + fmt::Debug {
    fn tax(&self, subtotal: Decimal, shipping_cost: Decimal) -> Decimal;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct NoTax;

impl TaxCalculator for NoTax {
    fn tax(&self, _subtotal: Decimal, _shipping_cost: Decimal) -> Decimal {
        Decimal::ZERO
    }
}

/// Percentage of the merchandise subtotal; shipping is not taxed.
#[derive(Debug, Clone, Copy)]
pub struct FlatRateTax {
    pub rate: Decimal,
}

impl TaxCalculator for FlatRateTax {
    fn tax(&self, subtotal: Decimal, _shipping_cost: Decimal) -> Decimal {
        round_money(subtotal * self.rate).max(Decimal::ZERO)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderTotals {
    pub subtotal: Decimal,
    pub shipping_cost: Decimal,
    pub tax: Decimal,
    pub total: Decimal,
}

#[derive(Debug, Clone)]
pub struct PricingPolicy {
    pub shipping: ShippingPolicy,
    pub tax: Arc<dyn TaxCalculator>,
}

impl PricingPolicy {
    pub fn new(shipping: ShippingPolicy, tax: Arc<dyn TaxCalculator>) -> Self {
        Self { shipping, tax }
    }

    /// A zero `tax_rate` selects [`NoTax`].
    pub fn from_config(config: &CheckoutConfig) -> Self {
        let tax: Arc<dyn TaxCalculator> = if config.tax_rate.is_zero() {
            Arc::new(NoTax)
        } else {
            Arc::new(FlatRateTax {
                rate: config.tax_rate,
            })
        };

        Self::new(
            ShippingPolicy {
                free_shipping_threshold: config.free_shipping_threshold,
                flat_rate: round_money(config.flat_shipping_rate),
            },
            tax,
        )
    }

    /// Totals for `(unit_price, quantity)` lines.
    pub fn totals<I>(&self, lines: I) -> OrderTotals
    where
        I: IntoIterator<Item = (Decimal, i32)>,
    {
        let subtotal: Decimal = lines
            .into_iter()
            .map(|(price, quantity)| line_total(price, quantity))
            .sum();
        let shipping_cost = self.shipping.cost(subtotal);
        let tax = self.tax.tax(subtotal, shipping_cost).max(Decimal::ZERO);

        OrderTotals {
            subtotal,
            shipping_cost,
            tax,
            total: subtotal + shipping_cost + tax,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use rust_decimal_macros::dec;

    fn default_policy() -> PricingPolicy {
        PricingPolicy::from_config(&CheckoutConfig::default())
    }

    #[test]
    fn shipping_threshold_is_exclusive() {
        let policy = default_policy();
        assert_eq!(policy.shipping.cost(dec!(100.00)), dec!(10));
        assert_eq!(policy.shipping.cost(dec!(100.01)), dec!(0));
        assert_eq!(policy.shipping.cost(dec!(0)), dec!(10));
    }

    #[test]
    fn example_cart_totals() {
        let totals = default_policy().totals([(dec!(45.00), 2), (dec!(15.00), 1)]);

        assert_eq!(totals.subtotal, dec!(105.00));
        assert_eq!(totals.shipping_cost, dec!(0));
        assert_eq!(totals.tax, dec!(0));
        assert_eq!(format_money(totals.total), "105.00");
    }

    #[test]
    fn flat_rate_tax_rounds_half_away_from_zero() {
        let tax = FlatRateTax { rate: dec!(0.0875) };
        // 19.99 * 0.0875 = 1.749125
        assert_eq!(tax.tax(dec!(19.99), dec!(10)), dec!(1.75));
        // 2.00 * 0.0125 = 0.025
        assert_eq!(FlatRateTax { rate: dec!(0.0125) }.tax(dec!(2.00), dec!(0)), dec!(0.03));
    }

    #[test]
    fn zero_tax_rate_selects_no_tax() {
        let policy = default_policy();
        assert_eq!(policy.tax.tax(dec!(500), dec!(0)), Decimal::ZERO);

        let taxed = PricingPolicy::from_config(&CheckoutConfig {
            tax_rate: dec!(0.10),
            ..CheckoutConfig::default()
        });
        let totals = taxed.totals([(dec!(50.00), 1)]);
        assert_eq!(totals.tax, dec!(5.00));
        assert_eq!(totals.total, dec!(65.00));
    }

    #[test]
    fn format_money_pads_and_rounds() {
        assert_eq!(format_money(dec!(105)), "105.00");
        assert_eq!(format_money(dec!(0.5)), "0.50");
        assert_eq!(format_money(dec!(12.345)), "12.35");
    }

    fn money() -> impl Strategy<Value = Decimal> {
        (0i64..1_000_000).prop_map(|cents| Decimal::new(cents, 2))
    }

    proptest! {
        #[test]
        fn total_is_exact_sum_of_parts(
            lines in prop::collection::vec((money(), 1i32..50), 1..10),
            rate in 0u32..3000,
        ) {
            let policy = PricingPolicy::new(
                ShippingPolicy { free_shipping_threshold: dec!(100), flat_rate: dec!(10) },
                Arc::new(FlatRateTax { rate: Decimal::new(rate as i64, 4) }),
            );
            let totals = policy.totals(lines.clone());

            let expected_subtotal: Decimal = lines
                .iter()
                .map(|(p, q)| *p * Decimal::from(*q))
                .sum();
            prop_assert_eq!(totals.subtotal, expected_subtotal);
            prop_assert_eq!(totals.total, totals.subtotal + totals.shipping_cost + totals.tax);
            prop_assert!(totals.tax >= Decimal::ZERO);
            prop_assert!(totals.shipping_cost == Decimal::ZERO || totals.subtotal <= dec!(100));
        }
    }
}
