use rust_decimal::{Decimal, RoundingStrategy};
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Pool quantities below this are treated as empty.
pub const DUST_THRESHOLD: Decimal = dec!(0.00000001);

/// Round a currency amount to cents, half-up.
///
/// Every per-unit cost and cost basis the engine reports goes through this
/// so the ledger, the summary and the export all agree to the cent.
pub fn round_cents(amount: Decimal) -> Decimal {
    amount.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero)
}

/// Weighted-average cost pool for a single asset
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Pool {
    #[schemars(with = "f64")]
    pub total_cost: Decimal,
    #[schemars(with = "f64")]
    pub total_units: Decimal,
}

impl Pool {
    pub fn new(total_cost: Decimal, total_units: Decimal) -> Self {
        Pool {
            total_cost,
            total_units,
        }
    }

    /// Average cost of one unit, rounded to cents. Zero for an empty pool.
    pub fn per_unit_cost(&self) -> Decimal {
        if self.total_units <= Decimal::ZERO {
            Decimal::ZERO
        } else {
            round_cents(self.total_cost / self.total_units)
        }
    }

    /// Add to the pool (acquisition)
    pub fn add(&mut self, quantity: Decimal, cost: Decimal) {
        self.total_cost += cost;
        self.total_units += quantity;
        log::debug!(
            "Pool ADD: qty={}, cost={}. New total: qty={}, cost={}",
            quantity,
            cost,
            self.total_units,
            self.total_cost
        );
    }

    /// Remove `quantity` units at the given (already rounded) per-unit cost
    /// and return the cost basis taken out of the pool.
    pub fn remove(&mut self, quantity: Decimal, per_unit_cost: Decimal) -> Decimal {
        let cost_basis = round_cents(quantity * per_unit_cost);
        self.total_cost -= cost_basis;
        self.total_units -= quantity;

        if self.total_units < DUST_THRESHOLD {
            log::debug!(
                "Pool REMOVE left dust: qty={}, cost={}. Clearing pool",
                self.total_units,
                self.total_cost
            );
            self.total_units = Decimal::ZERO;
            self.total_cost = Decimal::ZERO;
        }

        log::debug!(
            "Pool REMOVE: qty={}, cost={}. Remaining: qty={}, cost={}",
            quantity,
            cost_basis,
            self.total_units,
            self.total_cost
        );
        cost_basis
    }

    pub fn is_empty(&self) -> bool {
        self.total_units.is_zero()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_cents_is_half_up() {
        assert_eq!(round_cents(dec!(1.005)), dec!(1.01));
        assert_eq!(round_cents(dec!(1.004)), dec!(1.00));
        assert_eq!(round_cents(dec!(-1.005)), dec!(-1.01));
        assert_eq!(round_cents(dec!(61706.6666)), dec!(61706.67));
    }

    #[test]
    fn empty_pool_has_zero_per_unit_cost() {
        let pool = Pool::default();
        assert_eq!(pool.per_unit_cost(), Decimal::ZERO);
        assert!(pool.is_empty());
    }

    #[test]
    fn pool_basic_operations() {
        let mut pool = Pool::default();
        pool.add(dec!(10), dec!(1000));
        assert_eq!(pool.total_units, dec!(10));
        assert_eq!(pool.total_cost, dec!(1000));
        assert_eq!(pool.per_unit_cost(), dec!(100));

        let cost = pool.remove(dec!(5), pool.per_unit_cost());
        assert_eq!(cost, dec!(500));
        assert_eq!(pool.total_units, dec!(5));
        assert_eq!(pool.total_cost, dec!(500));
        assert_eq!(pool.per_unit_cost(), dec!(100));
    }

    #[test]
    fn remove_clears_dust() {
        let mut pool = Pool::new(dec!(100), dec!(3));
        let per_unit = pool.per_unit_cost();
        assert_eq!(per_unit, dec!(33.33));

        let cost = pool.remove(dec!(2.999999999), per_unit);
        assert_eq!(cost, dec!(99.99));
        assert_eq!(pool.total_units, Decimal::ZERO);
        assert_eq!(pool.total_cost, Decimal::ZERO);
    }

    #[test]
    fn remove_everything_leaves_rounding_residue_cleared() {
        let mut pool = Pool::new(dec!(100), dec!(3));
        let per_unit = pool.per_unit_cost();
        pool.remove(dec!(3), per_unit);
        assert_eq!(pool, Pool::default());
    }
}
