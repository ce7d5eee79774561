use super::acb::LedgerEntry;
use super::pool::Pool;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

/// Share of a net capital gain that is taxable
pub const DEFAULT_INCLUSION_RATE: Decimal = dec!(0.5);

/// Holdings at the end of the summarized period
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct Holdings {
    pub total_units: Decimal,
    pub total_cost: Decimal,
    pub per_unit_cost: Decimal,
}

impl From<Pool> for Holdings {
    fn from(pool: Pool) -> Self {
        Holdings {
            total_units: pool.total_units,
            total_cost: pool.total_cost,
            per_unit_cost: pool.per_unit_cost(),
        }
    }
}

/// Capital gains totals for a period
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Summary {
    /// Calendar year summarized, or `None` for all years
    pub year: Option<i32>,
    pub disposal_count: usize,
    pub total_gains: Decimal,
    /// Losses not flagged as superficial, as a positive amount
    pub total_losses: Decimal,
    pub net_gain: Decimal,
    pub inclusion_rate: Decimal,
    pub taxable_gain: Decimal,
    /// Flagged losses left out of both totals
    pub superficial_loss_count: usize,
    pub holdings: Holdings,
}

/// Total up the disposals in `entries` for `year` (or all years).
///
/// Flagged superficial losses are counted but excluded from the totals; they
/// are not added to any replacement cost. Holdings come from the last entry
/// in the period.
pub fn summarize(entries: &[LedgerEntry], year: Option<i32>, inclusion_rate: Decimal) -> Summary {
    let in_period: Vec<&LedgerEntry> = entries
        .iter()
        .filter(|e| year.is_none_or(|y| e.tax_year() == y))
        .collect();

    let mut disposal_count = 0;
    let mut total_gains = Decimal::ZERO;
    let mut total_losses = Decimal::ZERO;
    let mut superficial_loss_count = 0;

    for disposition in in_period.iter().filter_map(|e| e.disposition.as_ref()) {
        disposal_count += 1;
        if disposition.gain >= Decimal::ZERO {
            total_gains += disposition.gain;
        } else if disposition.superficial_loss {
            superficial_loss_count += 1;
        } else {
            total_losses += disposition.gain.abs();
        }
    }

    let net_gain = total_gains - total_losses;
    let taxable_gain = (net_gain * inclusion_rate).max(Decimal::ZERO);
    let holdings = in_period
        .last()
        .map(|e| Holdings::from(e.pool_after()))
        .unwrap_or_default();

    Summary {
        year,
        disposal_count,
        total_gains,
        total_losses,
        net_gain,
        inclusion_rate,
        taxable_gain,
        superficial_loss_count,
        holdings,
    }
}
