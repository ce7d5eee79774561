use super::pool::{round_cents, Pool};
use super::price::PriceConfidence;
use super::superficial::{check_superficial_loss, AcquisitionIndex};
use super::transaction::{EventKind, Transaction, TxType};
use chrono::{Datelike, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

/// Gain/loss realized by a disposal
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Disposition {
    /// Sale value less fees
    pub proceeds: Decimal,
    /// Units disposed at the pre-disposal per-unit cost, rounded to cents
    pub cost_basis: Decimal,
    pub gain: Decimal,
    pub superficial_loss: bool,
    pub superficial_loss_note: String,
}

impl Disposition {
    /// Proceeds before fees were taken off
    pub fn gross_proceeds(&self, fee: Decimal) -> Decimal {
        self.proceeds + fee
    }
}

/// One processed transaction with the pool as it stood afterwards
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LedgerEntry {
    pub timestamp: NaiveDateTime,
    pub kind: EventKind,
    pub tx_type: TxType,
    pub quantity: Decimal,
    pub unit_price: Decimal,
    pub fee: Decimal,
    pub label: String,
    pub price_confidence: Option<PriceConfidence>,
    pub total_cost_after: Decimal,
    pub total_units_after: Decimal,
    pub per_unit_cost_after: Decimal,
    /// Present for disposals only
    pub disposition: Option<Disposition>,
}

impl LedgerEntry {
    fn new(tx: &Transaction, kind: EventKind, pool: &Pool, disposition: Option<Disposition>) -> Self {
        LedgerEntry {
            timestamp: tx.timestamp,
            kind,
            tx_type: tx.tx_type.clone(),
            quantity: tx.quantity,
            unit_price: tx.unit_price,
            fee: tx.fee,
            label: tx.label.clone(),
            price_confidence: tx.price_confidence,
            total_cost_after: pool.total_cost,
            total_units_after: pool.total_units,
            per_unit_cost_after: pool.per_unit_cost(),
            disposition,
        }
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// Canadian tax years follow the calendar year
    pub fn tax_year(&self) -> i32 {
        self.timestamp.year()
    }

    pub fn gain(&self) -> Option<Decimal> {
        self.disposition.as_ref().map(|d| d.gain)
    }

    pub fn pool_after(&self) -> Pool {
        Pool::new(self.total_cost_after, self.total_units_after)
    }
}

/// Run the full transaction history through an empty pool.
///
/// Transactions are stably sorted by timestamp first, so same-instant
/// transactions keep their input order. Types other than buy, receive,
/// sell, spend and send are skipped without an entry.
pub fn process(transactions: &[Transaction]) -> Vec<LedgerEntry> {
    process_with_opening(transactions, Pool::default())
}

/// As [`process`], starting from a pool carried over from an earlier run.
///
/// The superficial-loss lookback only sees acquisitions from this run.
pub fn process_with_opening(transactions: &[Transaction], opening: Pool) -> Vec<LedgerEntry> {
    let mut sorted: Vec<&Transaction> = transactions.iter().collect();
    sorted.sort_by_key(|tx| tx.timestamp);

    let mut pool = opening;
    let mut acquisitions = AcquisitionIndex::new();
    let mut ledger = Vec::with_capacity(sorted.len());

    if !pool.is_empty() {
        log::debug!(
            "Opening pool: qty={}, cost={}",
            pool.total_units,
            pool.total_cost
        );
    }

    for tx in sorted {
        let Some(kind) = tx.kind() else {
            log::debug!(
                "Skipping {} transaction on {}: unrecognized type",
                tx.tx_type,
                tx.timestamp
            );
            continue;
        };

        let entry = match kind {
            EventKind::Acquisition => {
                let cost = tx.quantity * tx.unit_price + tx.fee;
                pool.add(tx.quantity, cost);
                acquisitions.push(tx.timestamp);
                LedgerEntry::new(tx, kind, &pool, None)
            }
            EventKind::Disposal => {
                let disposition = dispose(tx, &mut pool, &acquisitions);
                LedgerEntry::new(tx, kind, &pool, Some(disposition))
            }
        };
        ledger.push(entry);
    }

    ledger
}

fn dispose(tx: &Transaction, pool: &mut Pool, acquisitions: &AcquisitionIndex) -> Disposition {
    // Read once: the same rounded figure prices the disposal and shrinks the pool
    let per_unit_cost = pool.per_unit_cost();

    let proceeds = tx.quantity * tx.unit_price - tx.fee;
    let cost_basis = pool.remove(tx.quantity, per_unit_cost);
    debug_assert_eq!(cost_basis, round_cents(tx.quantity * per_unit_cost));
    let gain = proceeds - cost_basis;

    let (superficial_loss, superficial_loss_note) = if gain < Decimal::ZERO {
        let check = check_superficial_loss(tx.timestamp, acquisitions);
        (check.flagged, check.note)
    } else {
        (false, String::new())
    };

    log::debug!(
        "Disposal {} on {}: proceeds={}, cost_basis={}, gain={}",
        tx.quantity,
        tx.timestamp,
        proceeds,
        cost_basis,
        gain
    );

    Disposition {
        proceeds,
        cost_basis,
        gain,
        superficial_loss,
        superficial_loss_note,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn at(date: &str) -> NaiveDateTime {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .unwrap()
            .and_hms_opt(0, 0, 0)
            .unwrap()
    }

    fn buy(date: &str, qty: Decimal, price: Decimal, fee: Decimal) -> Transaction {
        Transaction::new(at(date), "buy", qty, price, fee)
    }

    fn sell(date: &str, qty: Decimal, price: Decimal, fee: Decimal) -> Transaction {
        Transaction::new(at(date), "sell", qty, price, fee)
    }

    fn sample_history() -> Vec<Transaction> {
        vec![
            buy("2024-01-15", dec!(0.5), dec!(60000), dec!(50)).with_label("DCA Purchase"),
            buy("2024-02-20", dec!(0.25), dec!(65000), dec!(30)).with_label("DCA Purchase"),
            sell("2024-03-10", dec!(0.3), dec!(70000), dec!(25)).with_label("Taking profit"),
            buy("2024-04-05", dec!(0.1), dec!(55000), dec!(15)).with_label("Buying dip"),
            sell("2024-04-20", dec!(0.2), dec!(50000), dec!(20)).with_label("Loss sale"),
        ]
    }

    #[test]
    fn acquisitions_then_profitable_disposal() {
        let ledger = process(&sample_history()[..3]);
        assert_eq!(ledger.len(), 3);

        // 0.5 * 60000 + 50 + 0.25 * 65000 + 30
        assert_eq!(ledger[1].total_cost_after, dec!(46330));
        assert_eq!(ledger[1].total_units_after, dec!(0.75));
        assert_eq!(ledger[1].per_unit_cost_after, dec!(61773.33));
        assert!(ledger[1].disposition.is_none());

        let d = ledger[2].disposition.as_ref().unwrap();
        assert_eq!(d.proceeds, dec!(20975));
        // 0.3 * 61773.33 = 18531.999 -> 18532.00
        assert_eq!(d.cost_basis, dec!(18532.00));
        assert_eq!(d.gain, dec!(2443.00));
        assert!(!d.superficial_loss);
        assert_eq!(d.superficial_loss_note, "");

        assert_eq!(ledger[2].total_cost_after, dec!(27798.00));
        assert_eq!(ledger[2].total_units_after, dec!(0.45));
        assert_eq!(ledger[2].per_unit_cost_after, dec!(61773.33));
    }

    #[test]
    fn loss_after_recent_purchase_is_flagged() {
        let ledger = process(&sample_history());
        assert_eq!(ledger.len(), 5);

        // pool 27798.00 + 5515 = 33313.00 over 0.55 units
        assert_eq!(ledger[3].total_cost_after, dec!(33313.00));
        assert_eq!(ledger[3].per_unit_cost_after, dec!(60569.09));

        let d = ledger[4].disposition.as_ref().unwrap();
        assert_eq!(d.proceeds, dec!(9980));
        assert_eq!(d.cost_basis, dec!(12113.82));
        assert_eq!(d.gain, dec!(-2133.82));
        assert!(d.superficial_loss);
        assert!(d.superficial_loss_note.contains("2024-04-05"));
    }

    #[test]
    fn acquisition_only_units_are_exact() {
        let txs = vec![
            buy("2024-01-01", dec!(0.00012345), dec!(50000), dec!(1)),
            buy("2024-01-02", dec!(1.23456789), dec!(51000), dec!(0)),
            Transaction::new(at("2024-01-03"), "receive", dec!(0.1), dec!(0), dec!(0)),
        ];
        let ledger = process(&txs);
        let total: Decimal = txs.iter().map(|t| t.quantity).sum();
        assert_eq!(ledger.last().unwrap().total_units_after, total);
    }

    #[test]
    fn cost_basis_uses_previous_entry_per_unit_cost() {
        let ledger = process(&sample_history());
        for pair in ledger.windows(2) {
            if let Some(d) = &pair[1].disposition {
                assert_eq!(
                    d.cost_basis,
                    round_cents(pair[1].quantity * pair[0].per_unit_cost_after)
                );
                assert_eq!(
                    pair[1].total_cost_after,
                    pair[0].total_cost_after - d.cost_basis
                );
            }
        }
    }

    #[test]
    fn per_unit_cost_is_recomputed_after_every_entry() {
        let ledger = process(&sample_history());
        for entry in &ledger {
            assert_eq!(entry.per_unit_cost_after, entry.pool_after().per_unit_cost());
        }
    }

    #[test]
    fn per_unit_cost_rises_with_total_cost_at_fixed_units() {
        let per_unit: Vec<Decimal> = [dec!(100), dec!(100.01), dec!(101), dec!(150), dec!(10000)]
            .into_iter()
            .map(|price| {
                let ledger = process(&[buy("2024-01-01", dec!(3), price, dec!(1))]);
                assert_eq!(ledger[0].total_units_after, dec!(3));
                ledger[0].per_unit_cost_after
            })
            .collect();
        assert!(per_unit.windows(2).all(|w| w[0] <= w[1]), "{:?}", per_unit);
        assert_eq!(per_unit[0], dec!(100.33));
    }

    #[test]
    fn unsorted_input_is_sorted_and_repeatable() {
        let mut txs = sample_history();
        txs.reverse();
        let first = process(&txs);
        let second = process(&txs);
        assert_eq!(first, second);
        assert_eq!(first, process(&sample_history()));
    }

    #[test]
    fn equal_timestamps_keep_input_order() {
        let txs = vec![
            buy("2024-01-01", dec!(1), dec!(100), dec!(0)),
            sell("2024-01-02", dec!(1), dec!(150), dec!(0)),
            buy("2024-01-02", dec!(1), dec!(200), dec!(0)),
        ];
        let ledger = process(&txs);
        assert_eq!(ledger[1].kind, EventKind::Disposal);
        assert_eq!(ledger[1].disposition.as_ref().unwrap().gain, dec!(50));
        assert_eq!(ledger[2].kind, EventKind::Acquisition);
        assert_eq!(ledger[2].per_unit_cost_after, dec!(200));

        let swapped = vec![txs[0].clone(), txs[2].clone(), txs[1].clone()];
        let ledger = process(&swapped);
        assert_eq!(ledger[1].kind, EventKind::Acquisition);
        assert_eq!(ledger[2].disposition.as_ref().unwrap().cost_basis, dec!(150));
    }

    #[test]
    fn unrecognized_types_are_skipped() {
        let txs = vec![
            buy("2024-01-01", dec!(1), dec!(100), dec!(0)),
            Transaction::new(at("2024-01-02"), "stake", dec!(5), dec!(100), dec!(0)),
            sell("2024-01-03", dec!(1), dec!(120), dec!(0)),
        ];
        let ledger = process(&txs);
        assert_eq!(ledger.len(), 2);
        assert_eq!(ledger[1].total_units_after, Decimal::ZERO);
    }

    #[test]
    fn disposal_from_empty_pool_has_zero_cost_basis() {
        let ledger = process(&[sell("2024-01-01", dec!(1), dec!(100), dec!(0))]);
        let d = ledger[0].disposition.as_ref().unwrap();
        assert_eq!(d.cost_basis, Decimal::ZERO);
        assert_eq!(d.gain, dec!(100));
        assert_eq!(ledger[0].per_unit_cost_after, Decimal::ZERO);
    }

    #[test]
    fn zero_price_acquisition_lowers_average() {
        let ledger = process(&[
            buy("2024-01-01", dec!(1), dec!(100), dec!(0)),
            Transaction::new(at("2024-01-02"), "receive", dec!(1), dec!(0), dec!(0)),
        ]);
        assert_eq!(ledger[1].per_unit_cost_after, dec!(50));
    }

    #[test]
    fn full_disposal_clears_pool() {
        let ledger = process(&[
            buy("2024-01-01", dec!(3), dec!(33.333333), dec!(0)),
            sell("2024-02-01", dec!(3), dec!(40), dec!(0)),
        ]);
        let last = ledger.last().unwrap();
        assert_eq!(last.total_units_after, Decimal::ZERO);
        assert_eq!(last.total_cost_after, Decimal::ZERO);
        assert_eq!(last.per_unit_cost_after, Decimal::ZERO);
    }

    #[test]
    fn loss_with_old_purchase_is_not_flagged() {
        let ledger = process(&[
            buy("2024-01-01", dec!(1), dec!(100), dec!(0)),
            sell("2024-03-01", dec!(1), dec!(50), dec!(0)),
        ]);
        let d = ledger[1].disposition.as_ref().unwrap();
        assert_eq!(d.gain, dec!(-50));
        assert!(!d.superficial_loss);
        assert!(!d.superficial_loss_note.is_empty());
    }

    #[test]
    fn superficial_window_boundaries() {
        let flagged = |buy_date: &str| {
            let ledger = process(&[
                buy("2023-01-01", dec!(2), dec!(100), dec!(0)),
                buy(buy_date, dec!(0.01), dec!(100), dec!(0)),
                sell("2024-04-20", dec!(1), dec!(50), dec!(0)),
            ]);
            ledger[2].disposition.as_ref().unwrap().superficial_loss
        };
        // 10 days before
        assert!(flagged("2024-04-10"));
        // 31 days before
        assert!(!flagged("2024-03-20"));
    }

    #[test]
    fn opening_pool_is_carried_forward() {
        let opening = Pool::new(dec!(30000), dec!(0.5));
        let ledger = process_with_opening(&[sell("2024-06-01", dec!(0.25), dec!(70000), dec!(0))], opening);
        let d = ledger[0].disposition.as_ref().unwrap();
        assert_eq!(d.cost_basis, dec!(15000));
        assert_eq!(d.gain, dec!(2500));
        assert_eq!(ledger[0].total_units_after, dec!(0.25));
    }

    #[test]
    fn chunked_runs_match_single_run_when_pool_is_carried() {
        let history = sample_history();
        let whole = process(&history);
        let first = process(&history[..3]);
        let carried = first.last().unwrap().pool_after();
        let second = process_with_opening(&history[3..], carried);
        assert_eq!(second.last().unwrap().pool_after(), whole.last().unwrap().pool_after());
    }

    #[test]
    fn empty_input_yields_empty_ledger() {
        assert!(process(&[]).is_empty());
    }
}
