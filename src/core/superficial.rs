//! Superficial-loss detection
//!
//! A loss is only flagged for review here; the amount is never denied or
//! moved onto replacement property.

use super::acb::LedgerEntry;
use super::transaction::EventKind;
use chrono::{Duration, NaiveDateTime};
use rust_decimal::Decimal;
use serde::Serialize;

/// Days either side of a disposal in which a repurchase makes a loss superficial
pub const SUPERFICIAL_LOSS_DAYS: i64 = 30;

/// Timestamps of acquisitions seen so far in a run, kept in ascending order
#[derive(Debug, Clone, Default)]
pub struct AcquisitionIndex {
    timestamps: Vec<NaiveDateTime>,
}

impl AcquisitionIndex {
    pub fn new() -> Self {
        AcquisitionIndex::default()
    }

    pub fn push(&mut self, at: NaiveDateTime) {
        let pos = self.timestamps.partition_point(|t| *t <= at);
        self.timestamps.insert(pos, at);
    }

    pub fn len(&self) -> usize {
        self.timestamps.len()
    }

    pub fn is_empty(&self) -> bool {
        self.timestamps.is_empty()
    }

    /// Acquisitions with `start <= t < end`, earliest first
    pub fn range(&self, start: NaiveDateTime, end: NaiveDateTime) -> &[NaiveDateTime] {
        let lo = self.timestamps.partition_point(|t| *t < start);
        let hi = self.timestamps.partition_point(|t| *t < end);
        &self.timestamps[lo..hi.max(lo)]
    }
}

/// Outcome of checking one loss-making disposal
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SuperficialLossCheck {
    pub flagged: bool,
    pub note: String,
}

/// Look back over the acquisitions already processed in this run for one
/// within 30 days before the disposal.
///
/// Acquisitions after the disposal are not visible here, so both outcomes
/// carry a note asking for the following 30 days to be checked by hand.
pub fn check_superficial_loss(
    disposal_at: NaiveDateTime,
    prior: &AcquisitionIndex,
) -> SuperficialLossCheck {
    let window_start = disposal_at - Duration::days(SUPERFICIAL_LOSS_DAYS);

    match prior.range(window_start, disposal_at).first() {
        Some(acquired) => {
            log::debug!(
                "Disposal on {} flagged: acquisition on {} within {} days before",
                disposal_at,
                acquired,
                SUPERFICIAL_LOSS_DAYS
            );
            SuperficialLossCheck {
                flagged: true,
                note: format!(
                    "POTENTIAL SUPERFICIAL LOSS: acquired on {} (within {} days before this \
                     disposal). Review whether still held {} days after the disposal.",
                    acquired.format("%Y-%m-%d"),
                    SUPERFICIAL_LOSS_DAYS,
                    SUPERFICIAL_LOSS_DAYS
                ),
            }
        }
        None => SuperficialLossCheck {
            flagged: false,
            note: format!(
                "Check for acquisitions within {} days AFTER this disposal before claiming \
                 the loss.",
                SUPERFICIAL_LOSS_DAYS
            ),
        },
    }
}

/// A loss disposal followed by acquisitions inside the forward window
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ForwardRepurchase {
    pub disposal_at: NaiveDateTime,
    pub gain: Decimal,
    pub already_flagged: bool,
    pub acquisitions: Vec<NaiveDateTime>,
}

/// Scan a complete ledger for acquisitions in the 30 days after each loss.
///
/// Review aid only: the flags on the ledger entries are left as they are.
pub fn find_forward_repurchases(entries: &[LedgerEntry]) -> Vec<ForwardRepurchase> {
    let mut index = AcquisitionIndex::new();
    for entry in entries {
        if entry.kind == EventKind::Acquisition {
            index.push(entry.timestamp);
        }
    }

    entries
        .iter()
        .filter_map(|entry| {
            let disposition = entry.disposition.as_ref()?;
            if disposition.gain >= Decimal::ZERO {
                return None;
            }
            let window_end = entry.timestamp + Duration::days(SUPERFICIAL_LOSS_DAYS);
            // (disposal, disposal + 30 days]
            let acquisitions: Vec<_> = index
                .range(entry.timestamp, window_end + Duration::nanoseconds(1))
                .iter()
                .copied()
                .filter(|t| *t > entry.timestamp)
                .collect();
            if acquisitions.is_empty() {
                return None;
            }
            Some(ForwardRepurchase {
                disposal_at: entry.timestamp,
                gain: disposition.gain,
                already_flagged: disposition.superficial_loss,
                acquisitions,
            })
        })
        .collect()
}
