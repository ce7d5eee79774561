use super::acb::LedgerEntry;
use super::pool::round_cents;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::io::Write;

pub const DEFAULT_DESCRIPTION: &str = "Bitcoin (BTC)";

/// One disposal laid out for CRA Schedule 3 (capital gains)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schedule3Row {
    #[serde(rename = "Date of Disposition")]
    pub date: String,
    #[serde(rename = "Description")]
    pub description: String,
    #[serde(rename = "Number of Units")]
    pub units: String,
    #[serde(rename = "Proceeds of Disposition")]
    pub proceeds: String,
    #[serde(rename = "Adjusted Cost Base")]
    pub adjusted_cost_base: String,
    #[serde(rename = "Outlays and Expenses")]
    pub outlays: String,
    #[serde(rename = "Gain (or Loss)")]
    pub gain: String,
    #[serde(rename = "Superficial Loss")]
    pub superficial_loss: String,
    #[serde(rename = "Notes")]
    pub notes: String,
}

fn money(amount: Decimal) -> String {
    format!("{:.2}", round_cents(amount))
}

/// Disposals in `year` as Schedule 3 rows.
///
/// Proceeds are reported gross, with the fee shown separately as an outlay.
pub fn schedule3_rows(entries: &[LedgerEntry], year: i32, description: &str) -> Vec<Schedule3Row> {
    entries
        .iter()
        .filter(|e| e.tax_year() == year)
        .filter_map(|e| {
            let d = e.disposition.as_ref()?;
            Some(Schedule3Row {
                date: e.date().format("%Y-%m-%d").to_string(),
                description: format!("{} - {}", description, e.tx_type),
                units: e.quantity.normalize().to_string(),
                proceeds: money(d.gross_proceeds(e.fee)),
                adjusted_cost_base: money(d.cost_basis),
                outlays: money(e.fee),
                gain: money(d.gain),
                superficial_loss: (if d.superficial_loss { "YES - REVIEW" } else { "No" })
                    .to_string(),
                notes: if d.superficial_loss {
                    d.superficial_loss_note.clone()
                } else {
                    e.label.clone()
                },
            })
        })
        .collect()
}

pub fn write_schedule3_csv<W: Write>(rows: &[Schedule3Row], writer: W) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for row in rows {
        wtr.serialize(row)?;
    }
    wtr.flush()?;
    Ok(())
}
