//! Ledger command - every processed transaction with the running pool

use crate::cmd::{
    format_cents, format_money, format_money_signed, format_quantity, print_warnings, year_label,
    InputArgs,
};
use crate::core::acb::{process, LedgerEntry};
use clap::Args;
use serde::Serialize;
use std::io;
use tabled::{
    settings::{object::Rows, Alignment, Modify, Style},
    Table, Tabled,
};

#[derive(Args, Debug)]
pub struct LedgerCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to show
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as CSV instead of formatted table
    #[arg(long)]
    csv: bool,
}

impl LedgerCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (transactions, warnings) = self.input.load()?;
        print_warnings(&warnings);

        let ledger = process(&transactions);
        let entries: Vec<&LedgerEntry> = ledger
            .iter()
            .filter(|e| self.year.is_none_or(|y| e.tax_year() == y))
            .collect();

        if self.csv {
            write_csv(&entries)
        } else {
            self.print_table(&entries);
            Ok(())
        }
    }

    fn print_table(&self, entries: &[&LedgerEntry]) {
        let year_str = year_label(self.year);
        if entries.is_empty() {
            println!("No transactions found ({})", year_str);
            return;
        }

        let rows: Vec<LedgerRow> = entries
            .iter()
            .enumerate()
            .map(|(i, e)| LedgerRow {
                row_num: i + 1,
                date: e.date().format("%Y-%m-%d").to_string(),
                tx_type: e.tx_type.to_string(),
                quantity: format_quantity(e.quantity),
                price: format_money(e.unit_price),
                fee: format_money(e.fee),
                proceeds: e
                    .disposition
                    .as_ref()
                    .map_or(String::new(), |d| format_money(d.proceeds)),
                cost_basis: e
                    .disposition
                    .as_ref()
                    .map_or(String::new(), |d| format_money(d.cost_basis)),
                gain: e
                    .disposition
                    .as_ref()
                    .map_or(String::new(), |d| format_money_signed(d.gain)),
                superficial: e
                    .disposition
                    .as_ref()
                    .map_or(String::new(), |d| {
                        (if d.superficial_loss { "YES" } else { "" }).to_string()
                    }),
                units: format_quantity(e.total_units_after),
                total_cost: format_money(e.total_cost_after),
                acb: format_money(e.per_unit_cost_after),
            })
            .collect();

        println!();
        println!("ACB LEDGER ({})", year_str);
        println!();

        let table = Table::new(rows)
            .with(Style::rounded())
            .with(Modify::new(Rows::new(1..)).with(Alignment::right()))
            .to_string();
        println!("{}", table);

        for entry in entries {
            if let Some(d) = entry.disposition.as_ref().filter(|d| d.superficial_loss) {
                println!("{}: {}", entry.date(), d.superficial_loss_note);
            }
        }
    }
}

#[derive(Debug, Clone, Tabled)]
struct LedgerRow {
    #[tabled(rename = "#")]
    row_num: usize,
    #[tabled(rename = "Date")]
    date: String,
    #[tabled(rename = "Type")]
    tx_type: String,
    #[tabled(rename = "Quantity")]
    quantity: String,
    #[tabled(rename = "Price")]
    price: String,
    #[tabled(rename = "Fee")]
    fee: String,
    #[tabled(rename = "Proceeds")]
    proceeds: String,
    #[tabled(rename = "Cost Basis")]
    cost_basis: String,
    #[tabled(rename = "Gain/Loss")]
    gain: String,
    #[tabled(rename = "Superficial")]
    superficial: String,
    #[tabled(rename = "Units Held")]
    units: String,
    #[tabled(rename = "Total ACB")]
    total_cost: String,
    #[tabled(rename = "ACB/Unit")]
    acb: String,
}

/// Ledger row for CSV output
#[derive(Debug, Serialize)]
struct LedgerCsvRow {
    date: String,
    #[serde(rename = "type")]
    tx_type: String,
    quantity: String,
    price: String,
    fee: String,
    label: String,
    price_confidence: String,
    proceeds: String,
    cost_basis: String,
    gain: String,
    superficial_loss: String,
    superficial_loss_note: String,
    total_units: String,
    total_cost: String,
    per_unit_cost: String,
}

impl From<&LedgerEntry> for LedgerCsvRow {
    fn from(e: &LedgerEntry) -> Self {
        let d = e.disposition.as_ref();
        LedgerCsvRow {
            date: e.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx_type: e.tx_type.to_string(),
            quantity: e.quantity.normalize().to_string(),
            price: format_cents(e.unit_price),
            fee: format_cents(e.fee),
            label: e.label.clone(),
            price_confidence: e
                .price_confidence
                .map_or(String::new(), |c| c.as_str().to_string()),
            proceeds: d.map_or(String::new(), |d| format_cents(d.proceeds)),
            cost_basis: d.map_or(String::new(), |d| format_cents(d.cost_basis)),
            gain: d.map_or(String::new(), |d| format_cents(d.gain)),
            superficial_loss: d.map_or(String::new(), |d| d.superficial_loss.to_string()),
            superficial_loss_note: d.map_or(String::new(), |d| d.superficial_loss_note.clone()),
            total_units: e.total_units_after.normalize().to_string(),
            total_cost: format_cents(e.total_cost_after),
            per_unit_cost: format_cents(e.per_unit_cost_after),
        }
    }
}

fn write_csv(entries: &[&LedgerEntry]) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(io::stdout());
    for entry in entries {
        wtr.serialize(LedgerCsvRow::from(*entry))?;
    }
    wtr.flush()?;
    Ok(())
}
