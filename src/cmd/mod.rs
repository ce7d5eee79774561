pub mod export;
pub mod import;
pub mod ledger;
pub mod schema;
pub mod summary;
pub mod validate;

use crate::core::price::{attach_prices, PriceTable};
use crate::core::transaction::{self, Transaction};
use crate::core::warnings::Warning;
use crate::core::round_cents;
use clap::Args;
use rust_decimal::Decimal;
use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::{Path, PathBuf};

/// Where prices for unpriced transactions come from
#[derive(Args, Debug, Clone)]
pub struct PriceArgs {
    /// Daily price CSV (date and close/price columns)
    #[arg(short, long)]
    pub prices: Option<PathBuf>,

    /// Do not fall back to built-in monthly average prices
    #[arg(long)]
    pub no_fallback: bool,
}

impl PriceArgs {
    pub fn price_table(&self) -> anyhow::Result<PriceTable> {
        let mut table = if self.no_fallback {
            PriceTable::without_fallback()
        } else {
            PriceTable::with_fallback()
        };
        if let Some(path) = &self.prices {
            let loaded = table.read_csv(BufReader::new(File::open(path)?))?;
            log::info!("Loaded {} daily prices from {}", loaded, path.display());
        }
        Ok(table)
    }
}

/// Canonical transactions input shared by the reporting commands
#[derive(Args, Debug)]
pub struct InputArgs {
    /// Transactions file (CSV, or JSON by extension). Reads CSV from stdin if "-".
    #[arg(default_value = "-")]
    pub file: PathBuf,

    #[command(flatten)]
    pub prices: PriceArgs,
}

impl InputArgs {
    /// Read transactions and price any that arrived without a price
    pub fn load(&self) -> anyhow::Result<(Vec<Transaction>, Vec<Warning>)> {
        let mut transactions = read_transactions(&self.file)?;
        let table = self.prices.price_table()?;
        let warnings = attach_prices(&mut transactions, &table);
        Ok((transactions, warnings))
    }
}

/// Read canonical transactions from a file (or stdin with "-")
pub fn read_transactions(path: &Path) -> anyhow::Result<Vec<Transaction>> {
    if path.as_os_str() == "-" {
        return read_from_stdin();
    }
    let reader = BufReader::new(File::open(path)?);
    let is_json = path
        .extension()
        .is_some_and(|ext| ext.eq_ignore_ascii_case("json"));
    if is_json {
        transaction::read_transactions_json(reader)
    } else {
        transaction::read_transactions_csv(reader)
    }
}

fn read_from_stdin() -> anyhow::Result<Vec<Transaction>> {
    let stdin = io::stdin();
    let mut reader = BufReader::new(stdin.lock());

    let mut buffer = Vec::new();
    reader.read_to_end(&mut buffer)?;

    if buffer.is_empty() {
        anyhow::bail!("No input received. Provide a file or pipe data to stdin.");
    }

    transaction::read_transactions_csv(io::Cursor::new(buffer))
}

pub fn print_warnings(warnings: &[Warning]) {
    for warning in warnings {
        eprintln!("Warning: {}", warning);
    }
}

/// Amount rounded half-up to cents, without a currency symbol
pub fn format_cents(amount: Decimal) -> String {
    format!("{:.2}", round_cents(amount))
}

pub fn format_money(amount: Decimal) -> String {
    format!("${:.2}", round_cents(amount))
}

pub fn format_money_signed(amount: Decimal) -> String {
    if amount < Decimal::ZERO {
        format!("-${:.2}", round_cents(amount.abs()))
    } else {
        format_money(amount)
    }
}

pub fn format_quantity(qty: Decimal) -> String {
    let s = format!("{:.8}", qty);
    let trimmed = s.trim_end_matches('0').trim_end_matches('.');
    trimmed.to_string()
}

pub fn year_label(year: Option<i32>) -> String {
    year.map_or("All Years".to_string(), |y| y.to_string())
}
