//! Import command - normalize a wallet export into canonical transactions CSV

use crate::cmd::{print_warnings, PriceArgs};
use crate::core::import::import_wallet_csv;
use crate::core::price::attach_prices;
use crate::core::transaction::write_transactions_csv;
use clap::Args;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ImportCommand {
    /// Wallet CSV export (e.g. from Sparrow)
    file: PathBuf,

    #[command(flatten)]
    prices: PriceArgs,

    /// Write transactions here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ImportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let reader = BufReader::new(File::open(&self.file)?);
        let mut import = import_wallet_csv(reader)?;
        log::info!(
            "Read {} transactions from {}",
            import.transactions.len(),
            self.file.display()
        );

        let table = self.prices.price_table()?;
        let price_warnings = attach_prices(&mut import.transactions, &table);
        import.warnings.extend(price_warnings);
        print_warnings(&import.warnings);

        match &self.output {
            Some(path) => write_transactions_csv(&import.transactions, File::create(path)?),
            None => write_transactions_csv(&import.transactions, io::stdout()),
        }
    }
}
