//! Export command - Schedule 3 capital gains rows for a tax year

use crate::cmd::{print_warnings, InputArgs};
use crate::core::acb::process;
use crate::core::export::{schedule3_rows, write_schedule3_csv, DEFAULT_DESCRIPTION};
use clap::Args;
use std::fs::File;
use std::io;
use std::path::PathBuf;

#[derive(Args, Debug)]
pub struct ExportCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to export
    #[arg(short, long)]
    year: i32,

    /// Property description for each row
    #[arg(short, long, default_value = DEFAULT_DESCRIPTION)]
    description: String,

    /// Write CSV here instead of stdout
    #[arg(short, long)]
    output: Option<PathBuf>,
}

impl ExportCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (transactions, warnings) = self.input.load()?;
        print_warnings(&warnings);

        let ledger = process(&transactions);
        let rows = schedule3_rows(&ledger, self.year, &self.description);
        if rows.is_empty() {
            log::warn!("No disposals in {}", self.year);
        }

        match &self.output {
            Some(path) => {
                write_schedule3_csv(&rows, File::create(path)?)?;
                eprintln!("Wrote {} rows to {}", rows.len(), path.display());
                Ok(())
            }
            None => write_schedule3_csv(&rows, io::stdout()),
        }
    }
}
