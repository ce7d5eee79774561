use acbc::cmd;
use clap::{Parser, Subcommand};

/// Adjusted Cost Base calculator for weighted-average capital gains
#[derive(Parser, Debug)]
#[command(name = "acbc", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Show every transaction with the running cost pool
    Ledger(cmd::ledger::LedgerCommand),
    /// Capital gains totals and taxable amount
    Summary(cmd::summary::SummaryCommand),
    /// Export disposals as Schedule 3 CSV
    Export(cmd::export::ExportCommand),
    /// Normalize a wallet export into transactions CSV
    Import(cmd::import::ImportCommand),
    /// Check data quality and possible superficial losses
    Validate(cmd::validate::ValidateCommand),
    /// Print the expected input formats
    Schema(cmd::schema::SchemaCommand),
}

fn main() -> anyhow::Result<()> {
    pretty_env_logger::init();

    let cli = Cli::parse();
    match cli.command {
        Command::Ledger(ledger) => ledger.exec(),
        Command::Summary(summary) => summary.exec(),
        Command::Export(export) => export.exec(),
        Command::Import(import) => import.exec(),
        Command::Validate(validate) => validate.exec(),
        Command::Schema(schema) => schema.exec(),
    }
}
