//! Summary command - capital gains totals and taxable amount for a period

use crate::cmd::{
    format_cents, format_money, format_money_signed, format_quantity, print_warnings, year_label,
    InputArgs,
};
use crate::core::acb::process;
use crate::core::summary::{summarize, Summary, DEFAULT_INCLUSION_RATE};
use clap::Args;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct SummaryCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to report
    #[arg(short, long)]
    year: Option<i32>,

    /// Share of the net gain that is taxable
    #[arg(long, default_value_t = DEFAULT_INCLUSION_RATE, value_parser = parse_inclusion_rate)]
    inclusion_rate: Decimal,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// Summary data for JSON output
#[derive(Debug, Serialize)]
struct SummaryData {
    tax_year: String,
    disposal_count: usize,
    total_gains: String,
    total_losses: String,
    net_gain: String,
    inclusion_rate: String,
    taxable_gain: String,
    superficial_loss_count: usize,
    holdings: HoldingsData,
}

#[derive(Debug, Serialize)]
struct HoldingsData {
    units: String,
    total_cost: String,
    per_unit_cost: String,
}

impl SummaryCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (transactions, warnings) = self.input.load()?;
        print_warnings(&warnings);

        let ledger = process(&transactions);
        let summary = summarize(&ledger, self.year, self.inclusion_rate);

        if self.json {
            print_json(&summary)
        } else {
            print_summary(&summary);
            Ok(())
        }
    }
}

fn print_summary(summary: &Summary) {
    println!();
    println!("CAPITAL GAINS SUMMARY ({})", year_label(summary.year));
    println!();

    println!("DISPOSALS");
    println!("  Count: {}", summary.disposal_count);
    println!(
        "  Gains: {} | Losses: {} | Net: {}",
        format_money(summary.total_gains),
        format_money(summary.total_losses),
        format_money_signed(summary.net_gain)
    );
    println!(
        "  Taxable @ {}%: {}",
        (summary.inclusion_rate * dec!(100)).normalize(),
        format_money(summary.taxable_gain)
    );
    if summary.superficial_loss_count > 0 {
        println!(
            "  Superficial losses excluded: {} (review before filing)",
            summary.superficial_loss_count
        );
    }
    println!();

    println!("HOLDINGS");
    println!(
        "  Units: {} | Total ACB: {} | ACB/Unit: {}",
        format_quantity(summary.holdings.total_units),
        format_money(summary.holdings.total_cost),
        format_money(summary.holdings.per_unit_cost)
    );
    println!();
}

fn print_json(summary: &Summary) -> anyhow::Result<()> {
    let data = SummaryData {
        tax_year: year_label(summary.year),
        disposal_count: summary.disposal_count,
        total_gains: format_cents(summary.total_gains),
        total_losses: format_cents(summary.total_losses),
        net_gain: format_cents(summary.net_gain),
        inclusion_rate: summary.inclusion_rate.normalize().to_string(),
        taxable_gain: format_cents(summary.taxable_gain),
        superficial_loss_count: summary.superficial_loss_count,
        holdings: HoldingsData {
            units: summary.holdings.total_units.normalize().to_string(),
            total_cost: format_cents(summary.holdings.total_cost),
            per_unit_cost: format_cents(summary.holdings.per_unit_cost),
        },
    };

    println!("{}", serde_json::to_string_pretty(&data)?);
    Ok(())
}

fn parse_inclusion_rate(s: &str) -> Result<Decimal, String> {
    let rate: Decimal = s
        .parse()
        .map_err(|_| format!("'{}' is not a decimal number", s))?;
    if rate < Decimal::ZERO || rate > Decimal::ONE {
        return Err(format!("inclusion rate must be between 0 and 1, got {}", rate));
    }
    Ok(rate)
}
