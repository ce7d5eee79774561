//! Validate command - surface data quality issues without generating full reports

use crate::cmd::{format_cents, format_quantity, year_label, InputArgs};
use crate::core::acb::{process, LedgerEntry};
use crate::core::superficial::find_forward_repurchases;
use crate::core::warnings::Warning;
use chrono::{Datelike, NaiveDate};
use clap::Args;
use rust_decimal::Decimal;
use serde::Serialize;

#[derive(Args, Debug)]
pub struct ValidateCommand {
    #[command(flatten)]
    input: InputArgs,

    /// Calendar year to check
    #[arg(short, long)]
    year: Option<i32>,

    /// Output as JSON instead of formatted text
    #[arg(long)]
    json: bool,
}

/// A validation issue for output
#[derive(Debug, Clone, Serialize)]
struct ValidationIssue {
    #[serde(rename = "type")]
    issue_type: &'static str,
    date: String,
    message: String,
}

/// JSON output structure
#[derive(Debug, Serialize)]
struct ValidationOutput {
    tax_year: String,
    issue_count: usize,
    issues: Vec<ValidationIssue>,
}

impl ValidateCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        let (transactions, warnings) = self.input.load()?;
        let ledger = process(&transactions);

        let mut issues: Vec<(NaiveDate, ValidationIssue)> = Vec::new();
        issues.extend(warnings.iter().filter_map(price_issue));
        issues.extend(insufficient_holdings(&ledger));
        issues.extend(flagged_losses(&ledger));
        issues.extend(find_forward_repurchases(&ledger).into_iter().map(|r| {
            let dates: Vec<String> = r
                .acquisitions
                .iter()
                .map(|a| a.format("%Y-%m-%d").to_string())
                .collect();
            let date = r.disposal_at.date();
            (
                date,
                ValidationIssue {
                    issue_type: "Repurchase",
                    date: date.format("%Y-%m-%d").to_string(),
                    message: format!(
                        "Loss of ${} followed by acquisitions on {} (within 30 days after). \
                         Confirm whether this is a superficial loss.",
                        format_cents(r.gain.abs()),
                        dates.join(", ")
                    ),
                },
            )
        }));

        issues.retain(|(date, _)| self.year.is_none_or(|y| date.year() == y));
        issues.sort_by_key(|(date, _)| *date);
        let issues: Vec<ValidationIssue> = issues.into_iter().map(|(_, issue)| issue).collect();

        if self.json {
            self.print_json(&issues)?;
        } else {
            self.print_text(&issues);
        }

        // Exit with code 1 if issues found
        if !issues.is_empty() {
            std::process::exit(1);
        }
        Ok(())
    }

    fn print_text(&self, issues: &[ValidationIssue]) {
        println!();
        println!("VALIDATION RESULTS ({})", year_label(self.year));
        println!();

        if issues.is_empty() {
            println!("\u{2713} No issues found.");
        } else {
            println!("\u{26A0} {} issue(s) found:", issues.len());
            println!();

            for (i, issue) in issues.iter().enumerate() {
                println!("  {}. [{}] {}", i + 1, issue.issue_type, issue.date);
                println!("     {}", issue.message);
                println!();
            }
        }
    }

    fn print_json(&self, issues: &[ValidationIssue]) -> anyhow::Result<()> {
        let output = ValidationOutput {
            tax_year: year_label(self.year),
            issue_count: issues.len(),
            issues: issues.to_vec(),
        };

        println!("{}", serde_json::to_string_pretty(&output)?);
        Ok(())
    }
}

fn price_issue(warning: &Warning) -> Option<(NaiveDate, ValidationIssue)> {
    let (date, issue_type) = match warning {
        Warning::UnresolvedPrice { date } => (*date, "UnresolvedPrice"),
        Warning::FallbackPrice { date, .. } => (*date, "FallbackPrice"),
        Warning::MalformedRow { .. } | Warning::NoTransactions => return None,
    };
    Some((
        date,
        ValidationIssue {
            issue_type,
            date: date.format("%Y-%m-%d").to_string(),
            message: warning.to_string(),
        },
    ))
}

/// Disposals of more units than the pool held at the time
fn insufficient_holdings(ledger: &[LedgerEntry]) -> Vec<(NaiveDate, ValidationIssue)> {
    let mut held = Decimal::ZERO;
    let mut issues = Vec::new();
    for entry in ledger {
        if entry.disposition.is_some() && entry.quantity > held {
            let issue_type = if held.is_zero() {
                "NoHoldings"
            } else {
                "InsufficientHoldings"
            };
            issues.push((
                entry.date(),
                ValidationIssue {
                    issue_type,
                    date: entry.date().format("%Y-%m-%d").to_string(),
                    message: format!(
                        "Disposal of {} units but only {} held - cost basis is understated",
                        format_quantity(entry.quantity),
                        format_quantity(held)
                    ),
                },
            ));
        }
        held = entry.total_units_after;
    }
    issues
}

fn flagged_losses(ledger: &[LedgerEntry]) -> Vec<(NaiveDate, ValidationIssue)> {
    ledger
        .iter()
        .filter_map(|entry| {
            let d = entry.disposition.as_ref().filter(|d| d.superficial_loss)?;
            Some((
                entry.date(),
                ValidationIssue {
                    issue_type: "SuperficialLoss",
                    date: entry.date().format("%Y-%m-%d").to_string(),
                    message: d.superficial_loss_note.clone(),
                },
            ))
        })
        .collect()
}
