//! Schema command - print expected input formats

use crate::core::transaction::TransactionInput;
use clap::Args;
use schemars::schema_for;

#[derive(Args, Debug)]
pub struct SchemaCommand {
    /// Output format: json-schema, csv-header or csv-fields
    #[arg(value_enum, default_value = "json-schema")]
    format: SchemaFormat,
}

#[derive(Debug, Clone, Copy, clap::ValueEnum)]
pub enum SchemaFormat {
    /// JSON Schema for the input format
    JsonSchema,
    /// CSV header row with column names
    CsvHeader,
    /// CSV column descriptions
    CsvFields,
}

impl SchemaCommand {
    pub fn exec(&self) -> anyhow::Result<()> {
        match self.format {
            SchemaFormat::JsonSchema => print_json_schema(),
            SchemaFormat::CsvHeader => {
                println!("{}", CSV_COLUMNS.join(","));
                Ok(())
            }
            SchemaFormat::CsvFields => {
                print_csv_fields();
                Ok(())
            }
        }
    }
}

fn print_json_schema() -> anyhow::Result<()> {
    let schema = schema_for!(TransactionInput);
    println!("{}", serde_json::to_string_pretty(&schema)?);
    Ok(())
}

fn print_csv_fields() {
    println!("CSV Input Format");
    println!("================");
    println!();
    for (name, required, description) in CSV_FIELD_DESCRIPTIONS {
        let req = if *required { "required" } else { "optional" };
        println!("{:18} ({:8})  {}", name, req, description);
    }
    println!();
    println!("Amounts are in the reporting currency (CAD). Rows with an empty price");
    println!("are priced from --prices or the built-in monthly table.");
}

const CSV_COLUMNS: &[&str] = &[
    "date",
    "type",
    "quantity",
    "price",
    "fee",
    "label",
    "price_confidence",
];

const CSV_FIELD_DESCRIPTIONS: &[(&str, bool, &str)] = &[
    (
        "date",
        true,
        "Transaction time (YYYY-MM-DD, YYYY-MM-DD HH:MM:SS or RFC3339)",
    ),
    ("type", true, "buy, receive, sell, spend or send"),
    ("quantity", true, "Units of the asset (positive)"),
    ("price", false, "Price per unit; leave empty to look up"),
    ("fee", false, "Fee paid, added to cost or taken from proceeds"),
    ("label", false, "Free-text note"),
    (
        "price_confidence",
        false,
        "exact, nearest_within_7_days, monthly_fallback or unresolved",
    ),
];
