use chrono::NaiveDate;
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Non-fatal problems found while importing or pricing transactions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(tag = "type")]
pub enum Warning {
    /// No price could be found; the transaction was priced at zero.
    UnresolvedPrice {
        #[schemars(with = "String")]
        date: NaiveDate,
    },
    /// Price came from the coarse monthly table rather than daily data.
    FallbackPrice {
        #[schemars(with = "String")]
        date: NaiveDate,
        #[schemars(with = "f64")]
        price: Decimal,
    },
    /// A source row could not be parsed and was dropped.
    MalformedRow { row: usize, reason: String },
    /// The import produced no transactions at all.
    NoTransactions,
}

impl fmt::Display for Warning {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Warning::UnresolvedPrice { date } => write!(
                f,
                "{}: no price data available, using 0. Update before filing.",
                date.format("%Y-%m-%d")
            ),
            Warning::FallbackPrice { date, price } => write!(
                f,
                "{}: using monthly average price ${:.2}. Load daily prices for accuracy.",
                date.format("%Y-%m-%d"),
                price
            ),
            Warning::MalformedRow { row, reason } => write!(f, "Row {}: {}", row, reason),
            Warning::NoTransactions => write!(f, "No valid transactions found"),
        }
    }
}
