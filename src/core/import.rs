//! Wallet export normalizer
//!
//! Turns a wallet CSV export (Sparrow style: date, label, signed value,
//! balance, fee, txid) into canonical transactions. Prices are left at zero
//! for [`attach_prices`](super::price::attach_prices) to fill in.

use super::transaction::{Transaction, TxType};
use super::warnings::Warning;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use std::io::Read;
use std::str::FromStr;

/// Minor units (satoshis) per whole unit
pub const MINOR_UNITS_PER_UNIT: Decimal = dec!(100000000);

/// Integral amounts above this are read as minor units
const WHOLE_UNIT_CEILING: Decimal = dec!(21);

const DATE_COLUMNS: &[&str] = &["date", "datetime", "timestamp", "time", "date (utc)"];
const LABEL_COLUMNS: &[&str] = &["label", "memo", "note", "description"];
const VALUE_COLUMNS: &[&str] = &["value", "amount", "btc", "sats"];
const FEE_COLUMNS: &[&str] = &["fee", "fees", "tx_fee", "network_fee"];

const BUY_KEYWORDS: &[&str] = &["buy", "purchase", "dca", "exchange", "acquired", "bought"];
const SELL_KEYWORDS: &[&str] = &["sell", "sold", "exchange", "profit", "exit"];
const SPEND_KEYWORDS: &[&str] = &["spend", "payment", "paid", "purchase", "bought"];

#[derive(Debug, thiserror::Error)]
pub enum ImportError {
    #[error("could not find a {0} column in CSV")]
    MissingColumn(&'static str),
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// Transactions read from a wallet export plus any rows that were dropped
#[derive(Debug, Default)]
pub struct WalletImport {
    pub transactions: Vec<Transaction>,
    pub warnings: Vec<Warning>,
}

struct Columns {
    date: usize,
    value: usize,
    label: Option<usize>,
    fee: Option<usize>,
}

impl Columns {
    fn detect(headers: &[String]) -> Result<Self, ImportError> {
        let find = |candidates: &[&str]| {
            candidates
                .iter()
                .find_map(|c| headers.iter().position(|h| h == c))
        };
        Ok(Columns {
            date: find(DATE_COLUMNS).ok_or(ImportError::MissingColumn("date"))?,
            value: find(VALUE_COLUMNS).ok_or(ImportError::MissingColumn("value/amount"))?,
            label: find(LABEL_COLUMNS),
            fee: find(FEE_COLUMNS),
        })
    }
}

/// Read a wallet CSV export. Rows that can't be parsed are dropped with a
/// warning rather than failing the import.
pub fn import_wallet_csv<R: Read>(reader: R) -> Result<WalletImport, ImportError> {
    let mut rdr = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);
    let headers: Vec<String> = rdr
        .headers()?
        .iter()
        .map(|h| h.trim().to_lowercase())
        .collect();
    let columns = Columns::detect(&headers)?;
    if columns.fee.is_some() {
        log::debug!("Fee column present; network fees in asset units are not converted");
    }

    let mut import = WalletImport::default();
    for (idx, record) in rdr.records().enumerate() {
        let row = idx + 1;
        let record = match record {
            Ok(record) => record,
            Err(err) => {
                import.warnings.push(Warning::MalformedRow {
                    row,
                    reason: err.to_string(),
                });
                continue;
            }
        };
        match parse_row(&record, &columns) {
            Ok(tx) => import.transactions.push(tx),
            Err(reason) => {
                log::debug!("Dropping row {}: {}", row, reason);
                import.warnings.push(Warning::MalformedRow { row, reason });
            }
        }
    }

    if import.transactions.is_empty() {
        import.warnings.push(Warning::NoTransactions);
    }
    Ok(import)
}

fn parse_row(record: &csv::StringRecord, columns: &Columns) -> Result<Transaction, String> {
    let date = record.get(columns.date).unwrap_or_default();
    let timestamp =
        parse_wallet_date(date).ok_or_else(|| format!("Could not parse date '{}'", date))?;

    let value = record.get(columns.value).unwrap_or_default();
    let (quantity, outgoing) =
        parse_wallet_amount(value).ok_or_else(|| format!("Could not parse amount '{}'", value))?;
    if quantity.is_zero() {
        return Err(format!("Zero amount '{}'", value));
    }

    let label = columns
        .label
        .and_then(|i| record.get(i))
        .unwrap_or_default()
        .trim()
        .to_string();
    let base = if outgoing { TxType::Send } else { TxType::Receive };

    Ok(Transaction::new(
        timestamp,
        infer_tx_type(base, &label),
        quantity,
        Decimal::ZERO,
        Decimal::ZERO,
    )
    .with_label(label))
}

/// Parse the date formats wallets commonly export.
///
/// Day-first formats are tried before month-first, so an ambiguous
/// `03/04/2024` reads as 3 April.
pub fn parse_wallet_date(s: &str) -> Option<NaiveDateTime> {
    const DATETIME_FORMATS: &[&str] = &[
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
        "%d/%m/%Y %H:%M:%S",
        "%m/%d/%Y %H:%M:%S",
        "%Y/%m/%d %H:%M:%S",
        "%d-%m-%Y %H:%M:%S",
    ];
    const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%m/%d/%Y", "%Y/%m/%d", "%d-%m-%Y"];

    let s = s.trim();
    DATETIME_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(s, fmt).ok())
        .or_else(|| {
            DATE_FORMATS
                .iter()
                .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
                .map(|d| d.and_time(chrono::NaiveTime::MIN))
        })
        .or_else(|| DateTime::parse_from_rfc3339(s).ok().map(|dt| dt.naive_local()))
}

/// Parse a signed wallet amount into whole units and whether it was outgoing.
///
/// Amounts with a fractional part are whole units. Integral amounts above
/// 21 are minor units.
pub fn parse_wallet_amount(s: &str) -> Option<(Decimal, bool)> {
    let s = s.trim();
    if s.is_empty() {
        return None;
    }
    let outgoing = s.starts_with('-');
    let cleaned: String = s
        .trim_start_matches('-')
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let amount = Decimal::from_str(&cleaned).ok()?;

    let fractional = cleaned.contains('.') && amount.fract() != Decimal::ZERO;
    let amount = if fractional {
        amount
    } else if amount > WHOLE_UNIT_CEILING {
        amount / MINOR_UNITS_PER_UNIT
    } else {
        amount
    };
    Some((amount, outgoing))
}

/// Refine a direction-only type using keywords in the wallet label
pub fn infer_tx_type(base: TxType, label: &str) -> TxType {
    let label = label.to_lowercase();
    let has_any = |keywords: &[&str]| keywords.iter().any(|k| label.contains(k));

    match base {
        TxType::Receive if has_any(BUY_KEYWORDS) => TxType::Buy,
        TxType::Send if has_any(SELL_KEYWORDS) => TxType::Sell,
        TxType::Send if has_any(SPEND_KEYWORDS) => TxType::Spend,
        other => other,
    }
}
