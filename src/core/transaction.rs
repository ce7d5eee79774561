use super::price::PriceConfidence;
use chrono::{DateTime, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use schemars::JsonSchema;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;
use std::io::{Read, Write};
use std::str::FromStr;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum TransactionError {
    #[error("invalid datetime: {0}")]
    InvalidDatetime(String),
    #[error("invalid {field} '{value}' on row {row}")]
    InvalidAmount {
        row: usize,
        field: &'static str,
        value: String,
    },
    #[error("negative {field} on row {row}")]
    NegativeAmount { row: usize, field: &'static str },
    #[error("quantity must be greater than zero on row {row}")]
    NonPositiveQuantity { row: usize },
    #[error("invalid price confidence '{value}' on row {row}")]
    InvalidConfidence { row: usize, value: String },
}

/// Whether a transaction adds to or removes from the pool
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum EventKind {
    Acquisition,
    Disposal,
}

/// Display label of a transaction
///
/// `buy` and `receive` are acquisitions, `sell`, `spend` and `send` are
/// disposals. Anything else is kept verbatim and skipped by the engine.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum TxType {
    Buy,
    Receive,
    Sell,
    Spend,
    Send,
    Other(String),
}

impl TxType {
    pub fn kind(&self) -> Option<EventKind> {
        match self {
            TxType::Buy | TxType::Receive => Some(EventKind::Acquisition),
            TxType::Sell | TxType::Spend | TxType::Send => Some(EventKind::Disposal),
            TxType::Other(_) => None,
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            TxType::Buy => "buy",
            TxType::Receive => "receive",
            TxType::Sell => "sell",
            TxType::Spend => "spend",
            TxType::Send => "send",
            TxType::Other(s) => s,
        }
    }
}

impl From<String> for TxType {
    fn from(s: String) -> Self {
        match s.trim().to_lowercase().as_str() {
            "buy" => TxType::Buy,
            "receive" => TxType::Receive,
            "sell" => TxType::Sell,
            "spend" => TxType::Spend,
            "send" => TxType::Send,
            _ => TxType::Other(s),
        }
    }
}

impl From<&str> for TxType {
    fn from(s: &str) -> Self {
        TxType::from(s.to_string())
    }
}

impl From<TxType> for String {
    fn from(t: TxType) -> Self {
        t.as_str().to_string()
    }
}

impl fmt::Display for TxType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl JsonSchema for TxType {
    fn schema_name() -> String {
        "TxType".to_string()
    }

    fn json_schema(gen: &mut schemars::gen::SchemaGenerator) -> schemars::schema::Schema {
        String::json_schema(gen)
    }
}

/// Input root for transaction JSON
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct TransactionInput {
    pub transactions: Vec<Transaction>,
}

/// A single classified, priced transaction of the pooled asset
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct Transaction {
    /// When the transaction occurred (RFC3339, `YYYY-MM-DD HH:MM:SS` or date-only)
    #[serde(rename = "date", deserialize_with = "deserialize_datetime")]
    #[schemars(with = "String")]
    pub timestamp: NaiveDateTime,
    /// buy, receive, sell, spend or send
    #[serde(rename = "type")]
    pub tx_type: TxType,
    /// Units of the asset, always positive
    #[schemars(with = "f64")]
    pub quantity: Decimal,
    /// Price per unit in the reporting currency; 0 when unresolved
    #[serde(rename = "price", default)]
    #[schemars(with = "f64")]
    pub unit_price: Decimal,
    /// Fee in the reporting currency
    #[serde(default)]
    #[schemars(with = "f64")]
    pub fee: Decimal,
    #[serde(default)]
    pub label: String,
    /// How the price was resolved, if it was looked up
    #[serde(default)]
    pub price_confidence: Option<PriceConfidence>,
}

impl Transaction {
    pub fn new(
        timestamp: NaiveDateTime,
        tx_type: impl Into<TxType>,
        quantity: Decimal,
        unit_price: Decimal,
        fee: Decimal,
    ) -> Self {
        Transaction {
            timestamp,
            tx_type: tx_type.into(),
            quantity,
            unit_price,
            fee,
            label: String::new(),
            price_confidence: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = label.into();
        self
    }

    pub fn kind(&self) -> Option<EventKind> {
        self.tx_type.kind()
    }

    pub fn date(&self) -> NaiveDate {
        self.timestamp.date()
    }

    /// True when the price was never supplied and should be looked up
    pub fn needs_price(&self) -> bool {
        self.unit_price.is_zero()
            && matches!(
                self.price_confidence,
                None | Some(PriceConfidence::Unresolved)
            )
    }

    /// Reject amounts the pool can't take and tag an explicitly supplied
    /// zero price so it is not looked up later.
    fn checked(mut self, row: usize, price_given: bool) -> Result<Self, TransactionError> {
        if self.quantity <= Decimal::ZERO {
            return Err(TransactionError::NonPositiveQuantity { row });
        }
        for (field, amount) in [("price", self.unit_price), ("fee", self.fee)] {
            if amount.is_sign_negative() && !amount.is_zero() {
                return Err(TransactionError::NegativeAmount { row, field });
            }
        }
        if price_given && self.unit_price.is_zero() && self.price_confidence.is_none() {
            self.price_confidence = Some(PriceConfidence::Exact);
        }
        Ok(self)
    }
}

/// Flat CSV row for canonical transaction files
#[derive(Debug, Serialize, Deserialize)]
pub struct TransactionRecord {
    pub date: String,
    #[serde(rename = "type")]
    pub tx_type: String,
    pub quantity: String,
    #[serde(default)]
    pub price: Option<String>,
    #[serde(default)]
    pub fee: Option<String>,
    #[serde(default)]
    pub label: Option<String>,
    #[serde(default)]
    pub price_confidence: Option<String>,
}

impl From<&Transaction> for TransactionRecord {
    fn from(tx: &Transaction) -> Self {
        TransactionRecord {
            date: tx.timestamp.format("%Y-%m-%d %H:%M:%S").to_string(),
            tx_type: tx.tx_type.to_string(),
            quantity: tx.quantity.normalize().to_string(),
            // An untagged zero price is written empty so it is looked up on read
            price: (!tx.unit_price.is_zero() || tx.price_confidence.is_some())
                .then(|| tx.unit_price.normalize().to_string()),
            fee: Some(tx.fee.normalize().to_string()),
            label: Some(tx.label.clone()),
            price_confidence: tx.price_confidence.map(|c| c.as_str().to_string()),
        }
    }
}

impl TransactionRecord {
    fn into_transaction(self, row: usize) -> Result<Transaction, TransactionError> {
        let timestamp = parse_datetime(self.date.trim())?;
        let quantity = parse_amount(row, "quantity", Some(&self.quantity))?;
        let price_given = self.price.as_deref().is_some_and(|p| !p.trim().is_empty());
        let unit_price = parse_amount(row, "price", self.price.as_deref())?;
        let fee = parse_amount(row, "fee", self.fee.as_deref())?;
        let price_confidence = match self.price_confidence.as_deref().map(str::trim) {
            None | Some("") => None,
            Some(value) => Some(PriceConfidence::from_str(value).map_err(|_| {
                TransactionError::InvalidConfidence {
                    row,
                    value: value.to_string(),
                }
            })?),
        };

        Transaction {
            timestamp,
            tx_type: TxType::from(self.tx_type),
            quantity,
            unit_price,
            fee,
            label: self.label.unwrap_or_default().trim().to_string(),
            price_confidence,
        }
        .checked(row, price_given)
    }
}

/// One entry of the JSON input, before validation
#[derive(Debug, Deserialize)]
struct JsonRecord {
    #[serde(deserialize_with = "deserialize_datetime")]
    date: NaiveDateTime,
    #[serde(rename = "type")]
    tx_type: TxType,
    quantity: Decimal,
    #[serde(default)]
    price: Option<Decimal>,
    #[serde(default)]
    fee: Option<Decimal>,
    #[serde(default)]
    label: String,
    #[serde(default)]
    price_confidence: Option<PriceConfidence>,
}

#[derive(Debug, Deserialize)]
struct JsonInput {
    transactions: Vec<JsonRecord>,
}

impl JsonRecord {
    fn into_transaction(self, row: usize) -> Result<Transaction, TransactionError> {
        Transaction {
            timestamp: self.date,
            tx_type: self.tx_type,
            quantity: self.quantity,
            unit_price: self.price.unwrap_or_default(),
            fee: self.fee.unwrap_or_default(),
            label: self.label.trim().to_string(),
            price_confidence: self.price_confidence,
        }
        .checked(row, self.price.is_some())
    }
}

fn parse_amount(
    row: usize,
    field: &'static str,
    value: Option<&str>,
) -> Result<Decimal, TransactionError> {
    let value = value.map(str::trim).unwrap_or_default();
    if value.is_empty() {
        return Ok(Decimal::ZERO);
    }
    let amount = Decimal::from_str(value).map_err(|_| TransactionError::InvalidAmount {
        row,
        field,
        value: value.to_string(),
    })?;
    Ok(amount)
}

/// Read canonical transactions from CSV
pub fn read_transactions_csv<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let mut rdr = csv::ReaderBuilder::new().trim(csv::Trim::All).from_reader(reader);
    let mut transactions = Vec::new();
    for (idx, result) in rdr.deserialize::<TransactionRecord>().enumerate() {
        let record = result?;
        transactions.push(record.into_transaction(idx + 1)?);
    }
    Ok(transactions)
}

/// Read canonical transactions from JSON
pub fn read_transactions_json<R: Read>(reader: R) -> anyhow::Result<Vec<Transaction>> {
    let input: JsonInput = serde_json::from_reader(reader)?;
    let mut transactions = Vec::with_capacity(input.transactions.len());
    for (idx, record) in input.transactions.into_iter().enumerate() {
        transactions.push(record.into_transaction(idx + 1)?);
    }
    Ok(transactions)
}

/// Write canonical transactions as CSV
pub fn write_transactions_csv<W: Write>(
    transactions: &[Transaction],
    writer: W,
) -> anyhow::Result<()> {
    let mut wtr = csv::Writer::from_writer(writer);
    for tx in transactions {
        wtr.serialize(TransactionRecord::from(tx))?;
    }
    wtr.flush()?;
    Ok(())
}

pub fn parse_datetime(s: &str) -> Result<NaiveDateTime, TransactionError> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Ok(dt.naive_local());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Ok(dt);
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%.f") {
        return Ok(dt);
    }
    if let Ok(date) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        return Ok(date.and_time(chrono::NaiveTime::MIN));
    }
    Err(TransactionError::InvalidDatetime(s.to_string()))
}

fn deserialize_datetime<'de, D>(deserializer: D) -> Result<NaiveDateTime, D::Error>
where
    D: Deserializer<'de>,
{
    let s: String = Deserialize::deserialize(deserializer)?;
    parse_datetime(s.trim()).map_err(|err| serde::de::Error::custom(err.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn tx_type_classification() {
        assert_eq!(TxType::from("buy").kind(), Some(EventKind::Acquisition));
        assert_eq!(TxType::from("Receive").kind(), Some(EventKind::Acquisition));
        assert_eq!(TxType::from("SELL").kind(), Some(EventKind::Disposal));
        assert_eq!(TxType::from("spend").kind(), Some(EventKind::Disposal));
        assert_eq!(TxType::from("send").kind(), Some(EventKind::Disposal));
        assert_eq!(TxType::from("stake").kind(), None);
        assert_eq!(TxType::from("stake").as_str(), "stake");
    }

    #[test]
    fn parse_datetime_formats() {
        let expected = NaiveDate::from_ymd_opt(2024, 1, 15)
            .unwrap()
            .and_hms_opt(10, 30, 0)
            .unwrap();
        assert_eq!(parse_datetime("2024-01-15T10:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-15 10:30:00").unwrap(), expected);
        assert_eq!(parse_datetime("2024-01-15T10:30:00+00:00").unwrap(), expected);
        assert_eq!(
            parse_datetime("2024-01-15").unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 15)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap()
        );
        assert!(parse_datetime("15 Jan 2024").is_err());
    }

    #[test]
    fn read_csv_with_optional_columns() {
        let data = "\
date,type,quantity,price,fee,label,price_confidence
2024-01-15,buy,0.5,60000,50,DCA Purchase,exact
2024-03-10 09:00:00,sell,0.3,70000,,,
";
        let txs = read_transactions_csv(data.as_bytes()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].tx_type, TxType::Buy);
        assert_eq!(txs[0].quantity, dec!(0.5));
        assert_eq!(txs[0].fee, dec!(50));
        assert_eq!(txs[0].label, "DCA Purchase");
        assert_eq!(txs[0].price_confidence, Some(PriceConfidence::Exact));
        assert_eq!(txs[1].fee, Decimal::ZERO);
        assert_eq!(txs[1].label, "");
        assert_eq!(txs[1].price_confidence, None);
    }

    #[test]
    fn read_csv_rejects_bad_amount() {
        let data = "date,type,quantity,price,fee,label,price_confidence\n2024-01-15,buy,lots,1,0,,\n";
        let err = read_transactions_csv(data.as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransactionError>(),
            Some(&TransactionError::InvalidAmount {
                row: 1,
                field: "quantity",
                value: "lots".to_string()
            })
        );
    }

    #[test]
    fn read_csv_rejects_negative_fee() {
        let data = "date,type,quantity,price,fee,label,price_confidence\n2024-01-15,buy,1,1,-5,,\n";
        let err = read_transactions_csv(data.as_bytes()).unwrap_err();
        assert_eq!(
            err.downcast_ref::<TransactionError>(),
            Some(&TransactionError::NegativeAmount {
                row: 1,
                field: "fee"
            })
        );
    }

    #[test]
    fn read_csv_rejects_non_positive_quantity() {
        for qty in ["0", "-1"] {
            let data = format!("date,type,quantity,price,fee\n2024-01-15,sell,{},100,0\n", qty);
            let err = read_transactions_csv(data.as_bytes()).unwrap_err();
            assert_eq!(
                err.downcast_ref::<TransactionError>(),
                Some(&TransactionError::NonPositiveQuantity { row: 1 })
            );
        }
    }

    #[test]
    fn read_json_applies_csv_checks() {
        let cases = [
            (
                r#"{"date": "2024-01-15", "type": "sell", "quantity": "-1", "price": "100", "fee": "-5"}"#,
                TransactionError::NonPositiveQuantity { row: 2 },
            ),
            (
                r#"{"date": "2024-01-15", "type": "sell", "quantity": 0, "price": "100"}"#,
                TransactionError::NonPositiveQuantity { row: 2 },
            ),
            (
                r#"{"date": "2024-01-15", "type": "sell", "quantity": "1", "price": "100", "fee": "-5"}"#,
                TransactionError::NegativeAmount { row: 2, field: "fee" },
            ),
            (
                r#"{"date": "2024-01-15", "type": "buy", "quantity": "1", "price": "-100"}"#,
                TransactionError::NegativeAmount { row: 2, field: "price" },
            ),
        ];
        for (bad, expected) in cases {
            let data = format!(
                r#"{{"transactions": [
                    {{"date": "2024-01-01", "type": "buy", "quantity": "1", "price": "100"}},
                    {}
                ]}}"#,
                bad
            );
            let err = read_transactions_json(data.as_bytes()).unwrap_err();
            assert_eq!(err.downcast_ref::<TransactionError>(), Some(&expected));
        }
    }

    #[test]
    fn explicit_zero_price_is_tagged_exact() {
        let csv = "\
date,type,quantity,price,fee,label,price_confidence
2024-01-15,receive,1,0,0,gift,
2024-01-16,receive,1,,0,,
2024-01-17,receive,1,0,0,,monthly_fallback
";
        let txs = read_transactions_csv(csv.as_bytes()).unwrap();
        assert_eq!(txs[0].price_confidence, Some(PriceConfidence::Exact));
        assert!(!txs[0].needs_price());
        assert_eq!(txs[1].price_confidence, None);
        assert!(txs[1].needs_price());
        assert_eq!(txs[2].price_confidence, Some(PriceConfidence::MonthlyFallback));

        let json = r#"{"transactions": [
            {"date": "2024-01-15", "type": "receive", "quantity": 1, "price": 0},
            {"date": "2024-01-16", "type": "receive", "quantity": 1}
        ]}"#;
        let txs = read_transactions_json(json.as_bytes()).unwrap();
        assert_eq!(txs[0].price_confidence, Some(PriceConfidence::Exact));
        assert!(txs[1].needs_price());
    }

    #[test]
    fn untagged_zero_price_is_written_empty() {
        let tx = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 4, 20)
                .unwrap()
                .and_hms_opt(0, 0, 0)
                .unwrap(),
            "receive",
            dec!(0.1),
            Decimal::ZERO,
            Decimal::ZERO,
        );
        let mut buf = Vec::new();
        write_transactions_csv(std::slice::from_ref(&tx), &mut buf).unwrap();
        let out = String::from_utf8(buf.clone()).unwrap();
        assert!(out.contains("2024-04-20 00:00:00,receive,0.1,,0,,"));
        let txs = read_transactions_csv(buf.as_slice()).unwrap();
        assert_eq!(txs, vec![tx]);
    }

    #[test]
    fn read_json_defaults_fee_and_label() {
        let data = r#"{"transactions": [
            {"date": "2024-01-15T00:00:00", "type": "buy", "quantity": "0.5", "price": "60000"},
            {"date": "2024-02-01", "type": "gift", "quantity": 1}
        ]}"#;
        let txs = read_transactions_json(data.as_bytes()).unwrap();
        assert_eq!(txs.len(), 2);
        assert_eq!(txs[0].fee, Decimal::ZERO);
        assert_eq!(txs[0].unit_price, dec!(60000));
        assert_eq!(txs[1].tx_type, TxType::Other("gift".to_string()));
        assert_eq!(txs[1].kind(), None);
    }

    #[test]
    fn csv_written_transactions_read_back() {
        let tx = Transaction::new(
            NaiveDate::from_ymd_opt(2024, 4, 20)
                .unwrap()
                .and_hms_opt(11, 30, 0)
                .unwrap(),
            "sell",
            dec!(0.2),
            dec!(50000),
            dec!(20),
        )
        .with_label("Loss sale");

        let mut buf = Vec::new();
        write_transactions_csv(std::slice::from_ref(&tx), &mut buf).unwrap();
        let txs = read_transactions_csv(buf.as_slice()).unwrap();
        assert_eq!(txs, vec![tx]);
    }
}
