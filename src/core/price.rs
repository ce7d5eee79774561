use super::transaction::Transaction;
use super::warnings::Warning;
use chrono::{Datelike, Duration, NaiveDate, NaiveDateTime};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::io::Read;
use std::str::FromStr;

/// How far from the transaction date a daily price may be borrowed
pub const NEAREST_PRICE_DAYS: i64 = 7;

#[derive(Debug, thiserror::Error)]
pub enum PriceError {
    #[error("could not identify date and price columns")]
    MissingColumns,
    #[error("no valid price data found")]
    NoPrices,
    #[error(transparent)]
    Csv(#[from] csv::Error),
}

/// How a price was resolved
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PriceConfidence {
    Exact,
    #[serde(rename = "nearest_within_7_days")]
    NearestWithin7Days,
    MonthlyFallback,
    Unresolved,
}

impl PriceConfidence {
    pub fn as_str(&self) -> &'static str {
        match self {
            PriceConfidence::Exact => "exact",
            PriceConfidence::NearestWithin7Days => "nearest_within_7_days",
            PriceConfidence::MonthlyFallback => "monthly_fallback",
            PriceConfidence::Unresolved => "unresolved",
        }
    }
}

impl FromStr for PriceConfidence {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "exact" => Ok(PriceConfidence::Exact),
            "nearest_within_7_days" => Ok(PriceConfidence::NearestWithin7Days),
            "monthly_fallback" => Ok(PriceConfidence::MonthlyFallback),
            "unresolved" => Ok(PriceConfidence::Unresolved),
            other => Err(format!("unknown price confidence: {other}")),
        }
    }
}

impl fmt::Display for PriceConfidence {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Resolved unit price and how it was found
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub price: Decimal,
    pub confidence: PriceConfidence,
}

impl PriceQuote {
    pub fn unresolved() -> Self {
        PriceQuote {
            price: Decimal::ZERO,
            confidence: PriceConfidence::Unresolved,
        }
    }
}

/// Anything that can price the asset at a point in time
pub trait PriceSource {
    fn get_price(&self, at: NaiveDateTime) -> PriceQuote;
}

/// Approximate monthly BTC/CAD averages used when no daily price is loaded.
/// Not accurate enough for filing.
const FALLBACK_MONTHLY: &[(i32, u32, Decimal)] = &[
    (2023, 1, dec!(23000)),
    (2023, 2, dec!(31000)),
    (2023, 3, dec!(37000)),
    (2023, 4, dec!(39000)),
    (2023, 5, dec!(37000)),
    (2023, 6, dec!(41000)),
    (2023, 7, dec!(40000)),
    (2023, 8, dec!(36000)),
    (2023, 9, dec!(36000)),
    (2023, 10, dec!(46000)),
    (2023, 11, dec!(50000)),
    (2023, 12, dec!(58000)),
    (2024, 1, dec!(58000)),
    (2024, 2, dec!(70000)),
    (2024, 3, dec!(90000)),
    (2024, 4, dec!(85000)),
    (2024, 5, dec!(87000)),
    (2024, 6, dec!(85000)),
    (2024, 7, dec!(88000)),
    (2024, 8, dec!(80000)),
    (2024, 9, dec!(78000)),
    (2024, 10, dec!(92000)),
    (2024, 11, dec!(125000)),
    (2024, 12, dec!(130000)),
    (2025, 1, dec!(135000)),
];

/// Daily prices plus a coarse monthly fallback
#[derive(Debug, Clone, Default)]
pub struct PriceTable {
    daily: HashMap<NaiveDate, Decimal>,
    monthly: HashMap<(i32, u32), Decimal>,
}

impl PriceTable {
    /// Empty table with the built-in monthly fallback loaded
    pub fn with_fallback() -> Self {
        let monthly = FALLBACK_MONTHLY
            .iter()
            .map(|(year, month, price)| ((*year, *month), *price))
            .collect();
        PriceTable {
            daily: HashMap::new(),
            monthly,
        }
    }

    /// Empty table with no fallback; unknown dates resolve to zero
    pub fn without_fallback() -> Self {
        PriceTable::default()
    }

    pub fn insert(&mut self, date: NaiveDate, price: Decimal) {
        self.daily.insert(date, price);
    }

    /// Load daily prices from a CSV export and return how many were read.
    ///
    /// The date column is the first header containing `date`; the price
    /// column is the first other header containing `close`, `price`, `cad`
    /// or `value`. Without both, the first two columns are used. Rows that
    /// fail to parse are skipped.
    pub fn read_csv<R: Read>(&mut self, reader: R) -> Result<usize, PriceError> {
        let mut rdr = csv::ReaderBuilder::new()
            .flexible(true)
            .trim(csv::Trim::All)
            .from_reader(reader);
        let headers: Vec<String> = rdr.headers()?.iter().map(|h| h.to_lowercase()).collect();

        let date_col = headers.iter().position(|h| h.contains("date"));
        let price_col = headers.iter().enumerate().position(|(i, h)| {
            Some(i) != date_col && ["close", "price", "cad", "value"].iter().any(|k| h.contains(k))
        });
        let (date_col, price_col) = match (date_col, price_col) {
            (Some(d), Some(p)) => (d, p),
            _ if headers.len() >= 2 => (0, 1),
            _ => return Err(PriceError::MissingColumns),
        };

        let mut loaded = 0;
        for record in rdr.records() {
            let record = record?;
            let (Some(date), Some(price)) = (record.get(date_col), record.get(price_col)) else {
                continue;
            };
            let Some(date) = parse_price_date(date) else {
                log::debug!("Skipping price row with bad date '{}'", date);
                continue;
            };
            let cleaned: String = price.chars().filter(|c| *c != ',' && *c != '$').collect();
            let Ok(price) = Decimal::from_str(cleaned.trim()) else {
                log::debug!("Skipping price row with bad price '{}'", price);
                continue;
            };
            self.daily.insert(date, price);
            loaded += 1;
        }

        if loaded == 0 {
            return Err(PriceError::NoPrices);
        }
        log::debug!("Loaded {} daily prices", loaded);
        Ok(loaded)
    }
}

impl PriceSource for PriceTable {
    fn get_price(&self, at: NaiveDateTime) -> PriceQuote {
        let date = at.date();

        if let Some(price) = self.daily.get(&date) {
            return PriceQuote {
                price: *price,
                confidence: PriceConfidence::Exact,
            };
        }

        for offset in 1..=NEAREST_PRICE_DAYS {
            for delta in [-offset, offset] {
                if let Some(price) = self.daily.get(&(date + Duration::days(delta))) {
                    log::debug!("Price for {} borrowed from {:+} days", date, delta);
                    return PriceQuote {
                        price: *price,
                        confidence: PriceConfidence::NearestWithin7Days,
                    };
                }
            }
        }

        if let Some(price) = self.monthly.get(&(date.year(), date.month())) {
            log::warn!("Using monthly fallback price {} for {}", price, date);
            return PriceQuote {
                price: *price,
                confidence: PriceConfidence::MonthlyFallback,
            };
        }

        log::warn!("No price data for {}", date);
        PriceQuote::unresolved()
    }
}

fn parse_price_date(s: &str) -> Option<NaiveDate> {
    const FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y", "%d/%m/%Y", "%b %d, %Y"];
    if let Ok(dt) = chrono::DateTime::parse_from_rfc3339(s) {
        return Some(dt.date_naive());
    }
    if let Ok(dt) = NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S") {
        return Some(dt.date());
    }
    FORMATS
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

/// Fill in prices for transactions that have none.
///
/// Only transactions without a supplied price are looked up: a zero
/// `unit_price` that is untagged or previously unresolved. Monthly
/// fallbacks and failed lookups produce warnings; a failed lookup leaves the
/// price at zero.
pub fn attach_prices<S: PriceSource + ?Sized>(
    transactions: &mut [Transaction],
    source: &S,
) -> Vec<Warning> {
    let mut warnings = Vec::new();
    for tx in transactions.iter_mut().filter(|tx| tx.needs_price()) {
        let quote = source.get_price(tx.timestamp);
        tx.unit_price = quote.price;
        tx.price_confidence = Some(quote.confidence);
        match quote.confidence {
            PriceConfidence::MonthlyFallback => warnings.push(Warning::FallbackPrice {
                date: tx.date(),
                price: quote.price,
            }),
            PriceConfidence::Unresolved => {
                warnings.push(Warning::UnresolvedPrice { date: tx.date() })
            }
            PriceConfidence::Exact | PriceConfidence::NearestWithin7Days => {}
        }
    }
    warnings
}
