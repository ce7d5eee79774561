pub mod acb;
pub mod export;
pub mod import;
pub mod pool;
pub mod price;
pub mod summary;
pub mod superficial;
pub mod transaction;
pub mod warnings;

// Flat public surface for domain types and functions.
pub use acb::{process, process_with_opening, Disposition, LedgerEntry};
pub use export::{schedule3_rows, write_schedule3_csv, Schedule3Row};
pub use import::{import_wallet_csv, ImportError, WalletImport};
pub use pool::{round_cents, Pool};
pub use price::{attach_prices, PriceConfidence, PriceQuote, PriceSource, PriceTable};
pub use summary::{summarize, Holdings, Summary, DEFAULT_INCLUSION_RATE};
pub use superficial::{find_forward_repurchases, ForwardRepurchase};
pub use transaction::{
    read_transactions_csv, read_transactions_json, write_transactions_csv, EventKind,
    Transaction, TransactionError, TransactionInput, TxType,
};
pub use warnings::Warning;
