use chrono::NaiveDate;

/// Result type of the library.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors returned by the feed, broker, ledger and engine.
#[derive(thiserror::Error, Debug)]
pub enum Error {
    /// The symbol has no data anywhere in the feed source.
    #[error("Invalid symbol: no data for {0}")]
    InvalidSymbol(String),

    /// The symbol is already subscribed.
    #[error("Duplicate subscription: {0} is already subscribed")]
    DuplicateSubscription(String),

    /// `next_data` was called while the feed is stopped.
    /// Callers must check `is_running` first.
    #[error("Feed is not running")]
    FeedNotRunning,

    /// The ledger holds no position in the symbol.
    #[error("Not invested in {0}")]
    NotInvested(String),

    /// A held symbol has no finite close in the last seen snapshot.
    #[error("Stale price: {0} is not in the last seen snapshot")]
    StalePrice(String),

    /// A fill would take the position below zero. Short selling is not supported.
    #[error("Insufficient position in {symbol}: held {held}, fill {quantity}")]
    InsufficientPosition {
        /// Symbol of the rejected fill.
        symbol: String,
        /// Quantity held before the fill.
        held: f64,
        /// Signed fill quantity.
        quantity: f64,
    },

    /// The fill price or quantity is not a finite number.
    #[error("Invalid fill: price {0}, quantity {1}")]
    InvalidFill(f64, f64),

    /// The order is structurally malformed.
    #[error("Invalid order: {0}")]
    InvalidOrder(String),

    /// The initial cash is not positive.
    #[error("Balance must be positive (got: {0})")]
    NegZeroBalance(f64),

    /// The replay range ends before it starts.
    #[error("Invalid date range: start {0} is after end {1}")]
    InvalidDateRange(NaiveDate, NaiveDate),

    /// A source timestamp could not be parsed.
    #[error("Invalid timestamp: {0}")]
    InvalidTimestamp(String),

    /// A source row is missing a column or has an unparsable number.
    #[error("Invalid record at line {line}: {reason}")]
    InvalidRecord {
        /// 1-based line of a CSV source, or element index of a JSON array.
        line: u64,
        /// What went wrong.
        reason: String,
    },

    /// I/O error occurred.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// CSV error occurred.
    #[error("CSV error: {0}")]
    CsvError(#[from] csv::Error),

    /// JSON serialization/deserialization error occurred.
    #[cfg(feature = "json")]
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),
}
