//! # systrade: a deterministic backtesting simulator
//!
//! **systrade** replays historical OHLCV bars through a user strategy, a
//! simulated broker and a portfolio ledger, one snapshot at a time.
//! A run is single-threaded and fully deterministic: the same data and the
//! same strategy always produce the same fills and the same history.
//!
//! ## Core Components
//! | Component         | Description                                                                          |
//! |-------------------|--------------------------------------------------------------------------------------|
//! | **`Bar`**         | OHLCV values of one symbol for one period. Missing data is an all-`NaN` bar.         |
//! | **`Snapshot`**    | The bars of every subscribed symbol at one as-of time.                               |
//! | **`FileFeed`**    | Replays a CSV (or JSON) file, one snapshot per calendar date, over a date range.     |
//! | **`SimulatedBroker`** | Queues market orders and fills them in full at the next snapshot's open.         |
//! | **`Ledger`**      | Cash, positions, last seen prices and one activity record per tick.                  |
//! | **`Strategy`**    | User logic, reached through a `Context` (subscribe, post orders, read the ledger).    |
//! | **`Engine`**      | The event loop driving all of the above.                                             |
//! | **`Metrics`**     | Total return, drawdown and Sharpe ratio of the equity curve.                         |
//!
//! ## Tick order
//! 1. The feed hands out the next snapshot.
//! 2. The broker fills the orders posted on earlier ticks at that snapshot's open.
//! 3. Each fill is applied to the ledger, then reported to `Strategy::on_execution`.
//! 4. The ledger is marked to the snapshot's closes, then `Strategy::on_data` runs.
//!
//! An order posted during `on_data` therefore never fills before the next tick.
//!
//! ## Getting Started
//! ```rust
//! use systrade::prelude::*;
//!
//! struct BuyOnce;
//!
//! impl Strategy for BuyOnce {
//!     fn on_start(&mut self, ctx: &mut Context<'_>) -> Result<()> {
//!         ctx.subscribe("ABC")
//!     }
//!
//!     fn on_data(&mut self, ctx: &mut Context<'_>, _snapshot: &Snapshot) -> Result<()> {
//!         if !ctx.ledger().is_invested() {
//!             ctx.post_market_order("ABC", 10.0)?;
//!         }
//!         Ok(())
//!     }
//! }
//!
//! let csv = "Date,Symbol,Open,High,Low,Close,Volume
//! 2025-01-02,ABC,100,101,99,100,1000
//! 2025-01-03,ABC,102,104,101,103,1000
//! ";
//! let feed = FileFeed::from_reader(csv.as_bytes(), FeedConfig::default()).unwrap();
//! let mut engine = Engine::new(feed, SimulatedBroker::new(), BuyOnce, 10_000.0).unwrap();
//! engine.run().unwrap();
//!
//! // bought 10 at the second open, valued at the second close
//! assert_eq!(engine.ledger().cash(), 10_000.0 - 1020.0);
//! assert_eq!(engine.ledger().value().unwrap(), 10_000.0 - 1020.0 + 1030.0);
//!
//! #[cfg(feature = "metrics")]
//! println!("{}", Metrics::from(engine.ledger()));
//! ```
//!
//! ## Error Handling
//! Every fallible operation returns [`errors::Result`]. The engine stops at
//! the first error and hands it back unchanged, for example:
//! - subscribing to a symbol absent from the source,
//! - selling more than is held,
//! - valuing a held symbol missing from the last snapshot.
//!
//! ## Features
//! | Feature     | Description                                                     |
//! |-------------|-----------------------------------------------------------------|
//! | `metrics`   | Performance metrics (default).                                  |
//! | `serialize` | `Serialize`/`Deserialize` on the data types.                    |
//! | `json`      | Loading replay sources from JSON files.                         |
//!
//! ## License
//! MIT
#![warn(missing_docs)]

/// Core simulation components: bars, feeds, orders, broker, ledger, strategy and engine.
pub mod engine;

/// Error types for the library.
pub mod errors;

/// Replay source parsing.
mod utils;

/// Performance metrics: total return, drawdown, Sharpe ratio.
#[cfg(feature = "metrics")]
pub mod metrics;

#[cfg(feature = "json")]
pub use utils::{get_records_from_json, read_json_records};
pub use utils::{SourceRecord, get_records_from_csv, parse_timestamp, read_csv_records};

/// Re-exports of commonly used types and traits for convenience.
pub mod prelude {
    pub use crate::engine::*;
    pub use crate::errors::*;

    #[cfg(feature = "metrics")]
    pub use crate::metrics::*;
}
