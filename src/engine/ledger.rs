use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::engine::{Position, Snapshot};
use crate::errors::{Error, Result};

/// Quantities closer to zero than this are treated as flat.
const ZERO_TOLERANCE: f64 = 1e-8;

/// Read-only access to a portfolio ledger.
///
/// This is what strategies and external callers get. Mutation goes through
/// [`Ledger::on_fill`] and [`Ledger::on_data`], which only the engine calls
/// during a run.
pub trait LedgerView {
    /// Current cash balance.
    fn cash(&self) -> f64;

    /// Timestamp of the last seen snapshot.
    fn as_of(&self) -> DateTime<Utc>;

    /// Market value of all held positions at the last seen close prices.
    ///
    /// Fails with [`Error::StalePrice`] if a held symbol is not in the last seen
    /// snapshot or its close there is not finite.
    fn asset_value(&self) -> Result<f64>;

    /// Market value of the position in `symbol`.
    fn asset_value_of(&self, symbol: &str) -> Result<f64>;

    /// Asset value plus cash.
    fn value(&self) -> Result<f64> {
        Ok(self.asset_value()? + self.cash())
    }

    /// Whether any position is held.
    fn is_invested(&self) -> bool;

    /// Whether a position in `symbol` is held.
    fn is_invested_in(&self, symbol: &str) -> bool;

    /// Returns the position in `symbol`, or [`Error::NotInvested`].
    fn position(&self, symbol: &str) -> Result<&Position>;

    /// Iterates over the held positions in symbol order.
    fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_>;

    /// Returns the recorded history.
    fn activity(&self) -> Activity<'_>;
}

/// One held symbol inside an [`ActivityRecord`].
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Holding {
    /// Held symbol.
    pub symbol: String,
    /// Signed quantity held.
    pub quantity: f64,
    /// Close price used for the valuation.
    pub price: f64,
    /// `quantity * price`.
    pub asset_value: f64,
}

/// State of the ledger at the end of one tick.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ActivityRecord {
    /// As-of time of the snapshot that produced the record.
    pub timestamp: DateTime<Utc>,
    /// Cash after the tick's fills.
    pub cash: f64,
    /// Held symbols, in symbol order.
    pub holdings: Vec<Holding>,
    /// Sum of the holdings' asset values.
    pub asset_value: f64,
    /// `asset_value + cash`.
    pub value: f64,
}

/// Borrowed view over the activity log.
#[derive(Debug, Clone, Copy)]
pub struct Activity<'a> {
    records: &'a [ActivityRecord],
}

impl<'a> Activity<'a> {
    /// Wraps a slice of records.
    pub fn new(records: &'a [ActivityRecord]) -> Self {
        Self { records }
    }

    /// Returns every record, oldest first.
    pub fn records(&self) -> &'a [ActivityRecord] {
        self.records
    }

    /// Returns the most recent record.
    pub fn last(&self) -> Option<&'a ActivityRecord> {
        self.records.last()
    }

    /// Returns the number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Whether nothing was recorded yet.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Total value at each record.
    pub fn equity_curve(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.value).collect()
    }

    /// Last value over first value, minus one.
    pub fn total_return(&self) -> Option<f64> {
        let first = self.records.first()?;
        let last = self.records.last()?;
        Some(last.value / first.value - 1.0)
    }
}

/// Cash, positions, last seen prices and history of a simulated portfolio.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone)]
pub struct Ledger {
    // Starting cash, kept for metrics
    initial_cash: f64,
    cash: f64,
    // Only non-zero holdings are kept
    positions: BTreeMap<String, Position>,
    // Last seen snapshot, the price source for valuations
    prices: Snapshot,
    activity: Vec<ActivityRecord>,
    fills: usize,
}

impl Ledger {
    /// Creates a flat ledger holding `cash`.
    /// Non-positive or non-finite amounts are rejected.
    pub fn new(cash: f64) -> Result<Self> {
        if !cash.is_finite() || cash <= 0.0 {
            return Err(Error::NegZeroBalance(cash));
        }

        Ok(Self {
            cash,
            initial_cash: cash,
            positions: BTreeMap::new(),
            prices: Snapshot::default(),
            activity: Vec::new(),
            fills: 0,
        })
    }

    /// Seeds positions. Flat entries are skipped.
    pub fn with_positions<I>(mut self, positions: I) -> Self
    where
        I: IntoIterator<Item = Position>,
    {
        for position in positions {
            if position.quantity().abs() > ZERO_TOLERANCE {
                self.positions.insert(position.symbol().to_string(), position);
            }
        }
        self
    }

    /// Seeds the last seen snapshot without recording activity.
    pub fn with_prices(mut self, prices: Snapshot) -> Self {
        self.prices = prices;
        self
    }

    /// Returns the starting cash.
    pub fn initial_cash(&self) -> f64 {
        self.initial_cash
    }

    /// Returns the number of fills applied.
    pub fn fills(&self) -> usize {
        self.fills
    }

    /// Returns the last seen snapshot.
    pub fn prices(&self) -> &Snapshot {
        &self.prices
    }

    /// Caches `snapshot` as the price source and appends one activity record.
    ///
    /// Must run once per tick, after the tick's fills. If a held symbol has no
    /// price the error is returned and nothing is appended.
    pub fn on_data(&mut self, snapshot: &Snapshot) -> Result<()> {
        self.prices = snapshot.clone();
        let record = self.record()?;
        tracing::trace!(
            as_of = %record.timestamp,
            cash = record.cash,
            value = record.value,
            "ledger marked to market"
        );
        self.activity.push(record);
        Ok(())
    }

    /// Applies a fill of `quantity` (negative sells) at `price`.
    ///
    /// Cash is debited by `price * quantity`. A position returning to zero is
    /// removed. A fill that would leave the position negative is rejected
    /// before anything changes.
    pub fn on_fill(&mut self, symbol: &str, price: f64, quantity: f64) -> Result<()> {
        if !price.is_finite() || !quantity.is_finite() {
            return Err(Error::InvalidFill(price, quantity));
        }

        let held = self.positions.get(symbol).map_or(0.0, Position::quantity);
        let remaining = held + quantity;
        if remaining < -ZERO_TOLERANCE {
            return Err(Error::InsufficientPosition {
                symbol: symbol.to_string(),
                held,
                quantity,
            });
        }

        self.cash -= price * quantity;
        if remaining.abs() <= ZERO_TOLERANCE {
            self.positions.remove(symbol);
        } else {
            self.positions
                .entry(symbol.to_string())
                .and_modify(|p| p.set_quantity(remaining))
                .or_insert_with(|| Position::new(symbol, remaining));
        }

        self.fills += 1;
        tracing::trace!(symbol, price, quantity, cash = self.cash, "fill applied to ledger");
        Ok(())
    }

    // A missing bar carries a NaN close, which is no price either
    fn price_of(&self, symbol: &str) -> Result<f64> {
        self.prices
            .get(symbol)
            .map(|bar| bar.close())
            .filter(|close| close.is_finite())
            .ok_or_else(|| Error::StalePrice(symbol.to_string()))
    }

    fn record(&self) -> Result<ActivityRecord> {
        let holdings = self
            .positions
            .values()
            .map(|position| {
                let price = self.price_of(position.symbol())?;
                Ok(Holding {
                    symbol: position.symbol().to_string(),
                    quantity: position.quantity(),
                    price,
                    asset_value: position.value(price),
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let asset_value = holdings.iter().map(|h| h.asset_value).sum::<f64>();
        Ok(ActivityRecord {
            timestamp: self.prices.as_of(),
            cash: self.cash,
            holdings,
            asset_value,
            value: asset_value + self.cash,
        })
    }
}

impl LedgerView for Ledger {
    fn cash(&self) -> f64 {
        self.cash
    }

    fn as_of(&self) -> DateTime<Utc> {
        self.prices.as_of()
    }

    fn asset_value(&self) -> Result<f64> {
        let mut total = 0.0;
        for position in self.positions.values() {
            total += position.value(self.price_of(position.symbol())?);
        }
        Ok(total)
    }

    fn asset_value_of(&self, symbol: &str) -> Result<f64> {
        let position = self.position(symbol)?;
        Ok(position.value(self.price_of(symbol)?))
    }

    fn is_invested(&self) -> bool {
        !self.positions.is_empty()
    }

    fn is_invested_in(&self, symbol: &str) -> bool {
        self.positions.contains_key(symbol)
    }

    fn position(&self, symbol: &str) -> Result<&Position> {
        self.positions
            .get(symbol)
            .ok_or_else(|| Error::NotInvested(symbol.to_string()))
    }

    fn positions(&self) -> Box<dyn Iterator<Item = &Position> + '_> {
        Box::new(self.positions.values())
    }

    fn activity(&self) -> Activity<'_> {
        Activity::new(&self.activity)
    }
}
