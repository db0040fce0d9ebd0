use std::collections::{BTreeMap, btree_map::Iter};

use chrono::{DateTime, Utc};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// OHLCV values of one symbol for one period.
///
/// Missing data is a bar whose fields are all `NaN`, never an absent entry.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    volume: f64,
}

impl Default for Bar {
    fn default() -> Self {
        Self::missing()
    }
}

impl From<(f64, f64, f64, f64, f64)> for Bar {
    fn from((open, high, low, close, volume): (f64, f64, f64, f64, f64)) -> Self {
        Self {
            open,
            high,
            low,
            close,
            volume,
        }
    }
}

impl Bar {
    /// Returns a bar with every field set to `NaN`.
    pub const fn missing() -> Self {
        Self {
            open: f64::NAN,
            high: f64::NAN,
            low: f64::NAN,
            close: f64::NAN,
            volume: f64::NAN,
        }
    }

    /// Starts a builder where unset fields stay `NaN`.
    pub fn builder() -> BarBuilder {
        BarBuilder::default()
    }

    /// Returns the open price.
    pub fn open(&self) -> f64 {
        self.open
    }

    /// Returns the high price.
    pub fn high(&self) -> f64 {
        self.high
    }

    /// Returns the low price.
    pub fn low(&self) -> f64 {
        self.low
    }

    /// Returns the close price.
    pub fn close(&self) -> f64 {
        self.close
    }

    /// Returns the traded volume.
    pub fn volume(&self) -> f64 {
        self.volume
    }

    /// True when no field carries a value.
    pub fn is_missing(&self) -> bool {
        self.open.is_nan() && self.high.is_nan() && self.low.is_nan() && self.close.is_nan() && self.volume.is_nan()
    }
}

/// Builder for [`Bar`].
#[derive(Debug, Clone, Copy)]
pub struct BarBuilder {
    bar: Bar,
}

impl Default for BarBuilder {
    fn default() -> Self {
        Self { bar: Bar::missing() }
    }
}

impl BarBuilder {
    /// Sets the open price.
    pub fn open(mut self, open: f64) -> Self {
        self.bar.open = open;
        self
    }

    /// Sets the high price.
    pub fn high(mut self, high: f64) -> Self {
        self.bar.high = high;
        self
    }

    /// Sets the low price.
    pub fn low(mut self, low: f64) -> Self {
        self.bar.low = low;
        self
    }

    /// Sets the close price.
    pub fn close(mut self, close: f64) -> Self {
        self.bar.close = close;
        self
    }

    /// Sets the volume.
    pub fn volume(mut self, volume: f64) -> Self {
        self.bar.volume = volume;
        self
    }

    /// Returns the bar.
    pub fn build(self) -> Bar {
        self.bar
    }
}

/// The bars of every subscribed symbol at one point in time.
///
/// A snapshot is produced once per feed tick and never mutated afterwards by
/// the engine. Symbols iterate in lexical order so fills and activity records
/// come out in a stable order.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Snapshot {
    as_of: DateTime<Utc>,
    bars: BTreeMap<String, Bar>,
}

impl Default for Snapshot {
    fn default() -> Self {
        Self::new(DateTime::<Utc>::MIN_UTC)
    }
}

impl FromIterator<(String, Bar)> for Snapshot {
    fn from_iter<I: IntoIterator<Item = (String, Bar)>>(iter: I) -> Self {
        let mut snapshot = Self::default();
        snapshot.bars.extend(iter);
        snapshot
    }
}

impl Snapshot {
    /// Creates an empty snapshot as of the given time.
    pub fn new(as_of: DateTime<Utc>) -> Self {
        Self {
            as_of,
            bars: BTreeMap::new(),
        }
    }

    /// Adds a bar, chaining. Used while a snapshot is assembled.
    pub fn with_bar(mut self, symbol: impl Into<String>, bar: Bar) -> Self {
        self.insert(symbol, bar);
        self
    }

    /// Adds or replaces a bar. Used while a snapshot is assembled.
    pub fn insert(&mut self, symbol: impl Into<String>, bar: Bar) {
        self.bars.insert(symbol.into(), bar);
    }

    /// Returns the time the snapshot refers to.
    pub fn as_of(&self) -> DateTime<Utc> {
        self.as_of
    }

    /// Returns the bar of `symbol`, if present.
    pub fn get(&self, symbol: &str) -> Option<&Bar> {
        self.bars.get(symbol)
    }

    /// Whether the snapshot carries an entry for `symbol`.
    pub fn contains(&self, symbol: &str) -> bool {
        self.bars.contains_key(symbol)
    }

    /// Iterates over `(symbol, bar)` pairs in symbol order.
    pub fn bars(&self) -> Iter<'_, String, Bar> {
        self.bars.iter()
    }

    /// Iterates over the symbols.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.bars.keys().map(String::as_str)
    }

    /// Returns the number of symbols.
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    /// Whether the snapshot has no bars.
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn default_bar_is_missing() {
        let bar = Bar::default();
        assert!(bar.is_missing());
        assert!(bar.open().is_nan());
        assert!(bar.volume().is_nan());
    }

    #[test]
    fn builder_leaves_unset_fields_nan() {
        let bar = Bar::builder().open(30.0).close(35.0).build();
        assert_eq!(bar.open(), 30.0);
        assert_eq!(bar.close(), 35.0);
        assert!(bar.high().is_nan());
        assert!(bar.low().is_nan());
        assert!(!bar.is_missing());
    }

    #[test]
    fn bar_from_tuple() {
        let bar = Bar::from((1.0, 2.0, 0.5, 1.5, 100.0));
        assert_eq!(bar.high(), 2.0);
        assert_eq!(bar.low(), 0.5);
        assert_eq!(bar.volume(), 100.0);
    }

    #[test]
    fn default_snapshot_is_empty_at_min_time() {
        let snapshot = Snapshot::default();
        assert!(snapshot.is_empty());
        assert_eq!(snapshot.as_of(), DateTime::<Utc>::MIN_UTC);
    }

    #[test]
    fn snapshot_iterates_in_symbol_order() {
        let as_of = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot::new(as_of)
            .with_bar("DEF", Bar::builder().close(2.0).build())
            .with_bar("ABC", Bar::builder().close(1.0).build());

        let symbols: Vec<_> = snapshot.symbols().collect();
        assert_eq!(symbols, ["ABC", "DEF"]);
        assert_eq!(snapshot.len(), 2);
        assert!(snapshot.contains("ABC"));
        assert!(!snapshot.contains("XYZ"));
        assert_eq!(snapshot.get("DEF").map(Bar::close), Some(2.0));
        assert_eq!(snapshot.as_of(), as_of);
    }
}
