use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::io::Read;
use std::path::Path;

use chrono::{NaiveDate, NaiveTime, TimeZone, Utc};
#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::engine::{Bar, Snapshot};
use crate::errors::{Error, Result};
use crate::utils::{SourceRecord, get_records_from_csv, read_csv_records};

const DEFAULT_START: NaiveDate = match NaiveDate::from_ymd_opt(2005, 1, 3) {
    Some(date) => date,
    None => panic!("invalid default start date"),
};

const DEFAULT_END: NaiveDate = match NaiveDate::from_ymd_opt(2025, 8, 29) {
    Some(date) => date,
    None => panic!("invalid default end date"),
};

/// Source of market data snapshots.
pub trait Feed {
    /// Starts streaming.
    fn start(&mut self);

    /// Stops streaming.
    fn stop(&mut self);

    /// Whether the feed currently has data to hand out.
    fn is_running(&self) -> bool;

    /// Adds `symbol` to the subscribed set.
    fn subscribe(&mut self, symbol: &str) -> Result<()>;

    /// Returns the next snapshot for the subscribed symbols.
    ///
    /// Fails with [`Error::FeedNotRunning`] once the feed is stopped.
    fn next_data(&mut self) -> Result<Snapshot>;
}

/// Inclusive replay range of a [`FileFeed`].
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FeedConfig {
    /// First replayed date.
    pub start: NaiveDate,
    /// Last replayed date.
    pub end: NaiveDate,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            start: DEFAULT_START,
            end: DEFAULT_END,
        }
    }
}

impl FeedConfig {
    /// Creates a range, rejecting `start > end`.
    pub fn new(start: NaiveDate, end: NaiveDate) -> Result<Self> {
        if start > end {
            return Err(Error::InvalidDateRange(start, end));
        }
        Ok(Self { start, end })
    }

    /// Creates a range from two `YYYY-MM-DD` strings.
    pub fn parse(start: &str, end: &str) -> Result<Self> {
        let parse = |value: &str| {
            NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d").map_err(|_| Error::InvalidTimestamp(value.to_string()))
        };
        Self::new(parse(start)?, parse(end)?)
    }

    /// Whether `date` lies in the range.
    pub fn contains(&self, date: NaiveDate) -> bool {
        self.start <= date && date <= self.end
    }
}

/// Replays bars loaded from a file, one snapshot per calendar date.
///
/// Records are loaded once and filtered to the configured range. Each
/// snapshot carries every subscribed symbol; a symbol without a row on that
/// date gets a missing (`NaN`) bar. The feed stops itself right after the
/// last date in range is handed out.
#[derive(Debug)]
pub struct FileFeed {
    config: FeedConfig,
    // Every symbol in the source, whatever the range
    symbols: BTreeSet<String>,
    days: Vec<(NaiveDate, HashMap<String, Bar>)>,
    subscriptions: BTreeSet<String>,
    cursor: usize,
    running: bool,
}

impl FileFeed {
    /// Loads a CSV file.
    pub fn from_path(path: impl AsRef<Path>, config: FeedConfig) -> Result<Self> {
        let path = path.as_ref();
        let records = get_records_from_csv(path)?;
        tracing::info!(path = %path.display(), records = records.len(), "loaded replay source");
        Ok(Self::from_records(records, config))
    }

    /// Loads CSV from any reader.
    pub fn from_reader<R: Read>(reader: R, config: FeedConfig) -> Result<Self> {
        Ok(Self::from_records(read_csv_records(reader)?, config))
    }

    /// Loads a JSON array of records.
    #[cfg(feature = "json")]
    pub fn from_json_path(path: impl AsRef<Path>, config: FeedConfig) -> Result<Self> {
        let path = path.as_ref();
        let records = crate::utils::get_records_from_json(path)?;
        tracing::info!(path = %path.display(), records = records.len(), "loaded replay source");
        Ok(Self::from_records(records, config))
    }

    /// Builds a feed from in-memory records.
    pub fn from_records<I>(records: I, config: FeedConfig) -> Self
    where
        I: IntoIterator<Item = SourceRecord>,
    {
        let mut symbols = BTreeSet::new();
        let mut days: BTreeMap<NaiveDate, HashMap<String, Bar>> = BTreeMap::new();

        for record in records {
            let date = record.timestamp.date_naive();
            if !symbols.contains(&record.symbol) {
                symbols.insert(record.symbol.clone());
            }
            if !config.contains(date) {
                continue;
            }

            let bar = Bar::from((record.open, record.high, record.low, record.close, record.volume));
            if days.entry(date).or_default().insert(record.symbol.clone(), bar).is_some() {
                tracing::warn!(%date, symbol = %record.symbol, "duplicate row, keeping the last one");
            }
        }

        tracing::debug!(
            symbols = symbols.len(),
            dates = days.len(),
            start = %config.start,
            end = %config.end,
            "replay range prepared"
        );

        Self {
            config,
            symbols,
            days: days.into_iter().collect(),
            subscriptions: BTreeSet::new(),
            cursor: 0,
            running: false,
        }
    }

    /// Returns the replay range.
    pub fn config(&self) -> &FeedConfig {
        &self.config
    }

    /// Iterates over every symbol in the source.
    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.symbols.iter().map(String::as_str)
    }

    /// Iterates over the replay dates in range.
    pub fn dates(&self) -> impl Iterator<Item = NaiveDate> + '_ {
        self.days.iter().map(|(date, _)| *date)
    }

    /// Iterates over the subscribed symbols.
    pub fn subscriptions(&self) -> impl Iterator<Item = &str> {
        self.subscriptions.iter().map(String::as_str)
    }

    /// Returns the number of snapshots not handed out yet.
    pub fn remaining(&self) -> usize {
        self.days.len().saturating_sub(self.cursor)
    }
}

impl Feed for FileFeed {
    fn start(&mut self) {
        if self.remaining() == 0 {
            tracing::warn!(start = %self.config.start, end = %self.config.end, "no data in replay range, feed stays stopped");
            return;
        }
        self.running = true;
    }

    fn stop(&mut self) {
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn subscribe(&mut self, symbol: &str) -> Result<()> {
        if !self.symbols.contains(symbol) {
            return Err(Error::InvalidSymbol(symbol.to_string()));
        }
        if !self.subscriptions.insert(symbol.to_string()) {
            return Err(Error::DuplicateSubscription(symbol.to_string()));
        }
        tracing::debug!(symbol, "subscribed");
        Ok(())
    }

    fn next_data(&mut self) -> Result<Snapshot> {
        if !self.running {
            return Err(Error::FeedNotRunning);
        }
        let Some((date, bars)) = self.days.get(self.cursor) else {
            self.running = false;
            return Err(Error::FeedNotRunning);
        };

        let mut snapshot = Snapshot::new(Utc.from_utc_datetime(&date.and_time(NaiveTime::MIN)));
        for symbol in &self.subscriptions {
            snapshot.insert(symbol.as_str(), bars.get(symbol).copied().unwrap_or_default());
        }

        self.cursor += 1;
        if self.cursor >= self.days.len() {
            tracing::debug!(last = %date, "replay range exhausted, stopping feed");
            self.stop();
        }
        Ok(snapshot)
    }
}
