//! Core simulation components.
//!
//! This module provides the fundamental types for backtesting:
//! - `Bar` / `Snapshot`: OHLCV data and the bars of all subscribed symbols at one time.
//! - `Feed`: replays snapshots (`FileFeed` reads them from a file).
//! - `Broker`: queues orders and fills them (`SimulatedBroker` fills at the next open).
//! - `Ledger`: cash, positions, valuations and history.
//! - `Strategy`: user logic, reached through a `Context`.
//! - `Engine`: the event loop tying them together.

mod bar;
mod broker;
mod feed;
mod ledger;
mod order;
mod position;
mod strategy;

#[cfg(test)]
mod scenarios;

use chrono::{DateTime, Utc};

use crate::errors::Result;

pub use bar::*;
pub use broker::*;
pub use feed::*;
pub use ledger::*;
pub use order::*;
pub use position::*;
pub use strategy::*;

/// Counts of a finished run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Snapshots processed.
    pub ticks: usize,
    /// Fills applied to the ledger.
    pub fills: usize,
}

/// Backtesting engine: one feed, one broker, one strategy and the ledger it owns.
///
/// Each tick runs in a fixed order:
/// 1. pull the next snapshot from the feed,
/// 2. let the broker fill orders queued on earlier ticks against it,
/// 3. apply every fill to the ledger, then report it to the strategy,
/// 4. mark the ledger to the snapshot, then hand the snapshot to the strategy.
///
/// Any error ends the run.
#[derive(Debug)]
pub struct Engine<F, B, S> {
    feed: F,
    broker: B,
    strategy: S,
    ledger: Ledger,
    ids: OrderIds,
    summary: RunSummary,
}

impl<F, B, S> Engine<F, B, S>
where
    F: Feed,
    B: Broker,
    S: Strategy,
{
    /// Creates a new engine.
    ///
    /// ### Arguments
    /// * `feed` - Source of snapshots.
    /// * `broker` - Order execution.
    /// * `strategy` - Decision logic.
    /// * `cash` - Initial cash of the ledger, must be positive.
    ///
    /// ### Returns
    /// The engine, or [`Error::NegZeroBalance`](crate::errors::Error::NegZeroBalance).
    ///
    /// ### Example
    /// ```rust
    /// use systrade::prelude::*;
    ///
    /// struct Idle;
    /// impl Strategy for Idle {
    ///     fn on_start(&mut self, ctx: &mut Context<'_>) -> Result<()> {
    ///         ctx.subscribe("ABC")
    ///     }
    ///
    ///     fn on_data(&mut self, _ctx: &mut Context<'_>, _snapshot: &Snapshot) -> Result<()> {
    ///         Ok(())
    ///     }
    /// }
    ///
    /// let csv = "Date,Symbol,Open,High,Low,Close,Volume\n2025-01-02,ABC,10,11,9,10.5,100\n";
    /// let feed = FileFeed::from_reader(csv.as_bytes(), FeedConfig::default()).unwrap();
    /// let mut engine = Engine::new(feed, SimulatedBroker::new(), Idle, 1000.0).unwrap();
    /// let summary = engine.run().unwrap();
    ///
    /// assert_eq!(summary.ticks, 1);
    /// assert_eq!(engine.ledger().value().unwrap(), 1000.0);
    /// ```
    pub fn new(feed: F, broker: B, strategy: S, cash: f64) -> Result<Self> {
        Ok(Self {
            feed,
            broker,
            strategy,
            ledger: Ledger::new(cash)?,
            ids: OrderIds::default(),
            summary: RunSummary::default(),
        })
    }

    /// Returns the ledger.
    pub fn ledger(&self) -> &Ledger {
        &self.ledger
    }

    /// Returns the strategy.
    pub fn strategy(&self) -> &S {
        &self.strategy
    }

    /// Returns the feed.
    pub fn feed(&self) -> &F {
        &self.feed
    }

    /// Returns the broker.
    pub fn broker(&self) -> &B {
        &self.broker
    }

    /// Returns the number of completed ticks.
    pub fn ticks(&self) -> usize {
        self.summary.ticks
    }

    /// Takes the engine apart.
    pub fn into_parts(self) -> (F, B, S, Ledger) {
        (self.feed, self.broker, self.strategy, self.ledger)
    }

    /// Runs until the feed stops.
    ///
    /// Starts the feed, calls `on_start`, then processes one tick per snapshot.
    /// The first error returned by any component aborts the run and is
    /// returned as is; the engine does not retry.
    ///
    /// An engine runs once. Calling `run` again resumes from the current feed
    /// position with the same ledger, calls `on_start` again and keeps
    /// counting into the same [`RunSummary`]. Build a new engine for a fresh run.
    pub fn run(&mut self) -> Result<RunSummary> {
        let span = tracing::info_span!("backtest", cash = self.ledger.initial_cash());
        let _guard = span.enter();

        self.feed.start();
        tracing::info!("run started");

        let mut ctx = Context::new(
            &mut self.feed,
            &mut self.broker,
            &self.ledger,
            &mut self.ids,
            DateTime::<Utc>::MIN_UTC,
        );
        if let Err(err) = self.strategy.on_start(&mut ctx) {
            tracing::error!(error = %err, tick = self.summary.ticks, "run aborted");
            return Err(err);
        }

        while self.feed.is_running() {
            if let Err(err) = self.tick() {
                tracing::error!(error = %err, tick = self.summary.ticks, "run aborted");
                return Err(err);
            }
        }

        tracing::info!(
            ticks = self.summary.ticks,
            fills = self.summary.fills,
            cash = self.ledger.cash(),
            "run finished"
        );
        Ok(self.summary)
    }

    fn tick(&mut self) -> Result<()> {
        let snapshot = self.feed.next_data()?;
        let now = snapshot.as_of();
        tracing::debug!(as_of = %now, symbols = snapshot.len(), "tick");

        self.broker.on_data(&snapshot)?;
        for report in self.broker.pop_latest() {
            self.ledger.on_fill(report.symbol(), report.last_price, report.last_quantity)?;
            self.summary.fills += 1;

            let mut ctx = Context::new(&mut self.feed, &mut self.broker, &self.ledger, &mut self.ids, now);
            self.strategy.on_execution(&mut ctx, &report)?;
        }

        self.ledger.on_data(&snapshot)?;
        let mut ctx = Context::new(&mut self.feed, &mut self.broker, &self.ledger, &mut self.ids, now);
        self.strategy.on_data(&mut ctx, &snapshot)?;

        self.summary.ticks += 1;
        Ok(())
    }
}
