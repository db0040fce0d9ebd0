use chrono::{DateTime, Utc};

use crate::engine::{Broker, ExecutionReport, Feed, LedgerView, Order, OrderIds, Snapshot};
use crate::errors::Result;

/// User decision logic driven by the [`Engine`](crate::engine::Engine).
///
/// Per tick, every `on_execution` call of that tick happens before its
/// `on_data` call, and both see the ledger with the tick's fills applied.
pub trait Strategy {
    /// Called once, before the first snapshot. Usually subscribes.
    fn on_start(&mut self, ctx: &mut Context<'_>) -> Result<()>;

    /// Called once per snapshot, after the ledger applied it.
    fn on_data(&mut self, ctx: &mut Context<'_>, snapshot: &Snapshot) -> Result<()>;

    /// Called once per fill, before the `on_data` call of the same tick.
    fn on_execution(&mut self, _ctx: &mut Context<'_>, _report: &ExecutionReport) -> Result<()> {
        Ok(())
    }
}

/// What a strategy can reach during a callback: subscriptions, order
/// submission, a read-only ledger and the current time.
pub struct Context<'a> {
    feed: &'a mut dyn Feed,
    broker: &'a mut dyn Broker,
    ledger: &'a dyn LedgerView,
    ids: &'a mut OrderIds,
    now: DateTime<Utc>,
}

impl<'a> Context<'a> {
    pub(crate) fn new(
        feed: &'a mut dyn Feed,
        broker: &'a mut dyn Broker,
        ledger: &'a dyn LedgerView,
        ids: &'a mut OrderIds,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            feed,
            broker,
            ledger,
            ids,
            now,
        }
    }

    /// Subscribes the feed to `symbol`.
    pub fn subscribe(&mut self, symbol: &str) -> Result<()> {
        self.feed.subscribe(symbol)
    }

    /// Sends a market order and returns its id. A negative quantity sells.
    pub fn post_market_order(&mut self, symbol: &str, quantity: f64) -> Result<String> {
        let id = self.ids.next_id();
        let order = Order::market(id.clone(), symbol, quantity, self.now);
        self.broker.post_order(order)?;
        tracing::debug!(id = %id, symbol, quantity, at = %self.now, "order posted");
        Ok(id)
    }

    /// Returns the read-only ledger.
    pub fn ledger(&self) -> &'a dyn LedgerView {
        self.ledger
    }

    /// Returns the as-of time of the current tick, or the minimum time before the first one.
    pub fn now(&self) -> DateTime<Utc> {
        self.now
    }
}
