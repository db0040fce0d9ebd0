use std::collections::{HashMap, VecDeque};

use crate::engine::{ExecutionReport, Order, Snapshot};
use crate::errors::Result;

/// Accepts orders and reports their fills.
pub trait Broker {
    /// Handles a new snapshot, filling whatever can be filled against it.
    fn on_data(&mut self, snapshot: &Snapshot) -> Result<()>;

    /// Queues an order.
    fn post_order(&mut self, order: Order) -> Result<()>;

    /// Drains the reports generated since the last call, oldest first.
    fn pop_latest(&mut self) -> Vec<ExecutionReport>;
}

/// Backtest broker filling market orders at the next bar's open.
///
/// Orders are assumed to be decided at the close of one bar and can only
/// trade at the open of the next one, so an order posted during tick T is
/// filled on tick T+1.
#[derive(Debug, Default)]
pub struct SimulatedBroker {
    orders: HashMap<String, VecDeque<Order>>,
    reports: Vec<ExecutionReport>,
}

impl SimulatedBroker {
    /// Creates a broker with no queued order.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of queued orders.
    pub fn pending(&self) -> usize {
        self.orders.values().map(VecDeque::len).sum()
    }

    /// Returns the queued orders for `symbol`.
    pub fn pending_for(&self, symbol: &str) -> impl Iterator<Item = &Order> {
        self.orders.get(symbol).into_iter().flatten()
    }
}

impl Broker for SimulatedBroker {
    fn on_data(&mut self, snapshot: &Snapshot) -> Result<()> {
        for (symbol, bar) in snapshot.bars() {
            let Some(queue) = self.orders.get_mut(symbol) else {
                continue;
            };
            if queue.is_empty() {
                continue;
            }

            let price = bar.open();
            //? no open to trade at, keep the orders for the next priced bar
            if !price.is_finite() {
                tracing::debug!(symbol = %symbol, pending = queue.len(), "no open price, orders stay queued");
                continue;
            }

            while let Some(order) = queue.pop_front() {
                tracing::debug!(
                    id = order.id(),
                    symbol = %symbol,
                    quantity = order.quantity(),
                    price,
                    "market order filled"
                );
                self.reports.push(ExecutionReport::full_fill(order, price, snapshot.as_of()));
            }
        }

        self.orders.retain(|_, queue| !queue.is_empty());
        Ok(())
    }

    fn post_order(&mut self, order: Order) -> Result<()> {
        order.validate()?;
        self.orders.entry(order.symbol().to_string()).or_default().push_back(order);
        Ok(())
    }

    fn pop_latest(&mut self) -> Vec<ExecutionReport> {
        std::mem::take(&mut self.reports)
    }
}
