use std::collections::VecDeque;

use chrono::{DateTime, TimeZone, Utc};

use crate::engine::*;
use crate::errors::{Error, Result};

/// Hands out prepared snapshots in order.
struct FakeFeed {
    data: VecDeque<Snapshot>,
    subscribed: Vec<String>,
}

impl FakeFeed {
    fn new(data: Vec<Snapshot>) -> Self {
        Self {
            data: data.into(),
            subscribed: Vec::new(),
        }
    }
}

impl Feed for FakeFeed {
    fn start(&mut self) {}

    fn stop(&mut self) {}

    fn is_running(&self) -> bool {
        !self.data.is_empty()
    }

    fn subscribe(&mut self, symbol: &str) -> Result<()> {
        self.subscribed.push(symbol.to_string());
        Ok(())
    }

    fn next_data(&mut self) -> Result<Snapshot> {
        self.data.pop_front().ok_or(Error::FeedNotRunning)
    }
}

#[derive(Debug, Clone, PartialEq)]
enum Seen {
    Start(DateTime<Utc>),
    Execution { id: String, price: f64, quantity: f64, cash: f64 },
    Data { as_of: DateTime<Utc>, cash: f64, invested: bool },
}

/// Buys `quantity` of `symbol` whenever flat, `orders` times per decision.
struct BuyAndHold {
    symbol: String,
    quantity: f64,
    orders: usize,
    seen: Vec<Seen>,
    reports: Vec<ExecutionReport>,
}

impl BuyAndHold {
    fn new(symbol: &str, quantity: f64) -> Self {
        Self {
            symbol: symbol.to_string(),
            quantity,
            orders: 1,
            seen: Vec::new(),
            reports: Vec::new(),
        }
    }
}

impl Strategy for BuyAndHold {
    fn on_start(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        self.seen.push(Seen::Start(ctx.now()));
        ctx.subscribe(&self.symbol)
    }

    fn on_data(&mut self, ctx: &mut Context<'_>, snapshot: &Snapshot) -> Result<()> {
        let ledger = ctx.ledger();
        self.seen.push(Seen::Data {
            as_of: snapshot.as_of(),
            cash: ledger.cash(),
            invested: ledger.is_invested(),
        });
        // value() must hold on every tick
        assert_eq!(ledger.value()?, ledger.asset_value()? + ledger.cash());

        if !ledger.is_invested() && snapshot.contains(&self.symbol) && self.reports.is_empty() {
            for _ in 0..self.orders {
                ctx.post_market_order(&self.symbol, self.quantity)?;
            }
        }
        Ok(())
    }

    fn on_execution(&mut self, ctx: &mut Context<'_>, report: &ExecutionReport) -> Result<()> {
        self.seen.push(Seen::Execution {
            id: report.order.id().to_string(),
            price: report.last_price,
            quantity: report.last_quantity,
            cash: ctx.ledger().cash(),
        });
        self.reports.push(report.clone());
        Ok(())
    }
}

fn day(d: u32) -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 1, d, 0, 0, 0).unwrap()
}

fn bar(open: f64, close: f64) -> Bar {
    Bar::builder().open(open).close(close).build()
}

#[test]
fn scenario_engine_round_trip() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", Bar::builder().close(123.0).build());
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(124.0, 124.0));

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2]), SimulatedBroker::new(), BuyAndHold::new("ABC", 10.0), 1000.0).unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary, RunSummary { ticks: 2, fills: 1 });
    assert_eq!(engine.feed().subscribed, ["ABC"]);

    let strategy = engine.strategy();
    assert_eq!(strategy.reports.len(), 1);
    let report = &strategy.reports[0];
    assert_eq!(report.last_price, 124.0);
    assert_eq!(report.last_quantity, 10.0);
    assert_eq!(report.rem_quantity, 0.0);
    assert_eq!(report.fill_timestamp, day(2));
    // decided on tick 1, stamped with tick 1 time
    assert_eq!(report.order.submit_time(), day(1));

    let ledger = engine.ledger();
    assert!(ledger.is_invested_in("ABC"));
    assert_eq!(ledger.cash(), 1000.0 - 1240.0);
    assert_eq!(ledger.value().unwrap(), -240.0 + 1240.0);
    assert_eq!(ledger.activity().len(), 2);
}

#[test]
fn scenario_callbacks_order() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(120.0, 123.0));
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(124.0, 125.0));

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2]), SimulatedBroker::new(), BuyAndHold::new("ABC", 10.0), 1000.0).unwrap();
    engine.run().unwrap();

    let expected = vec![
        Seen::Start(DateTime::<Utc>::MIN_UTC),
        Seen::Data {
            as_of: day(1),
            cash: 1000.0,
            invested: false,
        },
        // the fill is applied before the strategy hears about it
        Seen::Execution {
            id: "1".to_string(),
            price: 124.0,
            quantity: 10.0,
            cash: -240.0,
        },
        Seen::Data {
            as_of: day(2),
            cash: -240.0,
            invested: true,
        },
    ];
    assert_eq!(engine.strategy().seen, expected);
}

#[test]
fn scenario_two_orders_same_tick() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(30.0, 35.0));
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(36.0, 37.0));
    let mut strategy = BuyAndHold::new("ABC", 5.0);
    strategy.orders = 2;

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2]), SimulatedBroker::new(), strategy, 1000.0).unwrap();
    let summary = engine.run().unwrap();
    assert_eq!(summary.fills, 2);

    let (_, mut broker, strategy, ledger) = engine.into_parts();
    let ids: Vec<_> = strategy.reports.iter().map(|r| r.order.id()).collect();
    assert_eq!(ids, ["1", "2"]);
    assert!(strategy.reports.iter().all(|r| r.last_price == 36.0));
    assert!(strategy.reports.iter().all(|r| r.fill_timestamp == day(2)));

    assert_eq!(broker.pending(), 0);
    assert!(broker.pop_latest().is_empty());
    assert_eq!(ledger.position("ABC").unwrap().quantity(), 10.0);
    assert_eq!(ledger.cash(), 1000.0 - 360.0);
}

#[test]
fn scenario_order_on_last_tick_never_fills() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(30.0, 35.0));

    let mut engine = Engine::new(FakeFeed::new(vec![d1]), SimulatedBroker::new(), BuyAndHold::new("ABC", 1.0), 1000.0).unwrap();
    engine.run().unwrap();

    assert_eq!(engine.broker().pending(), 1);
    assert!(!engine.ledger().is_invested());
    assert_eq!(engine.ledger().cash(), 1000.0);
}

#[test]
fn scenario_empty_feed_still_starts() {
    let mut engine = Engine::new(FakeFeed::new(vec![]), SimulatedBroker::new(), BuyAndHold::new("ABC", 1.0), 1000.0).unwrap();
    let summary = engine.run().unwrap();

    assert_eq!(summary.ticks, 0);
    assert_eq!(engine.strategy().seen, vec![Seen::Start(DateTime::<Utc>::MIN_UTC)]);
    assert!(engine.ledger().activity().is_empty());
}

#[test]
fn scenario_stale_price_aborts_the_run() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(30.0, 35.0));
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(36.0, 37.0));
    // ABC disappears while held
    let d3 = Snapshot::new(day(3)).with_bar("DEF", bar(1.0, 1.0));
    let d4 = Snapshot::new(day(4)).with_bar("ABC", bar(38.0, 39.0));

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2, d3, d4]), SimulatedBroker::new(), BuyAndHold::new("ABC", 1.0), 1000.0).unwrap();
    let result = engine.run();

    assert!(matches!(result, Err(Error::StalePrice(symbol)) if symbol == "ABC"));
    assert_eq!(engine.ticks(), 2);
    assert_eq!(engine.ledger().activity().len(), 2);
    assert_eq!(engine.feed().data.len(), 1);
}

#[test]
fn scenario_missing_bar_of_a_held_symbol_aborts_the_run() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(30.0, 35.0));
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(36.0, 37.0));
    // still subscribed, but no row for the day
    let d3 = Snapshot::new(day(3)).with_bar("ABC", Bar::missing());

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2, d3]), SimulatedBroker::new(), BuyAndHold::new("ABC", 1.0), 1000.0).unwrap();
    let result = engine.run();

    assert!(matches!(result, Err(Error::StalePrice(symbol)) if symbol == "ABC"));
    assert_eq!(engine.ticks(), 2);
    assert!(engine.ledger().activity().equity_curve().iter().all(|value| value.is_finite()));
}

#[test]
fn scenario_second_run_continues_the_first() {
    let d1 = Snapshot::new(day(1)).with_bar("ABC", bar(30.0, 35.0));
    let d2 = Snapshot::new(day(2)).with_bar("ABC", bar(36.0, 37.0));

    let mut engine = Engine::new(FakeFeed::new(vec![d1, d2]), SimulatedBroker::new(), BuyAndHold::new("ABC", 1.0), 1000.0).unwrap();
    let first = engine.run().unwrap();
    assert_eq!(first, RunSummary { ticks: 2, fills: 1 });

    // the feed is exhausted, only on_start runs again
    let second = engine.run().unwrap();
    assert_eq!(second, first);
    assert_eq!(engine.ledger().activity().len(), 2);
    assert_eq!(engine.ledger().cash(), 1000.0 - 36.0);
    let starts = engine.strategy().seen.iter().filter(|seen| matches!(seen, Seen::Start(_))).count();
    assert_eq!(starts, 2);
}

/// Sells more than it holds as soon as it is invested.
struct Oversell;

impl Strategy for Oversell {
    fn on_start(&mut self, _ctx: &mut Context<'_>) -> Result<()> {
        Ok(())
    }

    fn on_data(&mut self, ctx: &mut Context<'_>, _snapshot: &Snapshot) -> Result<()> {
        if ctx.ledger().is_invested_in("ABC") {
            ctx.post_market_order("ABC", -5.0)?;
        } else {
            ctx.post_market_order("ABC", 2.0)?;
        }
        Ok(())
    }
}

#[test]
fn scenario_short_sale_aborts_the_run() {
    let data = (1..=4).map(|d| Snapshot::new(day(d)).with_bar("ABC", bar(10.0, 10.0))).collect();

    let mut engine = Engine::new(FakeFeed::new(data), SimulatedBroker::new(), Oversell, 1000.0).unwrap();
    let result = engine.run();

    assert!(matches!(result, Err(Error::InsufficientPosition { .. })));
    assert_eq!(engine.ledger().position("ABC").unwrap().quantity(), 2.0);
    assert_eq!(engine.ledger().cash(), 980.0);
}

#[test]
fn scenario_invalid_subscription_aborts_the_run() {
    let csv = "Date,Symbol,Open,High,Low,Close,Volume\n2025-01-02,NVDA,1,1,1,1,1\n";
    let feed = FileFeed::from_reader(csv.as_bytes(), FeedConfig::default()).unwrap();

    let mut engine = Engine::new(feed, SimulatedBroker::new(), BuyAndHold::new("MSFT", 1.0), 1000.0).unwrap();
    assert!(matches!(engine.run(), Err(Error::InvalidSymbol(_))));
    assert_eq!(engine.ticks(), 0);
}

#[test]
fn scenario_invalid_cash() {
    let result = Engine::new(FakeFeed::new(vec![]), SimulatedBroker::new(), Oversell, 0.0);
    assert!(matches!(result, Err(Error::NegZeroBalance(_))));
}
