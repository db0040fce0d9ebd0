//! # Buy and Hold with a Moving Average Filter
//!
//! Replays a year of synthetic daily bars for two symbols. The strategy
//! splits its cash between them, buying a symbol once its close is above
//! its 20-day average and selling it when the close falls back below.
//!
//! Run with `RUST_LOG=systrade=debug` to follow every order and fill.

use std::collections::{HashMap, VecDeque};
use std::error::Error;

use chrono::{Duration, TimeZone, Utc};
use systrade::SourceRecord;
use systrade::prelude::*;
use tracing_subscriber::EnvFilter;

const SYMBOLS: [&str; 2] = ["ACME", "GLOBEX"];
const WINDOW: usize = 20;

/// Deterministic daily bars: a slow trend plus a wave.
fn synthetic_records() -> Vec<SourceRecord> {
    let base = Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap();
    let mut records = Vec::new();

    for day in 0..252 {
        let t = day as f64;
        for (i, symbol) in SYMBOLS.iter().enumerate() {
            let drift = if i == 0 { 0.08 } else { -0.02 };
            let close = 100.0 + drift * t + 6.0 * (t / (9.0 + 4.0 * i as f64)).sin();
            let open = close - 0.4 * (t / 3.0).cos();
            records.push(SourceRecord {
                timestamp: base + Duration::days(day),
                symbol: symbol.to_string(),
                open,
                high: open.max(close) + 0.5,
                low: open.min(close) - 0.5,
                close,
                volume: 10_000.0 + 100.0 * t,
            });
        }
    }
    records
}

struct TrendFollower {
    closes: HashMap<&'static str, VecDeque<f64>>,
    budget: f64,
}

impl TrendFollower {
    fn new(budget: f64) -> Self {
        Self {
            closes: HashMap::new(),
            budget,
        }
    }

    fn average(&mut self, symbol: &'static str, close: f64) -> Option<f64> {
        let window = self.closes.entry(symbol).or_default();
        window.push_back(close);
        if window.len() > WINDOW {
            window.pop_front();
        }
        (window.len() == WINDOW).then(|| window.iter().sum::<f64>() / WINDOW as f64)
    }
}

impl Strategy for TrendFollower {
    fn on_start(&mut self, ctx: &mut Context<'_>) -> Result<()> {
        for symbol in SYMBOLS {
            ctx.subscribe(symbol)?;
        }
        Ok(())
    }

    fn on_data(&mut self, ctx: &mut Context<'_>, snapshot: &Snapshot) -> Result<()> {
        for symbol in SYMBOLS {
            let Some(bar) = snapshot.get(symbol).filter(|bar| !bar.is_missing()) else {
                continue;
            };
            let close = bar.close();
            let Some(average) = self.average(symbol, close) else {
                continue;
            };

            let invested = ctx.ledger().is_invested_in(symbol);
            if !invested && close > average {
                let quantity = (self.budget / close).floor();
                ctx.post_market_order(symbol, quantity)?;
            } else if invested && close < average {
                let held = ctx.ledger().position(symbol)?.quantity();
                ctx.post_market_order(symbol, -held)?;
            }
        }
        Ok(())
    }

    fn on_execution(&mut self, ctx: &mut Context<'_>, report: &ExecutionReport) -> Result<()> {
        tracing::info!(
            symbol = report.symbol(),
            side = ?report.order.side(),
            price = report.last_price,
            quantity = report.last_quantity,
            cash = ctx.ledger().cash(),
            at = %ctx.now().date_naive(),
            "filled"
        );
        Ok(())
    }
}

fn main() -> std::result::Result<(), Box<dyn Error>> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let initial_cash = 10_000.0;
    let feed = FileFeed::from_records(synthetic_records(), FeedConfig::parse("2024-01-01", "2024-12-31")?);
    let strategy = TrendFollower::new(initial_cash / SYMBOLS.len() as f64);

    let mut engine = Engine::new(feed, SimulatedBroker::new(), strategy, initial_cash)?;
    let summary = engine.run()?;
    println!("ticks: {}, fills: {}", summary.ticks, summary.fills);

    let ledger = engine.ledger();
    for position in ledger.positions() {
        println!("holding {} x {}", position.quantity(), position.symbol());
    }

    #[cfg(feature = "metrics")]
    println!("{}", Metrics::from(ledger));

    Ok(())
}
