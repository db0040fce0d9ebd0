//! Performance metrics for backtesting.
//!
//! This module computes, from the per-tick equity curve of a [`Ledger`]:
//! - Total return
//! - Max drawdown
//! - Sharpe ratio
//!
//! along with the number of fills.
//!
//! It needs the `metrics` feature, which is on by default.

use std::fmt;

use crate::engine::{Ledger, LedgerView};

/// Key performance indicators of a run.
///
/// Built from the total value recorded at the end of each tick, usually
/// through `Metrics::from(engine.ledger())`.
#[cfg_attr(feature = "serialize", derive(serde::Serialize, serde::Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Metrics {
    equity: Vec<f64>,
    initial_value: f64,
    fills: usize,
}

impl From<&Ledger> for Metrics {
    fn from(value: &Ledger) -> Self {
        Self::new(value.activity().equity_curve(), value.initial_cash(), value.fills())
    }
}

impl Metrics {
    /// Creates a new `Metrics` instance from an equity curve, the starting value and a fill count.
    pub fn new(equity: Vec<f64>, initial_value: f64, fills: usize) -> Self {
        Self {
            equity,
            initial_value,
            fills,
        }
    }

    /// Returns the number of fills.
    pub fn fills(&self) -> usize {
        self.fills
    }

    /// Returns the starting value.
    pub fn initial_value(&self) -> f64 {
        self.initial_value
    }

    /// Returns the last recorded value, or the starting value if nothing was recorded.
    pub fn final_value(&self) -> f64 {
        self.equity.last().copied().unwrap_or(self.initial_value)
    }

    /// Returns the equity curve.
    pub fn equity(&self) -> &[f64] {
        &self.equity
    }

    /// Computes the total return as a percentage of the starting value.
    pub fn total_return(&self) -> f64 {
        (self.final_value() - self.initial_value) / self.initial_value * 100.0
    }

    /// Computes the maximum drawdown as a percentage.
    pub fn max_drawdown(&self) -> f64 {
        let mut max_peak = self.initial_value;
        let mut max_drawdown = 0.0;

        for &value in &self.equity {
            if value > max_peak {
                max_peak = value;
            }
            let drawdown = (max_peak - value) / max_peak;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
            }
        }

        max_drawdown * 100.0
    }

    /// Computes the Sharpe ratio of the per-tick returns.
    ///
    /// `risk_free_rate` is the per-tick risk-free return (e.g., 0.0 for simplicity).
    /// Without any return the ratio is `NaN`.
    pub fn sharpe_ratio(&self, risk_free_rate: f64) -> f64 {
        let mut returns = Vec::with_capacity(self.equity.len());
        let mut previous = self.initial_value;

        for &value in &self.equity {
            returns.push((value - previous) / previous);
            previous = value;
        }

        let mean_return = returns.iter().sum::<f64>() / returns.len() as f64;
        let std_dev = (returns.iter().map(|r| (r - mean_return).powi(2)).sum::<f64>() / returns.len() as f64).sqrt();

        (mean_return - risk_free_rate) / std_dev
    }
}

impl fmt::Display for Metrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "=== Backtest Metrics ===")?;
        writeln!(f, "Initial Value: {:.2}", self.initial_value)?;
        writeln!(f, "Final Value: {:.2}", self.final_value())?;
        writeln!(f, "Ticks: {}", self.equity.len())?;
        writeln!(f, "Fills: {}", self.fills)?;
        writeln!(f)?;
        writeln!(f, "Total Return: {:.2}%", self.total_return())?;
        writeln!(f, "Max Drawdown: {:.2}%", self.max_drawdown())?;
        writeln!(f, "Sharpe Ratio (risk-free rate = 0.0): {:.2}", self.sharpe_ratio(0.0))
    }
}

#[cfg(test)]
#[test]
fn max_drawdown() {
    let metrics = Metrics::new(vec![10000.0, 12000.0, 9000.0, 11000.0], 10000.0, 0);
    assert_eq!(metrics.max_drawdown(), 25.0); // (12000 - 9000) / 12000 = 25%
}

#[cfg(test)]
#[test]
fn max_drawdown_no_ticks() {
    let metrics = Metrics::new(vec![], 10000.0, 0);
    assert_eq!(metrics.max_drawdown(), 0.0);
}

#[cfg(test)]
#[test]
fn total_return() {
    let metrics = Metrics::new(vec![10000.0, 10500.0, 11000.0], 10000.0, 0);
    assert_eq!(metrics.final_value(), 11000.0);
    assert_eq!(metrics.total_return(), 10.0);

    let flat = Metrics::new(vec![], 10000.0, 0);
    assert_eq!(flat.final_value(), 10000.0);
    assert_eq!(flat.total_return(), 0.0);
}

#[cfg(test)]
#[test]
fn sharpe_ratio() {
    let metrics = Metrics::new(vec![10000.0, 10500.0, 10300.0, 10700.0], 10000.0, 0);
    let sharpe = metrics.sharpe_ratio(0.0);
    // Approximate value, since Sharpe ratio depends on standard deviation
    assert!(sharpe > 0.0 && sharpe < 1.0);
}

#[cfg(test)]
#[test]
fn sharpe_ratio_no_ticks() {
    let metrics = Metrics::new(vec![], 10000.0, 0);
    assert!(metrics.sharpe_ratio(0.0).is_nan());
}

#[cfg(test)]
#[test]
fn from_ledger() {
    use crate::engine::{Bar, Snapshot};

    let mut ledger = Ledger::new(1000.0).unwrap();
    let close = |price: f64| Snapshot::default().with_bar("ABC", Bar::builder().close(price).build());

    ledger.on_fill("ABC", 100.0, 5.0).unwrap();
    ledger.on_data(&close(100.0)).unwrap();
    ledger.on_data(&close(80.0)).unwrap();
    ledger.on_data(&close(120.0)).unwrap();

    let metrics = Metrics::from(&ledger);
    assert_eq!(metrics.equity(), [1000.0, 900.0, 1100.0]);
    assert_eq!(metrics.initial_value(), 1000.0);
    assert_eq!(metrics.fills(), 1);
    assert_eq!(metrics.max_drawdown(), 10.0);
    assert!(metrics.to_string().starts_with("=== Backtest Metrics ===\n"));
}
