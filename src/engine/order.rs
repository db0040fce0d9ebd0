use chrono::{DateTime, Utc};

#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

use crate::errors::{Error, Result};

/// Represents the side of an order (buy or sell), derived from the sign of its quantity.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OrderSide {
    /// Positive quantity.
    Buy,
    /// Negative quantity.
    Sell,
}

/// Represents the type of an order. Only market orders are simulated.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OrderType {
    /// Fills at the next available open.
    #[default]
    Market,
}

/// A trading intent.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Order {
    id: String,
    symbol: String,
    quantity: f64,
    order_type: OrderType,
    submit_time: DateTime<Utc>,
    price: Option<f64>,
}

impl Order {
    /// Creates a market order. A positive quantity buys, a negative one sells.
    pub fn market(id: impl Into<String>, symbol: impl Into<String>, quantity: f64, submit_time: DateTime<Utc>) -> Self {
        Self {
            id: id.into(),
            symbol: symbol.into(),
            quantity,
            order_type: OrderType::Market,
            submit_time,
            price: None,
        }
    }

    /// Attaches a limit price. Market orders ignore it.
    pub fn with_price(mut self, price: f64) -> Self {
        self.price = Some(price);
        self
    }

    /// Returns the order id.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the signed quantity.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Returns the side implied by the quantity sign.
    pub fn side(&self) -> OrderSide {
        if self.quantity < 0.0 { OrderSide::Sell } else { OrderSide::Buy }
    }

    /// Returns the order type.
    pub fn order_type(&self) -> OrderType {
        self.order_type
    }

    /// Returns the submission time.
    pub fn submit_time(&self) -> DateTime<Utc> {
        self.submit_time
    }

    /// Returns the optional limit price.
    pub fn price(&self) -> Option<f64> {
        self.price
    }

    /// Checks the order is well formed: a symbol and a finite, non-zero quantity.
    pub(crate) fn validate(&self) -> Result<()> {
        if self.symbol.is_empty() {
            return Err(Error::InvalidOrder(format!("order {} has an empty symbol", self.id)));
        }
        if !self.quantity.is_finite() || self.quantity == 0.0 {
            return Err(Error::InvalidOrder(format!(
                "order {} has quantity {}",
                self.id, self.quantity
            )));
        }
        Ok(())
    }
}

/// The outcome of a simulated fill.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionReport {
    /// The order that was filled.
    pub order: Order,
    /// Price of this fill.
    pub last_price: f64,
    /// Signed quantity of this fill.
    pub last_quantity: f64,
    /// Signed quantity filled so far.
    pub cum_quantity: f64,
    /// Quantity still open.
    pub rem_quantity: f64,
    /// Time of the fill.
    pub fill_timestamp: DateTime<Utc>,
}

impl ExecutionReport {
    /// Reports `order` as completely filled at `price`.
    pub fn full_fill(order: Order, price: f64, fill_timestamp: DateTime<Utc>) -> Self {
        let quantity = order.quantity();
        Self {
            order,
            last_price: price,
            last_quantity: quantity,
            cum_quantity: quantity,
            rem_quantity: 0.0,
            fill_timestamp,
        }
    }

    /// Returns the symbol of the filled order.
    pub fn symbol(&self) -> &str {
        self.order.symbol()
    }

    /// Returns the signed notional of the fill (price times quantity).
    pub fn notional(&self) -> f64 {
        self.last_price * self.last_quantity
    }
}

/// Hands out order ids "1", "2", ... for one strategy.
#[derive(Debug, Clone)]
pub struct OrderIds {
    next: u64,
}

impl Default for OrderIds {
    fn default() -> Self {
        Self { next: 1 }
    }
}

impl OrderIds {
    /// Returns the next id and advances the sequence.
    pub fn next_id(&mut self) -> String {
        let id = self.next.to_string();
        self.next += 1;
        id
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap()
    }

    #[test]
    fn create_market_order() {
        let order = Order::market("O1", "ABC", 5.0, now());

        assert_eq!(order.id(), "O1");
        assert_eq!(order.symbol(), "ABC");
        assert_eq!(order.quantity(), 5.0);
        assert_eq!(order.order_type(), OrderType::Market);
        assert_eq!(order.submit_time(), now());
        assert!(order.price().is_none());
        assert_eq!(order.side(), OrderSide::Buy);
    }

    #[test]
    fn negative_quantity_is_a_sell() {
        let order = Order::market("O1", "ABC", -2.0, now());
        assert_eq!(order.side(), OrderSide::Sell);
    }

    #[test]
    fn limit_price_is_carried() {
        let order = Order::market("O1", "ABC", 1.0, now()).with_price(99.5);
        assert_eq!(order.price(), Some(99.5));
    }

    #[test]
    fn validate_rejects_malformed_orders() {
        assert!(Order::market("1", "ABC", 1.0, now()).validate().is_ok());
        assert!(matches!(
            Order::market("1", "", 1.0, now()).validate(),
            Err(Error::InvalidOrder(_))
        ));
        assert!(matches!(
            Order::market("1", "ABC", 0.0, now()).validate(),
            Err(Error::InvalidOrder(_))
        ));
        assert!(matches!(
            Order::market("1", "ABC", f64::NAN, now()).validate(),
            Err(Error::InvalidOrder(_))
        ));
    }

    #[test]
    fn full_fill_report() {
        let order = Order::market("O2", "ABC", 10.0, now());
        let report = ExecutionReport::full_fill(order.clone(), 30.0, now());

        assert_eq!(report.order, order);
        assert_eq!(report.last_price, 30.0);
        assert_eq!(report.last_quantity, 10.0);
        assert_eq!(report.cum_quantity, 10.0);
        assert_eq!(report.rem_quantity, 0.0);
        assert_eq!(report.notional(), 300.0);
        assert_eq!(report.symbol(), "ABC");
    }

    #[test]
    fn order_ids_start_at_one() {
        let mut ids = OrderIds::default();
        assert_eq!(ids.next_id(), "1");
        assert_eq!(ids.next_id(), "2");
        assert_eq!(ids.next_id(), "3");
    }
}
