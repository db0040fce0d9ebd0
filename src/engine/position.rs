#[cfg(feature = "serialize")]
use serde::{Deserialize, Serialize};

/// Signed holding in one symbol.
#[cfg_attr(feature = "serialize", derive(Serialize, Deserialize))]
#[derive(Debug, Clone, PartialEq)]
pub struct Position {
    symbol: String,
    quantity: f64,
}

impl Position {
    /// Creates a position of `quantity` in `symbol`.
    pub fn new(symbol: impl Into<String>, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            quantity,
        }
    }

    /// Returns the symbol.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the signed quantity.
    pub fn quantity(&self) -> f64 {
        self.quantity
    }

    /// Market value of the position at `price`.
    pub fn value(&self, price: f64) -> f64 {
        price * self.quantity
    }

    pub(crate) fn set_quantity(&mut self, quantity: f64) {
        self.quantity = quantity;
    }
}

impl From<(&str, f64)> for Position {
    fn from((symbol, quantity): (&str, f64)) -> Self {
        Self::new(symbol, quantity)
    }
}

#[cfg(test)]
#[test]
fn value() {
    let pos = Position::new("ABC", 10.0);
    assert_eq!(pos.symbol(), "ABC");
    assert_eq!(pos.quantity(), 10.0);
    assert_eq!(pos.value(123.5), 1235.0);
}

#[cfg(test)]
#[test]
fn equality() {
    let pos = Position::from(("ABC", 123.0));
    assert_eq!(pos, Position::new("ABC", 123.0));
    assert_ne!(pos, Position::new("DEF", 123.0));
    assert_ne!(pos, Position::new("ABC", 123.1));
}
