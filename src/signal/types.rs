//! Order signal and fill types

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Order identifier
pub type OrderId = Uuid;

/// Trading side
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Side {
    /// Buy (increases signed position)
    Buy,
    /// Sell (decreases signed position)
    Sell,
}

impl Side {
    /// Direction multiplier: +1 for buys, -1 for sells
    pub fn sign(self) -> Decimal {
        match self {
            Side::Buy => Decimal::ONE,
            Side::Sell => Decimal::NEGATIVE_ONE,
        }
    }

    /// Signed quantity for this side
    pub fn signed(self, quantity: Decimal) -> Decimal {
        self.sign() * quantity
    }
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Buy => write!(f, "buy"),
            Side::Sell => write!(f, "sell"),
        }
    }
}

/// An order request emitted by a strategy
///
/// Signals are ephemeral: produced per event and consumed immediately by the
/// fill simulator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OrderSignal {
    /// Instrument symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Requested quantity
    pub quantity: Decimal,
}

impl OrderSignal {
    /// Create a new order signal
    pub fn new(symbol: impl Into<String>, side: Side, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            side,
            quantity,
        }
    }

    /// Convenience constructor for a buy
    pub fn buy(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self::new(symbol, Side::Buy, quantity)
    }

    /// Convenience constructor for a sell
    pub fn sell(symbol: impl Into<String>, quantity: Decimal) -> Self {
        Self::new(symbol, Side::Sell, quantity)
    }
}

/// A simulated execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    /// Order ID
    pub order_id: OrderId,
    /// Instrument symbol
    pub symbol: String,
    /// Trade side
    pub side: Side,
    /// Fill price (after slippage)
    pub price: Decimal,
    /// Fill quantity (always positive)
    pub quantity: Decimal,
    /// Fee charged for this fill
    pub fee: Decimal,
    /// Exchange timestamp of the triggering event (ns)
    pub timestamp: i64,
}

impl Fill {
    /// Notional value of the fill
    pub fn notional(&self) -> Decimal {
        self.price * self.quantity
    }
}
