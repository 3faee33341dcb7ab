//! Fill simulation with slippage, fees and position limits

use super::FillModelConfig;
use crate::signal::{Fill, OrderSignal, Side};
use rust_decimal::Decimal;
use thiserror::Error;
use uuid::Uuid;

/// Reason a signal was not filled
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FillRejection {
    /// Quantity was zero or negative
    #[error("invalid quantity {0}")]
    InvalidQuantity(Decimal),

    /// No positive price seen yet for the symbol
    #[error("no market price for {0}")]
    NoMarketPrice(String),

    /// Fill would push |size| past the limit
    #[error("position limit exceeded: resulting size {resulting} > limit {limit}")]
    PositionLimit { resulting: Decimal, limit: Decimal },
}

impl FillRejection {
    /// Short label used for metrics
    pub fn reason(&self) -> &'static str {
        match self {
            Self::InvalidQuantity(_) => "invalid_quantity",
            Self::NoMarketPrice(_) => "no_market_price",
            Self::PositionLimit { .. } => "position_limit",
        }
    }
}

/// Turns order signals into immediate simulated fills
#[derive(Debug, Clone)]
pub struct FillSimulator {
    /// Adverse price adjustment as a fraction of price
    pub slippage_rate: Decimal,
    /// Fee as a fraction of notional
    pub fee_rate: Decimal,
    /// Maximum absolute position size per symbol
    pub max_position_size: Decimal,
}

impl FillSimulator {
    /// Create a simulator from the fill model and a position limit
    pub fn new(model: &FillModelConfig, max_position_size: Decimal) -> Self {
        Self {
            slippage_rate: model.slippage_rate,
            fee_rate: model.fee_rate,
            max_position_size,
        }
    }

    /// Slipped execution price for a side
    pub fn fill_price(&self, side: Side, market_price: Decimal) -> Decimal {
        match side {
            Side::Buy => market_price * (Decimal::ONE + self.slippage_rate),
            Side::Sell => market_price * (Decimal::ONE - self.slippage_rate),
        }
    }

    /// Resolve a signal against the current market price and position
    ///
    /// `market_price` is the last reference price for the signal's symbol and
    /// `current_size` is the signed position before the fill.
    pub fn simulate(
        &self,
        signal: &OrderSignal,
        market_price: Option<Decimal>,
        current_size: Decimal,
        timestamp: i64,
    ) -> Result<Fill, FillRejection> {
        if signal.quantity <= Decimal::ZERO {
            return Err(FillRejection::InvalidQuantity(signal.quantity));
        }

        let price = market_price
            .filter(|p| *p > Decimal::ZERO)
            .ok_or_else(|| FillRejection::NoMarketPrice(signal.symbol.clone()))?;

        let resulting = (current_size + signal.side.signed(signal.quantity)).abs();
        if resulting > self.max_position_size {
            return Err(FillRejection::PositionLimit {
                resulting,
                limit: self.max_position_size,
            });
        }

        let fill_price = self.fill_price(signal.side, price);
        let fee = fill_price * signal.quantity * self.fee_rate;

        Ok(Fill {
            order_id: Uuid::new_v4(),
            symbol: signal.symbol.clone(),
            side: signal.side,
            price: fill_price,
            quantity: signal.quantity,
            fee,
            timestamp,
        })
    }
}
