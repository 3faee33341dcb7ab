//! Ledger types

use crate::signal::OrderId;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Cost-basis accounting method
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CostBasisMethod {
    /// Blend every entry into one average price
    #[default]
    WeightedAverage,
    /// Track individual lots, closing oldest first
    Fifo,
}

/// An open lot (FIFO mode only)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PositionLot {
    /// Remaining unsigned quantity
    pub quantity: Decimal,
    /// Entry price
    pub price: Decimal,
    /// Entry timestamp (ns)
    pub timestamp: i64,
    /// Order that opened the lot
    pub order_id: OrderId,
}
