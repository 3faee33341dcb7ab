//! Per-symbol position and cost-basis accounting

use super::{CostBasisMethod, PositionLot};
use crate::signal::Fill;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

/// Position state for one symbol
///
/// `size` is signed: positive is long, negative is short. `avg_price` is zero
/// while flat. Under FIFO it is the lot-weighted average and is only used for
/// display; PnL comes from the individual lots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    /// Instrument symbol
    pub symbol: String,
    /// Signed position size
    pub size: Decimal,
    /// Average entry price of the open quantity
    pub avg_price: Decimal,
    /// Accumulated realized P&L (excludes fees)
    pub realized_pnl: Decimal,
    /// Cost-basis method
    pub method: CostBasisMethod,
    /// Open lots, oldest first (FIFO only)
    pub lots: VecDeque<PositionLot>,
    /// Timestamp of the last applied fill (ns)
    pub last_update: i64,
}

impl Position {
    /// Create a flat position
    pub fn new(symbol: impl Into<String>, method: CostBasisMethod) -> Self {
        Self {
            symbol: symbol.into(),
            size: Decimal::ZERO,
            avg_price: Decimal::ZERO,
            realized_pnl: Decimal::ZERO,
            method,
            lots: VecDeque::new(),
            last_update: 0,
        }
    }

    /// Check if position is flat
    pub fn is_flat(&self) -> bool {
        self.size.is_zero()
    }

    /// Check if position is long
    pub fn is_long(&self) -> bool {
        self.size > Decimal::ZERO
    }

    /// Check if position is short
    pub fn is_short(&self) -> bool {
        self.size < Decimal::ZERO
    }

    /// Average entry price, if a position is open
    pub fn entry_price(&self) -> Option<Decimal> {
        (!self.is_flat()).then_some(self.avg_price)
    }

    /// Apply a fill and return the realized P&L it produced
    ///
    /// Only closing volume realizes P&L. A fill larger than the open size
    /// closes the position and opens the remainder on the other side at the
    /// fill price.
    pub fn apply_fill(&mut self, fill: &Fill) -> Decimal {
        let before = self.realized_pnl;
        match self.method {
            CostBasisMethod::WeightedAverage => self.apply_weighted(fill),
            CostBasisMethod::Fifo => self.apply_fifo(fill),
        }
        self.last_update = fill.timestamp;
        self.realized_pnl - before
    }

    fn is_opening(&self, signed_qty: Decimal) -> bool {
        self.size.is_zero() || self.size.is_sign_positive() == signed_qty.is_sign_positive()
    }

    fn apply_weighted(&mut self, fill: &Fill) {
        let signed_qty = fill.side.signed(fill.quantity);

        if self.is_opening(signed_qty) {
            let open = self.size.abs();
            self.avg_price = (open * self.avg_price + fill.quantity * fill.price) / (open + fill.quantity);
            self.size += signed_qty;
            return;
        }

        let direction = sign_of(self.size);
        let closed = fill.quantity.min(self.size.abs());
        self.realized_pnl += direction * (fill.price - self.avg_price) * closed;
        self.size += signed_qty;

        if self.size.is_zero() {
            self.avg_price = Decimal::ZERO;
        } else if fill.quantity > closed {
            // Flipped: remainder opens fresh at the fill price
            self.avg_price = fill.price;
        }
    }

    fn apply_fifo(&mut self, fill: &Fill) {
        let signed_qty = fill.side.signed(fill.quantity);

        if self.is_opening(signed_qty) {
            self.push_lot(fill, fill.quantity);
            self.size += signed_qty;
            self.refresh_lot_average();
            return;
        }

        let direction = sign_of(self.size);
        let mut remaining = fill.quantity;
        while remaining > Decimal::ZERO {
            let Some(lot) = self.lots.front_mut() else {
                break;
            };
            let consumed = lot.quantity.min(remaining);
            self.realized_pnl += direction * (fill.price - lot.price) * consumed;
            lot.quantity -= consumed;
            remaining -= consumed;
            self.size -= direction * consumed;
            if lot.quantity.is_zero() {
                self.lots.pop_front();
            }
        }

        if remaining > Decimal::ZERO {
            // Lots exhausted: what is left opens the opposite side
            self.size = fill.side.signed(remaining);
            self.push_lot(fill, remaining);
        }
        self.refresh_lot_average();
    }

    fn push_lot(&mut self, fill: &Fill, quantity: Decimal) {
        self.lots.push_back(PositionLot {
            quantity,
            price: fill.price,
            timestamp: fill.timestamp,
            order_id: fill.order_id,
        });
    }

    fn refresh_lot_average(&mut self) {
        let quantity: Decimal = self.lots.iter().map(|l| l.quantity).sum();
        self.avg_price = if quantity.is_zero() {
            Decimal::ZERO
        } else {
            self.lots.iter().map(|l| l.quantity * l.price).sum::<Decimal>() / quantity
        };
    }

    /// Mark-to-market P&L of the open quantity
    pub fn unrealized_pnl(&self, mark_price: Decimal) -> Decimal {
        match self.method {
            CostBasisMethod::WeightedAverage => {
                if self.is_flat() {
                    Decimal::ZERO
                } else {
                    self.size * (mark_price - self.avg_price)
                }
            }
            CostBasisMethod::Fifo => {
                let direction = sign_of(self.size);
                self.lots
                    .iter()
                    .map(|lot| direction * (mark_price - lot.price) * lot.quantity)
                    .sum()
            }
        }
    }

    /// Realized plus unrealized P&L
    pub fn total_pnl(&self, mark_price: Decimal) -> Decimal {
        self.realized_pnl + self.unrealized_pnl(mark_price)
    }

    /// Zero all state, keeping symbol and method
    pub fn reset(&mut self) {
        self.size = Decimal::ZERO;
        self.avg_price = Decimal::ZERO;
        self.realized_pnl = Decimal::ZERO;
        self.lots.clear();
        self.last_update = 0;
    }
}

/// +1 for long, -1 for short, 0 when flat
fn sign_of(size: Decimal) -> Decimal {
    if size > Decimal::ZERO {
        Decimal::ONE
    } else if size < Decimal::ZERO {
        Decimal::NEGATIVE_ONE
    } else {
        Decimal::ZERO
    }
}
