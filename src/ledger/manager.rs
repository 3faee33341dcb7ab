//! Multi-symbol position manager

use super::{CostBasisMethod, Position};
use crate::signal::Fill;
use rust_decimal::Decimal;
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Tracks positions across symbols
///
/// The map sits behind a mutex so a shared manager cannot be re-entered
/// mid-update; all access still happens from one thread of execution.
#[derive(Debug, Default)]
pub struct PositionManager {
    method: CostBasisMethod,
    positions: Mutex<HashMap<String, Position>>,
}

impl PositionManager {
    /// Create an empty manager using the given cost-basis method
    pub fn new(method: CostBasisMethod) -> Self {
        Self {
            method,
            positions: Mutex::new(HashMap::new()),
        }
    }

    /// Cost-basis method for newly created positions
    pub fn method(&self) -> CostBasisMethod {
        self.method
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, Position>> {
        self.positions.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Apply a fill, creating the position on first use
    ///
    /// Returns the realized P&L delta and a snapshot of the updated position.
    pub fn apply_fill(&self, fill: &Fill) -> (Decimal, Position) {
        let mut positions = self.lock();
        let position = positions
            .entry(fill.symbol.clone())
            .or_insert_with(|| Position::new(fill.symbol.clone(), self.method));
        let delta = position.apply_fill(fill);
        (delta, position.clone())
    }

    /// Snapshot of one position
    pub fn position(&self, symbol: &str) -> Option<Position> {
        self.lock().get(symbol).cloned()
    }

    /// Signed size for a symbol (zero if never traded)
    pub fn size(&self, symbol: &str) -> Decimal {
        self.lock().get(symbol).map_or(Decimal::ZERO, |p| p.size)
    }

    /// Snapshot of every position, ordered by symbol
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self.lock().values().cloned().collect();
        positions.sort_by(|a, b| a.symbol.cmp(&b.symbol));
        positions
    }

    /// Realized P&L summed across symbols
    pub fn total_realized_pnl(&self) -> Decimal {
        self.lock().values().map(|p| p.realized_pnl).sum()
    }

    /// Unrealized P&L summed across symbols
    ///
    /// Positions without a mark contribute nothing.
    pub fn total_unrealized_pnl(&self, marks: &HashMap<String, Decimal>) -> Decimal {
        self.lock()
            .values()
            .filter_map(|p| marks.get(&p.symbol).map(|mark| p.unrealized_pnl(*mark)))
            .sum()
    }

    /// Number of non-flat positions
    pub fn open_count(&self) -> usize {
        self.lock().values().filter(|p| !p.is_flat()).count()
    }

    /// Reset every position in place
    pub fn reset(&self) {
        for position in self.lock().values_mut() {
            position.reset();
        }
    }

    /// Drop all positions and switch cost-basis method
    pub fn clear(&mut self, method: CostBasisMethod) {
        self.method = method;
        self.lock().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signal::Side;
    use rust_decimal_macros::dec;
    use uuid::Uuid;

    fn fill(symbol: &str, side: Side, quantity: Decimal, price: Decimal) -> Fill {
        Fill {
            order_id: Uuid::new_v4(),
            symbol: symbol.to_string(),
            side,
            price,
            quantity,
            fee: dec!(0),
            timestamp: 0,
        }
    }

    #[test]
    fn test_creates_position_on_first_fill() {
        let manager = PositionManager::new(CostBasisMethod::WeightedAverage);
        assert!(manager.position("BTCUSDT").is_none());
        assert_eq!(manager.size("BTCUSDT"), dec!(0));

        let (delta, position) = manager.apply_fill(&fill("BTCUSDT", Side::Buy, dec!(1), dec!(100)));
        assert_eq!(delta, dec!(0));
        assert_eq!(position.size, dec!(1));
        assert_eq!(manager.size("BTCUSDT"), dec!(1));
        assert_eq!(manager.open_count(), 1);
    }

    #[test]
    fn test_multi_symbol_totals() {
        let manager = PositionManager::new(CostBasisMethod::Fifo);
        manager.apply_fill(&fill("BTCUSDT", Side::Buy, dec!(1), dec!(100)));
        manager.apply_fill(&fill("ETHUSDT", Side::Sell, dec!(2), dec!(50)));
        manager.apply_fill(&fill("BTCUSDT", Side::Sell, dec!(0.5), dec!(110)));

        assert_eq!(manager.total_realized_pnl(), dec!(5));

        let mut marks = HashMap::new();
        marks.insert("BTCUSDT".to_string(), dec!(120));
        marks.insert("ETHUSDT".to_string(), dec!(45));
        // BTC: 0.5 * 20 = 10, ETH short: 2 * 5 = 10
        assert_eq!(manager.total_unrealized_pnl(&marks), dec!(20));

        let symbols: Vec<String> = manager.positions().into_iter().map(|p| p.symbol).collect();
        assert_eq!(symbols, vec!["BTCUSDT", "ETHUSDT"]);
    }

    #[test]
    fn test_unmarked_positions_ignored() {
        let manager = PositionManager::new(CostBasisMethod::WeightedAverage);
        manager.apply_fill(&fill("BTCUSDT", Side::Buy, dec!(1), dec!(100)));
        assert_eq!(manager.total_unrealized_pnl(&HashMap::new()), dec!(0));
    }

    #[test]
    fn test_open_count_and_clear() {
        let mut manager = PositionManager::new(CostBasisMethod::WeightedAverage);
        manager.apply_fill(&fill("BTCUSDT", Side::Buy, dec!(1), dec!(100)));
        manager.apply_fill(&fill("ETHUSDT", Side::Buy, dec!(1), dec!(50)));
        manager.apply_fill(&fill("ETHUSDT", Side::Sell, dec!(1), dec!(55)));
        // Flat positions are kept but not counted as open
        assert_eq!(manager.open_count(), 1);
        assert_eq!(manager.positions().len(), 2);

        manager.reset();
        assert_eq!(manager.open_count(), 0);
        assert!(manager.position("BTCUSDT").is_some_and(|p| p.is_flat()));

        manager.clear(CostBasisMethod::Fifo);
        assert!(manager.positions().is_empty());
        assert_eq!(manager.method(), CostBasisMethod::Fifo);
    }
}
