//! Backtest engine types

use crate::signal::{OrderId, Side};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use thiserror::Error;

/// One executed fill in the audit trail
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    /// Simulated order ID
    pub order_id: OrderId,
    /// Exchange timestamp of the triggering event (ns)
    pub timestamp: i64,
    /// Instrument symbol
    pub symbol: String,
    /// Trade direction
    pub side: Side,
    /// Fill price after slippage
    pub price: Decimal,
    /// Filled quantity
    pub quantity: Decimal,
    /// Fee charged
    pub fee: Decimal,
    /// Change in realized P&L caused by this fill (fee excluded)
    pub pnl: Decimal,
    /// Strategy that produced the signal
    pub strategy_id: String,
}

impl TradeRecord {
    /// Traded value (price * quantity)
    pub fn value(&self) -> Decimal {
        self.price * self.quantity
    }
}

/// Engine lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineState {
    /// No configuration loaded
    #[default]
    Uninitialized,
    /// Configured and ready to run
    Initialized,
    /// Replaying events
    Running,
    /// Replayed every event
    Completed,
    /// Aborted by an error
    Failed,
    /// Stopped by request before the last event
    Stopped,
}

impl EngineState {
    /// Whether the run has finished, successfully or not
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Stopped)
    }
}

impl fmt::Display for EngineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Uninitialized => "uninitialized",
            Self::Initialized => "initialized",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Stopped => "stopped",
        };
        f.write_str(name)
    }
}

/// Backtest engine errors
#[derive(Debug, Error)]
pub enum BacktestError {
    /// Operation not allowed in the current state
    #[error("engine is {actual}, expected {expected}")]
    InvalidState {
        expected: EngineState,
        actual: EngineState,
    },

    /// No strategy attached
    #[error("no strategy set")]
    MissingStrategy,

    /// No data source attached
    #[error("no data source set")]
    MissingDataSource,

    /// Data source failed to connect or fetch
    #[error("data source error: {0}")]
    DataSource(String),

    /// Strategy refused its configuration
    #[error("strategy initialization failed: {0}")]
    StrategyInit(String),

    /// Strategy failed while handling an event
    #[error("strategy error: {0}")]
    Strategy(String),
}

/// Cooperative cancellation flag for a running backtest
///
/// Cloned handles share one flag. The engine checks it once per event.
#[derive(Debug, Clone, Default)]
pub struct StopHandle(Arc<AtomicBool>);

impl StopHandle {
    /// Request a stop
    pub fn stop(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    /// Whether a stop has been requested
    pub fn is_stopped(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    pub(crate) fn clear(&self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_terminal_states() {
        assert!(!EngineState::Uninitialized.is_terminal());
        assert!(!EngineState::Initialized.is_terminal());
        assert!(!EngineState::Running.is_terminal());
        assert!(EngineState::Completed.is_terminal());
        assert!(EngineState::Failed.is_terminal());
        assert!(EngineState::Stopped.is_terminal());
    }

    #[test]
    fn test_invalid_state_message() {
        let err = BacktestError::InvalidState {
            expected: EngineState::Initialized,
            actual: EngineState::Completed,
        };
        assert_eq!(err.to_string(), "engine is completed, expected initialized");
    }

    #[test]
    fn test_stop_handle_shared() {
        let handle = StopHandle::default();
        let clone = handle.clone();
        assert!(!clone.is_stopped());

        handle.stop();
        assert!(clone.is_stopped());

        clone.clear();
        assert!(!handle.is_stopped());
    }
}
