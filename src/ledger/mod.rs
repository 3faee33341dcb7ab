//! Position ledger module
//!
//! Per-symbol position state, cost-basis accounting and P&L

mod manager;
mod position;
mod types;

pub use manager::PositionManager;
pub use position::Position;
pub use types::{CostBasisMethod, PositionLot};
