//! Order signal module
//!
//! Orders emitted by strategies and the fills they turn into

mod types;

pub use types::{Fill, OrderId, OrderSignal, Side};
