//! Market data module
//!
//! Event types and the historical data source boundary

mod memory;
mod types;

pub use memory::InMemoryDataSource;
pub use types::{BookTop, DataRequest, EventPayload, Kline, MarketEvent, TradeTick};

use async_trait::async_trait;

/// Trait for historical market data sources
///
/// Implementations return a finite, time-ordered event list for a request.
#[async_trait]
pub trait DataSource: Send + Sync {
    /// Open the underlying connection
    async fn connect(&self) -> anyhow::Result<()>;
    /// Fetch every event matching the request
    async fn get_data(&self, request: &DataRequest) -> anyhow::Result<Vec<MarketEvent>>;
    /// Close the underlying connection
    async fn disconnect(&self) -> anyhow::Result<()>;
}
