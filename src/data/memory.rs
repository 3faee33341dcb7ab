//! In-memory data source

use super::{DataRequest, DataSource, MarketEvent};
use anyhow::Context;
use async_trait::async_trait;
use std::path::Path;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

/// Data source backed by a preloaded event list
///
/// Events are returned in stored order; no sorting is applied.
#[derive(Debug, Default)]
pub struct InMemoryDataSource {
    events: Vec<MarketEvent>,
    connected: AtomicBool,
    disconnects: AtomicUsize,
}

impl InMemoryDataSource {
    /// Create a source over the given events
    pub fn new(events: Vec<MarketEvent>) -> Self {
        Self {
            events,
            connected: AtomicBool::new(false),
            disconnects: AtomicUsize::new(0),
        }
    }

    /// Load events from a JSON array file
    pub fn from_json_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read events from {}", path.display()))?;
        let events: Vec<MarketEvent> = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse events in {}", path.display()))?;
        tracing::info!(count = events.len(), path = %path.display(), "Loaded market events");
        Ok(Self::new(events))
    }

    /// Number of stored events
    pub fn len(&self) -> usize {
        self.events.len()
    }

    /// Whether the source holds no events
    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }

    /// Whether `connect` has been called without a matching `disconnect`
    pub fn is_connected(&self) -> bool {
        self.connected.load(Ordering::SeqCst)
    }

    /// Number of `disconnect` calls observed
    pub fn disconnect_count(&self) -> usize {
        self.disconnects.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl DataSource for InMemoryDataSource {
    async fn connect(&self) -> anyhow::Result<()> {
        self.connected.store(true, Ordering::SeqCst);
        tracing::debug!(events = self.events.len(), "In-memory source connected");
        Ok(())
    }

    async fn get_data(&self, request: &DataRequest) -> anyhow::Result<Vec<MarketEvent>> {
        if !self.is_connected() {
            anyhow::bail!("data source is not connected");
        }
        let events: Vec<MarketEvent> = self
            .events
            .iter()
            .filter(|e| request.matches(e))
            .cloned()
            .collect();
        tracing::debug!(
            symbol = %request.symbol,
            start_ns = request.start_ns,
            end_ns = request.end_ns,
            count = events.len(),
            "Fetched events"
        );
        Ok(events)
    }

    async fn disconnect(&self) -> anyhow::Result<()> {
        self.connected.store(false, Ordering::SeqCst);
        self.disconnects.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
