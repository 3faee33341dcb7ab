//! Ordered event replay

use crate::data::MarketEvent;

/// Yields events in exchange-timestamp order
///
/// Sources are expected to deliver sorted data. If they do not, the stream
/// logs a warning and stable-sorts, so events sharing a timestamp keep their
/// delivered order.
pub struct EventStream {
    events: std::vec::IntoIter<MarketEvent>,
    total: usize,
    reordered: bool,
}

impl EventStream {
    /// Build a stream, sorting if the input is out of order
    pub fn new(mut events: Vec<MarketEvent>) -> Self {
        let out_of_order = events
            .windows(2)
            .filter(|w| w[1].exchange_ts < w[0].exchange_ts)
            .count();

        if out_of_order > 0 {
            tracing::warn!(
                out_of_order,
                total = events.len(),
                "Events not ordered by exchange timestamp, sorting"
            );
            events.sort_by_key(|e| e.exchange_ts);
        }

        Self {
            total: events.len(),
            events: events.into_iter(),
            reordered: out_of_order > 0,
        }
    }

    /// Number of events in the stream
    pub fn total(&self) -> usize {
        self.total
    }

    /// Whether the input had to be sorted
    pub fn was_reordered(&self) -> bool {
        self.reordered
    }
}

impl Iterator for EventStream {
    type Item = MarketEvent;

    fn next(&mut self) -> Option<Self::Item> {
        self.events.next()
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.events.size_hint()
    }
}
