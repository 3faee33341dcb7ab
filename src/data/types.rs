//! Market event types

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// A single recorded market event
///
/// Events are immutable once produced and are expected to arrive ordered by
/// `exchange_ts`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MarketEvent {
    /// Instrument symbol (e.g., "BTCUSDT")
    pub symbol: String,
    /// Venue the event was recorded from
    #[serde(default)]
    pub venue: String,
    /// Exchange timestamp (ns)
    pub exchange_ts: i64,
    /// Local receive timestamp (ns)
    #[serde(default)]
    pub receive_ts: i64,
    /// Publish timestamp (ns)
    #[serde(default)]
    pub publish_ts: i64,
    /// Type-specific payload
    pub payload: EventPayload,
}

/// Type-specific event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventPayload {
    /// Public trade print
    Trade(TradeTick),
    /// OHLCV bar
    Kline(Kline),
    /// Top of book
    BookTop(BookTop),
}

/// Public trade print
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeTick {
    /// Trade price
    pub price: Decimal,
    /// Trade quantity
    pub quantity: Decimal,
    /// Whether the buyer was the maker
    #[serde(default)]
    pub is_buyer_maker: bool,
}

/// OHLCV bar
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Kline {
    pub open: Decimal,
    pub high: Decimal,
    pub low: Decimal,
    pub close: Decimal,
    pub volume: Decimal,
    /// Interval open time (ns)
    pub open_ts: i64,
    /// Interval close time (ns)
    pub close_ts: i64,
}

/// Best bid/ask levels
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BookTop {
    pub bid_price: Decimal,
    pub bid_quantity: Decimal,
    pub ask_price: Decimal,
    pub ask_quantity: Decimal,
}

impl MarketEvent {
    /// Build a trade event with identical exchange/receive/publish timestamps
    pub fn trade(symbol: impl Into<String>, timestamp: i64, price: Decimal, quantity: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            venue: String::new(),
            exchange_ts: timestamp,
            receive_ts: timestamp,
            publish_ts: timestamp,
            payload: EventPayload::Trade(TradeTick {
                price,
                quantity,
                is_buyer_maker: false,
            }),
        }
    }

    /// Reference price used for fills and marking
    ///
    /// Trade price, kline close, or book mid.
    pub fn price(&self) -> Decimal {
        match &self.payload {
            EventPayload::Trade(t) => t.price,
            EventPayload::Kline(k) => k.close,
            EventPayload::BookTop(b) => (b.bid_price + b.ask_price) / dec!(2),
        }
    }

    /// Short name of the payload type
    pub fn kind(&self) -> &'static str {
        match self.payload {
            EventPayload::Trade(_) => "trade",
            EventPayload::Kline(_) => "kline",
            EventPayload::BookTop(_) => "book_top",
        }
    }
}

/// Parameters for a historical data fetch
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct DataRequest {
    /// Symbol to fetch; empty matches every symbol
    pub symbol: String,
    /// Inclusive start (ns)
    pub start_ns: i64,
    /// Exclusive end (ns)
    pub end_ns: i64,
    /// Data type identifier (e.g., "trade", "kline")
    pub data_type: String,
    /// Bar interval identifier (e.g., "1m")
    pub time_frame: String,
}

impl DataRequest {
    /// Whether an event falls inside this request
    pub fn matches(&self, event: &MarketEvent) -> bool {
        (self.symbol.is_empty() || self.symbol == event.symbol)
            && event.exchange_ts >= self.start_ns
            && event.exchange_ts < self.end_ns
    }
}
