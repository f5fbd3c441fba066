// =============================================================================
// Shared types used across the ticker relay
// =============================================================================

use serde::{Deserialize, Serialize};

/// A normalised one-bucket OHLC candle served by `/history/{ticker}`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Candle {
    /// Bucket start, unix seconds.
    pub time: i64,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
}

/// Simplified ticker update pushed to downstream clients.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TickerPacket {
    pub ticker: String,
    pub price: f64,
    /// Relay wall-clock time in unix seconds (sub-second precision), not the
    /// exchange's event time.
    pub timestamp: f64,
}

impl TickerPacket {
    /// Build a packet stamped with the current wall-clock time.
    pub fn stamped(ticker: impl Into<String>, price: f64) -> Self {
        let now = chrono::Utc::now();
        Self {
            ticker: ticker.into(),
            price,
            timestamp: now.timestamp_micros() as f64 / 1_000_000.0,
        }
    }
}

/// Lifecycle phase of a single downstream/upstream relay pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayPhase {
    Connecting,
    Streaming,
    Closed,
}

impl std::fmt::Display for RelayPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Connecting => write!(f, "Connecting"),
            Self::Streaming => write!(f, "Streaming"),
            Self::Closed => write!(f, "Closed"),
        }
    }
}

/// Why a relay session ended without a fault.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RelayExit {
    DownstreamClosed,
    UpstreamClosed,
}

impl std::fmt::Display for RelayExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::DownstreamClosed => write!(f, "downstream closed"),
            Self::UpstreamClosed => write!(f, "upstream closed"),
        }
    }
}
