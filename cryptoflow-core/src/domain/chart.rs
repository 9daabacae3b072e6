//! Market-chart payloads as returned by the `market_chart/range` endpoint.

use serde::{Deserialize, Serialize};

/// One `[epoch_ms, value]` pair. Either element may be `null` upstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SeriesPoint(pub Option<f64>, pub Option<f64>);

impl SeriesPoint {
    pub fn new(timestamp_ms: f64, value: f64) -> Self {
        Self(Some(timestamp_ms), Some(value))
    }

    pub fn timestamp_ms(&self) -> Option<f64> {
        self.0
    }

    pub fn value(&self) -> Option<f64> {
        self.1
    }
}

/// Structured body of a successful market-chart response.
///
/// Missing keys decode as empty series so "is this usable" stays a length check.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketChart {
    #[serde(default)]
    pub prices: Vec<SeriesPoint>,
    #[serde(default)]
    pub total_volumes: Vec<SeriesPoint>,
    #[serde(default)]
    pub market_caps: Vec<SeriesPoint>,
}

impl MarketChart {
    /// True when any of the three series has no points.
    pub fn has_empty_series(&self) -> bool {
        self.prices.is_empty() || self.total_volumes.is_empty() || self.market_caps.is_empty()
    }
}

/// What the normalizer sees for one target.
///
/// A failed request and an instrument with no history in range both arrive as `Empty`.
#[derive(Debug, Clone, PartialEq)]
pub enum RawResponse {
    Success(MarketChart),
    Empty,
}

impl RawResponse {
    pub fn is_empty(&self) -> bool {
        matches!(self, RawResponse::Empty)
    }
}
