//! Fetch targets, time ranges, and the HTTP requests derived from them.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// One (instrument, quote currency) pair to retrieve market data for.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FetchTarget {
    pub instrument_id: String,
    pub quote_currency: String,
}

impl FetchTarget {
    pub fn new(instrument_id: impl Into<String>, quote_currency: impl Into<String>) -> Self {
        Self {
            instrument_id: instrument_id.into(),
            quote_currency: quote_currency.into(),
        }
    }
}

impl fmt::Display for FetchTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.instrument_id, self.quote_currency)
    }
}

/// Inclusive time window in epoch seconds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: i64,
    pub end: i64,
}

impl TimeRange {
    pub fn new(start: i64, end: i64) -> Self {
        Self { start, end }
    }

    /// Window covering the `days` days before `now`.
    ///
    /// `None` when the start falls outside chrono's representable range.
    pub fn trailing_days(now: DateTime<Utc>, days: u32) -> Option<Self> {
        let start = now.checked_sub_signed(Duration::try_days(i64::from(days))?)?;
        Some(Self {
            start: start.timestamp(),
            end: now.timestamp(),
        })
    }
}

/// A single planned GET request. Exists only for the duration of one batch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchRequest {
    pub endpoint: String,
    /// Ordered query parameters: `vs_currency`, `from`, `to`.
    pub query_params: Vec<(String, String)>,
    pub target: FetchTarget,
}

impl FetchRequest {
    /// Value of a query parameter by name.
    pub fn param(&self, name: &str) -> Option<&str> {
        self.query_params
            .iter()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.as_str())
    }
}
