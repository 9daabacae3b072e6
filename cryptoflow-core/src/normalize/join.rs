//! Timestamp join of the three market-chart series.
//!
//! Series are matched on exact timestamp equality. A timestamp that appears
//! more than once in a series multiplies the matches, and output follows the
//! order of the price series.

use crate::domain::{MarketChart, SeriesPoint};
use chrono::{DateTime, Datelike};
use std::collections::HashMap;

/// One timestamp present in all three series.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct JoinedPoint {
    pub timestamp_ms: f64,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub capitalization: Option<f64>,
}

/// Inner join of prices, volumes and caps on timestamp.
///
/// Points with a missing or non-finite timestamp never match.
pub fn join_series(chart: &MarketChart) -> Vec<JoinedPoint> {
    let volumes = index_by_timestamp(&chart.total_volumes);
    let caps = index_by_timestamp(&chart.market_caps);

    let mut joined = Vec::with_capacity(chart.prices.len());
    for point in &chart.prices {
        let Some(ts) = finite_timestamp(point) else {
            continue;
        };
        let key = timestamp_key(ts);
        let (Some(vols), Some(cps)) = (volumes.get(&key), caps.get(&key)) else {
            continue;
        };

        for volume in vols {
            for capitalization in cps {
                joined.push(JoinedPoint {
                    timestamp_ms: ts,
                    price: clean_value(point.value()),
                    volume: *volume,
                    capitalization: *capitalization,
                });
            }
        }
    }
    joined
}

/// Epoch milliseconds → UTC calendar day as `YYYYMMDD`.
///
/// Returns `None` for non-finite input and for dates outside years 1..=9999.
pub fn date_key_from_millis(ms: f64) -> Option<i32> {
    if !ms.is_finite() {
        return None;
    }
    let floored = ms.floor();
    if floored < i64::MIN as f64 || floored > i64::MAX as f64 {
        return None;
    }
    let dt = DateTime::from_timestamp_millis(floored as i64)?;
    let year = dt.year();
    if !(1..=9999).contains(&year) {
        return None;
    }
    Some(year * 10_000 + dt.month() as i32 * 100 + dt.day() as i32)
}

/// Round to 2 decimals, ties to even on the scaled value.
pub fn round2(value: f64) -> f64 {
    if !value.is_finite() {
        return value;
    }
    (value * 100.0).round_ties_even() / 100.0
}

fn index_by_timestamp(points: &[SeriesPoint]) -> HashMap<u64, Vec<Option<f64>>> {
    let mut index: HashMap<u64, Vec<Option<f64>>> = HashMap::new();
    for point in points {
        if let Some(ts) = finite_timestamp(point) {
            index
                .entry(timestamp_key(ts))
                .or_default()
                .push(clean_value(point.value()));
        }
    }
    index
}

fn finite_timestamp(point: &SeriesPoint) -> Option<f64> {
    point.timestamp_ms().filter(|ts| ts.is_finite())
}

// 0.0 and -0.0 compare equal but differ in bits.
fn timestamp_key(ts: f64) -> u64 {
    if ts == 0.0 {
        0
    } else {
        ts.to_bits()
    }
}

fn clean_value(value: Option<f64>) -> Option<f64> {
    value.filter(|v| !v.is_nan())
}
