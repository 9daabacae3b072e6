//! Domain types shared by every pipeline stage.

pub mod chart;
pub mod target;

pub use chart::{MarketChart, RawResponse, SeriesPoint};
pub use target::{FetchRequest, FetchTarget, TimeRange};
