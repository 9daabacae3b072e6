//! Cryptoflow Store: persistence and analytics for normalized market tables.
//!
//! - SQLite loading with insert-ignore semantics on (date_key, instrument_id, quote_currency)
//! - Window-function analytics: spikes, moving averages, volatility, monthly summaries
//! - CSV export for external chart renderers

pub mod analytics;
pub mod config;
pub mod error;
pub mod export;
pub mod loader;

pub use analytics::{
    volume_share, GrowthRow, MarketAnalyzer, Metric, MonthlyRow, MovingAverageRow, RankedRow,
    SortOrder, SpikeQuery, VolumeShare,
};
pub use config::{validate_identifier, StoreConfig};
pub use error::StoreError;
pub use export::{export_rows_csv, export_table_csv, write_csv};
pub use loader::DatabaseLoader;
