//! Cryptoflow Core: market-data acquisition and normalization.
//!
//! This crate contains the ingestion pipeline:
//! - Domain types (targets, time ranges, requests, market charts)
//! - Request planning over instruments × quote currencies
//! - Rate-limited concurrent fetch with typed per-request outcomes
//! - Normalization into one deduplicated, categorical polars table
//! - The orchestrator that runs plan → fetch → normalize

pub mod config;
pub mod domain;
pub mod fetch;
pub mod normalize;
pub mod pipeline;
pub mod plan;

pub use config::{ConfigError, PipelineConfig};
pub use domain::{FetchRequest, FetchTarget, MarketChart, RawResponse, SeriesPoint, TimeRange};
pub use fetch::{FetchOutcome, FetchSummary, RateLimitedFetcher, RetryPolicy, Transport};
pub use normalize::{NormalizeError, NormalizedRow, NormalizedTable, ResponseNormalizer};
pub use pipeline::{PipelineError, PipelineOrchestrator};
pub use plan::{cartesian_targets, RequestPlanner};
