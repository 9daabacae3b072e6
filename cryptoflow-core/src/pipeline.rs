//! Plan → fetch → normalize, one batch at a time.

use crate::config::PipelineConfig;
use crate::domain::{FetchTarget, RawResponse, TimeRange};
use crate::fetch::{FetchSummary, RateLimitedFetcher, ReqwestTransport, Transport};
use crate::normalize::{NormalizeError, NormalizedTable, ResponseNormalizer};
use crate::plan::RequestPlanner;
use thiserror::Error;
use tracing::{error, info};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("fetcher returned {outcomes} outcomes for {requests} requests")]
    ArityMismatch { outcomes: usize, requests: usize },

    #[error(transparent)]
    Normalize(#[from] NormalizeError),
}

/// Wires a planner, a fetcher and a normalizer into a single run.
///
/// No retries happen at this layer; a failed run is reported to the caller.
pub struct PipelineOrchestrator<T: Transport> {
    planner: RequestPlanner,
    fetcher: RateLimitedFetcher<T>,
    normalizer: ResponseNormalizer,
    last_summary: Option<FetchSummary>,
}

impl PipelineOrchestrator<ReqwestTransport> {
    /// Production orchestrator over reqwest, configured from `config`.
    pub fn from_config(config: &PipelineConfig) -> Self {
        let fetcher = RateLimitedFetcher::new(ReqwestTransport::new())
            .with_max_concurrent(config.max_concurrent)
            .with_timeout(config.request_timeout())
            .with_retry(config.retry.clone());
        Self::new(RequestPlanner::new(config.base_url.as_str()), fetcher)
    }
}

impl<T: Transport> PipelineOrchestrator<T> {
    pub fn new(planner: RequestPlanner, fetcher: RateLimitedFetcher<T>) -> Self {
        Self {
            planner,
            fetcher,
            normalizer: ResponseNormalizer::new(),
            last_summary: None,
        }
    }

    pub fn planner(&self) -> &RequestPlanner {
        &self.planner
    }

    pub fn fetcher(&self) -> &RateLimitedFetcher<T> {
        &self.fetcher
    }

    /// Outcome counts of the last run's fetch batch.
    pub fn summary(&self) -> Option<&FetchSummary> {
        self.last_summary.as_ref()
    }

    /// Table kept by the normalizer from the last run.
    pub fn table(&self) -> &NormalizedTable {
        self.normalizer.table()
    }

    /// Run one full batch for `targets` over `range`.
    pub async fn run(
        &mut self,
        targets: &[FetchTarget],
        range: TimeRange,
    ) -> Result<NormalizedTable, PipelineError> {
        let requests = self.planner.build(targets, range);
        info!(
            requests = requests.len(),
            start = range.start,
            end = range.end,
            "starting pipeline run"
        );

        let outcomes = self.fetcher.gather(&requests).await;
        self.last_summary = Some(FetchSummary::from_outcomes(&outcomes));

        if outcomes.len() != requests.len() {
            error!(
                outcomes = outcomes.len(),
                requests = requests.len(),
                "fetch arity mismatch, abandoning batch"
            );
            return Err(PipelineError::ArityMismatch {
                outcomes: outcomes.len(),
                requests: requests.len(),
            });
        }

        let responses: Vec<RawResponse> = outcomes.into_iter().map(RawResponse::from).collect();
        let table = self.normalizer.normalize(&responses, targets)?;

        info!(rows = table.height(), "pipeline run complete");
        Ok(table)
    }
}
