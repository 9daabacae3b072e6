//! Concurrent, permit-capped batch fetch.

use super::outcome::{FetchOutcome, FetchSummary};
use super::retry::RetryPolicy;
use super::transport::{HttpSession, Transport};
use crate::domain::FetchRequest;
use futures::future::join_all;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, error, info, warn};

/// Issues a batch of GETs concurrently with at most `max_concurrent` in flight.
///
/// `gather` never fails: each position settles into a [`FetchOutcome`], and the
/// output has the same length and order as the input.
pub struct RateLimitedFetcher<T: Transport> {
    transport: T,
    max_concurrent: usize,
    timeout: Duration,
    retry: RetryPolicy,
}

impl<T: Transport> RateLimitedFetcher<T> {
    pub const DEFAULT_MAX_CONCURRENT: usize = 3;
    pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

    pub fn new(transport: T) -> Self {
        Self {
            transport,
            max_concurrent: Self::DEFAULT_MAX_CONCURRENT,
            timeout: Self::DEFAULT_TIMEOUT,
            retry: RetryPolicy::none(),
        }
    }

    /// Permit capacity. Clamped to at least 1.
    pub fn with_max_concurrent(mut self, max_concurrent: usize) -> Self {
        self.max_concurrent = max_concurrent.max(1);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn max_concurrent(&self) -> usize {
        self.max_concurrent
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Fetch every request and wait for all of them to settle.
    pub async fn gather(&self, requests: &[FetchRequest]) -> Vec<FetchOutcome> {
        if requests.is_empty() {
            return Vec::new();
        }

        let session = match self.transport.open_session() {
            Ok(session) => session,
            Err(e) => {
                error!(error = %e, requests = requests.len(), "batch setup failed");
                return requests
                    .iter()
                    .map(|_| FetchOutcome::from_transport_error(e.clone()))
                    .collect();
            }
        };

        let permits = Semaphore::new(self.max_concurrent);
        let started = Instant::now();

        let outcomes = join_all(
            requests
                .iter()
                .map(|request| self.fetch_one(&session, &permits, request)),
        )
        .await;

        let summary = FetchSummary::from_outcomes(&outcomes);
        info!(
            total = summary.total,
            succeeded = summary.succeeded,
            failed = summary.failed(),
            max_concurrent = self.max_concurrent,
            elapsed_ms = started.elapsed().as_millis() as u64,
            "fetch batch settled"
        );

        outcomes
    }

    async fn fetch_one(
        &self,
        session: &T::Session,
        permits: &Semaphore,
        request: &FetchRequest,
    ) -> FetchOutcome {
        // Held until this request settles, retries included.
        let _permit = match permits.acquire().await {
            Ok(permit) => permit,
            Err(_) => {
                return FetchOutcome::Transport {
                    message: "permit pool closed".into(),
                }
            }
        };

        let mut attempt = 0;
        loop {
            let outcome = self.attempt(session, request).await;

            if outcome.is_retryable() && attempt < self.retry.max_retries {
                let delay = self.retry.delay_for(attempt);
                debug!(
                    target_pair = %request.target,
                    attempt = attempt + 1,
                    delay_ms = delay.as_millis() as u64,
                    outcome = %outcome,
                    "retrying request"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
                continue;
            }

            log_outcome(request, &outcome, attempt);
            return outcome;
        }
    }

    async fn attempt(&self, session: &T::Session, request: &FetchRequest) -> FetchOutcome {
        match tokio::time::timeout(self.timeout, session.get(request)).await {
            Err(_) => FetchOutcome::Timeout,
            Ok(Err(e)) => FetchOutcome::from_transport_error(e),
            Ok(Ok(resp)) => FetchOutcome::from_response(resp),
        }
    }
}

fn log_outcome(request: &FetchRequest, outcome: &FetchOutcome, retries: u32) {
    let pair = &request.target;
    match outcome {
        FetchOutcome::Success(chart) => debug!(
            target_pair = %pair,
            points = chart.prices.len(),
            retries,
            "fetched market chart"
        ),
        FetchOutcome::RateLimited { retry_after_secs } => warn!(
            target_pair = %pair,
            endpoint = %request.endpoint,
            retry_after_secs = ?retry_after_secs,
            retries,
            "rate limited by market-data API (HTTP 429)"
        ),
        FetchOutcome::ApiError { status } => warn!(
            target_pair = %pair,
            endpoint = %request.endpoint,
            status,
            retries,
            "unable to fetch market chart"
        ),
        FetchOutcome::EmbeddedError { message } => warn!(
            target_pair = %pair,
            endpoint = %request.endpoint,
            message = %message,
            "market-data API returned an error body"
        ),
        FetchOutcome::Timeout => warn!(
            target_pair = %pair,
            endpoint = %request.endpoint,
            retries,
            "request timed out"
        ),
        FetchOutcome::Transport { message } => warn!(
            target_pair = %pair,
            endpoint = %request.endpoint,
            message = %message,
            "transport error"
        ),
    }
}
