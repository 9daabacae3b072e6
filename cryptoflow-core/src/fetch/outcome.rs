//! Typed per-request outcomes.
//!
//! Every request in a batch settles into exactly one [`FetchOutcome`]. Outcomes
//! collapse to [`RawResponse`] only at the normalization boundary, so callers and
//! tests can still tell a rate limit from a timeout.

use super::transport::{HttpResponse, TransportError};
use crate::domain::{MarketChart, RawResponse};
use serde::Serialize;
use serde_json::Value;
use std::fmt;

/// How one request settled.
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// HTTP 200 with a usable market-chart body.
    Success(MarketChart),
    /// HTTP 200 whose body carries an API error indicator.
    EmbeddedError { message: String },
    /// HTTP 429.
    RateLimited { retry_after_secs: Option<u64> },
    /// Any other non-200 status.
    ApiError { status: u16 },
    /// The per-request timeout elapsed.
    Timeout,
    /// Connection failure or a body that could not be read or decoded.
    Transport { message: String },
}

/// Discriminant of a [`FetchOutcome`], for counting and assertions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum OutcomeKind {
    Success,
    EmbeddedError,
    RateLimited,
    ApiError,
    Timeout,
    Transport,
}

impl FetchOutcome {
    /// Classify a completed HTTP exchange.
    pub fn from_response(resp: HttpResponse) -> Self {
        if resp.status == 429 {
            return FetchOutcome::RateLimited {
                retry_after_secs: resp.retry_after_secs,
            };
        }
        if resp.status != 200 {
            return FetchOutcome::ApiError {
                status: resp.status,
            };
        }

        let value: Value = match serde_json::from_str(&resp.body) {
            Ok(v) => v,
            Err(e) => {
                return FetchOutcome::Transport {
                    message: format!("malformed JSON body: {e}"),
                }
            }
        };

        if let Some(message) = embedded_error(&value) {
            return FetchOutcome::EmbeddedError { message };
        }

        match serde_json::from_value::<MarketChart>(value) {
            Ok(chart) => FetchOutcome::Success(chart),
            Err(e) => FetchOutcome::Transport {
                message: format!("unexpected body shape: {e}"),
            },
        }
    }

    pub fn from_transport_error(err: TransportError) -> Self {
        match err {
            TransportError::TimedOut => FetchOutcome::Timeout,
            other => FetchOutcome::Transport {
                message: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> OutcomeKind {
        match self {
            FetchOutcome::Success(_) => OutcomeKind::Success,
            FetchOutcome::EmbeddedError { .. } => OutcomeKind::EmbeddedError,
            FetchOutcome::RateLimited { .. } => OutcomeKind::RateLimited,
            FetchOutcome::ApiError { .. } => OutcomeKind::ApiError,
            FetchOutcome::Timeout => OutcomeKind::Timeout,
            FetchOutcome::Transport { .. } => OutcomeKind::Transport,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, FetchOutcome::Success(_))
    }

    /// Whether a bounded retry may help: rate limits, timeouts, and 5xx.
    pub fn is_retryable(&self) -> bool {
        match self {
            FetchOutcome::RateLimited { .. } | FetchOutcome::Timeout => true,
            FetchOutcome::ApiError { status } => *status >= 500,
            _ => false,
        }
    }

    /// Collapse to what the normalizer consumes.
    pub fn into_raw(self) -> RawResponse {
        match self {
            FetchOutcome::Success(chart) => RawResponse::Success(chart),
            _ => RawResponse::Empty,
        }
    }
}

impl From<FetchOutcome> for RawResponse {
    fn from(outcome: FetchOutcome) -> Self {
        outcome.into_raw()
    }
}

impl fmt::Display for FetchOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FetchOutcome::Success(chart) => write!(f, "ok ({} price points)", chart.prices.len()),
            FetchOutcome::EmbeddedError { message } => write!(f, "api error in body: {message}"),
            FetchOutcome::RateLimited {
                retry_after_secs: Some(secs),
            } => write!(f, "rate limited (retry after {secs}s)"),
            FetchOutcome::RateLimited { .. } => write!(f, "rate limited"),
            FetchOutcome::ApiError { status } => write!(f, "HTTP {status}"),
            FetchOutcome::Timeout => write!(f, "timed out"),
            FetchOutcome::Transport { message } => write!(f, "transport error: {message}"),
        }
    }
}

/// Extract an API error message from an otherwise successful body.
///
/// Recognises `{"error": ...}` and `{"status": {"error_code": ..., "error_message": ...}}`.
fn embedded_error(value: &Value) -> Option<String> {
    let obj = value.as_object()?;

    if let Some(err) = obj.get("error") {
        return match err {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        };
    }

    let status = obj.get("status")?.as_object()?;
    let code = status.get("error_code")?;
    if code.is_null() {
        return None;
    }
    let message = status
        .get("error_message")
        .and_then(Value::as_str)
        .unwrap_or("no message");
    Some(format!("code {code}: {message}"))
}

/// Per-kind counts for one batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchSummary {
    pub total: usize,
    pub succeeded: usize,
    pub embedded_errors: usize,
    pub rate_limited: usize,
    pub api_errors: usize,
    pub timeouts: usize,
    pub transport_errors: usize,
}

impl FetchSummary {
    pub fn from_outcomes(outcomes: &[FetchOutcome]) -> Self {
        let mut summary = FetchSummary {
            total: outcomes.len(),
            ..Default::default()
        };
        for outcome in outcomes {
            match outcome.kind() {
                OutcomeKind::Success => summary.succeeded += 1,
                OutcomeKind::EmbeddedError => summary.embedded_errors += 1,
                OutcomeKind::RateLimited => summary.rate_limited += 1,
                OutcomeKind::ApiError => summary.api_errors += 1,
                OutcomeKind::Timeout => summary.timeouts += 1,
                OutcomeKind::Transport => summary.transport_errors += 1,
            }
        }
        summary
    }

    pub fn failed(&self) -> usize {
        self.total - self.succeeded
    }

    pub fn all_failed(&self) -> bool {
        self.succeeded == 0
    }
}
