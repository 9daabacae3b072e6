//! Scripted in-memory transport shared by the integration tests.

#![allow(dead_code)]

use async_trait::async_trait;
use cryptoflow_core::domain::FetchRequest;
use cryptoflow_core::fetch::{HttpResponse, HttpSession, Transport, TransportError};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// What the scripted server does for one attempt.
#[derive(Debug, Clone)]
pub enum Step {
    Respond {
        status: u16,
        retry_after_secs: Option<u64>,
        body: String,
        delay: Duration,
    },
    Fail(TransportError),
    /// Never answers; only a fetcher timeout ends it.
    Hang,
}

impl Step {
    pub fn ok(body: impl Into<String>) -> Self {
        Step::Respond {
            status: 200,
            retry_after_secs: None,
            body: body.into(),
            delay: Duration::ZERO,
        }
    }

    pub fn ok_after(body: impl Into<String>, delay: Duration) -> Self {
        Step::Respond {
            status: 200,
            retry_after_secs: None,
            body: body.into(),
            delay,
        }
    }

    pub fn status(status: u16) -> Self {
        Step::Respond {
            status,
            retry_after_secs: None,
            body: String::new(),
            delay: Duration::ZERO,
        }
    }

    pub fn rate_limited(retry_after_secs: u64) -> Self {
        Step::Respond {
            status: 429,
            retry_after_secs: Some(retry_after_secs),
            body: "Rate limit exceeded".into(),
            delay: Duration::ZERO,
        }
    }
}

#[derive(Default)]
struct Script {
    /// Keyed by `instrument/currency`. The last step repeats once the queue drains.
    steps: Mutex<HashMap<String, VecDeque<Step>>>,
    fallback: Mutex<Option<Step>>,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
    calls: AtomicUsize,
    sessions: AtomicUsize,
}

/// Cloneable handle; clones share one script and one set of counters.
#[derive(Clone, Default)]
pub struct ScriptedTransport {
    script: Arc<Script>,
    fail_open: bool,
}

impl ScriptedTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// A transport whose sessions can never be opened.
    pub fn unopenable() -> Self {
        Self {
            fail_open: true,
            ..Self::default()
        }
    }

    pub fn on(self, pair: &str, steps: impl IntoIterator<Item = Step>) -> Self {
        self.script
            .steps
            .lock()
            .unwrap()
            .insert(pair.to_string(), steps.into_iter().collect());
        self
    }

    /// Step used for any pair with no script of its own.
    pub fn otherwise(self, step: Step) -> Self {
        *self.script.fallback.lock().unwrap() = Some(step);
        self
    }

    pub fn peak_in_flight(&self) -> usize {
        self.script.peak.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> usize {
        self.script.calls.load(Ordering::SeqCst)
    }

    pub fn sessions_opened(&self) -> usize {
        self.script.sessions.load(Ordering::SeqCst)
    }

    fn next_step(&self, pair: &str) -> Step {
        let mut steps = self.script.steps.lock().unwrap();
        if let Some(queue) = steps.get_mut(pair) {
            if queue.len() > 1 {
                if let Some(step) = queue.pop_front() {
                    return step;
                }
            }
            if let Some(step) = queue.front() {
                return step.clone();
            }
        }
        self.script
            .fallback
            .lock()
            .unwrap()
            .clone()
            .unwrap_or_else(|| Step::status(404))
    }
}

impl Transport for ScriptedTransport {
    type Session = ScriptedSession;

    fn open_session(&self) -> Result<ScriptedSession, TransportError> {
        if self.fail_open {
            return Err(TransportError::Session("no TLS backend".into()));
        }
        self.script.sessions.fetch_add(1, Ordering::SeqCst);
        Ok(ScriptedSession {
            transport: self.clone(),
        })
    }
}

pub struct ScriptedSession {
    transport: ScriptedTransport,
}

struct InFlight<'a>(&'a AtomicUsize);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl HttpSession for ScriptedSession {
    async fn get(&self, request: &FetchRequest) -> Result<HttpResponse, TransportError> {
        let script = &self.transport.script;
        script.calls.fetch_add(1, Ordering::SeqCst);
        let now = script.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        script.peak.fetch_max(now, Ordering::SeqCst);
        // Decrements on drop, so a cancelled (timed out) request is counted too.
        let _guard = InFlight(&script.in_flight);

        match self.transport.next_step(&request.target.to_string()) {
            Step::Respond {
                status,
                retry_after_secs,
                body,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                } else {
                    tokio::task::yield_now().await;
                }
                Ok(HttpResponse {
                    status,
                    retry_after_secs,
                    body,
                })
            }
            Step::Fail(err) => Err(err),
            Step::Hang => {
                std::future::pending::<()>().await;
                Err(TransportError::Other("unreachable".into()))
            }
        }
    }
}

/// A market-chart body with one point per `(epoch_ms, price)` entry.
pub fn chart_body(points: &[(f64, f64)]) -> String {
    let series = |scale: f64| -> Vec<serde_json::Value> {
        points
            .iter()
            .map(|(ts, v)| serde_json::json!([ts, v * scale]))
            .collect()
    };
    serde_json::json!({
        "prices": series(1.0),
        "total_volumes": series(10.0),
        "market_caps": series(1000.0),
    })
    .to_string()
}

pub const JAN_1_2024_MS: f64 = 1_704_067_200_000.0;
pub const DAY_MS: f64 = 86_400_000.0;
