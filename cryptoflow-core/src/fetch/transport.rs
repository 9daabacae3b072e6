//! HTTP transport abstraction.
//!
//! The fetcher only needs "open a session, issue GETs on it". Keeping that behind
//! a trait lets tests script responses, delays, and failures without a network;
//! production uses [`ReqwestTransport`].

use crate::domain::FetchRequest;
use async_trait::async_trait;
use std::time::Duration;
use thiserror::Error;

/// Status, selected headers, and body of an HTTP response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    /// Parsed `Retry-After` header, in seconds.
    pub retry_after_secs: Option<u64>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            retry_after_secs: None,
            body: body.into(),
        }
    }
}

/// Transport-level failures: nothing usable came back from the server.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    #[error("failed to open HTTP session: {0}")]
    Session(String),

    #[error("connection failed: {0}")]
    Connect(String),

    #[error("transport timed out")]
    TimedOut,

    #[error("failed to read response body: {0}")]
    Body(String),

    #[error("request failed: {0}")]
    Other(String),
}

/// A connection context shared by every request in one batch.
#[async_trait]
pub trait HttpSession: Send + Sync {
    async fn get(&self, request: &FetchRequest) -> Result<HttpResponse, TransportError>;
}

/// Opens sessions. One session is opened per batch and dropped when it settles.
pub trait Transport: Send + Sync {
    type Session: HttpSession;

    fn open_session(&self) -> Result<Self::Session, TransportError>;
}

/// reqwest-backed transport.
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    user_agent: String,
    connect_timeout: Duration,
}

impl ReqwestTransport {
    pub fn new() -> Self {
        Self {
            user_agent: format!("cryptoflow/{}", env!("CARGO_PKG_VERSION")),
            connect_timeout: Duration::from_secs(10),
        }
    }

    pub fn with_user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }
}

impl Default for ReqwestTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for ReqwestTransport {
    type Session = ReqwestSession;

    fn open_session(&self) -> Result<ReqwestSession, TransportError> {
        let client = reqwest::Client::builder()
            .user_agent(&self.user_agent)
            .connect_timeout(self.connect_timeout)
            .build()
            .map_err(|e| TransportError::Session(e.to_string()))?;
        Ok(ReqwestSession { client })
    }
}

/// A pooled reqwest client living for one batch.
#[derive(Debug)]
pub struct ReqwestSession {
    client: reqwest::Client,
}

#[async_trait]
impl HttpSession for ReqwestSession {
    async fn get(&self, request: &FetchRequest) -> Result<HttpResponse, TransportError> {
        let resp = self
            .client
            .get(&request.endpoint)
            .query(&request.query_params)
            .send()
            .await
            .map_err(classify_reqwest_error)?;

        let status = resp.status().as_u16();
        let retry_after_secs = resp
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.trim().parse::<u64>().ok());

        let body = resp
            .text()
            .await
            .map_err(|e| TransportError::Body(e.to_string()))?;

        Ok(HttpResponse {
            status,
            retry_after_secs,
            body,
        })
    }
}

fn classify_reqwest_error(e: reqwest::Error) -> TransportError {
    if e.is_timeout() {
        TransportError::TimedOut
    } else if e.is_connect() {
        TransportError::Connect(e.to_string())
    } else {
        TransportError::Other(e.to_string())
    }
}
