//! Rate-limited market-data fetching.

pub mod fetcher;
pub mod outcome;
pub mod retry;
pub mod transport;

pub use fetcher::RateLimitedFetcher;
pub use outcome::{FetchOutcome, FetchSummary, OutcomeKind};
pub use retry::RetryPolicy;
pub use transport::{
    HttpResponse, HttpSession, ReqwestSession, ReqwestTransport, Transport, TransportError,
};
