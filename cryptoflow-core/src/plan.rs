//! Request planning: targets × time range → GET requests.

use crate::domain::{FetchRequest, FetchTarget, TimeRange};

/// Cartesian product of instruments and currencies, instrument-major.
///
/// Duplicates in either list are kept and produce duplicate targets.
pub fn cartesian_targets<I, C>(instruments: &[I], currencies: &[C]) -> Vec<FetchTarget>
where
    I: AsRef<str>,
    C: AsRef<str>,
{
    instruments
        .iter()
        .flat_map(|instrument| {
            currencies
                .iter()
                .map(move |currency| FetchTarget::new(instrument.as_ref(), currency.as_ref()))
        })
        .collect()
}

/// Builds `market_chart/range` requests against one API base URL.
#[derive(Debug, Clone)]
pub struct RequestPlanner {
    base_url: String,
}

impl RequestPlanner {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim().trim_end_matches('/').to_string();
        Self { base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// One request per target, in target order.
    pub fn build(&self, targets: &[FetchTarget], range: TimeRange) -> Vec<FetchRequest> {
        targets
            .iter()
            .map(|target| FetchRequest {
                endpoint: format!(
                    "{}/coins/{}/market_chart/range",
                    self.base_url, target.instrument_id
                ),
                query_params: vec![
                    ("vs_currency".to_string(), target.quote_currency.clone()),
                    ("from".to_string(), range.start.to_string()),
                    ("to".to_string(), range.end.to_string()),
                ],
                target: target.clone(),
            })
            .collect()
    }
}
