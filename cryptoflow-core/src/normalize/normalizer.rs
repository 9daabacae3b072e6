use super::join::{date_key_from_millis, join_series, round2};
use super::table::{NormalizedRow, NormalizedTable, TableError};
use crate::domain::{FetchTarget, RawResponse};
use thiserror::Error;
use tracing::{debug, error, warn};

#[derive(Debug, Error)]
pub enum NormalizeError {
    #[error("got {responses} responses for {targets} targets; batch abandoned")]
    ArityMismatch { responses: usize, targets: usize },

    #[error(transparent)]
    Table(#[from] TableError),
}

/// Reshapes a batch of raw responses into one [`NormalizedTable`].
///
/// The most recent result is kept and replaced by each call.
#[derive(Debug, Default)]
pub struct ResponseNormalizer {
    table: NormalizedTable,
}

impl ResponseNormalizer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Table produced by the last call to [`normalize`](Self::normalize).
    pub fn table(&self) -> &NormalizedTable {
        &self.table
    }

    /// Normalize `responses[i]` as the data for `targets[i]`.
    ///
    /// A length mismatch abandons the whole batch and leaves an empty table.
    /// Empty responses, and responses with any empty series, are skipped.
    pub fn normalize(
        &mut self,
        responses: &[RawResponse],
        targets: &[FetchTarget],
    ) -> Result<NormalizedTable, NormalizeError> {
        if responses.len() != targets.len() {
            error!(
                responses = responses.len(),
                targets = targets.len(),
                "response count does not match target count"
            );
            self.table = NormalizedTable::empty();
            return Err(NormalizeError::ArityMismatch {
                responses: responses.len(),
                targets: targets.len(),
            });
        }

        let mut rows = Vec::new();
        for (response, target) in responses.iter().zip(targets) {
            let chart = match response {
                RawResponse::Success(chart) if !chart.has_empty_series() => chart,
                RawResponse::Success(_) | RawResponse::Empty => {
                    warn!(target_pair = %target, "no usable market data, skipping");
                    continue;
                }
            };

            let before = rows.len();
            for point in join_series(chart) {
                let Some(date_key) = date_key_from_millis(point.timestamp_ms) else {
                    continue;
                };
                rows.push(NormalizedRow {
                    date_key,
                    price: point.price.map(round2),
                    volume: point.volume.map(round2),
                    capitalization: point.capitalization.map(round2),
                    instrument_id: target.instrument_id.clone(),
                    quote_currency: target.quote_currency.clone(),
                });
            }
            debug!(target_pair = %target, rows = rows.len() - before, "joined series");
        }

        if rows.is_empty() {
            warn!(targets = targets.len(), "no rows produced, table is empty");
        }

        // Store empty on failure so a stale table never outlives a bad batch.
        let table = match NormalizedTable::from_rows(rows) {
            Ok(table) => table,
            Err(e) => {
                self.table = NormalizedTable::empty();
                return Err(e.into());
            }
        };
        self.table = table.clone();
        Ok(table)
    }
}
