//! The normalized market table handed to storage and analytics.

use super::schema::{
    SchemaError, TableSchema, CAPITALIZATION, DATE_KEY, INSTRUMENT_ID, PRICE, QUOTE_CURRENCY,
    VOLUME,
};
use polars::prelude::*;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TableError {
    #[error("polars error: {0}")]
    Polars(#[from] PolarsError),

    #[error(transparent)]
    Schema(#[from] SchemaError),

    #[error("unexpected null in column '{column}' at row {row}")]
    UnexpectedNull { column: &'static str, row: usize },
}

/// One calendar day of market data for one pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalizedRow {
    /// `YYYYMMDD`.
    pub date_key: i32,
    pub price: Option<f64>,
    pub volume: Option<f64>,
    pub capitalization: Option<f64>,
    pub instrument_id: String,
    pub quote_currency: String,
}

/// Consolidated, deduplicated, typed table. Never mutated once built.
#[derive(Debug, Clone)]
pub struct NormalizedTable {
    frame: DataFrame,
}

impl NormalizedTable {
    /// A table with the full schema and no rows.
    pub fn empty() -> Self {
        Self {
            frame: DataFrame::empty_with_schema(&TableSchema::schema()),
        }
    }

    /// Build from rows: exact duplicates dropped (first kept, order stable),
    /// identity columns cast to categorical.
    pub fn from_rows(rows: Vec<NormalizedRow>) -> Result<Self, TableError> {
        if rows.is_empty() {
            return Ok(Self::empty());
        }

        let n = rows.len();
        let mut date_keys = Vec::with_capacity(n);
        let mut prices = Vec::with_capacity(n);
        let mut volumes = Vec::with_capacity(n);
        let mut caps = Vec::with_capacity(n);
        let mut instruments = Vec::with_capacity(n);
        let mut currencies = Vec::with_capacity(n);

        for row in rows {
            date_keys.push(row.date_key);
            prices.push(row.price);
            volumes.push(row.volume);
            caps.push(row.capitalization);
            instruments.push(row.instrument_id);
            currencies.push(row.quote_currency);
        }

        let columns: Vec<Column> = vec![
            Series::new(DATE_KEY.into(), date_keys).into(),
            Series::new(PRICE.into(), prices).into(),
            Series::new(VOLUME.into(), volumes).into(),
            Series::new(CAPITALIZATION.into(), caps).into(),
            Series::new(INSTRUMENT_ID.into(), instruments).into(),
            Series::new(QUOTE_CURRENCY.into(), currencies).into(),
        ];

        let frame = DataFrame::new(columns)?
            .lazy()
            .unique_stable(None, UniqueKeepStrategy::First)
            .with_columns([
                col(INSTRUMENT_ID).cast(TableSchema::categorical()),
                col(QUOTE_CURRENCY).cast(TableSchema::categorical()),
            ])
            .collect()?;

        Ok(Self { frame })
    }

    /// Wrap an existing frame after checking it against the schema.
    pub fn from_frame(frame: DataFrame) -> Result<Self, TableError> {
        TableSchema::validate(&frame)?;
        Ok(Self { frame })
    }

    pub fn is_empty(&self) -> bool {
        self.frame.height() == 0
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    /// Materialize the table as rows, in table order.
    pub fn rows(&self) -> Result<Vec<NormalizedRow>, TableError> {
        let date_keys = self.frame.column(DATE_KEY)?.as_materialized_series().i32()?.clone();
        let prices = self.frame.column(PRICE)?.as_materialized_series().f64()?.clone();
        let volumes = self.frame.column(VOLUME)?.as_materialized_series().f64()?.clone();
        let caps = self
            .frame
            .column(CAPITALIZATION)?
            .as_materialized_series()
            .f64()?
            .clone();
        let instruments = self.string_column(INSTRUMENT_ID)?;
        let currencies = self.string_column(QUOTE_CURRENCY)?;

        let mut rows = Vec::with_capacity(self.height());
        for i in 0..self.height() {
            let date_key = date_keys.get(i).ok_or(TableError::UnexpectedNull {
                column: DATE_KEY,
                row: i,
            })?;
            let instrument_id = instruments.get(i).ok_or(TableError::UnexpectedNull {
                column: INSTRUMENT_ID,
                row: i,
            })?;
            let quote_currency = currencies.get(i).ok_or(TableError::UnexpectedNull {
                column: QUOTE_CURRENCY,
                row: i,
            })?;

            rows.push(NormalizedRow {
                date_key,
                price: prices.get(i),
                volume: volumes.get(i),
                capitalization: caps.get(i),
                instrument_id: instrument_id.to_string(),
                quote_currency: quote_currency.to_string(),
            });
        }
        Ok(rows)
    }

    /// Content hash of the rows (blake3, hex). Equal tables hash equal.
    pub fn fingerprint(&self) -> Result<String, TableError> {
        let mut hasher = blake3::Hasher::new();
        for row in self.rows()? {
            let line = format!(
                "{}|{:?}|{:?}|{:?}|{}|{}\n",
                row.date_key,
                row.price.map(f64::to_bits),
                row.volume.map(f64::to_bits),
                row.capitalization.map(f64::to_bits),
                row.instrument_id,
                row.quote_currency
            );
            hasher.update(line.as_bytes());
        }
        Ok(hasher.finalize().to_hex().to_string())
    }

    fn string_column(&self, name: &str) -> Result<StringChunked, TableError> {
        let series = self
            .frame
            .column(name)?
            .as_materialized_series()
            .cast(&DataType::String)?;
        Ok(series.str()?.clone())
    }
}

impl PartialEq for NormalizedTable {
    fn eq(&self, other: &Self) -> bool {
        match (self.rows(), other.rows()) {
            (Ok(a), Ok(b)) => a == b,
            _ => false,
        }
    }
}

impl Default for NormalizedTable {
    fn default() -> Self {
        Self::empty()
    }
}
