//! Window-function analytics over the persisted market table.
//!
//! Column and sort-direction identifiers come from closed enums. Pair and date
//! bounds are bound parameters; window sizes are inlined as unsigned integers.

use crate::config::validate_identifier;
use crate::error::StoreError;
use crate::loader::DatabaseLoader;
use serde::{Deserialize, Serialize};
use sqlx::sqlite::SqliteRow;
use sqlx::Row;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// A numeric column of the market table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Price,
    Volume,
    Capitalization,
}

impl Metric {
    pub fn column(&self) -> &'static str {
        match self {
            Metric::Price => "price",
            Metric::Volume => "volume",
            Metric::Capitalization => "capitalization",
        }
    }
}

impl fmt::Display for Metric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.column())
    }
}

impl FromStr for Metric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "price" => Ok(Metric::Price),
            "volume" => Ok(Metric::Volume),
            "capitalization" | "cap" => Ok(Metric::Capitalization),
            other => Err(format!(
                "unknown metric '{other}' (expected price, volume, or capitalization)"
            )),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    pub fn sql(&self) -> &'static str {
        match self {
            SortOrder::Asc => "ASC",
            SortOrder::Desc => "DESC",
        }
    }
}

impl FromStr for SortOrder {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "asc" => Ok(SortOrder::Asc),
            "desc" => Ok(SortOrder::Desc),
            other => Err(format!("unknown sort order '{other}' (expected asc or desc)")),
        }
    }
}

/// Parameters of a spike (top-N days) query.
#[derive(Debug, Clone, PartialEq)]
pub struct SpikeQuery {
    pub metric: Metric,
    pub order: SortOrder,
    pub up_to_rank: u32,
    pub instrument_id: String,
    pub quote_currency: String,
    /// Inclusive `YYYYMMDD` bounds.
    pub start_key: i32,
    pub end_key: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RankedRow {
    pub instrument_id: String,
    pub quote_currency: String,
    pub date_key: i32,
    pub value: Option<f64>,
    pub rank: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MovingAverageRow {
    pub instrument_id: String,
    pub quote_currency: String,
    pub date_key: i32,
    pub value: Option<f64>,
    pub moving_average: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GrowthRow {
    pub instrument_id: String,
    pub quote_currency: String,
    pub date_key: i32,
    /// Percent change against the lagged row, 5 decimals. `None` when the lagged value is 0.
    pub growth_pct: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyRow {
    pub instrument_id: String,
    pub quote_currency: String,
    /// `YYYY-MM`.
    pub year_month: String,
    pub avg_price: Option<f64>,
    pub avg_volume: Option<f64>,
    pub avg_capitalization: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VolumeShare {
    pub year_month: String,
    pub avg_volume: f64,
    pub share_pct: f64,
}

/// Runs analytics queries against one market table.
pub struct MarketAnalyzer<'a> {
    db: &'a DatabaseLoader,
    table_name: String,
}

impl<'a> MarketAnalyzer<'a> {
    pub fn new(db: &'a DatabaseLoader, table_name: impl Into<String>) -> Result<Self, StoreError> {
        let table_name = table_name.into();
        validate_identifier(&table_name)?;
        Ok(Self { db, table_name })
    }

    pub fn table_name(&self) -> &str {
        &self.table_name
    }

    /// Days ranked by `metric` within the date window, dense rank ≤ `up_to_rank`.
    ///
    /// Rows with a null metric are not ranked.
    pub async fn spikes(&self, query: &SpikeQuery) -> Result<Vec<RankedRow>, StoreError> {
        let column = query.metric.column();
        let sql = format!(
            r#"
            WITH ranked AS (
                SELECT instrument_id, quote_currency, date_key, {column} AS value,
                DENSE_RANK() OVER (
                    PARTITION BY instrument_id, quote_currency
                    ORDER BY {column} {order}
                ) AS metric_rank
                FROM "{table}"
                WHERE instrument_id = ?1 AND quote_currency = ?2
                  AND date_key BETWEEN ?3 AND ?4
                  AND {column} IS NOT NULL
            )
            SELECT * FROM ranked
            WHERE metric_rank <= ?5
            ORDER BY metric_rank, date_key
            "#,
            order = query.order.sql(),
            table = self.table_name,
        );

        let rows = sqlx::query(&sql)
            .bind(&query.instrument_id)
            .bind(&query.quote_currency)
            .bind(query.start_key)
            .bind(query.end_key)
            .bind(i64::from(query.up_to_rank))
            .fetch_all(self.db.pool())
            .await?;

        debug!(metric = %query.metric, rows = rows.len(), "spikes query");
        rows.iter().map(ranked_row).collect()
    }

    /// Centered moving average over `preceding + 1 + following` rows, by date.
    pub async fn moving_average(
        &self,
        metric: Metric,
        preceding: u32,
        following: u32,
        instrument_id: &str,
        quote_currency: &str,
    ) -> Result<Vec<MovingAverageRow>, StoreError> {
        let column = metric.column();
        // Window offsets are inlined; u32 keeps them plain integers.
        let sql = format!(
            r#"
            SELECT instrument_id, quote_currency, date_key, {column} AS value,
            AVG({column}) OVER (
                PARTITION BY instrument_id, quote_currency
                ORDER BY date_key
                ROWS BETWEEN {preceding} PRECEDING AND {following} FOLLOWING
            ) AS moving_average
            FROM "{table}"
            WHERE instrument_id = ?1 AND quote_currency = ?2
            ORDER BY date_key
            "#,
            table = self.table_name,
        );

        let rows = sqlx::query(&sql)
            .bind(instrument_id)
            .bind(quote_currency)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(moving_average_row).collect()
    }

    /// Percent change of `metric` against the row `lag` days back.
    ///
    /// The first `lag` rows have nothing to compare with and are dropped.
    pub async fn volatility(
        &self,
        metric: Metric,
        lag: u32,
        instrument_id: &str,
        quote_currency: &str,
    ) -> Result<Vec<GrowthRow>, StoreError> {
        let column = metric.column();
        let sql = format!(
            r#"
            WITH lagged AS (
                SELECT instrument_id, quote_currency, date_key, {column} AS value,
                LAG({column}, {lag}) OVER (
                    PARTITION BY instrument_id, quote_currency
                    ORDER BY date_key
                ) AS previous
                FROM "{table}"
                WHERE instrument_id = ?1 AND quote_currency = ?2
            )
            SELECT instrument_id, quote_currency, date_key,
                ROUND((value - previous) / previous * 100, 5) AS growth_pct
            FROM lagged
            WHERE previous IS NOT NULL
            ORDER BY date_key
            "#,
            table = self.table_name,
        );

        let rows = sqlx::query(&sql)
            .bind(instrument_id)
            .bind(quote_currency)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(growth_row).collect()
    }

    /// Monthly averages of every metric, oldest month first.
    pub async fn monthly_summary(
        &self,
        instrument_id: &str,
        quote_currency: &str,
    ) -> Result<Vec<MonthlyRow>, StoreError> {
        let sql = format!(
            r#"
            WITH by_month AS (
                SELECT instrument_id, quote_currency, price, volume, capitalization,
                    substr(CAST(date_key AS TEXT), 1, 4) || '-' ||
                    substr(CAST(date_key AS TEXT), 5, 2) AS year_month
                FROM "{table}"
                WHERE instrument_id = ?1 AND quote_currency = ?2
            )
            SELECT instrument_id, quote_currency, year_month,
                AVG(price) AS avg_price,
                AVG(volume) AS avg_volume,
                AVG(capitalization) AS avg_capitalization
            FROM by_month
            GROUP BY year_month, instrument_id, quote_currency
            ORDER BY year_month
            "#,
            table = self.table_name,
        );

        let rows = sqlx::query(&sql)
            .bind(instrument_id)
            .bind(quote_currency)
            .fetch_all(self.db.pool())
            .await?;

        rows.iter().map(monthly_row).collect()
    }
}

fn ranked_row(row: &SqliteRow) -> Result<RankedRow, StoreError> {
    Ok(RankedRow {
        instrument_id: row.try_get("instrument_id")?,
        quote_currency: row.try_get("quote_currency")?,
        date_key: row.try_get("date_key")?,
        value: row.try_get("value")?,
        rank: row.try_get("metric_rank")?,
    })
}

fn moving_average_row(row: &SqliteRow) -> Result<MovingAverageRow, StoreError> {
    Ok(MovingAverageRow {
        instrument_id: row.try_get("instrument_id")?,
        quote_currency: row.try_get("quote_currency")?,
        date_key: row.try_get("date_key")?,
        value: row.try_get("value")?,
        moving_average: row.try_get("moving_average")?,
    })
}

fn growth_row(row: &SqliteRow) -> Result<GrowthRow, StoreError> {
    Ok(GrowthRow {
        instrument_id: row.try_get("instrument_id")?,
        quote_currency: row.try_get("quote_currency")?,
        date_key: row.try_get("date_key")?,
        growth_pct: row.try_get("growth_pct")?,
    })
}

fn monthly_row(row: &SqliteRow) -> Result<MonthlyRow, StoreError> {
    Ok(MonthlyRow {
        instrument_id: row.try_get("instrument_id")?,
        quote_currency: row.try_get("quote_currency")?,
        year_month: row.try_get("year_month")?,
        avg_price: row.try_get("avg_price")?,
        avg_volume: row.try_get("avg_volume")?,
        avg_capitalization: row.try_get("avg_capitalization")?,
    })
}

/// Share of total volume per month over the first `total_months` months.
///
/// Empty when there are no months or the total volume is zero.
pub fn volume_share(months: &[MonthlyRow], total_months: usize) -> Vec<VolumeShare> {
    let subset = &months[..months.len().min(total_months)];
    let total: f64 = subset.iter().filter_map(|m| m.avg_volume).sum();
    if subset.is_empty() || total == 0.0 {
        return Vec::new();
    }
    subset
        .iter()
        .map(|m| {
            let avg_volume = m.avg_volume.unwrap_or(0.0);
            VolumeShare {
                year_month: m.year_month.clone(),
                avg_volume,
                share_pct: avg_volume / total * 100.0,
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn month(ym: &str, volume: Option<f64>) -> MonthlyRow {
        MonthlyRow {
            instrument_id: "bitcoin".into(),
            quote_currency: "usd".into(),
            year_month: ym.into(),
            avg_price: None,
            avg_volume: volume,
            avg_capitalization: None,
        }
    }

    #[test]
    fn metric_parses_and_names_column() {
        assert_eq!("Price".parse::<Metric>().unwrap(), Metric::Price);
        assert_eq!("cap".parse::<Metric>().unwrap().column(), "capitalization");
        assert!("market_cap; --".parse::<Metric>().is_err());
    }

    #[test]
    fn sort_order_parses() {
        assert_eq!("ASC".parse::<SortOrder>().unwrap().sql(), "ASC");
        assert_eq!(SortOrder::default(), SortOrder::Desc);
        assert!("sideways".parse::<SortOrder>().is_err());
    }

    #[test]
    fn volume_share_limits_months() {
        let months = vec![
            month("2024-01", Some(100.0)),
            month("2024-02", Some(300.0)),
            month("2024-03", Some(1_000.0)),
        ];
        let shares = volume_share(&months, 2);
        assert_eq!(shares.len(), 2);
        assert_eq!(shares[0].share_pct, 25.0);
        assert_eq!(shares[1].share_pct, 75.0);
    }

    #[test]
    fn volume_share_of_nothing_is_empty() {
        assert!(volume_share(&[], 12).is_empty());
        assert!(volume_share(&[month("2024-01", Some(0.0))], 12).is_empty());
        assert!(volume_share(&[month("2024-01", None)], 12).is_empty());
    }
}
