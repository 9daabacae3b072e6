//! Bulk loading of normalized tables into SQLite.

use crate::config::{validate_identifier, StoreConfig};
use crate::error::StoreError;
use cryptoflow_core::normalize::NormalizedTable;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use std::path::Path;
use std::str::FromStr;
use std::time::Duration;
use tracing::{debug, info};

/// Owns the connection pool. Built once, then shared by reference with the analyzer.
#[derive(Debug, Clone)]
pub struct DatabaseLoader {
    pool: SqlitePool,
}

impl DatabaseLoader {
    /// Open the pool and run the health check. Failure here is fatal.
    pub async fn connect(config: &StoreConfig) -> Result<Self, StoreError> {
        config.validate()?;

        let connect_err = |source| StoreError::Connect {
            url: config.database_url.clone(),
            source,
        };

        let options = SqliteConnectOptions::from_str(&config.database_url)
            .map_err(connect_err)?
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(30));

        ensure_parent_dir(options.get_filename())?;

        let pool = SqlitePoolOptions::new()
            .max_connections(config.max_connections)
            .connect_with(options)
            .await
            .map_err(connect_err)?;

        let loader = Self { pool };
        loader.ping().await?;

        info!(url = %config.database_url, "database connection established");
        Ok(loader)
    }

    /// Wrap an existing pool (tests, embedding).
    pub fn from_pool(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// `SELECT 1 + 1` must come back as 2.
    pub async fn ping(&self) -> Result<(), StoreError> {
        let two: i64 = sqlx::query_scalar("SELECT 1 + 1")
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Ping(e.to_string()))?;
        if two != 2 {
            return Err(StoreError::Ping(format!("SELECT 1 + 1 returned {two}")));
        }
        Ok(())
    }

    /// Create the market table if missing. One row per day per pair.
    pub async fn ensure_table(&self, table_name: &str) -> Result<(), StoreError> {
        validate_identifier(table_name)?;

        let sql = format!(
            r#"
            CREATE TABLE IF NOT EXISTS "{table_name}" (
                date_key INTEGER NOT NULL,
                price REAL,
                volume REAL,
                capitalization REAL,
                instrument_id TEXT NOT NULL,
                quote_currency TEXT NOT NULL,
                UNIQUE (date_key, instrument_id, quote_currency)
            )
            "#
        );
        sqlx::query(&sql).execute(&self.pool).await?;

        let index = format!(
            r#"CREATE INDEX IF NOT EXISTS "idx_{table_name}_pair_date" ON "{table_name}" (instrument_id, quote_currency, date_key)"#
        );
        sqlx::query(&index).execute(&self.pool).await?;

        debug!(table = table_name, "table ready");
        Ok(())
    }

    /// Insert every row, ignoring rows whose key already exists.
    ///
    /// Runs in one transaction; returns the number of rows actually inserted.
    pub async fn load_table(
        &self,
        table: &NormalizedTable,
        table_name: &str,
    ) -> Result<u64, StoreError> {
        validate_identifier(table_name)?;

        if table.is_empty() {
            info!(table = table_name, "nothing to load");
            return Ok(0);
        }

        let rows = table.rows()?;
        let sql = format!(
            r#"INSERT OR IGNORE INTO "{table_name}"
               (date_key, price, volume, capitalization, instrument_id, quote_currency)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)"#
        );

        let mut tx = self.pool.begin().await?;
        let mut inserted = 0;
        for row in &rows {
            let result = sqlx::query(&sql)
                .bind(row.date_key)
                .bind(row.price)
                .bind(row.volume)
                .bind(row.capitalization)
                .bind(&row.instrument_id)
                .bind(&row.quote_currency)
                .execute(&mut *tx)
                .await?;
            inserted += result.rows_affected();
        }
        tx.commit().await?;

        info!(
            table = table_name,
            offered = rows.len(),
            inserted,
            ignored = rows.len() as u64 - inserted,
            "loaded normalized table"
        );
        Ok(inserted)
    }

    pub async fn count_rows(&self, table_name: &str) -> Result<i64, StoreError> {
        validate_identifier(table_name)?;
        let count: i64 = sqlx::query_scalar(&format!(r#"SELECT COUNT(*) FROM "{table_name}""#))
            .fetch_one(&self.pool)
            .await?;
        Ok(count)
    }
}

fn ensure_parent_dir(db_file: &Path) -> Result<(), StoreError> {
    if db_file.as_os_str() == ":memory:" {
        return Ok(());
    }
    match db_file.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => {
            std::fs::create_dir_all(parent).map_err(|source| StoreError::CreateDir {
                path: parent.to_path_buf(),
                source,
            })
        }
        _ => Ok(()),
    }
}
