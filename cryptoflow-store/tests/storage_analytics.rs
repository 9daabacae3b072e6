//! Loader and analytics against an on-disk SQLite database.

use cryptoflow_core::normalize::{NormalizedRow, NormalizedTable};
use cryptoflow_store::{
    export_rows_csv, volume_share, DatabaseLoader, MarketAnalyzer, Metric, SortOrder, SpikeQuery,
    StoreConfig, StoreError,
};
use tempfile::TempDir;

const TABLE: &str = "crypto_data";

fn row(date_key: i32, price: f64, instrument: &str, currency: &str) -> NormalizedRow {
    NormalizedRow {
        date_key,
        price: Some(price),
        volume: Some(price * 10.0),
        capitalization: Some(price * 1_000.0),
        instrument_id: instrument.into(),
        quote_currency: currency.into(),
    }
}

/// Ten January days of bitcoin/usd (100, 110, ... 190), two February days,
/// and one ethereum/usd day that must never leak into bitcoin queries.
fn seeded_table() -> NormalizedTable {
    let mut rows: Vec<NormalizedRow> = (0..10)
        .map(|i| row(20240101 + i, 100.0 + 10.0 * i as f64, "bitcoin", "usd"))
        .collect();
    rows.push(row(20240201, 300.0, "bitcoin", "usd"));
    rows.push(row(20240202, 400.0, "bitcoin", "usd"));
    rows.push(row(20240101, 9_999.0, "ethereum", "usd"));
    NormalizedTable::from_rows(rows).unwrap()
}

async fn open_db() -> (TempDir, DatabaseLoader) {
    let dir = tempfile::tempdir().unwrap();
    let config = StoreConfig {
        database_url: format!("sqlite://{}", dir.path().join("db/crypto.db").display()),
        ..StoreConfig::default()
    };
    let loader = DatabaseLoader::connect(&config).await.unwrap();
    loader.ensure_table(TABLE).await.unwrap();
    (dir, loader)
}

async fn seeded_db() -> (TempDir, DatabaseLoader) {
    let (dir, loader) = open_db().await;
    loader.load_table(&seeded_table(), TABLE).await.unwrap();
    (dir, loader)
}

#[tokio::test]
async fn connect_creates_database_and_pings() {
    let (dir, loader) = open_db().await;
    assert!(dir.path().join("db/crypto.db").exists());
    loader.ping().await.unwrap();
}

#[tokio::test]
async fn load_inserts_every_row_once() {
    let (_dir, loader) = open_db().await;
    let table = seeded_table();

    let first = loader.load_table(&table, TABLE).await.unwrap();
    assert_eq!(first, table.height() as u64);

    let second = loader.load_table(&table, TABLE).await.unwrap();
    assert_eq!(second, 0);
    assert_eq!(loader.count_rows(TABLE).await.unwrap(), table.height() as i64);
}

#[tokio::test]
async fn same_day_same_pair_keeps_first_row() {
    let (_dir, loader) = open_db().await;
    let table = NormalizedTable::from_rows(vec![
        row(20240101, 1.0, "bitcoin", "usd"),
        row(20240101, 2.0, "bitcoin", "usd"),
    ])
    .unwrap();

    assert_eq!(loader.load_table(&table, TABLE).await.unwrap(), 1);
    let price: f64 = sqlx::query_scalar("SELECT price FROM crypto_data")
        .fetch_one(loader.pool())
        .await
        .unwrap();
    assert_eq!(price, 1.0);
}

#[tokio::test]
async fn empty_table_loads_nothing() {
    let (_dir, loader) = open_db().await;
    let inserted = loader
        .load_table(&NormalizedTable::empty(), TABLE)
        .await
        .unwrap();
    assert_eq!(inserted, 0);
}

#[tokio::test]
async fn invalid_table_name_is_rejected() {
    let (_dir, loader) = open_db().await;
    let err = loader
        .load_table(&seeded_table(), "crypto_data; DROP TABLE x")
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::InvalidIdentifier(_)));
    assert!(MarketAnalyzer::new(&loader, "1bad").is_err());
}

#[tokio::test]
async fn non_sqlite_url_fails_fast() {
    let config = StoreConfig {
        database_url: "mysql://user@localhost/crypto".into(),
        ..StoreConfig::default()
    };
    let err = DatabaseLoader::connect(&config).await.unwrap_err();
    assert!(matches!(err, StoreError::InvalidConfig(_)));
}

#[tokio::test]
async fn spikes_rank_within_window() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let rows = analyzer
        .spikes(&SpikeQuery {
            metric: Metric::Price,
            order: SortOrder::Desc,
            up_to_rank: 3,
            instrument_id: "bitcoin".into(),
            quote_currency: "usd".into(),
            start_key: 20240101,
            end_key: 20240131,
        })
        .await
        .unwrap();

    let picked: Vec<(i32, i64)> = rows.iter().map(|r| (r.date_key, r.rank)).collect();
    assert_eq!(picked, vec![(20240110, 1), (20240109, 2), (20240108, 3)]);
    assert_eq!(rows[0].value, Some(190.0));
}

#[tokio::test]
async fn spikes_dense_rank_shares_ties() {
    let (_dir, loader) = open_db().await;
    let table = NormalizedTable::from_rows(vec![
        row(20240101, 5.0, "bitcoin", "usd"),
        row(20240102, 5.0, "bitcoin", "usd"),
        row(20240103, 4.0, "bitcoin", "usd"),
        row(20240104, 1.0, "bitcoin", "usd"),
    ])
    .unwrap();
    loader.load_table(&table, TABLE).await.unwrap();
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let rows = analyzer
        .spikes(&SpikeQuery {
            metric: Metric::Volume,
            order: SortOrder::Desc,
            up_to_rank: 2,
            instrument_id: "bitcoin".into(),
            quote_currency: "usd".into(),
            start_key: 20240101,
            end_key: 20240104,
        })
        .await
        .unwrap();

    let ranks: Vec<i64> = rows.iter().map(|r| r.rank).collect();
    assert_eq!(ranks, vec![1, 1, 2]);
}

#[tokio::test]
async fn moving_average_uses_row_window() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let rows = analyzer
        .moving_average(Metric::Price, 1, 1, "bitcoin", "usd")
        .await
        .unwrap();

    assert_eq!(rows.len(), 12);
    assert_eq!(rows[0].moving_average, Some(105.0));
    assert_eq!(rows[1].moving_average, Some(110.0));
    assert_eq!(rows[11].moving_average, Some(350.0));
}

#[tokio::test]
async fn volatility_is_lagged_percent_change() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let rows = analyzer
        .volatility(Metric::Price, 1, "bitcoin", "usd")
        .await
        .unwrap();

    assert_eq!(rows.len(), 11);
    assert_eq!(rows[0].date_key, 20240102);
    assert_eq!(rows[0].growth_pct, Some(10.0));
    // 110 → 120
    assert_eq!(rows[1].growth_pct, Some(9.09091));

    let lag3 = analyzer
        .volatility(Metric::Price, 3, "bitcoin", "usd")
        .await
        .unwrap();
    assert_eq!(lag3.len(), 9);
    assert_eq!(lag3[0].growth_pct, Some(30.0));
}

#[tokio::test]
async fn monthly_summary_averages_by_month() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let months = analyzer.monthly_summary("bitcoin", "usd").await.unwrap();

    assert_eq!(months.len(), 2);
    assert_eq!(months[0].year_month, "2024-01");
    assert_eq!(months[0].avg_price, Some(145.0));
    assert_eq!(months[1].year_month, "2024-02");
    assert_eq!(months[1].avg_volume, Some(3_500.0));

    let shares = volume_share(&months, 12);
    assert_eq!(shares.len(), 2);
    let total: f64 = shares.iter().map(|s| s.share_pct).sum();
    assert!((total - 100.0).abs() < 1e-9);
}

#[tokio::test]
async fn unknown_pair_yields_no_rows() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    assert!(analyzer
        .monthly_summary("dogecoin", "usd")
        .await
        .unwrap()
        .is_empty());
    assert!(analyzer
        .volatility(Metric::Volume, 1, "bitcoin", "eur")
        .await
        .unwrap()
        .is_empty());
}

#[tokio::test]
async fn analytics_rows_export_to_csv() {
    let (_dir, loader) = seeded_db().await;
    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();

    let months = analyzer.monthly_summary("bitcoin", "usd").await.unwrap();
    let csv = export_rows_csv(&months).unwrap();
    let mut lines = csv.lines();
    assert_eq!(
        lines.next(),
        Some("instrument_id,quote_currency,year_month,avg_price,avg_volume,avg_capitalization")
    );
    assert_eq!(lines.count(), 2);
}

#[tokio::test]
async fn normalized_batch_loads_and_reloads_idempotently() {
    use cryptoflow_core::domain::{FetchTarget, MarketChart, RawResponse, SeriesPoint};
    use cryptoflow_core::normalize::ResponseNormalizer;

    let day_ms = 86_400_000.0;
    let series = |scale: f64| -> Vec<SeriesPoint> {
        (0..5)
            .map(|i| SeriesPoint::new(1_704_067_200_000.0 + i as f64 * day_ms, (i + 1) as f64 * scale))
            .collect()
    };
    let chart = RawResponse::Success(MarketChart {
        prices: series(1.004),
        total_volumes: series(10.0),
        market_caps: series(100.0),
    });

    let mut normalizer = ResponseNormalizer::new();
    let table = normalizer
        .normalize(
            &[chart, RawResponse::Empty],
            &[
                FetchTarget::new("bitcoin", "usd"),
                FetchTarget::new("bitcoin", "eur"),
            ],
        )
        .unwrap();

    let (_dir, loader) = open_db().await;
    assert_eq!(loader.load_table(&table, TABLE).await.unwrap(), 5);
    assert_eq!(loader.load_table(&table, TABLE).await.unwrap(), 0);

    let analyzer = MarketAnalyzer::new(&loader, TABLE).unwrap();
    let rows = analyzer
        .moving_average(Metric::Price, 0, 0, "bitcoin", "usd")
        .await
        .unwrap();
    let prices: Vec<Option<f64>> = rows.iter().map(|r| r.value).collect();
    assert_eq!(
        prices,
        vec![Some(1.0), Some(2.01), Some(3.01), Some(4.02), Some(5.02)]
    );
}
