//! Cryptoflow CLI: plan, pull, and analyze market data.
//!
//! Commands:
//! - `plan`: print the requests a pull would issue (dry run)
//! - `pull`: fetch, normalize, load into SQLite, optionally export CSV
//! - `analyze`: run an analytics query against the stored table

mod config;

use anyhow::{bail, Context, Result};
use chrono::{Datelike, Duration, NaiveDate, Utc};
use clap::{Args, Parser, Subcommand};
use config::{AppConfig, DATABASE_URL_ENV};
use cryptoflow_core::{PipelineOrchestrator, RequestPlanner};
use cryptoflow_store::{
    export_rows_csv, export_table_csv, volume_share, write_csv, DatabaseLoader, MarketAnalyzer,
    Metric, SortOrder, SpikeQuery,
};
use serde::Serialize;
use std::path::{Path, PathBuf};
use tracing::info;

#[derive(Parser)]
#[command(
    name = "cryptoflow",
    about = "Cryptoflow CLI: crypto market-data pipeline and analytics"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Print the requests a pull would issue, without sending them.
    Plan {
        /// Path to a TOML config file.
        #[arg(long, default_value = "cryptoflow.toml")]
        config: PathBuf,
    },
    /// Fetch and normalize market data, then load it into the database.
    Pull {
        /// Path to a TOML config file.
        #[arg(long, default_value = "cryptoflow.toml")]
        config: PathBuf,

        /// Also write the normalized table to this CSV file.
        #[arg(long)]
        export: Option<PathBuf>,

        /// Do not touch the database.
        #[arg(long, default_value_t = false)]
        skip_store: bool,
    },
    /// Run an analytics query against the stored table.
    Analyze(AnalyzeArgs),
}

#[derive(Args)]
struct AnalyzeArgs {
    #[command(subcommand)]
    query: AnalyzeQuery,

    /// Path to a TOML config file.
    #[arg(long, global = true, default_value = "cryptoflow.toml")]
    config: PathBuf,

    /// Instrument id, e.g. bitcoin.
    #[arg(long, global = true, default_value = "bitcoin")]
    instrument: String,

    /// Quote currency, e.g. usd.
    #[arg(long, global = true, default_value = "usd")]
    currency: String,

    /// Write the result rows to this CSV file instead of printing them.
    #[arg(long, global = true)]
    export: Option<PathBuf>,
}

#[derive(Subcommand)]
enum AnalyzeQuery {
    /// Top-ranked days by a metric within a date window.
    Spikes {
        /// price, volume, or capitalization.
        #[arg(long, default_value = "capitalization")]
        metric: Metric,

        /// asc or desc.
        #[arg(long, default_value = "desc")]
        order: SortOrder,

        /// Keep days with dense rank up to this value.
        #[arg(long, default_value_t = 5)]
        up_to_rank: u32,

        /// First day (YYYYMMDD). Defaults to 15 days ago.
        #[arg(long)]
        start: Option<String>,

        /// Last day (YYYYMMDD). Defaults to today.
        #[arg(long)]
        end: Option<String>,
    },
    /// Moving average over a row window around each day.
    MovingAverage {
        #[arg(long, default_value = "price")]
        metric: Metric,

        #[arg(long, default_value_t = 3)]
        preceding: u32,

        #[arg(long, default_value_t = 3)]
        following: u32,
    },
    /// Percent change against the value `lag` days earlier.
    Volatility {
        #[arg(long, default_value = "price")]
        metric: Metric,

        #[arg(long, default_value_t = 3)]
        lag: u32,
    },
    /// Monthly averages plus each month's share of volume.
    Monthly {
        /// Months included in the volume share.
        #[arg(long, default_value_t = 12)]
        total_months: usize,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Plan { config } => run_plan(&config),
        Commands::Pull {
            config,
            export,
            skip_store,
        } => run_pull(&config, export.as_deref(), skip_store).await,
        Commands::Analyze(args) => run_analyze(args).await,
    }
}

fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_target(false)
        .init();
}

fn load_config(path: &Path) -> Result<AppConfig> {
    AppConfig::from_file(path)?.with_database_url(std::env::var(DATABASE_URL_ENV).ok())
}

fn run_plan(config_path: &Path) -> Result<()> {
    let config = load_config(config_path)?;
    let targets = config.pipeline.targets();
    let range = config.pipeline.time_range(Utc::now())?;
    let requests = RequestPlanner::new(config.pipeline.base_url.as_str()).build(&targets, range);

    println!(
        "{} requests, max {} in flight, {}s timeout",
        requests.len(),
        config.pipeline.max_concurrent,
        config.pipeline.request_timeout_secs
    );
    for request in &requests {
        let query: Vec<String> = request
            .query_params
            .iter()
            .map(|(k, v)| format!("{k}={v}"))
            .collect();
        println!("GET {}?{}", request.endpoint, query.join("&"));
    }
    Ok(())
}

async fn run_pull(config_path: &Path, export: Option<&Path>, skip_store: bool) -> Result<()> {
    let config = load_config(config_path)?;
    let targets = config.pipeline.targets();
    let range = config.pipeline.time_range(Utc::now())?;

    let mut pipeline = PipelineOrchestrator::from_config(&config.pipeline);
    let table = pipeline
        .run(&targets, range)
        .await
        .context("pipeline batch abandoned")?;

    if let Some(summary) = pipeline.summary() {
        println!(
            "Fetched {}/{} targets ({} rate limited, {} timed out, {} other failures)",
            summary.succeeded,
            summary.total,
            summary.rate_limited,
            summary.timeouts,
            summary.failed() - summary.rate_limited - summary.timeouts
        );
    }

    if table.is_empty() {
        println!("No data to analyse");
        return Ok(());
    }
    println!("Normalized {} rows", table.height());

    if !skip_store {
        let loader = DatabaseLoader::connect(&config.storage).await?;
        loader.ensure_table(&config.storage.table_name).await?;
        let inserted = loader
            .load_table(&table, &config.storage.table_name)
            .await?;
        println!(
            "Loaded {inserted} new rows into {} ({} already present)",
            config.storage.table_name,
            table.height() as u64 - inserted
        );
    }

    if let Some(path) = export {
        write_csv(path, &export_table_csv(&table)?)?;
        println!("Exported table to {}", path.display());
    }

    Ok(())
}

async fn run_analyze(args: AnalyzeArgs) -> Result<()> {
    let config = load_config(&args.config)?;
    let loader = DatabaseLoader::connect(&config.storage).await?;
    let analyzer = MarketAnalyzer::new(&loader, config.storage.table_name.as_str())?;
    let (instrument, currency) = (args.instrument.as_str(), args.currency.as_str());

    info!(instrument, currency, table = analyzer.table_name(), "running analytics");

    match args.query {
        AnalyzeQuery::Spikes {
            metric,
            order,
            up_to_rank,
            start,
            end,
        } => {
            let today = Utc::now().date_naive();
            let start_key = match start {
                Some(s) => parse_date_key(&s)?,
                None => date_key(today - Duration::days(15)),
            };
            let end_key = match end {
                Some(s) => parse_date_key(&s)?,
                None => date_key(today),
            };
            if start_key > end_key {
                bail!("--start {start_key} is after --end {end_key}");
            }
            let rows = analyzer
                .spikes(&SpikeQuery {
                    metric,
                    order,
                    up_to_rank,
                    instrument_id: args.instrument.clone(),
                    quote_currency: args.currency.clone(),
                    start_key,
                    end_key,
                })
                .await?;
            emit(&rows, args.export.as_deref(), |r| {
                format!("#{:<3} {}  {}", r.rank, r.date_key, fmt_value(r.value))
            })
        }
        AnalyzeQuery::MovingAverage {
            metric,
            preceding,
            following,
        } => {
            let rows = analyzer
                .moving_average(metric, preceding, following, instrument, currency)
                .await?;
            emit(&rows, args.export.as_deref(), |r| {
                format!(
                    "{}  {:>16}  avg {}",
                    r.date_key,
                    fmt_value(r.value),
                    fmt_value(r.moving_average)
                )
            })
        }
        AnalyzeQuery::Volatility { metric, lag } => {
            let rows = analyzer
                .volatility(metric, lag, instrument, currency)
                .await?;
            emit(&rows, args.export.as_deref(), |r| {
                format!("{}  {}%", r.date_key, fmt_value(r.growth_pct))
            })
        }
        AnalyzeQuery::Monthly { total_months } => {
            let months = analyzer.monthly_summary(instrument, currency).await?;
            emit(&months, args.export.as_deref(), |m| {
                format!(
                    "{}  price {}  volume {}  cap {}",
                    m.year_month,
                    fmt_value(m.avg_price),
                    fmt_value(m.avg_volume),
                    fmt_value(m.avg_capitalization)
                )
            })?;
            if args.export.is_none() {
                for share in volume_share(&months, total_months) {
                    println!("{}  {:>6.1}% of volume", share.year_month, share.share_pct);
                }
            }
            Ok(())
        }
    }
}

/// Print rows, or write them as CSV when an export path is given.
fn emit<T: Serialize>(rows: &[T], export: Option<&Path>, line: impl Fn(&T) -> String) -> Result<()> {
    match export {
        Some(path) => {
            write_csv(path, &export_rows_csv(rows)?)?;
            println!("Exported {} rows to {}", rows.len(), path.display());
        }
        None if rows.is_empty() => println!("No rows"),
        None => {
            for row in rows {
                println!("{}", line(row));
            }
        }
    }
    Ok(())
}

fn fmt_value(value: Option<f64>) -> String {
    value.map_or_else(|| "-".to_string(), |v| format!("{v:.2}"))
}

fn date_key(date: NaiveDate) -> i32 {
    date.year() * 10_000 + date.month() as i32 * 100 + date.day() as i32
}

fn parse_date_key(s: &str) -> Result<i32> {
    let date = NaiveDate::parse_from_str(s, "%Y%m%d")
        .with_context(|| format!("'{s}' is not a YYYYMMDD date"))?;
    Ok(date_key(date))
}
