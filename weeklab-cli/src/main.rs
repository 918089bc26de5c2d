//! WeekLab CLI: fetch weekly option histories and analyze them.
//!
//! Commands:
//! - `fetch`: ingest a symbol from Polygon.io and store its history snapshot
//! - `strike-gap`: sweep the strike gap above the previous close
//! - `leverage`: sweep the target leverage
//! - `slice`: week-by-week backtest at one strike gap
//! - `week`: every option of one week
//! - `options`: sell prices of every option, per week
//! - `lever-stat`: leverage ratios between adjacent strikes, per week
//! - `list`: stored histories
//!
//! Report lines go to stdout; logs go to stderr (`RUST_LOG` to adjust).

use anyhow::{bail, Context, Result};
use chrono::NaiveDate;
use clap::error::ErrorKind;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use weeklab_core::data::{PolygonProvider, Throttle};
use weeklab_runner::export::{export_slice_csv, export_sweep_csv, export_sweep_json, write_export};
use weeklab_runner::loader::history_store;
use weeklab_runner::report;
use weeklab_runner::{
    fetch_history, inspect_week, leverage_steps, load_history, run_slice, sell_prices,
    stored_symbols, LabConfig, ScanPolicy, Sweeper,
};

#[derive(Parser)]
#[command(
    name = "weeklab",
    version,
    about = "WeekLab CLI: weekly call option backtests"
)]
struct Cli {
    /// Path to a TOML config file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Data directory (overrides `data.data_dir`).
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,

    /// Evaluate sweep points on one thread.
    #[arg(long, global = true, default_value_t = false)]
    sequential: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest a symbol from Polygon.io and store its history.
    Fetch {
        symbol: String,

        /// Start date (YYYY-MM-DD). Defaults to `ingest.lookback_years` before --to.
        #[arg(long)]
        from: Option<String>,

        /// End date (YYYY-MM-DD). Defaults to today.
        #[arg(long)]
        to: Option<String>,
    },
    /// Sweep the strike gap from 0 to the configured weekly-return quantile.
    StrikeGap {
        symbol: String,

        /// Also write the sweep table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Also write the sweep report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Sweep the target leverage from the smallest to the configured quantile.
    Leverage {
        symbol: String,

        /// Also write the sweep table as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Also write the sweep report as JSON.
        #[arg(long)]
        json: Option<PathBuf>,
    },
    /// Backtest one strike gap week by week.
    Slice {
        symbol: String,

        /// Strike gap in percent above the previous close.
        #[arg(long, default_value_t = 0.0, allow_negative_numbers = true)]
        gap: f64,

        /// Also write the weekly rows as CSV.
        #[arg(long)]
        csv: Option<PathBuf>,
    },
    /// Show every option of the week settling on DATE.
    Week {
        symbol: String,

        /// Settlement date (YYYY-MM-DD).
        date: String,
    },
    /// Sell prices of every option, per week.
    Options { symbol: String },
    /// Leverage ratios between adjacent strikes, per week.
    LeverStat { symbol: String },
    /// List stored histories.
    List,
}

fn main() -> Result<()> {
    let cli = match Cli::try_parse() {
        Ok(cli) => cli,
        Err(e) if matches!(e.kind(), ErrorKind::DisplayHelp | ErrorKind::DisplayVersion) => e.exit(),
        Err(e) => {
            let _ = e.print();
            std::process::exit(1);
        }
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info,reqwest=warn,polars=warn".into()),
        )
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    let config = load_config(&cli)?;

    match cli.command {
        Commands::Fetch { symbol, from, to } => run_fetch(&config, &symbol, from, to),
        Commands::StrikeGap { symbol, csv, json } => {
            run_sweep_cmd(&config, &symbol, SweepKind::StrikeGap, csv, json)
        }
        Commands::Leverage { symbol, csv, json } => {
            run_sweep_cmd(&config, &symbol, SweepKind::Leverage, csv, json)
        }
        Commands::Slice { symbol, gap, csv } => run_slice_cmd(&config, &symbol, gap / 100.0, csv),
        Commands::Week { symbol, date } => run_week(&config, &symbol, &date),
        Commands::Options { symbol } => run_options(&config, &symbol),
        Commands::LeverStat { symbol } => run_lever_stat(&config, &symbol),
        Commands::List => run_list(&config),
    }
}

fn load_config(cli: &Cli) -> Result<LabConfig> {
    let mut config = match &cli.config {
        Some(path) => LabConfig::from_file(path)?,
        None => LabConfig::default(),
    };
    if let Some(dir) = &cli.data_dir {
        config.data.data_dir = dir.clone();
    }
    if cli.sequential {
        config.sweep.parallel = false;
    }
    Ok(config)
}

fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d").with_context(|| format!("invalid date '{s}'"))
}

fn run_fetch(config: &LabConfig, symbol: &str, from: Option<String>, to: Option<String>) -> Result<()> {
    let from = from.as_deref().map(parse_date).transpose()?;
    let to = to
        .as_deref()
        .map(parse_date)
        .transpose()?
        .unwrap_or_else(|| chrono::Local::now().date_naive());

    let throttle = Arc::new(Throttle::paced(config.request_delay()));
    let provider = PolygonProvider::from_env(throttle)?;

    let fetched = fetch_history(&provider, config, symbol, from, to)?;
    println!("{}", fetched.history.summary());
    println!(
        "contracts: {} accepted, {} rejected, {} payoff flags; weeks skipped: {}",
        fetched.stats.contracts_accepted,
        fetched.stats.contracts_rejected,
        fetched.stats.payoff_flags,
        fetched.stats.weeks_skipped
    );
    println!("saved to {}", fetched.snapshot.display());
    Ok(())
}

#[derive(Clone, Copy)]
enum SweepKind {
    StrikeGap,
    Leverage,
}

fn run_sweep_cmd(
    config: &LabConfig,
    symbol: &str,
    kind: SweepKind,
    csv: Option<PathBuf>,
    json: Option<PathBuf>,
) -> Result<()> {
    let history = load_history(config, symbol)?;
    tracing::info!("{}", history.summary());

    let policy = match kind {
        SweepKind::StrikeGap => ScanPolicy::strike_gap(&history, config.sweep.return_quantile)?,
        SweepKind::Leverage => ScanPolicy::leverage(&history, config.sweep.leverage_quantile)?,
    };
    tracing::info!(?policy, points = policy.len(), "sweeping");

    let sweep = Sweeper::new()
        .with_parallelism(config.sweep.parallel)
        .run(&history, &policy)?;
    for result in &sweep.results {
        println!("{}", report::scan_line(&policy, result));
    }
    if let Some(best) = sweep.best() {
        tracing::info!("{}", report::best_line(&policy, best));
    }

    if let Some(path) = csv {
        write_export(&path, &export_sweep_csv(&sweep)?)?;
    }
    if let Some(path) = json {
        write_export(&path, &export_sweep_json(&sweep)?)?;
    }
    Ok(())
}

fn run_slice_cmd(config: &LabConfig, symbol: &str, gap: f64, csv: Option<PathBuf>) -> Result<()> {
    let history = load_history(config, symbol)?;
    tracing::info!("{}", history.summary());

    let slice = run_slice(&history, gap)?;
    for row in &slice.rows {
        println!("{}", report::slice_line(row));
    }
    println!("{}", report::slice_summary(&slice));

    if let Some(path) = csv {
        write_export(&path, &export_slice_csv(&slice)?)?;
    }
    Ok(())
}

fn run_week(config: &LabConfig, symbol: &str, date: &str) -> Result<()> {
    let date = parse_date(date)?;
    let history = load_history(config, symbol)?;

    let Some(view) = inspect_week(&history, date) else {
        bail!("{date} not found");
    };
    for line in report::week_lines(&view) {
        println!("{line}");
    }
    Ok(())
}

fn run_options(config: &LabConfig, symbol: &str) -> Result<()> {
    let history = load_history(config, symbol)?;
    for row in sell_prices(&history) {
        println!("{}", report::sell_prices_line(&row));
    }
    Ok(())
}

fn run_lever_stat(config: &LabConfig, symbol: &str) -> Result<()> {
    let history = load_history(config, symbol)?;
    for row in leverage_steps(&history) {
        println!("{}", report::leverage_steps_line(&row));
    }
    Ok(())
}

fn run_list(config: &LabConfig) -> Result<()> {
    let symbols = stored_symbols(config)?;
    if symbols.is_empty() {
        println!("No stored histories in {}", history_store(config).dir().display());
        return Ok(());
    }

    let store = history_store(config);
    println!("{:<8} {:>6} {:<25} {:<20}", "Symbol", "Weeks", "Range", "Saved");
    println!("{}", "-".repeat(62));
    for symbol in &symbols {
        match store.meta(symbol) {
            Some(meta) => {
                let range = match (meta.first_week, meta.last_week) {
                    (Some(first), Some(last)) => format!("{first} to {last}"),
                    _ => "-".to_string(),
                };
                println!(
                    "{:<8} {:>6} {:<25} {:<20}",
                    symbol,
                    meta.weeks,
                    range,
                    meta.saved_at.format("%Y-%m-%d %H:%M:%S")
                );
            }
            None => println!("{symbol:<8} {:>6} {:<25} {:<20}", "?", "(no meta)", "-"),
        }
    }
    Ok(())
}
