//! SectorLab CLI — concentration backtest commands.
//!
//! Commands:
//! - `run` — execute one backtest and print the summary as JSON
//! - `grid` — sweep trigger thresholds × laggard percentiles, print pivots
//! - `verify-data` — fetch and report cache coverage without running

use anyhow::Result;
use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};

use sectorlab_core::config::resolve_token;
use sectorlab_core::data::{DataAccess, PanelCache, StdoutProgress, TuShareProvider};
use sectorlab_core::StrategyConfig;
use sectorlab_runner::grid::{run_grid, GridSpec};
use sectorlab_runner::runner::run_single_backtest;
use sectorlab_runner::{
    load_strategy_config, summarize, write_events_csv, write_grid_raw_csv, write_pivot_csv,
    write_summary_json,
};

#[derive(Parser)]
#[command(
    name = "sectorlab",
    about = "SectorLab CLI — sector-rotation concentration backtests"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Execute one backtest and print the summary as JSON.
    Run {
        #[command(flatten)]
        common: CommonArgs,

        /// Write <prefix>_events.csv and <prefix>_summary.json.
        #[arg(long)]
        output_prefix: Option<PathBuf>,
    },
    /// Sweep trigger thresholds × laggard percentiles and print pivot tables.
    Grid {
        #[command(flatten)]
        common: CommonArgs,

        /// Trigger-threshold axis (comma-separated). Defaults to the config's.
        #[arg(long, value_delimiter = ',')]
        thresholds: Option<Vec<f64>>,

        /// Laggard-percentile axis (comma-separated). Defaults to the config's.
        #[arg(long, value_delimiter = ',')]
        pcts: Option<Vec<f64>>,

        /// Write <prefix>_returns.csv, <prefix>_winrates.csv, <prefix>_raw.csv.
        #[arg(long)]
        output_prefix: Option<PathBuf>,
    },
    /// Fetch the configured range and report cache coverage as JSON.
    VerifyData {
        #[command(flatten)]
        common: CommonArgs,
    },
}

/// Options shared by every command.
#[derive(clap::Args)]
struct CommonArgs {
    /// Path to a TOML config file. Defaults merge in for omitted keys.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Provider token. Overrides the TUSHARE_TOKEN environment variable.
    #[arg(long)]
    token: Option<String>,

    /// Start date override (YYYY-MM-DD).
    #[arg(long)]
    start: Option<String>,

    /// End date override (YYYY-MM-DD).
    #[arg(long)]
    end: Option<String>,

    /// Cache directory override.
    #[arg(long)]
    cache_dir: Option<PathBuf>,

    /// Trigger threshold override.
    #[arg(long)]
    trigger_threshold: Option<f64>,

    /// Laggard percentile override.
    #[arg(long)]
    laggard_pct: Option<f64>,

    /// Holding window override, in trading days.
    #[arg(long)]
    hold_days: Option<usize>,

    /// Number of top-ranked industries per event.
    #[arg(long)]
    top_n: Option<usize>,

    /// Industry classification level override.
    #[arg(long)]
    level: Option<u8>,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            common,
            output_prefix,
        } => {
            let config = build_config(&common)?;
            run_cmd(&config, output_prefix.as_deref())
        }
        Commands::Grid {
            common,
            thresholds,
            pcts,
            output_prefix,
        } => {
            let mut config = build_config(&common)?;
            if let Some(thresholds) = thresholds {
                config.grid_trigger_thresholds = thresholds;
            }
            if let Some(pcts) = pcts {
                config.grid_laggard_pcts = pcts;
            }
            grid_cmd(&config, output_prefix.as_deref())
        }
        Commands::VerifyData { common } => {
            let config = build_config(&common)?;
            verify_cmd(&config)
        }
    }
}

/// Load the config file (or defaults), then apply CLI overrides and the
/// token resolution chain: explicit flag, then environment, then built-in.
fn build_config(args: &CommonArgs) -> Result<StrategyConfig> {
    let mut config = match &args.config {
        Some(path) => load_strategy_config(path)?,
        None => StrategyConfig::default(),
    };
    if let Some(start) = &args.start {
        config.start_date = NaiveDate::parse_from_str(start, "%Y-%m-%d")?;
    }
    if let Some(end) = &args.end {
        config.end_date = NaiveDate::parse_from_str(end, "%Y-%m-%d")?;
    }
    if let Some(dir) = &args.cache_dir {
        config.cache_dir = dir.clone();
    }
    if let Some(threshold) = args.trigger_threshold {
        config.trigger_threshold = threshold;
    }
    if let Some(pct) = args.laggard_pct {
        config.laggard_pct = pct;
    }
    if let Some(days) = args.hold_days {
        config.hold_days = days;
    }
    if let Some(n) = args.top_n {
        config.top_industry_n = n;
    }
    if let Some(level) = args.level {
        config.industry_level = level;
    }
    config.token = resolve_token(args.token.clone());
    config.validate()?;
    Ok(config)
}

fn build_access(config: &StrategyConfig) -> Result<DataAccess> {
    let provider = TuShareProvider::new(config)?;
    let cache = PanelCache::new(&config.cache_dir);
    Ok(DataAccess::new(Box::new(provider), cache)
        .with_config(config)
        .with_progress(Box::new(StdoutProgress)))
}

fn run_cmd(config: &StrategyConfig, output_prefix: Option<&Path>) -> Result<()> {
    let access = build_access(config)?;
    let output = run_single_backtest(&access, config)?;
    let payload = summarize(&output.summary.events);

    println!("{}", serde_json::to_string_pretty(&payload)?);
    eprintln!("run_id: {}", output.run_id);

    if let Some(prefix) = output_prefix {
        let events_path = suffixed(prefix, "_events.csv");
        let summary_path = suffixed(prefix, "_summary.json");
        write_events_csv(&events_path, &output.summary.events)?;
        write_summary_json(&summary_path, &payload)?;
        eprintln!(
            "wrote {} and {}",
            events_path.display(),
            summary_path.display()
        );
    }
    Ok(())
}

fn grid_cmd(config: &StrategyConfig, output_prefix: Option<&Path>) -> Result<()> {
    let access = build_access(config)?;
    let panel = access.fetch_prices(config.start_date, config.end_date)?;
    let membership = access.fetch_membership(config.industry_level)?;

    let spec = GridSpec::from_config(config);
    let outcome = run_grid(&panel, &membership, config, &spec)?;

    let returns = outcome.return_table();
    let winrates = outcome.win_table();
    println!("avg_return by trigger_threshold x laggard_pct");
    println!("{returns}");
    println!("win_rate by trigger_threshold x laggard_pct");
    println!("{winrates}");

    if let Some(prefix) = output_prefix {
        write_pivot_csv(&suffixed(prefix, "_returns.csv"), &returns)?;
        write_pivot_csv(&suffixed(prefix, "_winrates.csv"), &winrates)?;
        write_grid_raw_csv(&suffixed(prefix, "_raw.csv"), &outcome)?;
        eprintln!("wrote grid CSVs with prefix {}", prefix.display());
    }
    Ok(())
}

fn verify_cmd(config: &StrategyConfig) -> Result<()> {
    let access = build_access(config)?;
    let report = access.verify(config.start_date, config.end_date, config.industry_level)?;
    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}

fn suffixed(prefix: &Path, suffix: &str) -> PathBuf {
    let mut name = prefix.file_name().unwrap_or_default().to_os_string();
    name.push(suffix);
    prefix.with_file_name(name)
}
