//! CLI definition and dispatch.

use clap::{Parser, Subcommand};
use std::io;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing::{debug, info};
use tracing_subscriber::EnvFilter;

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::report_adapter::{FileReportAdapter, write_journal_to};
use crate::domain::backtest::{self as backtest_engine, BacktestConfig, BacktestResult};
use crate::domain::config_validation::{validate_backtest_config, validate_strategy_config};
use crate::domain::error::PulltraderError;
use crate::domain::metrics::Summary;
use crate::domain::strategy::StrategyConfig;
use crate::domain::universe::{load_universe, parse_symbols};
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::report_port::ReportPort;

pub const DEFAULT_DATA_DIR: &str = "data";

#[derive(Parser, Debug)]
#[command(
    name = "pulltrader",
    about = "Bar-replay backtester for pullback and breakout setups"
)]
pub struct Cli {
    /// Log engine decisions at debug level
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Run a backtest
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        /// Directory of <SYMBOL>.csv files (overrides [backtest] data_dir)
        #[arg(short, long)]
        data_dir: Option<PathBuf>,
        /// Comma-separated symbols (overrides [backtest] symbols)
        #[arg(long)]
        symbols: Option<String>,
        /// Journal CSV path; written to stdout when omitted
        #[arg(short, long)]
        journal: Option<PathBuf>,
        /// Summary JSON path
        #[arg(short, long)]
        summary: Option<PathBuf>,
        #[arg(long)]
        dry_run: bool,
    },
    /// Validate a configuration file without loading data
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// Recompute summary statistics from a saved journal
    Analyze {
        #[arg(short, long)]
        journal: PathBuf,
        #[arg(short, long)]
        summary: Option<PathBuf>,
    },
    /// List symbols available in a data directory
    ListSymbols {
        #[arg(short, long)]
        data_dir: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    init_tracing(cli.verbose);
    let result = match cli.command {
        Command::Backtest {
            config,
            data_dir,
            symbols,
            journal,
            summary,
            dry_run,
        } => {
            if dry_run {
                run_dry_run(&config)
            } else {
                run_backtest(
                    &config,
                    data_dir.as_deref(),
                    symbols.as_deref(),
                    journal.as_deref(),
                    summary.as_deref(),
                )
            }
        }
        Command::Validate { config } => run_dry_run(&config),
        Command::Analyze { journal, summary } => run_analyze(&journal, summary.as_deref()),
        Command::ListSymbols { data_dir } => run_list_symbols(&data_dir),
    };
    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e}");
            (&e).into()
        }
    }
}

/// `RUST_LOG` wins when set; otherwise info, or debug with `--verbose`.
fn init_tracing(verbose: bool) {
    let default = if verbose { "pulltrader=debug" } else { "pulltrader=info" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .try_init();
}

pub fn load_config(path: &Path) -> Result<FileConfigAdapter, PulltraderError> {
    FileConfigAdapter::from_file(path)
}

/// Parse and validate both configuration layers.
pub fn load_run_config(
    config: &dyn ConfigPort,
) -> Result<(BacktestConfig, StrategyConfig), PulltraderError> {
    let backtest = BacktestConfig::from_config(config)?;
    let strategy = StrategyConfig::from_config(config)?;
    validate_backtest_config(&backtest)?;
    validate_strategy_config(&strategy)?;
    Ok((backtest, strategy))
}

pub fn resolve_symbols(
    symbols_override: Option<&str>,
    config: &dyn ConfigPort,
) -> Result<Vec<String>, PulltraderError> {
    let raw = match symbols_override {
        Some(s) => s.to_string(),
        None => config
            .get_string("backtest", "symbols")
            .ok_or_else(|| PulltraderError::ConfigMissing {
                section: "backtest".into(),
                key: "symbols".into(),
            })?,
    };
    Ok(parse_symbols(&raw)?)
}

pub fn resolve_data_dir(data_dir_override: Option<&Path>, config: &dyn ConfigPort) -> PathBuf {
    data_dir_override
        .map(Path::to_path_buf)
        .or_else(|| config.get_string("backtest", "data_dir").map(PathBuf::from))
        .unwrap_or_else(|| PathBuf::from(DEFAULT_DATA_DIR))
}

fn run_backtest(
    config_path: &Path,
    data_dir_override: Option<&Path>,
    symbols_override: Option<&str>,
    journal_path: Option<&Path>,
    summary_path: Option<&Path>,
) -> Result<(), PulltraderError> {
    info!(config = %config_path.display(), "loading config");
    let config = load_config(config_path)?;
    let (backtest, strategy) = load_run_config(&config)?;
    let symbols = resolve_symbols(symbols_override, &config)?;
    let data_dir = resolve_data_dir(data_dir_override, &config);
    let benchmark = config
        .get_string("backtest", "benchmark")
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty());

    let data_port = CsvAdapter::new(data_dir);
    run_backtest_pipeline(
        &data_port,
        &strategy,
        &backtest,
        &symbols,
        benchmark.as_deref(),
        journal_path,
        summary_path,
    )?;
    Ok(())
}

/// Load the universe, replay it and write the reports. Without a journal path
/// the journal goes to stdout.
pub fn run_backtest_pipeline(
    data_port: &dyn DataPort,
    strategy: &StrategyConfig,
    backtest: &BacktestConfig,
    symbols: &[String],
    benchmark: Option<&str>,
    journal_path: Option<&Path>,
    summary_path: Option<&Path>,
) -> Result<BacktestResult, PulltraderError> {
    let universe = load_universe(data_port, symbols, backtest.start_date, backtest.end_date)?;

    let benchmark = match benchmark {
        Some(symbol) => {
            let bars = data_port.fetch_bars(symbol, backtest.start_date, backtest.end_date)?;
            debug!(%symbol, bars = bars.len(), "benchmark loaded");
            Some(bars)
        }
        None => None,
    };

    let result = backtest_engine::run_backtest(
        &universe.symbols,
        benchmark.as_deref(),
        backtest,
        strategy,
    )?;

    print_summary(&strategy.name(), &result.summary);
    eprintln!("Final Equity:      {:.2}", result.final_equity);

    let reports = FileReportAdapter::new();
    match journal_path {
        Some(path) => {
            reports.write_journal(&result.journal, path)?;
            eprintln!("\nJournal written to: {}", path.display());
        }
        None => write_journal_to(&result.journal, io::stdout().lock())?,
    }
    if let Some(path) = summary_path {
        reports.write_summary(&result.summary, path)?;
        eprintln!("Summary written to: {}", path.display());
    }
    Ok(result)
}

pub fn run_dry_run(config_path: &Path) -> Result<(), PulltraderError> {
    eprintln!("Loading config from {}", config_path.display());
    let config = load_config(config_path)?;
    let (backtest, strategy) = load_run_config(&config)?;

    eprintln!("Config validated successfully");
    eprintln!("\nStrategy: {}", strategy.name());
    eprintln!("  scanner: {:?}", strategy.scanner);
    eprintln!("  exit:    {:?}", strategy.exit);
    eprintln!("  sizing:  {:?}", strategy.sizing);
    eprintln!("\nBacktest:");
    eprintln!("  initial capital: {:.2}", backtest.initial_capital);
    eprintln!("  execution:       {:?}", backtest.execution);
    if let Some(start) = backtest.start_date {
        eprintln!("  start date:      {start}");
    }
    if let Some(end) = backtest.end_date {
        eprintln!("  end date:        {end}");
    }

    match config.get_string("backtest", "symbols") {
        Some(raw) => eprintln!("\nUniverse: {}", parse_symbols(&raw)?.join(", ")),
        None => eprintln!("\nUniverse: not configured (pass --symbols)"),
    }
    eprintln!("\nDry run complete: configuration is valid");
    Ok(())
}

pub fn run_analyze(journal_path: &Path, summary_path: Option<&Path>) -> Result<(), PulltraderError> {
    let reports = FileReportAdapter::new();
    let records = reports.read_journal(journal_path)?;
    info!(rows = records.len(), "journal loaded");
    let summary = Summary::compute(&records);
    print_summary(&journal_path.display().to_string(), &summary);
    if let Some(path) = summary_path {
        reports.write_summary(&summary, path)?;
        eprintln!("\nSummary written to: {}", path.display());
    }
    Ok(())
}

pub fn run_list_symbols(data_dir: &Path) -> Result<(), PulltraderError> {
    let symbols = CsvAdapter::new(data_dir.to_path_buf()).list_symbols()?;
    if symbols.is_empty() {
        eprintln!("No symbols found in {}", data_dir.display());
    } else {
        for symbol in &symbols {
            println!("{}", symbol);
        }
        eprintln!("{} symbols found", symbols.len());
    }
    Ok(())
}

fn fmt_num(value: f64, decimals: usize) -> String {
    if value.is_finite() {
        format!("{value:.decimals$}")
    } else {
        "n/a".to_string()
    }
}

fn fmt_pct(value: f64) -> String {
    if value.is_finite() {
        format!("{:.1}%", value * 100.0)
    } else {
        "n/a".to_string()
    }
}

pub fn print_summary(title: &str, summary: &Summary) {
    eprintln!("\n=== Results: {title} ===");
    eprintln!("Sessions:          {}", summary.days);
    eprintln!("No-Trade Sessions: {}", summary.no_trade_days);
    eprintln!("Trades:            {}", summary.entered_trades);
    eprintln!(
        "Wins / Losses:     {} / {}",
        summary.wins, summary.losses
    );
    eprintln!("Win Rate:          {}", fmt_pct(summary.win_rate));
    match summary.expectancy_ci95 {
        Some(ci) => eprintln!(
            "Expectancy:        {}R (95% CI {} to {})",
            fmt_num(summary.expectancy_r, 2),
            fmt_num(ci.low, 2),
            fmt_num(ci.high, 2)
        ),
        None => eprintln!("Expectancy:        {}R", fmt_num(summary.expectancy_r, 2)),
    }
    eprintln!("Profit Factor:     {}", fmt_num(summary.profit_factor, 2));
    eprintln!("Net P&L:           {}", fmt_num(summary.net_pnl, 2));
    eprintln!("Max Drawdown:      {}", fmt_num(summary.max_drawdown, 2));
    eprintln!("Max Consec Losses: {}", summary.max_consecutive_losses);
    eprintln!("Avg Hold (days):   {}", fmt_num(summary.avg_hold_days, 1));
    eprintln!("MFE Capture:       {}", fmt_pct(summary.mfe_capture));

    if !summary.exit_reasons.is_empty() {
        eprintln!("\nExit reasons:");
        for (reason, count) in &summary.exit_reasons {
            eprintln!("  {:<14} {}", reason.to_string(), count);
        }
    }
    if !summary.no_trade_reasons.is_empty() {
        eprintln!("\nNo-trade reasons:");
        for (reason, count) in &summary.no_trade_reasons {
            eprintln!("  {:<20} {}", reason.to_string(), count);
        }
    }
    if !summary.by_grade.is_empty() {
        eprintln!("\nBy grade:");
        for (grade, stats) in &summary.by_grade {
            eprintln!(
                "  {:<3} trades {:>4}  win {:>6}  exp {}R",
                grade.to_string(),
                stats.trades,
                fmt_pct(stats.win_rate),
                fmt_num(stats.expectancy_r, 2)
            );
        }
    }
}
