//! CLI definition and dispatch.

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use clap::{Parser, Subcommand};

use crate::adapters::csv_adapter::CsvAdapter;
use crate::adapters::file_config_adapter::FileConfigAdapter;
use crate::adapters::json_report::JsonReportAdapter;
use crate::adapters::log_notifier::LogNotifier;
use crate::adapters::paper_exchange::PaperExchange;
use crate::adapters::polling_feed::PollingFeed;
use crate::domain::config_validation::{
    load_backtest_settings, load_engine_config, load_execution_config, load_feed_settings,
    load_retry_policy, load_risk_config, load_strategy_config, validate_run_config,
    MODE_BACKTEST, MODE_LIVE, MODE_PAPER,
};
use crate::domain::engine::ExecutionEngine;
use crate::domain::error::TradewindError;
use crate::domain::executor::{ExchangeExecutor, OrderExecutor, SimulatedExecutor};
use crate::domain::feed::{HistoricalFeed, MarketDataFeed};
use crate::domain::ledger::PortfolioLedger;
use crate::domain::report::RunReport;
use crate::domain::risk::RiskManager;
use crate::domain::strategy::build_strategy;
use crate::ports::config_port::ConfigPort;
use crate::ports::data_port::DataPort;
use crate::ports::exchange_port::ExchangePort;
use crate::ports::report_port::ReportPort;

#[derive(Parser, Debug)]
#[command(name = "tradewind", about = "Backtesting and paper-trading execution engine")]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Replay historical data through the engine
    Backtest {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Trade simulated fills against a replayed live feed
    Paper {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
    },
    /// Trade through the exchange executor (asks for confirmation)
    Live {
        #[arg(short, long)]
        config: PathBuf,
        #[arg(short, long)]
        output: Option<PathBuf>,
        #[arg(long)]
        symbol: Option<String>,
        #[arg(long)]
        strategy: Option<String>,
        /// Skip the interactive confirmation
        #[arg(long)]
        yes: bool,
    },
    /// Validate a configuration file without running
    Validate {
        #[arg(short, long)]
        config: PathBuf,
    },
    /// List symbols available in the configured data directory
    ListSymbols {
        #[arg(short, long)]
        config: PathBuf,
    },
}

pub fn run(cli: Cli) -> ExitCode {
    match cli.command {
        Command::Backtest {
            config,
            output,
            symbol,
            strategy,
        } => run_backtest(&config, output.as_ref(), symbol, strategy),
        Command::Paper {
            config,
            output,
            symbol,
            strategy,
        } => run_paper(&config, output.as_ref(), symbol, strategy),
        Command::Live {
            config,
            output,
            symbol,
            strategy,
            yes,
        } => run_live(&config, output.as_ref(), symbol, strategy, yes),
        Command::Validate { config } => run_validate(&config),
        Command::ListSymbols { config } => run_list_symbols(&config),
    }
}

/// Config view with CLI overrides layered on top of the file.
struct OverrideConfig<'a> {
    inner: &'a dyn ConfigPort,
    symbol: Option<String>,
    strategy: Option<String>,
}

impl ConfigPort for OverrideConfig<'_> {
    fn get_string(&self, section: &str, key: &str) -> Option<String> {
        match (section, key) {
            ("trading", "symbol") if self.symbol.is_some() => self.symbol.clone(),
            ("strategy", "name") if self.strategy.is_some() => self.strategy.clone(),
            _ => self.inner.get_string(section, key),
        }
    }

    fn get_int(&self, section: &str, key: &str, default: i64) -> i64 {
        self.inner.get_int(section, key, default)
    }

    fn get_double(&self, section: &str, key: &str, default: f64) -> f64 {
        self.inner.get_double(section, key, default)
    }

    fn get_bool(&self, section: &str, key: &str, default: bool) -> bool {
        self.inner.get_bool(section, key, default)
    }
}

fn load_config(path: &PathBuf) -> Result<FileConfigAdapter, ExitCode> {
    FileConfigAdapter::from_file(path).map_err(|e| {
        eprintln!("error: {e}");
        (&e).into()
    })
}

fn fail(err: &TradewindError) -> ExitCode {
    eprintln!("error: {err}");
    err.into()
}

fn install_stop_flag() -> Arc<AtomicBool> {
    let stop = Arc::new(AtomicBool::new(false));
    let flag = Arc::clone(&stop);
    if let Err(e) = ctrlc::set_handler(move || {
        eprintln!("\nStop requested, finishing current bar...");
        flag.store(true, Ordering::Relaxed);
    }) {
        log::warn!("could not install Ctrl-C handler: {}", e);
    }
    stop
}

fn run_backtest(
    config_path: &PathBuf,
    output: Option<&PathBuf>,
    symbol: Option<String>,
    strategy: Option<String>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = OverrideConfig {
        inner: &adapter,
        symbol,
        strategy,
    };

    if let Err(e) = validate_run_config(&config, MODE_BACKTEST) {
        return fail(&e);
    }

    let settings = match load_backtest_settings(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let engine_config = load_engine_config(&config);
    let timeframe = config
        .get_string("trading", "timeframe")
        .unwrap_or_else(|| "1d".to_string());

    let strategy = match build_strategy(&load_strategy_config(&config)) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    eprintln!(
        "Backtesting {} with {} from {} to {}",
        engine_config.symbol,
        strategy.name(),
        settings.start.date_naive(),
        settings.end.date_naive(),
    );

    let data = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let bars = match data.fetch_bars(&engine_config.symbol, &timeframe, settings.start, settings.end)
    {
        Ok(bars) => bars,
        Err(e) => return fail(&e),
    };
    if bars.is_empty() {
        return fail(&TradewindError::NoData {
            symbol: engine_config.symbol.clone(),
            timeframe,
        });
    }
    eprintln!("  Loaded {} bars", bars.len());

    let mut engine = ExecutionEngine::new(
        engine_config,
        HistoricalFeed::new(bars),
        strategy,
        RiskManager::new(load_risk_config(&config)),
        SimulatedExecutor::new(load_execution_config(&config)),
        PortfolioLedger::new(settings.initial_cash),
    );

    drive(&mut engine, MODE_BACKTEST, &timeframe, output)
}

fn run_paper(
    config_path: &PathBuf,
    output: Option<&PathBuf>,
    symbol: Option<String>,
    strategy: Option<String>,
) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = OverrideConfig {
        inner: &adapter,
        symbol,
        strategy,
    };

    if let Err(e) = validate_run_config(&config, MODE_PAPER) {
        return fail(&e);
    }

    let settings = match load_backtest_settings(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let engine_config = load_engine_config(&config);
    let timeframe = config
        .get_string("trading", "timeframe")
        .unwrap_or_else(|| "1d".to_string());

    let strategy = match build_strategy(&load_strategy_config(&config)) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    let execution_config = load_execution_config(&config);
    let data = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let exchange = match PaperExchange::new(
        &data,
        &engine_config.symbol,
        &timeframe,
        settings.start,
        settings.end,
        settings.initial_cash,
        execution_config.fee_pct,
    ) {
        Ok(e) => e,
        Err(e) => return fail(&e),
    };

    let stop = install_stop_flag();
    let feed = PollingFeed::from_exchange(
        exchange,
        engine_config.symbol.clone(),
        load_feed_settings(&config),
        Arc::clone(&stop),
    );

    eprintln!(
        "Paper trading {} with {} (Ctrl-C to stop)",
        engine_config.symbol,
        strategy.name()
    );

    let mut engine = ExecutionEngine::new(
        engine_config,
        feed,
        strategy,
        RiskManager::new(load_risk_config(&config)),
        SimulatedExecutor::new(execution_config),
        PortfolioLedger::new(settings.initial_cash),
    );

    drive_with_stop(&mut engine, MODE_PAPER, &timeframe, output, stop)
}

fn run_live(
    config_path: &PathBuf,
    output: Option<&PathBuf>,
    symbol: Option<String>,
    strategy: Option<String>,
    yes: bool,
) -> ExitCode {
    if !yes && !confirm_live() {
        eprintln!("Aborted.");
        return ExitCode::SUCCESS;
    }

    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let config = OverrideConfig {
        inner: &adapter,
        symbol,
        strategy,
    };

    if let Err(e) = validate_run_config(&config, MODE_LIVE) {
        return fail(&e);
    }

    let settings = match load_backtest_settings(&config) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };
    let engine_config = load_engine_config(&config);
    let timeframe = config
        .get_string("trading", "timeframe")
        .unwrap_or_else(|| "1d".to_string());

    let strategy = match build_strategy(&load_strategy_config(&config)) {
        Ok(s) => s,
        Err(e) => return fail(&e),
    };

    // The paper exchange stands in for a real connector: one instance backs
    // the feed, a second one settles orders.
    let execution_config = load_execution_config(&config);
    let data = CsvAdapter::new(PathBuf::from(&settings.data_dir));
    let make_exchange = || {
        PaperExchange::new(
            &data,
            &engine_config.symbol,
            &timeframe,
            settings.start,
            settings.end,
            settings.initial_cash,
            execution_config.fee_pct,
        )
    };
    let feed_exchange = match make_exchange() {
        Ok(e) => e,
        Err(e) => return fail(&e),
    };
    let mut order_exchange = match make_exchange() {
        Ok(e) => e,
        Err(e) => return fail(&e),
    };

    let initial_cash = match order_exchange.get_balance() {
        Ok(balance) => balance,
        Err(e) => return fail(&e),
    };

    let stop = install_stop_flag();
    let feed = PollingFeed::from_exchange(
        feed_exchange,
        engine_config.symbol.clone(),
        load_feed_settings(&config),
        Arc::clone(&stop),
    );

    eprintln!(
        "Live trading {} with {} (Ctrl-C to stop)",
        engine_config.symbol,
        strategy.name()
    );

    let mut engine = ExecutionEngine::new(
        engine_config,
        feed,
        strategy,
        RiskManager::new(load_risk_config(&config)),
        ExchangeExecutor::new(order_exchange, load_retry_policy(&config)),
        PortfolioLedger::new(initial_cash),
    );

    drive_with_stop(&mut engine, MODE_LIVE, &timeframe, output, stop)
}

fn confirm_live() -> bool {
    eprint!("Live trading submits real orders. Type 'yes' to continue: ");
    let _ = io::stderr().flush();
    let mut answer = String::new();
    if io::stdin().lock().read_line(&mut answer).is_err() {
        return false;
    }
    answer.trim().eq_ignore_ascii_case("yes")
}

fn run_validate(config_path: &PathBuf) -> ExitCode {
    eprintln!("Loading config from {}", config_path.display());
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };

    let mode = adapter
        .get_string("trading", "mode")
        .unwrap_or_else(|| MODE_BACKTEST.to_string());
    if let Err(e) = validate_run_config(&adapter, &mode) {
        return fail(&e);
    }

    eprintln!("Configuration valid for mode '{}'", mode);
    ExitCode::SUCCESS
}

fn run_list_symbols(config_path: &PathBuf) -> ExitCode {
    let adapter = match load_config(config_path) {
        Ok(a) => a,
        Err(code) => return code,
    };
    let data_dir = adapter
        .get_string("backtest", "data_dir")
        .unwrap_or_else(|| "data".to_string());

    match CsvAdapter::new(PathBuf::from(data_dir)).list_symbols() {
        Ok(symbols) => {
            for symbol in symbols {
                println!("{symbol}");
            }
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn drive<F, X>(
    engine: &mut ExecutionEngine<F, X>,
    mode: &str,
    timeframe: &str,
    output: Option<&PathBuf>,
) -> ExitCode
where
    F: MarketDataFeed,
    X: OrderExecutor,
{
    drive_with_stop(engine, mode, timeframe, output, install_stop_flag())
}

fn drive_with_stop<F, X>(
    engine: &mut ExecutionEngine<F, X>,
    mode: &str,
    timeframe: &str,
    output: Option<&PathBuf>,
    stop: Arc<AtomicBool>,
) -> ExitCode
where
    F: MarketDataFeed,
    X: OrderExecutor,
{
    let mut sink = LogNotifier;
    let result = engine.run(&mut sink, &stop);
    let report = engine.report(mode, timeframe, result.completion);

    print_summary(&report);

    let output = output
        .cloned()
        .unwrap_or_else(|| PathBuf::from("report.json"));
    match JsonReportAdapter.write(&report, &output.to_string_lossy()) {
        Ok(()) => {
            eprintln!("\nReport written to: {}", output.display());
            ExitCode::SUCCESS
        }
        Err(e) => fail(&e),
    }
}

fn print_summary(report: &RunReport) {
    let metrics = &report.metrics;
    eprintln!("\n=== Run Summary ===");
    eprintln!("Completion:       {:?}", report.completion);
    eprintln!("Bars Processed:   {}", report.bars_processed);
    if report.bars_skipped > 0 {
        eprintln!("Bars Skipped:     {}", report.bars_skipped);
    }
    eprintln!("Final Equity:     {:.2}", report.final_equity);
    eprintln!("Total Return:     {:.2}%", metrics.total_return * 100.0);
    eprintln!("Annualized:       {:.2}%", metrics.annualized_return * 100.0);
    eprintln!("Sharpe Ratio:     {:.2}", metrics.sharpe_ratio);
    eprintln!("Sortino Ratio:    {:.2}", metrics.sortino_ratio);
    eprintln!("Max Drawdown:     -{:.1}%", metrics.max_drawdown * 100.0);
    eprintln!(
        "Total Trades:     {}",
        metrics.trades_won + metrics.trades_lost + metrics.trades_breakeven
    );
    eprintln!("Win Rate:         {:.1}%", metrics.win_rate * 100.0);
    eprintln!("Profit Factor:    {:.2}", metrics.profit_factor);
    eprintln!("Fills:            {}", report.fills.len());
}
