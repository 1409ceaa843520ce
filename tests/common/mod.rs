#![allow(dead_code)]

use chrono::{DateTime, Duration, TimeZone, Utc};
pub use tradewind::domain::bar::Bar;
use tradewind::domain::engine::{EngineConfig, ExecutionEngine};
use tradewind::domain::error::TradewindError;
use tradewind::domain::executor::{ExecutionConfig, SimulatedExecutor};
use tradewind::domain::feed::{HistoricalFeed, MarketDataFeed};
use tradewind::domain::ledger::PortfolioLedger;
use tradewind::domain::risk::{RiskConfig, RiskManager};
use tradewind::domain::signal::{Signal, SignalDecision};
use tradewind::domain::strategy::Strategy;

pub const SYMBOL: &str = "BTC/USDT";
pub const INITIAL_CASH: f64 = 10_000.0;

pub fn start_time() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap()
}

pub fn make_bar(day: i64, close: f64) -> Bar {
    Bar {
        symbol: SYMBOL.to_string(),
        timestamp: start_time() + Duration::days(day),
        open: close,
        high: close * 1.01,
        low: close * 0.99,
        close,
        volume: 1_000_000.0,
    }
}

pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| make_bar(i as i64, close))
        .collect()
}

pub fn make_bars_with_volume(closes: &[f64], volume: f64) -> Vec<Bar> {
    let mut bars = make_bars(closes);
    for bar in &mut bars {
        bar.volume = volume;
    }
    bars
}

pub fn no_friction() -> ExecutionConfig {
    ExecutionConfig {
        slippage_pct: 0.0,
        slippage_jitter_pct: 0.0,
        fee_pct: 0.0,
        max_fill_fraction: 1.0,
        ..ExecutionConfig::default()
    }
}

pub fn no_risk() -> RiskConfig {
    RiskConfig {
        stop_loss_pct: None,
        take_profit_pct: None,
        trailing_stop: false,
        max_drawdown_pct: None,
        ..RiskConfig::default()
    }
}

/// Buys with full confidence once, when the history reaches `at_len` bars.
#[derive(Debug)]
pub struct BuyOnce {
    pub at_len: usize,
}

impl Strategy for BuyOnce {
    fn name(&self) -> &str {
        "buy_once"
    }
    fn warmup_bars(&self) -> usize {
        1
    }
    fn evaluate(&self, history: &[Bar]) -> SignalDecision {
        if history.len() == self.at_len {
            SignalDecision::new(Signal::Buy, 1.0)
        } else {
            SignalDecision::hold()
        }
    }
}

/// Buys with full confidence on every bar. The engine itself ignores the
/// signal while a position is open or trading is halted.
#[derive(Debug)]
pub struct AlwaysBuy;

impl Strategy for AlwaysBuy {
    fn name(&self) -> &str {
        "always_buy"
    }
    fn warmup_bars(&self) -> usize {
        1
    }
    fn evaluate(&self, _history: &[Bar]) -> SignalDecision {
        SignalDecision::new(Signal::Buy, 1.0)
    }
}

/// Feed that yields its bars, then fails fatally.
pub struct FailingFeed {
    bars: Vec<Bar>,
    cursor: usize,
}

impl FailingFeed {
    pub fn new(bars: Vec<Bar>) -> Self {
        FailingFeed { bars, cursor: 0 }
    }
}

impl MarketDataFeed for FailingFeed {
    fn next_bar(&mut self) -> Result<Option<Bar>, TradewindError> {
        match self.bars.get(self.cursor) {
            Some(bar) => {
                self.cursor += 1;
                Ok(Some(bar.clone()))
            }
            None => Err(TradewindError::FeedUnavailable {
                failures: 5,
                reason: "connection refused".to_string(),
            }),
        }
    }
}

pub fn build_engine(
    bars: Vec<Bar>,
    strategy: Box<dyn Strategy>,
    risk: RiskConfig,
    execution: ExecutionConfig,
    engine_config: EngineConfig,
) -> ExecutionEngine<HistoricalFeed, SimulatedExecutor> {
    ExecutionEngine::new(
        engine_config,
        HistoricalFeed::new(bars),
        strategy,
        RiskManager::new(risk),
        SimulatedExecutor::new(execution),
        PortfolioLedger::new(INITIAL_CASH),
    )
}
