//! Signal sources.
//!
//! A `Strategy` is a pure function of the bar history it is handed: same
//! history in, same decision out. Variants are selected by configuration
//! name through `build_strategy`, never subclassed.

mod ema_crossover;
mod rsi;
mod sma_crossover;

pub use ema_crossover::EmaCrossover;
pub use rsi::RsiReversal;
pub use sma_crossover::SmaCrossover;

use super::bar::Bar;
use super::error::TradewindError;
use super::signal::SignalDecision;

pub trait Strategy: Send + std::fmt::Debug {
    fn name(&self) -> &str;

    /// Bars required before `evaluate` can produce a non-Hold decision.
    fn warmup_bars(&self) -> usize;

    fn evaluate(&self, history: &[Bar]) -> SignalDecision;
}

/// Strategy parameters as read from the `[strategy]` config section.
/// Defaults match the common textbook settings.
#[derive(Debug, Clone, PartialEq)]
pub struct StrategyConfig {
    pub name: String,
    pub fast_period: usize,
    pub slow_period: usize,
    pub rsi_period: usize,
    pub oversold: f64,
    pub overbought: f64,
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig {
            name: "ema_crossover".to_string(),
            fast_period: 12,
            slow_period: 26,
            rsi_period: 14,
            oversold: 30.0,
            overbought: 70.0,
        }
    }
}

pub fn build_strategy(config: &StrategyConfig) -> Result<Box<dyn Strategy>, TradewindError> {
    match config.name.as_str() {
        "ema_crossover" => Ok(Box::new(EmaCrossover::new(
            config.fast_period,
            config.slow_period,
        )?)),
        "sma_crossover" => Ok(Box::new(SmaCrossover::new(
            config.fast_period,
            config.slow_period,
        )?)),
        "rsi" => Ok(Box::new(RsiReversal::new(
            config.rsi_period,
            config.oversold,
            config.overbought,
        )?)),
        other => Err(TradewindError::UnknownStrategy {
            name: other.to_string(),
        }),
    }
}

/// EMA over closes: k = 2/(n+1), seeded with the first n-bar SMA. Returns
/// the values at the last two bars, or None during warmup.
pub(crate) fn ema_last_two(closes: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }

    let k = 2.0 / (period as f64 + 1.0);
    let mut ema: f64 = closes[..period].iter().sum::<f64>() / period as f64;
    let mut prev = ema;
    for close in &closes[period..] {
        prev = ema;
        ema = close * k + ema * (1.0 - k);
    }
    Some((prev, ema))
}

/// SMA at the last two bars, or None during warmup.
pub(crate) fn sma_last_two(closes: &[f64], period: usize) -> Option<(f64, f64)> {
    if period == 0 || closes.len() < period + 1 {
        return None;
    }
    let at = |end: usize| closes[end - period..end].iter().sum::<f64>() / period as f64;
    Some((at(closes.len() - 1), at(closes.len())))
}

pub(crate) fn closes(history: &[Bar]) -> Vec<f64> {
    history.iter().map(|b| b.close).collect()
}
