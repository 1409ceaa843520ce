//! SMA crossover, same cross rules as the EMA variant but on simple
//! moving averages.

use super::{closes, sma_last_two, Strategy};
use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::domain::signal::{Signal, SignalDecision};

const FULL_CONFIDENCE_SPREAD: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct SmaCrossover {
    fast_period: usize,
    slow_period: usize,
}

impl SmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, TradewindError> {
        if fast_period == 0 || slow_period == 0 || fast_period >= slow_period {
            return Err(TradewindError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "fast_period".to_string(),
                reason: format!(
                    "sma_crossover requires 0 < fast_period < slow_period, got {}/{}",
                    fast_period, slow_period
                ),
            });
        }
        Ok(SmaCrossover {
            fast_period,
            slow_period,
        })
    }
}

impl Strategy for SmaCrossover {
    fn name(&self) -> &str {
        "sma_crossover"
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period + 1
    }

    fn evaluate(&self, history: &[Bar]) -> SignalDecision {
        let closes = closes(history);
        let (Some((fast_prev, fast)), Some((slow_prev, slow))) = (
            sma_last_two(&closes, self.fast_period),
            sma_last_two(&closes, self.slow_period),
        ) else {
            return SignalDecision::hold();
        };

        let price = *closes.last().expect("sma implies non-empty history");
        let confidence = ((fast - slow).abs() / price / FULL_CONFIDENCE_SPREAD).min(1.0);

        if fast_prev <= slow_prev && fast > slow {
            SignalDecision::new(Signal::Buy, confidence)
        } else if fast_prev >= slow_prev && fast < slow {
            SignalDecision::new(Signal::Sell, confidence)
        } else {
            SignalDecision::hold()
        }
    }
}
