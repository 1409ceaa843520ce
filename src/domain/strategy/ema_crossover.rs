//! EMA crossover: buy when the fast EMA crosses above the slow, sell when
//! it crosses below. Confidence scales with the separation between the two
//! averages relative to price, saturating at 1% of price.

use super::{closes, ema_last_two, Strategy};
use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::domain::signal::{Signal, SignalDecision};

const FULL_CONFIDENCE_SPREAD: f64 = 0.01;

#[derive(Debug, Clone)]
pub struct EmaCrossover {
    fast_period: usize,
    slow_period: usize,
}

impl EmaCrossover {
    pub fn new(fast_period: usize, slow_period: usize) -> Result<Self, TradewindError> {
        if fast_period == 0 || slow_period == 0 || fast_period >= slow_period {
            return Err(TradewindError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "fast_period".to_string(),
                reason: format!(
                    "ema_crossover requires 0 < fast_period < slow_period, got {}/{}",
                    fast_period, slow_period
                ),
            });
        }
        Ok(EmaCrossover {
            fast_period,
            slow_period,
        })
    }
}

impl Strategy for EmaCrossover {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn warmup_bars(&self) -> usize {
        self.slow_period + 1
    }

    fn evaluate(&self, history: &[Bar]) -> SignalDecision {
        let closes = closes(history);
        let (Some((fast_prev, fast)), Some((slow_prev, slow))) = (
            ema_last_two(&closes, self.fast_period),
            ema_last_two(&closes, self.slow_period),
        ) else {
            return SignalDecision::hold();
        };

        let price = *closes.last().expect("ema implies non-empty history");
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

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::strategy::test_support::make_bars;

    #[test]
    fn rejects_inverted_periods() {
        assert!(EmaCrossover::new(26, 12).is_err());
        assert!(EmaCrossover::new(0, 5).is_err());
        assert!(EmaCrossover::new(5, 5).is_err());
    }

    #[test]
    fn holds_during_warmup() {
        let strategy = EmaCrossover::new(3, 5).unwrap();
        let bars = make_bars(&[100.0, 101.0, 102.0, 103.0]);
        assert_eq!(strategy.evaluate(&bars).signal, Signal::Hold);
    }

    #[test]
    fn buy_on_upward_cross() {
        let strategy = EmaCrossover::new(2, 4).unwrap();
        // Flat then a sharp rally drags the fast EMA through the slow.
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 100.0, 95.0, 110.0, 120.0]);
        let decision = strategy.evaluate(&bars);
        assert_eq!(decision.signal, Signal::Buy);
        assert!(decision.confidence > 0.0);
    }

    #[test]
    fn sell_on_downward_cross() {
        let strategy = EmaCrossover::new(2, 4).unwrap();
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 100.0, 105.0, 90.0, 80.0]);
        assert_eq!(strategy.evaluate(&bars).signal, Signal::Sell);
    }

    #[test]
    fn holds_without_a_cross() {
        let strategy = EmaCrossover::new(2, 4).unwrap();
        // Steady uptrend: fast stays above slow the whole time, no new cross
        // at the final bar.
        let bars = make_bars(&[
            100.0, 102.0, 104.0, 106.0, 108.0, 110.0, 112.0, 114.0, 116.0,
        ]);
        assert_eq!(strategy.evaluate(&bars).signal, Signal::Hold);
    }

    #[test]
    fn deterministic_over_same_history() {
        let strategy = EmaCrossover::new(2, 4).unwrap();
        let bars = make_bars(&[100.0, 100.0, 100.0, 100.0, 100.0, 95.0, 110.0, 120.0]);
        assert_eq!(strategy.evaluate(&bars), strategy.evaluate(&bars));
    }
}
