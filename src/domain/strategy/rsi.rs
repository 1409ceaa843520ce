//! RSI mean reversion: buy oversold, sell overbought.
//!
//! Wilder smoothing: average gain/loss seeded over the first `period`
//! changes, then avg[i] = (avg[i-1]*(n-1) + change[i]) / n.

use super::{closes, Strategy};
use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::domain::signal::{Signal, SignalDecision};

#[derive(Debug, Clone)]
pub struct RsiReversal {
    period: usize,
    oversold: f64,
    overbought: f64,
}

impl RsiReversal {
    pub fn new(period: usize, oversold: f64, overbought: f64) -> Result<Self, TradewindError> {
        if period == 0 {
            return Err(TradewindError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "rsi_period".to_string(),
                reason: "rsi period must be positive".to_string(),
            });
        }
        if !(0.0..=100.0).contains(&oversold)
            || !(0.0..=100.0).contains(&overbought)
            || oversold >= overbought
        {
            return Err(TradewindError::ConfigInvalid {
                section: "strategy".to_string(),
                key: "oversold".to_string(),
                reason: format!(
                    "rsi bands must satisfy 0 <= oversold < overbought <= 100, got {}/{}",
                    oversold, overbought
                ),
            });
        }
        Ok(RsiReversal {
            period,
            oversold,
            overbought,
        })
    }

    fn rsi(&self, closes: &[f64]) -> Option<f64> {
        if closes.len() < self.period + 1 {
            return None;
        }

        let n = self.period as f64;
        let mut avg_gain = 0.0;
        let mut avg_loss = 0.0;
        for w in closes[..self.period + 1].windows(2) {
            let change = w[1] - w[0];
            if change > 0.0 {
                avg_gain += change / n;
            } else {
                avg_loss += -change / n;
            }
        }
        for w in closes[self.period..].windows(2) {
            let change = w[1] - w[0];
            let (gain, loss) = if change > 0.0 {
                (change, 0.0)
            } else {
                (0.0, -change)
            };
            avg_gain = (avg_gain * (n - 1.0) + gain) / n;
            avg_loss = (avg_loss * (n - 1.0) + loss) / n;
        }

        if avg_loss == 0.0 {
            return Some(100.0);
        }
        let rs = avg_gain / avg_loss;
        Some(100.0 - 100.0 / (1.0 + rs))
    }
}

impl Strategy for RsiReversal {
    fn name(&self) -> &str {
        "rsi"
    }

    fn warmup_bars(&self) -> usize {
        self.period + 1
    }

    fn evaluate(&self, history: &[Bar]) -> SignalDecision {
        let closes = closes(history);
        let Some(rsi) = self.rsi(&closes) else {
            return SignalDecision::hold();
        };

        if rsi < self.oversold {
            let depth = if self.oversold > 0.0 {
                (self.oversold - rsi) / self.oversold
            } else {
                1.0
            };
            SignalDecision::new(Signal::Buy, depth)
        } else if rsi > self.overbought {
            let depth = if self.overbought < 100.0 {
                (rsi - self.overbought) / (100.0 - self.overbought)
            } else {
                1.0
            };
            SignalDecision::new(Signal::Sell, depth)
        } else {
            SignalDecision::hold()
        }
    }
}
