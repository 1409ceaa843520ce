//! Risk controls: per-position stop-loss / take-profit / trailing-stop
//! rules plus the portfolio-wide max-drawdown halt.
//!
//! Each open position carries one rule state, armed when the position opens
//! and destroyed when it closes. The state machine is Armed → Triggered →
//! Closed: a triggered position re-emits its forced exit every bar until the
//! closing fill lands, so a rejected or partial exit is retried rather than
//! forgotten.

use std::collections::HashMap;

use super::bar::Bar;
use super::order::RiskTrigger;
use super::position::{Position, PositionSide};

#[derive(Debug, Clone, PartialEq)]
pub struct RiskConfig {
    /// Fractional loss from entry that forces an exit (0.05 = 5%).
    pub stop_loss_pct: Option<f64>,
    /// Fractional gain from entry that takes profit.
    pub take_profit_pct: Option<f64>,
    pub trailing_stop: bool,
    /// Distance of the trailing stop from the favorable watermark.
    pub trailing_distance_pct: f64,
    /// Favorable move from entry required before the trail activates.
    /// None activates immediately.
    pub trailing_activation_pct: Option<f64>,
    /// Portfolio drawdown from peak that halts trading.
    pub max_drawdown_pct: Option<f64>,
}

impl Default for RiskConfig {
    fn default() -> Self {
        RiskConfig {
            stop_loss_pct: Some(0.05),
            take_profit_pct: Some(0.10),
            trailing_stop: false,
            trailing_distance_pct: 0.03,
            trailing_activation_pct: None,
            max_drawdown_pct: Some(0.20),
        }
    }
}

/// A forced exit: which rule fired and the price level it fired at. The
/// level is the execution reference for the exit fill.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ForcedExit {
    pub trigger: RiskTrigger,
    pub level: f64,
}

#[derive(Debug, Clone)]
struct RuleState {
    side: PositionSide,
    entry_price: f64,
    stop_price: Option<f64>,
    take_profit_price: Option<f64>,
    /// Best favorable price seen since entry (high for longs, low for shorts).
    watermark: f64,
    trailing_price: Option<f64>,
    triggered: Option<ForcedExit>,
}

pub struct RiskManager {
    config: RiskConfig,
    rules: HashMap<String, RuleState>,
    halted: bool,
}

impl RiskManager {
    pub fn new(config: RiskConfig) -> Self {
        RiskManager {
            config,
            rules: HashMap::new(),
            halted: false,
        }
    }

    /// Arm rule state for a freshly opened position.
    pub fn arm(&mut self, position: &Position) {
        let entry = position.entry_price;
        let (stop, take_profit) = match position.side {
            PositionSide::Long => (
                self.config.stop_loss_pct.map(|p| entry * (1.0 - p)),
                self.config.take_profit_pct.map(|p| entry * (1.0 + p)),
            ),
            PositionSide::Short => (
                self.config.stop_loss_pct.map(|p| entry * (1.0 + p)),
                self.config.take_profit_pct.map(|p| entry * (1.0 - p)),
            ),
        };

        self.rules.insert(
            position.symbol.clone(),
            RuleState {
                side: position.side,
                entry_price: entry,
                stop_price: stop,
                take_profit_price: take_profit,
                watermark: entry,
                trailing_price: None,
                triggered: None,
            },
        );
    }

    /// Destroy rule state once the position is closed.
    pub fn release(&mut self, symbol: &str) {
        self.rules.remove(symbol);
    }

    pub fn is_armed(&self, symbol: &str) -> bool {
        self.rules.contains_key(symbol)
    }

    /// Evaluate one bar against the symbol's rule state. Returns the forced
    /// exit to submit this bar, if any. Tie-break when several levels fall
    /// inside one bar's range: stop-loss, then trailing stop, then
    /// take-profit.
    pub fn evaluate(&mut self, bar: &Bar) -> Option<ForcedExit> {
        let state = self.rules.get_mut(&bar.symbol)?;

        if let Some(exit) = state.triggered {
            return Some(exit);
        }

        match state.side {
            PositionSide::Long => state.watermark = state.watermark.max(bar.high),
            PositionSide::Short => state.watermark = state.watermark.min(bar.low),
        }

        if self.config.trailing_stop {
            let activated = match self.config.trailing_activation_pct {
                None => true,
                Some(act) => match state.side {
                    PositionSide::Long => state.watermark >= state.entry_price * (1.0 + act),
                    PositionSide::Short => state.watermark <= state.entry_price * (1.0 - act),
                },
            };
            if activated {
                let candidate = match state.side {
                    PositionSide::Long => {
                        state.watermark * (1.0 - self.config.trailing_distance_pct)
                    }
                    PositionSide::Short => {
                        state.watermark * (1.0 + self.config.trailing_distance_pct)
                    }
                };
                // Ratchet toward profit only.
                state.trailing_price = Some(match (state.trailing_price, state.side) {
                    (Some(prev), PositionSide::Long) => prev.max(candidate),
                    (Some(prev), PositionSide::Short) => prev.min(candidate),
                    (None, _) => candidate,
                });
            }
        }

        let crossed_down = |level: f64| bar.low <= level;
        let crossed_up = |level: f64| bar.high >= level;

        let exit = match state.side {
            PositionSide::Long => state
                .stop_price
                .filter(|&s| crossed_down(s))
                .map(|s| ForcedExit {
                    trigger: RiskTrigger::StopLoss,
                    level: s,
                })
                .or_else(|| {
                    state
                        .trailing_price
                        .filter(|&t| crossed_down(t))
                        .map(|t| ForcedExit {
                            trigger: RiskTrigger::TrailingStop,
                            level: t,
                        })
                })
                .or_else(|| {
                    state
                        .take_profit_price
                        .filter(|&t| crossed_up(t))
                        .map(|t| ForcedExit {
                            trigger: RiskTrigger::TakeProfit,
                            level: t,
                        })
                }),
            PositionSide::Short => state
                .stop_price
                .filter(|&s| crossed_up(s))
                .map(|s| ForcedExit {
                    trigger: RiskTrigger::StopLoss,
                    level: s,
                })
                .or_else(|| {
                    state
                        .trailing_price
                        .filter(|&t| crossed_up(t))
                        .map(|t| ForcedExit {
                            trigger: RiskTrigger::TrailingStop,
                            level: t,
                        })
                })
                .or_else(|| {
                    state
                        .take_profit_price
                        .filter(|&t| crossed_down(t))
                        .map(|t| ForcedExit {
                            trigger: RiskTrigger::TakeProfit,
                            level: t,
                        })
                }),
        };

        if let Some(exit) = exit {
            state.triggered = Some(exit);
        }
        exit
    }

    /// Test the portfolio drawdown against the halt threshold. Returns true
    /// exactly once, on the transition into the halted state.
    pub fn check_drawdown(&mut self, drawdown: f64) -> bool {
        let Some(threshold) = self.config.max_drawdown_pct else {
            return false;
        };
        if !self.halted && drawdown > threshold {
            self.halted = true;
            return true;
        }
        false
    }

    pub fn is_halted(&self) -> bool {
        self.halted
    }

    /// Manual re-arm after a drawdown halt. Never called automatically.
    pub fn reset_halt(&mut self) {
        self.halted = false;
    }
}
