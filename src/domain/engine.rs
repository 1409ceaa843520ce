//! The execution engine: one strictly ordered decision cycle per bar.
//!
//! Cycle: (1) pull bar; (2) re-evaluate resting executor state and apply any
//! fills; (3) drawdown check — a fresh halt cancels all resting orders and
//! liquidates the book in full — then per-position risk evaluation;
//! (4) strategy signal, only while not halted and with nothing pending for
//! the symbol; (5) submit intents, risk exits strictly before signal
//! intents; (6) apply fills, snapshot equity, emit BarClose. Identical
//! inputs and configuration therefore produce identical fill logs and
//! equity curves.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use chrono::Utc;

use super::bar::Bar;
use super::event::EngineEvent;
use super::executor::{ExecutionOutcome, OrderExecutor};
use super::feed::MarketDataFeed;
use super::ledger::{FillEffect, PortfolioLedger};
use super::metrics::{periods_per_year, Metrics};
use super::order::{IntentReason, OrderIntent, RiskTrigger, Side};
use super::position::PositionSide;
use super::report::{Completion, RunReport};
use super::risk::RiskManager;
use super::signal::Signal;
use super::strategy::Strategy;
use crate::ports::event_port::EventSink;

/// What to do after a max-drawdown halt has flattened the book.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltPolicy {
    /// End the run.
    Stop,
    /// Keep consuming bars flat; entries stay suppressed.
    Flat,
}

#[derive(Debug, Clone, PartialEq)]
pub struct EngineConfig {
    pub symbol: String,
    /// Fraction of free cash committed per entry, scaled by signal
    /// confidence.
    pub max_position_fraction: f64,
    pub allow_short: bool,
    pub halt_policy: HaltPolicy,
    /// History window handed to the strategy.
    pub lookback: usize,
}

impl Default for EngineConfig {
    fn default() -> Self {
        EngineConfig {
            symbol: "BTC/USDT".to_string(),
            max_position_fraction: 0.5,
            allow_short: false,
            halt_policy: HaltPolicy::Stop,
            lookback: 200,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub completion: Completion,
    pub bars_processed: usize,
}

pub struct ExecutionEngine<F: MarketDataFeed, X: OrderExecutor> {
    config: EngineConfig,
    feed: F,
    strategy: Box<dyn Strategy>,
    risk: RiskManager,
    executor: X,
    ledger: PortfolioLedger,
    history: Vec<Bar>,
    bars_processed: usize,
}

impl<F: MarketDataFeed, X: OrderExecutor> ExecutionEngine<F, X> {
    pub fn new(
        config: EngineConfig,
        feed: F,
        strategy: Box<dyn Strategy>,
        risk: RiskManager,
        executor: X,
        ledger: PortfolioLedger,
    ) -> Self {
        ExecutionEngine {
            config,
            feed,
            strategy,
            risk,
            executor,
            ledger,
            history: Vec::new(),
            bars_processed: 0,
        }
    }

    pub fn ledger(&self) -> &PortfolioLedger {
        &self.ledger
    }

    pub fn run(&mut self, sink: &mut dyn EventSink, stop: &AtomicBool) -> RunResult {
        let completion = loop {
            if stop.load(Ordering::Relaxed) {
                break Completion::Stopped;
            }

            let bar = match self.feed.next_bar() {
                Ok(Some(bar)) => bar,
                Ok(None) => break Completion::Completed,
                Err(err) => {
                    log::error!("feed failed: {}", err);
                    break Completion::Aborted {
                        reason: err.to_string(),
                    };
                }
            };

            self.bars_processed += 1;
            self.history.push(bar.clone());
            if self.history.len() > self.config.lookback {
                let excess = self.history.len() - self.config.lookback;
                self.history.drain(..excess);
            }

            // Resting limits and partial remainders see the new bar first.
            let outcomes = self.executor.on_bar(&bar);
            self.apply_outcomes(outcomes, sink);

            let mut prices = HashMap::new();
            prices.insert(bar.symbol.clone(), bar.close);

            let newly_halted = {
                let drawdown = self.ledger.drawdown(&prices);
                if self.risk.check_drawdown(drawdown) {
                    sink.publish(&EngineEvent::DrawdownHalt {
                        drawdown,
                        timestamp: bar.timestamp,
                    });
                    true
                } else {
                    false
                }
            };

            let mut exits: Vec<OrderIntent> = Vec::new();
            if newly_halted {
                let cancelled = self.executor.cancel_pending();
                self.apply_outcomes(cancelled, sink);
                exits.extend(self.liquidation_intents(sink));
            } else if self.ledger.has_position(&bar.symbol) {
                // Watermarks and trigger state advance on every bar; the
                // exit intent itself waits until nothing is resting, so a
                // partial remainder and a forced exit never race.
                if let Some(exit) = self.risk.evaluate(&bar) {
                    if self.executor.pending_count() == 0 {
                        sink.publish(&EngineEvent::RiskTriggered {
                            symbol: bar.symbol.clone(),
                            trigger: exit.trigger,
                            level: exit.level,
                        });
                        exits.push(self.exit_intent(
                            &bar.symbol,
                            IntentReason::RiskExit(exit.trigger),
                            Some(exit.level),
                        ));
                    }
                }
            }

            let signal_intent = if exits.is_empty()
                && !self.risk.is_halted()
                && self.executor.pending_count() == 0
            {
                self.signal_intent(&bar)
            } else {
                None
            };

            // Risk exits strictly before signal entries.
            for intent in exits.into_iter().chain(signal_intent) {
                match self.executor.submit(intent.clone(), &bar) {
                    Ok(outcomes) => self.apply_outcomes(outcomes, sink),
                    Err(err) => {
                        log::warn!("intent {} failed: {}", intent.id, err);
                        sink.publish(&EngineEvent::IntentFailed {
                            intent,
                            error: err.to_string(),
                        });
                    }
                }
            }

            let snapshot = self.ledger.snapshot(bar.timestamp, &prices);
            sink.publish(&EngineEvent::BarClose(snapshot));

            if self.risk.is_halted() && self.config.halt_policy == HaltPolicy::Stop {
                break Completion::Halted {
                    drawdown: self
                        .ledger
                        .last_snapshot()
                        .map(|s| s.drawdown)
                        .unwrap_or(0.0),
                };
            }
        };

        sink.publish(&EngineEvent::RunComplete {
            bars_processed: self.bars_processed,
        });
        RunResult {
            completion,
            bars_processed: self.bars_processed,
        }
    }

    fn liquidation_intents(&mut self, sink: &mut dyn EventSink) -> Vec<OrderIntent> {
        let symbols: Vec<String> = self
            .ledger
            .open_positions()
            .map(|p| p.symbol.clone())
            .collect();
        symbols
            .into_iter()
            .map(|symbol| {
                sink.publish(&EngineEvent::RiskTriggered {
                    symbol: symbol.clone(),
                    trigger: RiskTrigger::DrawdownHalt,
                    level: 0.0,
                });
                self.exit_intent(
                    &symbol,
                    IntentReason::RiskExit(RiskTrigger::DrawdownHalt),
                    None,
                )
            })
            .collect()
    }

    fn exit_intent(
        &mut self,
        symbol: &str,
        reason: IntentReason,
        trigger_price: Option<f64>,
    ) -> OrderIntent {
        let position = self
            .ledger
            .position(symbol)
            .expect("exit intent requires an open position");
        let side = match position.side {
            PositionSide::Long => Side::Sell,
            PositionSide::Short => Side::Buy,
        };
        let quantity = position.quantity;
        let id = self.executor.next_intent_id();
        let mut intent = OrderIntent::market(id, symbol, side, quantity, reason);
        intent.trigger_price = trigger_price;
        intent
    }

    fn signal_intent(&mut self, bar: &Bar) -> Option<OrderIntent> {
        if bar.symbol != self.config.symbol || self.history.len() < self.strategy.warmup_bars() {
            return None;
        }

        let decision = self.strategy.evaluate(&self.history);
        let position = self.ledger.position(&bar.symbol);

        match (decision.signal, position.map(|p| p.side)) {
            // Opposite signal flattens an open position.
            (Signal::Buy, Some(PositionSide::Short)) | (Signal::Sell, Some(PositionSide::Long)) => {
                Some(self.exit_intent(&bar.symbol, IntentReason::Signal, None))
            }
            (Signal::Buy, None) => self.entry_intent(bar, Side::Buy, decision.confidence),
            (Signal::Sell, None) if self.config.allow_short => {
                self.entry_intent(bar, Side::Sell, decision.confidence)
            }
            _ => None,
        }
    }

    fn entry_intent(&mut self, bar: &Bar, side: Side, confidence: f64) -> Option<OrderIntent> {
        let budget = self.ledger.cash() * self.config.max_position_fraction * confidence;
        let quantity = budget / bar.close;
        if quantity <= 0.0 || !quantity.is_finite() {
            return None;
        }
        let id = self.executor.next_intent_id();
        Some(OrderIntent::market(
            id,
            &bar.symbol,
            side,
            quantity,
            IntentReason::Signal,
        ))
    }

    fn apply_outcomes(&mut self, outcomes: Vec<ExecutionOutcome>, sink: &mut dyn EventSink) {
        for outcome in outcomes {
            match outcome {
                ExecutionOutcome::Filled(fill) => match self.ledger.apply(&fill) {
                    Ok(effect) => {
                        sink.publish(&EngineEvent::FillExecuted(fill.clone()));
                        match effect {
                            FillEffect::Opened | FillEffect::Increased => {
                                let position = self
                                    .ledger
                                    .position(&fill.symbol)
                                    .expect("fill just opened this position")
                                    .clone();
                                // Re-arming on increase recomputes levels
                                // from the new average entry.
                                self.risk.arm(&position);
                            }
                            FillEffect::Closed(_) => self.risk.release(&fill.symbol),
                            FillEffect::Reduced(_) => {}
                        }
                    }
                    Err(err) => {
                        log::warn!("fill for intent {} rejected: {}", fill.intent_id, err);
                        sink.publish(&EngineEvent::FillRejected {
                            fill,
                            error: err.to_string(),
                        });
                    }
                },
                ExecutionOutcome::Resting { intent_id } => {
                    log::debug!("intent {} resting", intent_id);
                }
                ExecutionOutcome::Cancelled { intent, reason } => {
                    sink.publish(&EngineEvent::IntentCancelled { intent, reason });
                }
            }
        }
    }

    /// Build the end-of-run artifact from the final ledger state.
    pub fn report(&self, mode: &str, timeframe: &str, completion: Completion) -> RunReport {
        let metrics = Metrics::compute(
            self.ledger.equity_curve(),
            self.ledger.closed_trades(),
            self.ledger.initial_cash(),
            periods_per_year(timeframe),
        );
        RunReport {
            mode: mode.to_string(),
            symbol: self.config.symbol.clone(),
            strategy: self.strategy.name().to_string(),
            completion,
            generated_at: Utc::now(),
            initial_cash: self.ledger.initial_cash(),
            final_equity: self
                .ledger
                .last_snapshot()
                .map(|s| s.equity)
                .unwrap_or(self.ledger.initial_cash()),
            bars_processed: self.bars_processed,
            bars_skipped: self.feed.skipped(),
            metrics,
            fills: self.ledger.fills().to_vec(),
            closed_trades: self.ledger.closed_trades().to_vec(),
            equity_curve: self.ledger.equity_curve().to_vec(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::executor::{ExecutionConfig, SimulatedExecutor};
    use crate::domain::feed::HistoricalFeed;
    use crate::domain::risk::RiskConfig;
    use crate::domain::signal::SignalDecision;
    use crate::ports::event_port::NullSink;
    use chrono::{Duration, TimeZone, Utc};

    /// Buys with full confidence on one fixed bar index, otherwise holds.
    #[derive(Debug)]
    struct BuyOnce {
        at_len: usize,
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

    fn bars(closes: &[f64]) -> Vec<Bar> {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        closes
            .iter()
            .enumerate()
            .map(|(i, &close)| Bar {
                symbol: "BTC/USDT".into(),
                timestamp: start + Duration::days(i as i64),
                open: close,
                high: close * 1.01,
                low: close * 0.99,
                close,
                volume: 1_000_000.0,
            })
            .collect()
    }

    fn engine(closes: &[f64], risk: RiskConfig) -> ExecutionEngine<HistoricalFeed, SimulatedExecutor> {
        let exec = ExecutionConfig {
            slippage_pct: 0.0,
            slippage_jitter_pct: 0.0,
            fee_pct: 0.0,
            max_fill_fraction: 1.0,
            ..ExecutionConfig::default()
        };
        ExecutionEngine::new(
            EngineConfig::default(),
            HistoricalFeed::new(bars(closes)),
            Box::new(BuyOnce { at_len: 2 }),
            RiskManager::new(risk),
            SimulatedExecutor::new(exec),
            PortfolioLedger::new(10_000.0),
        )
    }

    fn no_risk() -> RiskConfig {
        RiskConfig {
            stop_loss_pct: None,
            take_profit_pct: None,
            trailing_stop: false,
            max_drawdown_pct: None,
            ..RiskConfig::default()
        }
    }

    #[test]
    fn completes_on_feed_exhaustion() {
        let mut engine = engine(&[100.0, 101.0, 102.0, 103.0], no_risk());
        let stop = AtomicBool::new(false);
        let result = engine.run(&mut NullSink, &stop);

        assert_eq!(result.completion, Completion::Completed);
        assert_eq!(result.bars_processed, 4);
        assert_eq!(engine.ledger().fills().len(), 1);
        assert!(engine.ledger().has_position("BTC/USDT"));
        assert_eq!(engine.ledger().equity_curve().len(), 4);
    }

    #[test]
    fn stop_flag_ends_run_before_first_bar() {
        let mut engine = engine(&[100.0, 101.0], no_risk());
        let stop = AtomicBool::new(true);
        let result = engine.run(&mut NullSink, &stop);

        assert_eq!(result.completion, Completion::Stopped);
        assert_eq!(result.bars_processed, 0);
    }

    #[test]
    fn stop_loss_round_trip() {
        let risk = RiskConfig {
            stop_loss_pct: Some(0.05),
            take_profit_pct: None,
            trailing_stop: false,
            max_drawdown_pct: None,
            ..RiskConfig::default()
        };
        // Entry at 101 on bar 2, then a slide through the 5% stop.
        let mut engine = engine(&[100.0, 101.0, 100.0, 98.0, 94.0, 93.0], risk);
        let stop = AtomicBool::new(false);
        let result = engine.run(&mut NullSink, &stop);

        assert_eq!(result.completion, Completion::Completed);
        assert!(!engine.ledger().has_position("BTC/USDT"));
        assert_eq!(engine.ledger().closed_trades().len(), 1);
        let trade = &engine.ledger().closed_trades()[0];
        // Exit at the armed stop level, 5% under the 101 entry.
        assert!((trade.exit_price - 101.0 * 0.95).abs() < 1e-9);
        assert!(trade.pnl < 0.0);
    }

    #[test]
    fn report_reflects_final_state() {
        let mut engine = engine(&[100.0, 101.0, 102.0], no_risk());
        let stop = AtomicBool::new(false);
        let result = engine.run(&mut NullSink, &stop);
        let report = engine.report("backtest", "1d", result.completion);

        assert_eq!(report.mode, "backtest");
        assert_eq!(report.strategy, "buy_once");
        assert_eq!(report.bars_processed, 3);
        assert_eq!(report.fills.len(), 1);
        assert_eq!(report.equity_curve.len(), 3);
        assert!((report.initial_cash - 10_000.0).abs() < 1e-9);
    }
}
