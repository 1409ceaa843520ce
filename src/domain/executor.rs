//! Order execution.
//!
//! `SimulatedExecutor` fills intents against bar data with adverse slippage,
//! limit-order resting, volume-capped partial fills, and id-keyed
//! idempotence. `ExchangeExecutor` forwards intents to an `ExchangePort`
//! under a capped exponential-backoff retry policy.
//!
//! Executors own intent id generation so that remainder intents created
//! inside the executor never collide with engine-created ids.

use std::collections::HashSet;
use std::thread;
use std::time::Duration;

use crossbeam_channel::{unbounded, Receiver, Sender};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use super::bar::Bar;
use super::error::TradewindError;
use super::order::{Fill, IntentId, IntentIdGen, IntentReason, OrderIntent, OrderType, Side};
use crate::ports::exchange_port::ExchangePort;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CancelReason {
    /// Limit order rested past `max_pending_bars` without crossing.
    Expired,
    /// Partial-fill remainder exceeded `max_retries`.
    RetriesExhausted,
    /// A drawdown halt flushed all resting state.
    Halted,
}

/// One executor decision. Partial fills surface as a `Filled` outcome for
/// the executed slice plus a `Resting`/`Cancelled` outcome for the rest.
#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(Fill),
    Resting { intent_id: IntentId },
    Cancelled { intent: OrderIntent, reason: CancelReason },
}

pub trait OrderExecutor {
    fn next_intent_id(&mut self) -> IntentId;

    /// Submit a new intent against the current bar. `DuplicateIntent` if the
    /// id was ever seen before.
    fn submit(
        &mut self,
        intent: OrderIntent,
        bar: &Bar,
    ) -> Result<Vec<ExecutionOutcome>, TradewindError>;

    /// Re-evaluate resting state (pending limits, partial remainders)
    /// against a new bar.
    fn on_bar(&mut self, bar: &Bar) -> Vec<ExecutionOutcome>;

    fn pending_count(&self) -> usize;

    /// Cancel everything still resting. Called on a drawdown halt so no
    /// stale limit or remainder can fill while trading is suppressed.
    fn cancel_pending(&mut self) -> Vec<ExecutionOutcome> {
        Vec::new()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct ExecutionConfig {
    /// Base adverse slippage rate for market fills.
    pub slippage_pct: f64,
    /// Extra adverse slippage drawn uniformly from [0, jitter] per fill.
    pub slippage_jitter_pct: f64,
    pub slippage_seed: u64,
    pub fee_pct: f64,
    /// A single fill consumes at most this fraction of the bar's volume.
    pub max_fill_fraction: f64,
    /// Bars a limit order may rest before auto-cancel.
    pub max_pending_bars: u32,
    /// Resubmissions allowed for a partial-fill remainder.
    pub max_retries: u32,
}

impl Default for ExecutionConfig {
    fn default() -> Self {
        ExecutionConfig {
            slippage_pct: 0.0005,
            slippage_jitter_pct: 0.0,
            slippage_seed: 42,
            fee_pct: 0.001,
            max_fill_fraction: 0.1,
            max_pending_bars: 5,
            max_retries: 3,
        }
    }
}

#[derive(Debug, Clone)]
struct PendingOrder {
    intent: OrderIntent,
    bars_waited: u32,
}

pub struct SimulatedExecutor {
    config: ExecutionConfig,
    ids: IntentIdGen,
    seen: HashSet<IntentId>,
    pending: Vec<PendingOrder>,
    rng: StdRng,
}

impl SimulatedExecutor {
    pub fn new(config: ExecutionConfig) -> Self {
        let rng = StdRng::seed_from_u64(config.slippage_seed);
        SimulatedExecutor {
            config,
            ids: IntentIdGen::new(),
            seen: HashSet::new(),
            pending: Vec::new(),
            rng,
        }
    }

    fn slippage_rate(&mut self) -> f64 {
        let jitter = if self.config.slippage_jitter_pct > 0.0 {
            self.rng.gen_range(0.0..=self.config.slippage_jitter_pct)
        } else {
            0.0
        };
        self.config.slippage_pct + jitter
    }

    /// Slippage is always adverse: buys pay up, sells receive less.
    fn slipped_price(&mut self, reference: f64, side: Side) -> f64 {
        let rate = self.slippage_rate();
        match side {
            Side::Buy => reference * (1.0 + rate),
            Side::Sell => reference * (1.0 - rate),
        }
    }

    fn make_fill(&self, intent: &OrderIntent, price: f64, quantity: f64, bar: &Bar) -> Fill {
        Fill {
            intent_id: intent.id,
            symbol: intent.symbol.clone(),
            side: intent.side,
            price,
            quantity,
            fee: price * quantity * self.config.fee_pct,
            timestamp: bar.timestamp,
            retry: intent.retry,
            reason: intent.reason,
        }
    }

    fn volume_cap(&self, bar: &Bar) -> f64 {
        self.config.max_fill_fraction * bar.volume
    }

    /// Fill as much of the intent as the bar's volume allows. The unfilled
    /// remainder becomes a new pending market intent with a bumped retry
    /// count, or is cancelled once retries run out. Forced risk exits are
    /// exempt from the cap: they must flatten in full within the bar.
    fn execute_at(
        &mut self,
        intent: &OrderIntent,
        price: f64,
        bar: &Bar,
    ) -> Vec<ExecutionOutcome> {
        let cap = match intent.reason {
            IntentReason::RiskExit(_) => f64::INFINITY,
            IntentReason::Signal => self.volume_cap(bar),
        };
        if intent.quantity <= cap {
            return vec![ExecutionOutcome::Filled(
                self.make_fill(intent, price, intent.quantity, bar),
            )];
        }

        let mut outcomes = Vec::with_capacity(2);
        if cap > 0.0 {
            outcomes.push(ExecutionOutcome::Filled(
                self.make_fill(intent, price, cap, bar),
            ));
        }

        let mut remainder = intent.clone();
        remainder.id = self.ids.next_id();
        remainder.quantity = intent.quantity - cap.max(0.0);
        remainder.retry = intent.retry + 1;
        // A limit remainder keeps resting at its price; a market remainder
        // chases the next close.
        remainder.trigger_price = None;

        if remainder.retry > self.config.max_retries {
            outcomes.push(ExecutionOutcome::Cancelled {
                intent: remainder,
                reason: CancelReason::RetriesExhausted,
            });
        } else {
            self.seen.insert(remainder.id);
            outcomes.push(ExecutionOutcome::Resting {
                intent_id: remainder.id,
            });
            self.pending.push(PendingOrder {
                intent: remainder,
                bars_waited: 0,
            });
        }
        outcomes
    }
}

impl OrderExecutor for SimulatedExecutor {
    fn next_intent_id(&mut self) -> IntentId {
        self.ids.next_id()
    }

    fn submit(
        &mut self,
        intent: OrderIntent,
        bar: &Bar,
    ) -> Result<Vec<ExecutionOutcome>, TradewindError> {
        if !self.seen.insert(intent.id) {
            return Err(TradewindError::DuplicateIntent {
                intent_id: intent.id.0,
            });
        }

        match intent.order_type {
            OrderType::Market => {
                let reference = intent.trigger_price.unwrap_or(bar.close);
                let price = self.slipped_price(reference, intent.side);
                Ok(self.execute_at(&intent, price, bar))
            }
            // Limit orders rest from the next bar onward.
            OrderType::Limit(_) => {
                let id = intent.id;
                self.pending.push(PendingOrder {
                    intent,
                    bars_waited: 0,
                });
                Ok(vec![ExecutionOutcome::Resting { intent_id: id }])
            }
        }
    }

    fn on_bar(&mut self, bar: &Bar) -> Vec<ExecutionOutcome> {
        let mut outcomes = Vec::new();
        let pending = std::mem::take(&mut self.pending);

        for mut order in pending {
            if order.intent.symbol != bar.symbol {
                self.pending.push(order);
                continue;
            }
            match order.intent.order_type {
                OrderType::Market => {
                    let price = self.slipped_price(bar.close, order.intent.side);
                    outcomes.extend(self.execute_at(&order.intent, price, bar));
                }
                OrderType::Limit(limit) => {
                    if bar.crosses(limit) {
                        // Limit fills at the limit price, no slippage.
                        outcomes.extend(self.execute_at(&order.intent, limit, bar));
                    } else {
                        order.bars_waited += 1;
                        if order.bars_waited >= self.config.max_pending_bars {
                            outcomes.push(ExecutionOutcome::Cancelled {
                                intent: order.intent,
                                reason: CancelReason::Expired,
                            });
                        } else {
                            self.pending.push(order);
                        }
                    }
                }
            }
        }
        outcomes
    }

    fn pending_count(&self) -> usize {
        self.pending.len()
    }

    fn cancel_pending(&mut self) -> Vec<ExecutionOutcome> {
        std::mem::take(&mut self.pending)
            .into_iter()
            .map(|order| ExecutionOutcome::Cancelled {
                intent: order.intent,
                reason: CancelReason::Halted,
            })
            .collect()
    }
}

/// Capped exponential backoff plus a per-attempt deadline for live order
/// submission.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    /// Upper bound on a single `submit_order` call.
    pub timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy {
            max_attempts: 3,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exp = self.base_delay.saturating_mul(1u32 << attempt.min(20));
        exp.min(self.max_delay)
    }
}

/// Live executor. The exchange lives on a worker thread; each submission
/// attempt waits at most `RetryPolicy::timeout` for its reply, so a hung
/// exchange call can never block the decision loop past the deadline.
pub struct ExchangeExecutor {
    requests: Option<Sender<OrderIntent>>,
    replies: Receiver<Result<Fill, TradewindError>>,
    policy: RetryPolicy,
    ids: IntentIdGen,
    seen: HashSet<IntentId>,
    handle: Option<thread::JoinHandle<()>>,
}

impl ExchangeExecutor {
    pub fn new<E>(mut exchange: E, policy: RetryPolicy) -> Self
    where
        E: ExchangePort + Send + 'static,
    {
        let (requests, request_rx) = unbounded::<OrderIntent>();
        let (reply_tx, replies) = unbounded();

        let handle = thread::spawn(move || {
            for intent in request_rx.iter() {
                if reply_tx.send(exchange.submit_order(&intent)).is_err() {
                    return;
                }
            }
        });

        ExchangeExecutor {
            requests: Some(requests),
            replies,
            policy,
            ids: IntentIdGen::new(),
            seen: HashSet::new(),
            handle: Some(handle),
        }
    }

    fn send_request(&self, intent: OrderIntent) -> Result<(), TradewindError> {
        // Discard replies from attempts that already timed out.
        while self.replies.try_recv().is_ok() {}
        self.requests
            .as_ref()
            .and_then(|tx| tx.send(intent).ok())
            .ok_or_else(|| TradewindError::OrderRejected {
                reason: "exchange worker is gone".to_string(),
            })
    }
}

impl OrderExecutor for ExchangeExecutor {
    fn next_intent_id(&mut self) -> IntentId {
        self.ids.next_id()
    }

    fn submit(
        &mut self,
        intent: OrderIntent,
        _bar: &Bar,
    ) -> Result<Vec<ExecutionOutcome>, TradewindError> {
        if !self.seen.insert(intent.id) {
            return Err(TradewindError::DuplicateIntent {
                intent_id: intent.id.0,
            });
        }

        let mut attempt = 0u32;
        loop {
            attempt += 1;
            self.send_request(intent.clone())?;

            match self.replies.recv_timeout(self.policy.timeout) {
                Ok(Ok(fill)) => return Ok(vec![ExecutionOutcome::Filled(fill)]),
                // A timed-out submission is ambiguous (the order may still
                // land); it is never resubmitted.
                Err(_) => {
                    log::warn!(
                        "order {} attempt {} exceeded the {:?} deadline",
                        intent.id,
                        attempt,
                        self.policy.timeout
                    );
                    return Err(TradewindError::OrderTimeout { attempts: attempt });
                }
                Ok(Err(err)) => {
                    if attempt >= self.policy.max_attempts {
                        log::warn!(
                            "order {} failed after {} attempts: {}",
                            intent.id,
                            attempt,
                            err
                        );
                        return Err(TradewindError::OrderTimeout { attempts: attempt });
                    }
                    let delay = self.policy.delay_for(attempt - 1);
                    log::warn!(
                        "order {} attempt {} failed ({}), retrying in {:?}",
                        intent.id,
                        attempt,
                        err,
                        delay
                    );
                    thread::sleep(delay);
                }
            }
        }
    }

    fn on_bar(&mut self, _bar: &Bar) -> Vec<ExecutionOutcome> {
        Vec::new()
    }

    fn pending_count(&self) -> usize {
        0
    }
}

impl Drop for ExchangeExecutor {
    fn drop(&mut self) {
        drop(self.requests.take());
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}
