//! Order intents and fills.
//!
//! An `OrderIntent` is the transient record of a single trade decision; a
//! `Fill` is the immutable record of its (possibly partial) execution.
//! Intent ids are monotonically increasing integers so that identical replay
//! inputs produce identical execution logs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct IntentId(pub u64);

impl fmt::Display for IntentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// Deterministic intent id source. One generator per executor.
#[derive(Debug, Default)]
pub struct IntentIdGen(u64);

impl IntentIdGen {
    pub fn new() -> Self {
        IntentIdGen(0)
    }

    pub fn next_id(&mut self) -> IntentId {
        self.0 += 1;
        IntentId(self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    pub fn opposite(self) -> Side {
        match self {
            Side::Buy => Side::Sell,
            Side::Sell => Side::Buy,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum OrderType {
    Market,
    Limit(f64),
}

/// Which risk rule forced an exit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskTrigger {
    StopLoss,
    TakeProfit,
    TrailingStop,
    DrawdownHalt,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntentReason {
    Signal,
    RiskExit(RiskTrigger),
}

#[derive(Debug, Clone, PartialEq)]
pub struct OrderIntent {
    pub id: IntentId,
    pub symbol: String,
    pub side: Side,
    pub quantity: f64,
    pub order_type: OrderType,
    pub reason: IntentReason,
    /// Reference price for market execution when the decision was made at a
    /// level other than the bar close (stop/take-profit/trailing exits).
    pub trigger_price: Option<f64>,
    /// How many times this logical order has been resubmitted.
    pub retry: u32,
}

impl OrderIntent {
    pub fn market(id: IntentId, symbol: &str, side: Side, quantity: f64, reason: IntentReason) -> Self {
        OrderIntent {
            id,
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Market,
            reason,
            trigger_price: None,
            retry: 0,
        }
    }

    pub fn limit(id: IntentId, symbol: &str, side: Side, quantity: f64, price: f64) -> Self {
        OrderIntent {
            id,
            symbol: symbol.to_string(),
            side,
            quantity,
            order_type: OrderType::Limit(price),
            reason: IntentReason::Signal,
            trigger_price: None,
            retry: 0,
        }
    }
}

/// Immutable execution record, appended to the ledger's fill log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub intent_id: IntentId,
    pub symbol: String,
    pub side: Side,
    pub price: f64,
    pub quantity: f64,
    pub fee: f64,
    pub timestamp: DateTime<Utc>,
    pub retry: u32,
    pub reason: IntentReason,
}
