//! End-of-run artifact: everything needed to compare two runs offline.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::ledger::EquitySnapshot;
use super::metrics::Metrics;
use super::order::Fill;
use super::position::ClosedTrade;

/// How the run ended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Completion {
    /// Feed exhausted normally.
    Completed,
    /// Max-drawdown halt with halt_policy = stop.
    Halted { drawdown: f64 },
    /// External stop flag raised.
    Stopped,
    /// Fatal condition; the report holds the last consistent state.
    Aborted { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    pub mode: String,
    pub symbol: String,
    pub strategy: String,
    pub completion: Completion,
    pub generated_at: DateTime<Utc>,
    pub initial_cash: f64,
    pub final_equity: f64,
    pub bars_processed: usize,
    pub bars_skipped: usize,
    pub metrics: Metrics,
    pub fills: Vec<Fill>,
    pub closed_trades: Vec<ClosedTrade>,
    pub equity_curve: Vec<EquitySnapshot>,
}
