//! Typed engine notifications, consumed through the `EventSink` port.

use chrono::{DateTime, Utc};

use super::executor::CancelReason;
use super::ledger::EquitySnapshot;
use super::order::{Fill, OrderIntent, RiskTrigger};

#[derive(Debug, Clone, PartialEq)]
pub enum EngineEvent {
    FillExecuted(Fill),
    IntentCancelled {
        intent: OrderIntent,
        reason: CancelReason,
    },
    IntentFailed {
        intent: OrderIntent,
        error: String,
    },
    /// Fill produced by the executor but rejected by the ledger.
    FillRejected {
        fill: Fill,
        error: String,
    },
    RiskTriggered {
        symbol: String,
        trigger: RiskTrigger,
        level: f64,
    },
    DrawdownHalt {
        drawdown: f64,
        timestamp: DateTime<Utc>,
    },
    BarClose(EquitySnapshot),
    RunComplete {
        bars_processed: usize,
    },
}
