//! Event sink that renders engine events through the `log` facade.

use crate::domain::event::EngineEvent;
use crate::ports::event_port::EventSink;

pub struct LogNotifier;

impl EventSink for LogNotifier {
    fn publish(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::FillExecuted(fill) => log::info!(
                "fill {}: {:?} {:.6} {} @ {:.4} (fee {:.4}, retry {})",
                fill.intent_id,
                fill.side,
                fill.quantity,
                fill.symbol,
                fill.price,
                fill.fee,
                fill.retry
            ),
            EngineEvent::IntentCancelled { intent, reason } => log::warn!(
                "intent {} cancelled ({:?}): {:?} {:.6} {}",
                intent.id,
                reason,
                intent.side,
                intent.quantity,
                intent.symbol
            ),
            EngineEvent::IntentFailed { intent, error } => {
                log::error!("intent {} failed: {}", intent.id, error)
            }
            EngineEvent::FillRejected { fill, error } => {
                log::error!("fill {} rejected by ledger: {}", fill.intent_id, error)
            }
            EngineEvent::RiskTriggered {
                symbol,
                trigger,
                level,
            } => log::warn!("{}: {:?} triggered at {:.4}", symbol, trigger, level),
            EngineEvent::DrawdownHalt {
                drawdown,
                timestamp,
            } => log::error!(
                "trading halted at {}: drawdown {:.2}%",
                timestamp,
                drawdown * 100.0
            ),
            EngineEvent::BarClose(snapshot) => log::debug!(
                "bar close {}: equity {:.2} (cash {:.2}, drawdown {:.2}%)",
                snapshot.timestamp,
                snapshot.equity,
                snapshot.cash,
                snapshot.drawdown * 100.0
            ),
            EngineEvent::RunComplete { bars_processed } => {
                log::info!("run complete: {} bars processed", bars_processed)
            }
        }
    }
}
