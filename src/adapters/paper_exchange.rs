//! Paper exchange: an `ExchangePort` that replays historical bars from a
//! `DataPort` and settles orders against a simulated balance. Each
//! `recent_bars` call advances replay time by one bar.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::domain::order::{Fill, OrderIntent, Side};
use crate::ports::data_port::DataPort;
use crate::ports::exchange_port::ExchangePort;

pub struct PaperExchange {
    bars: Vec<Bar>,
    cursor: usize,
    balance: f64,
    fee_pct: f64,
}

impl PaperExchange {
    pub fn new<D: DataPort>(
        data: &D,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
        initial_balance: f64,
        fee_pct: f64,
    ) -> Result<Self, TradewindError> {
        let bars = data.fetch_bars(symbol, timeframe, start, end)?;
        if bars.is_empty() {
            return Err(TradewindError::NoData {
                symbol: symbol.to_string(),
                timeframe: timeframe.to_string(),
            });
        }
        Ok(PaperExchange {
            bars,
            cursor: 0,
            balance: initial_balance,
            fee_pct,
        })
    }

    fn current_bar(&self) -> Option<&Bar> {
        self.cursor.checked_sub(1).and_then(|i| self.bars.get(i))
    }
}

impl ExchangePort for PaperExchange {
    fn recent_bars(&mut self, symbol: &str, limit: usize) -> Result<Vec<Bar>, TradewindError> {
        if self.cursor >= self.bars.len() {
            return Err(TradewindError::NoData {
                symbol: symbol.to_string(),
                timeframe: "replay".to_string(),
            });
        }
        self.cursor += 1;
        let from = self.cursor.saturating_sub(limit);
        Ok(self.bars[from..self.cursor].to_vec())
    }

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<Fill, TradewindError> {
        let (close, timestamp) = self
            .current_bar()
            .map(|bar| (bar.close, bar.timestamp))
            .ok_or_else(|| TradewindError::OrderRejected {
                reason: "no market data yet".to_string(),
            })?;

        let price = intent.trigger_price.unwrap_or(close);
        let notional = price * intent.quantity;
        let fee = notional * self.fee_pct;

        match intent.side {
            Side::Buy => {
                let cost = notional + fee;
                if cost > self.balance {
                    return Err(TradewindError::InsufficientMargin {
                        required: cost,
                        available: self.balance,
                    });
                }
                self.balance -= cost;
            }
            Side::Sell => {
                self.balance += notional - fee;
            }
        }

        Ok(Fill {
            intent_id: intent.id,
            symbol: intent.symbol.clone(),
            side: intent.side,
            price,
            quantity: intent.quantity,
            fee,
            timestamp,
            retry: intent.retry,
            reason: intent.reason,
        })
    }

    fn get_balance(&mut self) -> Result<f64, TradewindError> {
        Ok(self.balance)
    }
}
