//! Exchange collaborator port trait. Real connectors live outside this
//! crate; `PaperExchange` is the in-tree implementation.

use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::domain::order::{Fill, OrderIntent};

pub trait ExchangePort {
    /// Most recent bars for a symbol, oldest first.
    fn recent_bars(&mut self, symbol: &str, limit: usize) -> Result<Vec<Bar>, TradewindError>;

    fn submit_order(&mut self, intent: &OrderIntent) -> Result<Fill, TradewindError>;

    /// Free cash balance in the quote currency.
    fn get_balance(&mut self) -> Result<f64, TradewindError>;
}
