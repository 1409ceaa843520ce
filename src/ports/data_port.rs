//! Historical data access port trait.

use chrono::{DateTime, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;

pub trait DataPort {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TradewindError>;

    fn list_symbols(&self) -> Result<Vec<String>, TradewindError>;
}
