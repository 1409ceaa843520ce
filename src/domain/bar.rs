//! OHLCV bar representation.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::TradewindError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub symbol: String,
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl Bar {
    /// Reject bars that would corrupt downstream state: non-finite fields,
    /// inverted high/low, or non-positive prices.
    pub fn validate(&self) -> Result<(), TradewindError> {
        let fields = [self.open, self.high, self.low, self.close, self.volume];
        if fields.iter().any(|v| !v.is_finite()) {
            return Err(self.malformed("non-finite field"));
        }
        if self.high < self.low {
            return Err(self.malformed("high below low"));
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(self.malformed("non-positive price"));
        }
        if self.volume < 0.0 {
            return Err(self.malformed("negative volume"));
        }
        if self.close > self.high || self.close < self.low {
            return Err(self.malformed("close outside high/low range"));
        }
        Ok(())
    }

    /// Whether a limit price falls inside this bar's traded range.
    pub fn crosses(&self, price: f64) -> bool {
        price >= self.low && price <= self.high
    }

    fn malformed(&self, reason: &str) -> TradewindError {
        TradewindError::MalformedBar {
            symbol: self.symbol.clone(),
            reason: reason.to_string(),
        }
    }
}
