//! Position tracking.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PositionSide {
    Long,
    Short,
}

/// An open position. Owned exclusively by the ledger; the risk manager reads
/// it and may request closure but never mutates it directly.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub entry_time: DateTime<Utc>,
    /// Entry fees paid so far, prorated out on partial closes.
    pub entry_fees: f64,
}

impl Position {
    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side == PositionSide::Short
    }

    /// Capital locked in the position at entry prices (escrow model: shorts
    /// lock the entry notional, same as longs).
    pub fn locked_value(&self) -> f64 {
        self.quantity * self.entry_price
    }

    /// Mark-to-market value of the locked capital.
    pub fn market_value(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => self.quantity * price,
            // Escrowed notional plus the unrealized short profit/loss.
            PositionSide::Short => self.quantity * (2.0 * self.entry_price - price),
        }
    }

    pub fn unrealized_pnl(&self, price: f64) -> f64 {
        match self.side {
            PositionSide::Long => self.quantity * (price - self.entry_price),
            PositionSide::Short => self.quantity * (self.entry_price - price),
        }
    }
}

/// Record of one completed round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClosedTrade {
    pub symbol: String,
    pub side: PositionSide,
    pub quantity: f64,
    pub entry_price: f64,
    pub exit_price: f64,
    pub entry_time: DateTime<Utc>,
    pub exit_time: DateTime<Utc>,
    /// Net of entry and exit fees.
    pub pnl: f64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn entry_time() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, 15, 0, 0, 0).unwrap()
    }

    fn long_position() -> Position {
        Position {
            symbol: "BTC/USDT".into(),
            side: PositionSide::Long,
            quantity: 2.0,
            entry_price: 100.0,
            entry_time: entry_time(),
            entry_fees: 0.0,
        }
    }

    fn short_position() -> Position {
        Position {
            symbol: "ETH/USDT".into(),
            side: PositionSide::Short,
            quantity: 10.0,
            entry_price: 50.0,
            entry_time: entry_time(),
            entry_fees: 0.0,
        }
    }

    #[test]
    fn market_value_long_tracks_price() {
        let pos = long_position();
        assert_eq!(pos.market_value(110.0), 220.0);
        assert_eq!(pos.market_value(90.0), 180.0);
    }

    #[test]
    fn market_value_short_moves_inverse() {
        let pos = short_position();
        // Escrow 500; price down 10% -> value 550
        assert_eq!(pos.market_value(45.0), 550.0);
        // Price up 10% -> value 450
        assert_eq!(pos.market_value(55.0), 450.0);
    }

    #[test]
    fn unrealized_pnl_long() {
        let pos = long_position();
        assert_eq!(pos.unrealized_pnl(110.0), 20.0);
        assert_eq!(pos.unrealized_pnl(95.0), -10.0);
    }

    #[test]
    fn unrealized_pnl_short() {
        let pos = short_position();
        assert_eq!(pos.unrealized_pnl(45.0), 50.0);
        assert_eq!(pos.unrealized_pnl(55.0), -50.0);
    }

    #[test]
    fn locked_value_uses_entry_price() {
        assert_eq!(long_position().locked_value(), 200.0);
        assert_eq!(short_position().locked_value(), 500.0);
    }

    #[test]
    fn market_value_consistency_with_locked_plus_unrealized() {
        for pos in [long_position(), short_position()] {
            for price in [40.0, 80.0, 120.0] {
                let expected = pos.locked_value() + pos.unrealized_pnl(price);
                assert!((pos.market_value(price) - expected).abs() < 1e-9);
            }
        }
    }
}
