//! Market data feeds.
//!
//! `HistoricalFeed` replays a fixed bar series in timestamp order. Malformed
//! bars and out-of-order or duplicate timestamps are skipped with a warning
//! and counted, never surfaced as fatal errors.

use chrono::{DateTime, Utc};

use super::bar::Bar;
use super::error::TradewindError;

pub trait MarketDataFeed {
    /// Next bar in sequence. `Ok(None)` is a clean end of stream.
    fn next_bar(&mut self) -> Result<Option<Bar>, TradewindError>;

    /// Bars dropped so far for being malformed or out of order.
    fn skipped(&self) -> usize {
        0
    }
}

pub struct HistoricalFeed {
    bars: Vec<Bar>,
    cursor: usize,
    last_timestamp: Option<DateTime<Utc>>,
    skipped: usize,
}

impl HistoricalFeed {
    pub fn new(bars: Vec<Bar>) -> Self {
        HistoricalFeed {
            bars,
            cursor: 0,
            last_timestamp: None,
            skipped: 0,
        }
    }

    /// Rewind to the start for another deterministic replay.
    pub fn reset(&mut self) {
        self.cursor = 0;
        self.last_timestamp = None;
        self.skipped = 0;
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }
}

impl MarketDataFeed for HistoricalFeed {
    fn skipped(&self) -> usize {
        self.skipped
    }

    fn next_bar(&mut self) -> Result<Option<Bar>, TradewindError> {
        while self.cursor < self.bars.len() {
            let bar = self.bars[self.cursor].clone();
            self.cursor += 1;

            if let Err(err) = bar.validate() {
                log::warn!("skipping bar at {}: {}", bar.timestamp, err);
                self.skipped += 1;
                continue;
            }
            if let Some(last) = self.last_timestamp {
                if bar.timestamp <= last {
                    log::warn!(
                        "skipping out-of-order bar {} (last seen {})",
                        bar.timestamp,
                        last
                    );
                    self.skipped += 1;
                    continue;
                }
            }

            self.last_timestamp = Some(bar.timestamp);
            return Ok(Some(bar));
        }
        Ok(None)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    fn bar_at(day: i64, close: f64) -> Bar {
        let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        Bar {
            symbol: "BTC/USDT".into(),
            timestamp: start + Duration::days(day),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1_000.0,
        }
    }

    #[test]
    fn replays_in_order_then_ends_cleanly() {
        let mut feed = HistoricalFeed::new(vec![bar_at(0, 100.0), bar_at(1, 101.0)]);
        assert_eq!(feed.next_bar().unwrap().unwrap().close, 100.0);
        assert_eq!(feed.next_bar().unwrap().unwrap().close, 101.0);
        assert!(feed.next_bar().unwrap().is_none());
        assert!(feed.next_bar().unwrap().is_none());
    }

    #[test]
    fn skips_malformed_bars() {
        let mut broken = bar_at(1, 101.0);
        broken.high = broken.low - 10.0;
        let mut feed = HistoricalFeed::new(vec![bar_at(0, 100.0), broken, bar_at(2, 102.0)]);

        assert_eq!(feed.next_bar().unwrap().unwrap().close, 100.0);
        assert_eq!(feed.next_bar().unwrap().unwrap().close, 102.0);
        assert_eq!(feed.skipped(), 1);
    }

    #[test]
    fn skips_duplicate_and_regressing_timestamps() {
        let mut feed = HistoricalFeed::new(vec![
            bar_at(0, 100.0),
            bar_at(0, 100.5),
            bar_at(2, 102.0),
            bar_at(1, 101.0),
        ]);
        assert_eq!(feed.next_bar().unwrap().unwrap().close, 100.0);
        assert_eq!(feed.next_bar().unwrap().unwrap().close, 102.0);
        assert!(feed.next_bar().unwrap().is_none());
        assert_eq!(feed.skipped(), 2);
    }

    #[test]
    fn reset_allows_identical_replay() {
        let mut feed = HistoricalFeed::new(vec![bar_at(0, 100.0), bar_at(1, 101.0)]);
        let mut first = Vec::new();
        while let Some(bar) = feed.next_bar().unwrap() {
            first.push(bar);
        }

        feed.reset();
        let mut second = Vec::new();
        while let Some(bar) = feed.next_bar().unwrap() {
            second.push(bar);
        }
        assert_eq!(first, second);
    }
}
