//! CSV file data adapter.
//!
//! One file per symbol and timeframe, named `BTC-USDT_1d.csv`, with columns
//! `timestamp,open,high,low,close,volume`. Timestamps are RFC 3339 or plain
//! `YYYY-MM-DD` dates.

use std::fs;
use std::path::PathBuf;

use chrono::{DateTime, NaiveDate, Utc};

use crate::domain::bar::Bar;
use crate::domain::error::TradewindError;
use crate::ports::data_port::DataPort;

pub struct CsvAdapter {
    base_path: PathBuf,
}

impl CsvAdapter {
    pub fn new(base_path: PathBuf) -> Self {
        Self { base_path }
    }

    fn csv_path(&self, symbol: &str, timeframe: &str) -> PathBuf {
        let name = symbol.replace('/', "-");
        self.base_path.join(format!("{}_{}.csv", name, timeframe))
    }

    fn parse_timestamp(value: &str, symbol: &str) -> Result<DateTime<Utc>, TradewindError> {
        if let Ok(ts) = DateTime::parse_from_rfc3339(value) {
            return Ok(ts.with_timezone(&Utc));
        }
        NaiveDate::parse_from_str(value, "%Y-%m-%d")
            .map(|d| d.and_hms_opt(0, 0, 0).expect("midnight always exists").and_utc())
            .map_err(|e| TradewindError::MalformedBar {
                symbol: symbol.to_string(),
                reason: format!("invalid timestamp '{}': {}", value, e),
            })
    }

    fn parse_field(
        record: &csv::StringRecord,
        index: usize,
        name: &str,
        symbol: &str,
    ) -> Result<f64, TradewindError> {
        record
            .get(index)
            .ok_or_else(|| TradewindError::MalformedBar {
                symbol: symbol.to_string(),
                reason: format!("missing {} column", name),
            })?
            .parse()
            .map_err(|e| TradewindError::MalformedBar {
                symbol: symbol.to_string(),
                reason: format!("invalid {} value: {}", name, e),
            })
    }
}

impl DataPort for CsvAdapter {
    fn fetch_bars(
        &self,
        symbol: &str,
        timeframe: &str,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<Bar>, TradewindError> {
        let path = self.csv_path(symbol, timeframe);
        let content = fs::read_to_string(&path).map_err(|_| TradewindError::NoData {
            symbol: symbol.to_string(),
            timeframe: timeframe.to_string(),
        })?;

        let mut rdr = csv::Reader::from_reader(content.as_bytes());
        let mut bars = Vec::new();

        for result in rdr.records() {
            let record = result.map_err(|e| TradewindError::MalformedBar {
                symbol: symbol.to_string(),
                reason: format!("CSV parse error: {}", e),
            })?;

            let ts_str = record.get(0).ok_or_else(|| TradewindError::MalformedBar {
                symbol: symbol.to_string(),
                reason: "missing timestamp column".to_string(),
            })?;
            let timestamp = Self::parse_timestamp(ts_str, symbol)?;

            if timestamp < start || timestamp > end {
                continue;
            }

            bars.push(Bar {
                symbol: symbol.to_string(),
                timestamp,
                open: Self::parse_field(&record, 1, "open", symbol)?,
                high: Self::parse_field(&record, 2, "high", symbol)?,
                low: Self::parse_field(&record, 3, "low", symbol)?,
                close: Self::parse_field(&record, 4, "close", symbol)?,
                volume: Self::parse_field(&record, 5, "volume", symbol)?,
            });
        }

        bars.sort_by_key(|b| b.timestamp);
        Ok(bars)
    }

    fn list_symbols(&self) -> Result<Vec<String>, TradewindError> {
        let entries = fs::read_dir(&self.base_path)?;
        let mut symbols = Vec::new();

        for entry in entries {
            let entry = entry?;
            let name = entry.file_name();
            let name_str = name.to_string_lossy();

            if let Some(stem) = name_str.strip_suffix(".csv") {
                if let Some((symbol, _timeframe)) = stem.rsplit_once('_') {
                    let symbol = symbol.replace('-', "/");
                    if !symbols.contains(&symbol) {
                        symbols.push(symbol);
                    }
                }
            }
        }

        symbols.sort();
        Ok(symbols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use tempfile::TempDir;

    fn setup_test_data() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().to_path_buf();

        let csv_content = "timestamp,open,high,low,close,volume\n\
            2024-01-15,100.0,110.0,90.0,105.0,50000\n\
            2024-01-16,105.0,115.0,100.0,110.0,60000\n\
            2024-01-17,110.0,120.0,105.0,115.0,55000\n";

        fs::write(path.join("BTC-USDT_1d.csv"), csv_content).unwrap();
        fs::write(
            path.join("ETH-USDT_1h.csv"),
            "timestamp,open,high,low,close,volume\n\
             2024-01-15T10:00:00Z,50.0,55.0,49.0,52.0,1000\n",
        )
        .unwrap();

        (dir, path)
    }

    fn day(d: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 1, d, 0, 0, 0).unwrap()
    }

    #[test]
    fn fetch_bars_returns_parsed_rows() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BTC/USDT", "1d", day(15), day(17))
            .unwrap();

        assert_eq!(bars.len(), 3);
        assert_eq!(bars[0].timestamp, day(15));
        assert_eq!(bars[0].open, 100.0);
        assert_eq!(bars[0].high, 110.0);
        assert_eq!(bars[0].low, 90.0);
        assert_eq!(bars[0].close, 105.0);
        assert_eq!(bars[0].volume, 50000.0);
        assert_eq!(bars[0].symbol, "BTC/USDT");
    }

    #[test]
    fn fetch_bars_filters_by_range() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("BTC/USDT", "1d", day(16), day(16))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(bars[0].timestamp, day(16));
    }

    #[test]
    fn fetch_bars_parses_rfc3339_timestamps() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let bars = adapter
            .fetch_bars("ETH/USDT", "1h", day(15), day(16))
            .unwrap();
        assert_eq!(bars.len(), 1);
        assert_eq!(
            bars[0].timestamp,
            Utc.with_ymd_and_hms(2024, 1, 15, 10, 0, 0).unwrap()
        );
    }

    #[test]
    fn missing_file_is_no_data() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let err = adapter
            .fetch_bars("XRP/USDT", "1d", day(1), day(31))
            .unwrap_err();
        assert!(matches!(err, TradewindError::NoData { .. }));
    }

    #[test]
    fn list_symbols_decodes_file_names() {
        let (_dir, path) = setup_test_data();
        let adapter = CsvAdapter::new(path);

        let symbols = adapter.list_symbols().unwrap();
        assert_eq!(symbols, vec!["BTC/USDT", "ETH/USDT"]);
    }
}
