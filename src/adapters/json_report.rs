//! JSON report adapter: writes a `RunReport` to disk and reloads it for
//! cross-run comparison.

use std::fs;

use crate::domain::error::TradewindError;
use crate::domain::report::RunReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &RunReport, output_path: &str) -> Result<(), TradewindError> {
        let json =
            serde_json::to_string_pretty(report).map_err(|e| TradewindError::Report {
                reason: format!("serialization failed: {}", e),
            })?;
        fs::write(output_path, json)?;
        Ok(())
    }

    fn load(&self, path: &str) -> Result<RunReport, TradewindError> {
        let content = fs::read_to_string(path)?;
        serde_json::from_str(&content).map_err(|e| TradewindError::Report {
            reason: format!("failed to parse {}: {}", path, e),
        })
    }
}
