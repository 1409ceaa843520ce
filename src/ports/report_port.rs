//! Report output port trait.

use crate::domain::error::TradewindError;
use crate::domain::report::RunReport;

pub trait ReportPort {
    fn write(&self, report: &RunReport, output_path: &str) -> Result<(), TradewindError>;

    fn load(&self, path: &str) -> Result<RunReport, TradewindError>;
}
