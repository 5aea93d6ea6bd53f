//! JSON backtest report writer.

use std::fs;
use std::path::Path;

use crate::domain::error::TraderError;
use crate::domain::report::BacktestReport;
use crate::ports::report_port::ReportPort;

pub struct JsonReportAdapter;

impl ReportPort for JsonReportAdapter {
    fn write(&self, report: &BacktestReport, output_path: &Path) -> Result<(), TraderError> {
        let body = serde_json::to_string_pretty(report).map_err(|e| TraderError::Report {
            reason: format!("failed to encode report: {e}"),
        })?;

        if let Some(parent) = output_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TraderError::Report {
                reason: format!("failed to create {}: {e}", parent.display()),
            })?;
        }

        fs::write(output_path, body).map_err(|e| TraderError::Report {
            reason: format!("failed to write {}: {e}", output_path.display()),
        })
    }
}
