//! Append-only CSV trade log.

use std::fs::{self, OpenOptions};
use std::path::{Path, PathBuf};

use crate::domain::error::TraderError;
use crate::ports::trade_log_port::{TradeLogPort, TradeLogRecord};

pub const HEADER: &str =
    "date,type,entryPrice,exitPrice,size,leverage,profit,fees,netProfit,balance,reason";

pub struct CsvTradeLogAdapter {
    path: PathBuf,
}

impl CsvTradeLogAdapter {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl TradeLogPort for CsvTradeLogAdapter {
    fn append(&self, record: &TradeLogRecord) -> Result<(), TraderError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(|e| TraderError::TradeLog {
                reason: format!("failed to create {}: {}", parent.display(), e),
            })?;
        }

        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| TraderError::TradeLog {
                reason: format!("failed to open {}: {}", self.path.display(), e),
            })?;
        let is_new = file.metadata().map(|m| m.len() == 0).unwrap_or(true);

        let mut writer = csv::WriterBuilder::new()
            .has_headers(is_new)
            .from_writer(file);
        writer.serialize(record).map_err(|e| TraderError::TradeLog {
            reason: format!("failed to write {}: {}", self.path.display(), e),
        })?;
        writer.flush().map_err(|e| TraderError::TradeLog {
            reason: format!("failed to flush {}: {}", self.path.display(), e),
        })?;
        Ok(())
    }
}
