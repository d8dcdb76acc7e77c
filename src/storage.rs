//! Append-only CSV store for liquidation records.

use std::fs::{File, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;

use crate::error::PersistenceError;
use crate::feed::events::LiquidationEvent;

pub const LIQUIDATION_COLUMNS: [&str; 12] = [
    "symbol",
    "side",
    "order_type",
    "time_in_force",
    "original_quantity",
    "price",
    "average_price",
    "order_status",
    "order_last_filled_quantity",
    "order_filled_accumulated_quantity",
    "order_trade_time",
    "usd_size",
];

/// One persisted row. Numeric columns carry the exchange's text verbatim;
/// only `usd_size` is computed here.
#[derive(Debug, Clone, PartialEq)]
pub struct LiquidationRecord {
    pub columns: [String; 12],
}

impl LiquidationRecord {
    pub fn from_event(ev: &LiquidationEvent) -> Self {
        let r = &ev.received;
        Self {
            columns: [
                ev.symbol.clone(),
                ev.side.as_str().to_string(),
                ev.order_type.clone(),
                ev.time_in_force.clone(),
                r.original_quantity.clone(),
                r.price.clone(),
                r.average_price.clone(),
                ev.order_status.clone(),
                r.last_filled_quantity.clone(),
                r.filled_accumulated_quantity.clone(),
                r.trade_time.clone(),
                ev.notional.to_string(),
            ],
        }
    }

    pub fn to_line(&self) -> String {
        let mut line = self
            .columns
            .iter()
            .map(|c| c.replace([',', '\n', '\r'], " "))
            .collect::<Vec<_>>()
            .join(",");
        line.push('\n');
        line
    }
}

pub trait PersistenceSink: Send + Sync {
    fn append(&self, record: &LiquidationRecord) -> Result<(), PersistenceError>;
}

/// Appends use blocking `std::fs` writes from the calling task; each is one
/// short line per liquidation.
pub struct CsvStore {
    path: PathBuf,
    file: Mutex<File>,
}

impl CsvStore {
    /// Opens `path` for appending; writes the header if the file did not
    /// exist yet.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, PersistenceError> {
        let path = path.as_ref().to_path_buf();
        let existed = path.exists();
        let io_err = |source: std::io::Error| PersistenceError::Io {
            path: path.display().to_string(),
            source,
        };
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(io_err)?;
        if !existed {
            let header = format!("{}\n", LIQUIDATION_COLUMNS.join(","));
            file.write_all(header.as_bytes()).map_err(io_err)?;
        }
        Ok(Self {
            path,
            file: Mutex::new(file),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl PersistenceSink for CsvStore {
    fn append(&self, record: &LiquidationRecord) -> Result<(), PersistenceError> {
        let line = record.to_line();
        self.file
            .lock()
            .write_all(line.as_bytes())
            .map_err(|source| PersistenceError::Io {
                path: self.path.display().to_string(),
                source,
            })
    }
}
