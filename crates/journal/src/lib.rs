use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::{debug, error};

use common::{ConversionRecord, Result};

/// Append-only audit trail of asset conversions.
///
/// Each record becomes one newline-terminated UTF-8 line; the file is
/// created on first write and never rewritten or rotated.
#[derive(Debug, Clone)]
pub struct ConversionJournal {
    path: PathBuf,
}

impl ConversionJournal {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Build a record from raw amounts and append it.
    ///
    /// The record is returned even when the write fails; the failure is
    /// logged, never propagated, so the rotation cycle keeps going.
    pub async fn record(
        &self,
        timestamp: DateTime<Utc>,
        source_asset: &str,
        source_amount: f64,
        dest_asset: &str,
        dest_amount: f64,
        reason: &str,
    ) -> ConversionRecord {
        let record = ConversionRecord::new(
            timestamp,
            source_asset,
            source_amount,
            dest_asset,
            dest_amount,
            reason,
        );
        if let Err(e) = self.append(&record).await {
            error!(path = %self.path.display(), error = %e, "Failed to append conversion record");
        }
        record
    }

    /// Append one already-built record.
    pub async fn append(&self, record: &ConversionRecord) -> Result<()> {
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await?;
        let line = format!("{record}\n");
        file.write_all(line.as_bytes()).await?;
        file.flush().await?;

        debug!(
            from = %record.source_asset,
            to = %record.dest_asset,
            outcome = %record.outcome,
            delta = record.delta,
            "Conversion recorded"
        );
        Ok(())
    }
}
