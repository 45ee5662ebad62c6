//! Durable append-only sinks for accepted batches.
//!
//! The sink is invoked once per accepted batch, after the in-memory store has
//! been updated. A sink failure is reported to the caller and logged, but the
//! store is never rolled back: a transient disk error must not take away
//! live visibility, at the cost of a durability gap surfaced in the logs.

use async_trait::async_trait;

use crate::data::Reading;
use crate::error::AppResult;

#[cfg(feature = "storage_csv")]
use crate::error::TelemetryError;
#[cfg(feature = "storage_csv")]
use std::collections::HashMap;
#[cfg(feature = "storage_csv")]
use std::fs::{File, OpenOptions};
#[cfg(feature = "storage_csv")]
use std::path::{Path, PathBuf};
#[cfg(feature = "storage_csv")]
use tokio::sync::Mutex;

/// Append-only, per-device durable log.
///
/// Rows must be written in the order supplied. Implementations are shared by
/// all connection handlers and synchronize internally.
#[async_trait]
pub trait DurableSink: Send + Sync {
    /// Append one accepted batch for `device_id`.
    async fn append(&self, device_id: &str, readings: &[Reading]) -> AppResult<()>;
}

/// A sink writing one `<prefix><device>.csv` file per device.
///
/// The header row is written once when a file is first created; rows are
/// appended and flushed per batch. Writers are cached per device for the
/// lifetime of the sink.
#[cfg(feature = "storage_csv")]
pub struct CsvSink {
    data_dir: PathBuf,
    file_prefix: String,
    writers: Mutex<HashMap<String, csv::Writer<File>>>,
}

#[cfg(feature = "storage_csv")]
impl CsvSink {
    /// Create a sink rooted at `data_dir`, creating the directory if needed.
    pub fn new<P: AsRef<Path>>(data_dir: P, file_prefix: &str) -> AppResult<Self> {
        let data_dir = data_dir.as_ref().to_path_buf();
        std::fs::create_dir_all(&data_dir)?;
        tracing::info!(dir = %data_dir.display(), "CSV sink ready");
        Ok(Self {
            data_dir,
            file_prefix: file_prefix.to_string(),
            writers: Mutex::new(HashMap::new()),
        })
    }

    fn device_path(&self, device_id: &str) -> PathBuf {
        // Device names are free text from the wire; keep them inside the
        // data directory.
        let safe: String = device_id
            .chars()
            .map(|c| if c == '/' || c == '\\' || c == '\0' { '_' } else { c })
            .collect();
        self.data_dir
            .join(format!("{}{}.csv", self.file_prefix, safe))
    }

    fn open_writer(&self, device_id: &str) -> AppResult<csv::Writer<File>> {
        let path = self.device_path(device_id);
        let is_new = !path.exists();

        let file = OpenOptions::new().create(true).append(true).open(&path)?;
        let mut writer = csv::WriterBuilder::new()
            .has_headers(false)
            .from_writer(file);

        if is_new {
            writer
                .write_record(["time", "x", "y", "z"])
                .map_err(|e| TelemetryError::Storage(e.to_string()))?;
            tracing::debug!(path = %path.display(), "created device log");
        }

        Ok(writer)
    }
}

#[cfg(feature = "storage_csv")]
#[async_trait]
impl DurableSink for CsvSink {
    async fn append(&self, device_id: &str, readings: &[Reading]) -> AppResult<()> {
        let mut writers = self.writers.lock().await;

        if !writers.contains_key(device_id) {
            let writer = self.open_writer(device_id)?;
            writers.insert(device_id.to_string(), writer);
        }
        let writer = writers
            .get_mut(device_id)
            .ok_or_else(|| TelemetryError::Storage("writer cache miss".to_string()))?;

        for r in readings {
            writer
                .write_record(&[
                    r.time.to_string(),
                    r.x.to_string(),
                    r.y.to_string(),
                    r.z.to_string(),
                ])
                .map_err(|e| TelemetryError::Storage(e.to_string()))?;
        }
        writer
            .flush()
            .map_err(|e| TelemetryError::Storage(e.to_string()))?;

        Ok(())
    }
}

/// Stub when CSV storage is compiled out.
#[cfg(not(feature = "storage_csv"))]
pub struct CsvSink;

#[cfg(not(feature = "storage_csv"))]
impl CsvSink {
    /// Always fails: the `storage_csv` feature is not enabled.
    pub fn new<P: AsRef<std::path::Path>>(_data_dir: P, _file_prefix: &str) -> AppResult<Self> {
        Err(crate::error::TelemetryError::FeatureNotEnabled(
            "storage_csv".to_string(),
        ))
    }
}

#[cfg(not(feature = "storage_csv"))]
#[async_trait]
impl DurableSink for CsvSink {
    async fn append(&self, _device_id: &str, _readings: &[Reading]) -> AppResult<()> {
        Err(crate::error::TelemetryError::FeatureNotEnabled(
            "storage_csv".to_string(),
        ))
    }
}

/// In-memory sink recording every append, for tests.
#[derive(Default)]
pub struct MemorySink {
    appended: tokio::sync::Mutex<Vec<(String, Vec<Reading>)>>,
}

impl MemorySink {
    /// Create an empty recording sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// Everything appended so far, in order.
    pub async fn appended(&self) -> Vec<(String, Vec<Reading>)> {
        self.appended.lock().await.clone()
    }
}

#[async_trait]
impl DurableSink for MemorySink {
    async fn append(&self, device_id: &str, readings: &[Reading]) -> AppResult<()> {
        self.appended
            .lock()
            .await
            .push((device_id.to_string(), readings.to_vec()));
        Ok(())
    }
}
