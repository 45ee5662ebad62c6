//! Shared registry of per-device time series.
//!
//! The registry is the single piece of state shared between the ingestion
//! path (connection handlers) and the observer path (snapshot readers). All
//! access goes through a read/write lock held only for the duration of the
//! operation, never across I/O, so a snapshot reader can never observe a
//! partially-applied batch and a slow observer can never stall ingestion.
//!
//! Device entries are created lazily on the first valid batch and persist for
//! the process lifetime; staleness is an observer-side concern based on the
//! `last_checkin_millis` stamp.

use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::data::series::BoundedSeries;
use crate::data::Reading;

/// Live state for one device.
#[derive(Debug, Clone)]
struct DeviceState {
    last_checkin_millis: i64,
    times: BoundedSeries,
    norms: BoundedSeries,
    rows_received: u64,
}

impl DeviceState {
    fn new(series_capacity: usize) -> Self {
        Self {
            last_checkin_millis: 0,
            times: BoundedSeries::new(series_capacity),
            norms: BoundedSeries::new(series_capacity),
            rows_received: 0,
        }
    }
}

/// One row of the device table returned by [`DeviceRegistry::list_devices`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceSummary {
    /// The identifier the device self-reported.
    pub device_id: String,
    /// Epoch milliseconds of the most recent accepted batch.
    pub last_checkin_millis: i64,
    /// All-time count of ingested rows, unbounded by series capacity.
    pub rows_received: u64,
    /// Current length of the bounded series.
    pub series_len: usize,
}

/// An owned copy of one device's series, positionally aligned.
#[derive(Debug, Clone, PartialEq)]
pub struct SeriesSnapshot {
    /// Device-supplied timestamps, oldest first.
    pub times: Vec<f64>,
    /// Reading norms, aligned with `times`.
    pub norms: Vec<f64>,
}

/// Cloneable handle to the shared device registry.
#[derive(Clone)]
pub struct DeviceRegistry {
    series_capacity: usize,
    devices: Arc<RwLock<HashMap<String, DeviceState>>>,
}

impl DeviceRegistry {
    /// Create an empty registry whose per-device series hold at most
    /// `series_capacity` samples.
    pub fn new(series_capacity: usize) -> Self {
        Self {
            series_capacity,
            devices: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Apply one accepted batch atomically.
    ///
    /// Looks up or lazily creates the device entry, stamps the checkin time,
    /// then appends `(time, norm)` per reading in order with FIFO eviction.
    /// The write lock is held for the whole batch, so concurrent snapshots
    /// see either none or all of it.
    pub async fn apply_batch(&self, device_id: &str, readings: &[Reading], now_millis: i64) {
        let mut devices = self.devices.write().await;
        let state = devices
            .entry(device_id.to_string())
            .or_insert_with(|| DeviceState::new(self.series_capacity));

        state.last_checkin_millis = now_millis;
        for reading in readings {
            state.times.push(reading.time);
            state.norms.push(reading.norm());
            state.rows_received += 1;
        }
    }

    /// Owned copy of one device's series, or `None` for an unknown device.
    pub async fn snapshot(&self, device_id: &str) -> Option<SeriesSnapshot> {
        let devices = self.devices.read().await;
        devices.get(device_id).map(|state| SeriesSnapshot {
            times: state.times.to_vec(),
            norms: state.norms.to_vec(),
        })
    }

    /// Summaries for every known device, sorted by identifier.
    pub async fn list_devices(&self) -> Vec<DeviceSummary> {
        let devices = self.devices.read().await;
        let mut summaries: Vec<DeviceSummary> = devices
            .iter()
            .map(|(id, state)| DeviceSummary {
                device_id: id.clone(),
                last_checkin_millis: state.last_checkin_millis,
                rows_received: state.rows_received,
                series_len: state.times.len(),
            })
            .collect();
        summaries.sort_by(|a, b| a.device_id.cmp(&b.device_id));
        summaries
    }

    /// Number of devices that have checked in at least once.
    pub async fn device_count(&self) -> usize {
        self.devices.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::data::MAX_SERIES_LEN;

    fn reading(time: f64, x: f64, y: f64, z: f64) -> Reading {
        Reading { time, x, y, z }
    }

    #[tokio::test]
    async fn batch_application_stores_norms() {
        let registry = DeviceRegistry::new(16);
        registry
            .apply_batch(
                "dev1",
                &[reading(1.0, 3.0, 4.0, 0.0), reading(2.0, 0.0, 0.0, 5.0)],
                1_000,
            )
            .await;

        let snapshot = registry.snapshot("dev1").await.expect("device exists");
        assert_eq!(snapshot.times, vec![1.0, 2.0]);
        assert_eq!(snapshot.norms, vec![5.0, 5.0]);

        let devices = registry.list_devices().await;
        assert_eq!(devices.len(), 1);
        assert_eq!(devices[0].rows_received, 2);
        assert_eq!(devices[0].last_checkin_millis, 1_000);
    }

    #[tokio::test]
    async fn unknown_device_snapshot_is_none() {
        let registry = DeviceRegistry::new(16);
        assert!(registry.snapshot("ghost").await.is_none());
        assert_eq!(registry.device_count().await, 0);
    }

    #[tokio::test]
    async fn series_stay_aligned_under_capacity() {
        let registry = DeviceRegistry::new(MAX_SERIES_LEN);
        for i in 0..100u32 {
            registry
                .apply_batch("dev1", &[reading(f64::from(i), 1.0, 0.0, 0.0)], 0)
                .await;
        }

        let snapshot = registry.snapshot("dev1").await.expect("device exists");
        let devices = registry.list_devices().await;
        assert_eq!(snapshot.times.len(), snapshot.norms.len());
        assert_eq!(snapshot.times.len() as u64, devices[0].rows_received);
    }

    #[tokio::test]
    async fn rows_received_outlives_eviction() {
        let registry = DeviceRegistry::new(MAX_SERIES_LEN);
        for i in 0..(MAX_SERIES_LEN as u32 + 1) {
            registry
                .apply_batch("dev1", &[reading(f64::from(i), 1.0, 0.0, 0.0)], 0)
                .await;
        }

        let snapshot = registry.snapshot("dev1").await.expect("device exists");
        assert_eq!(snapshot.times.len(), MAX_SERIES_LEN);
        assert_eq!(snapshot.norms.len(), MAX_SERIES_LEN);
        // The earliest sample (time 0.0) was evicted.
        assert_eq!(snapshot.times[0], 1.0);

        let devices = registry.list_devices().await;
        assert_eq!(devices[0].rows_received, MAX_SERIES_LEN as u64 + 1);
        assert_eq!(devices[0].series_len, MAX_SERIES_LEN);
    }

    #[tokio::test]
    async fn list_is_sorted_by_id() {
        let registry = DeviceRegistry::new(8);
        for id in ["zeta", "alpha", "mid"] {
            registry
                .apply_batch(id, &[reading(1.0, 1.0, 1.0, 1.0)], 0)
                .await;
        }

        let ids: Vec<String> = registry
            .list_devices()
            .await
            .into_iter()
            .map(|d| d.device_id)
            .collect();
        assert_eq!(ids, vec!["alpha", "mid", "zeta"]);
    }

    #[tokio::test]
    async fn checkin_stamp_tracks_latest_batch() {
        let registry = DeviceRegistry::new(8);
        registry
            .apply_batch("dev1", &[reading(1.0, 0.0, 0.0, 0.0)], 100)
            .await;
        registry
            .apply_batch("dev1", &[reading(2.0, 0.0, 0.0, 0.0)], 250)
            .await;

        let devices = registry.list_devices().await;
        assert_eq!(devices[0].last_checkin_millis, 250);
    }
}
