//! Read-only observer boundary.
//!
//! Everything a dashboard or exporter needs: the device table, per-device
//! series snapshots, and the drained notification hints. Every operation is
//! non-blocking and returns owned copies, so observers can never corrupt the
//! store or stall ingestion by holding a reference.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio::time::interval;
use tracing::{debug, info};

use crate::data::registry::{DeviceRegistry, DeviceSummary, SeriesSnapshot};
use crate::notify::NotifyQueue;

/// Read-only facade over the registry and notification queue.
#[derive(Clone)]
pub struct Observer {
    registry: DeviceRegistry,
    notifications: Arc<NotifyQueue>,
}

impl Observer {
    /// Build an observer over the shared state.
    pub fn new(registry: DeviceRegistry, notifications: Arc<NotifyQueue>) -> Self {
        Self {
            registry,
            notifications,
        }
    }

    /// Summaries for every known device, sorted by identifier.
    pub async fn list_devices(&self) -> Vec<DeviceSummary> {
        self.registry.list_devices().await
    }

    /// Owned copy of one device's series, or `None` for an unknown device.
    pub async fn snapshot(&self, device_id: &str) -> Option<SeriesSnapshot> {
        self.registry.snapshot(device_id).await
    }

    /// Drain and return the queued "new data" hints.
    ///
    /// Hints are best-effort; a periodic `list_devices` refresh remains the
    /// ground truth regardless of what is (or is not) drained here.
    pub async fn drain_notifications(&self) -> Vec<String> {
        self.notifications.drain_all().await
    }
}

/// Periodic status reporter: the in-process stand-in for a dashboard.
///
/// On each tick, drains the hint queue and logs one line per device with its
/// row count, series length, and time since last checkin. Runs until the
/// task is dropped.
pub async fn run_status_loop(observer: Observer, period: Duration) {
    let mut tick = interval(period);

    loop {
        tick.tick().await;

        let updated = observer.drain_notifications().await;
        let devices = observer.list_devices().await;
        if devices.is_empty() {
            debug!("no devices have checked in yet");
            continue;
        }

        let now = Utc::now().timestamp_millis();
        for device in devices {
            let age_ms = now.saturating_sub(device.last_checkin_millis);
            let fresh = updated.iter().any(|id| id == &device.device_id);
            info!(
                device = %device.device_id,
                rows = device.rows_received,
                series_len = device.series_len,
                age_ms,
                fresh,
                "device status"
            );
        }
    }
}
