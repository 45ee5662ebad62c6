//! Concurrency properties of the shared device registry.

use std::sync::Arc;

use telemetry_daq::data::registry::DeviceRegistry;
use telemetry_daq::data::Reading;
use telemetry_daq::notify::NotifyQueue;

fn reading(time: f64, x: f64) -> Reading {
    Reading {
        time,
        x,
        y: 0.0,
        z: 0.0,
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn interleaved_producers_match_sequential_application() {
    const DEVICES: usize = 6;
    const BATCHES: usize = 50;
    const ROWS: usize = 4;

    let concurrent = DeviceRegistry::new(BATCHES * ROWS);

    let mut tasks = Vec::new();
    for d in 0..DEVICES {
        let registry = concurrent.clone();
        tasks.push(tokio::spawn(async move {
            let device = format!("dev{d}");
            for b in 0..BATCHES {
                let batch: Vec<Reading> = (0..ROWS)
                    .map(|r| reading((b * ROWS + r) as f64, d as f64))
                    .collect();
                registry.apply_batch(&device, &batch, b as i64).await;
            }
        }));
    }
    for task in tasks {
        task.await.expect("producer task");
    }

    // Sequential reference: one device applied alone.
    let sequential = DeviceRegistry::new(BATCHES * ROWS);
    for b in 0..BATCHES {
        let batch: Vec<Reading> = (0..ROWS)
            .map(|r| reading((b * ROWS + r) as f64, 1.0))
            .collect();
        sequential.apply_batch("dev1", &batch, b as i64).await;
    }
    let reference = sequential.snapshot("dev1").await.expect("reference");

    for d in 0..DEVICES {
        let device = format!("dev{d}");
        let snapshot = concurrent.snapshot(&device).await.expect("device exists");
        assert_eq!(snapshot.times, reference.times, "{device} times");
        assert_eq!(snapshot.times.len(), snapshot.norms.len(), "{device} aligned");
        assert!(
            snapshot.norms.iter().all(|&n| n == d as f64),
            "{device} series uncorrupted by other devices"
        );
    }

    let summaries = concurrent.list_devices().await;
    assert_eq!(summaries.len(), DEVICES);
    for summary in summaries {
        assert_eq!(summary.rows_received, (BATCHES * ROWS) as u64);
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn snapshots_never_observe_partial_batches() {
    const BATCH: usize = 100;
    const ITERATIONS: usize = 200;

    let registry = DeviceRegistry::new(BATCH * ITERATIONS);

    let writer = {
        let registry = registry.clone();
        tokio::spawn(async move {
            for b in 0..ITERATIONS {
                let batch: Vec<Reading> = (0..BATCH)
                    .map(|r| reading((b * BATCH + r) as f64, 1.0))
                    .collect();
                registry.apply_batch("dev1", &batch, b as i64).await;
            }
        })
    };

    let reader_task = {
        let registry = registry.clone();
        tokio::spawn(async move {
            loop {
                if let Some(snapshot) = registry.snapshot("dev1").await {
                    // Batches apply atomically, so a snapshot length is
                    // always a whole number of batches.
                    assert_eq!(snapshot.times.len() % BATCH, 0);
                    assert_eq!(snapshot.times.len(), snapshot.norms.len());
                    if snapshot.times.len() == BATCH * ITERATIONS {
                        break;
                    }
                }
                tokio::task::yield_now().await;
            }
        })
    };

    writer.await.expect("writer");
    reader_task.await.expect("reader");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn many_publishers_one_drainer() {
    const PUBLISHERS: usize = 8;
    const PER_PUBLISHER: usize = 100;

    let queue = Arc::new(NotifyQueue::new(PUBLISHERS * PER_PUBLISHER));

    let mut tasks = Vec::new();
    for p in 0..PUBLISHERS {
        let queue = Arc::clone(&queue);
        tasks.push(tokio::spawn(async move {
            let device = format!("dev{p}");
            for _ in 0..PER_PUBLISHER {
                queue.publish(&device);
            }
        }));
    }
    for task in tasks {
        task.await.expect("publisher task");
    }

    // Capacity was sized to fit everything, so nothing was dropped.
    let drained = queue.drain_all().await;
    assert_eq!(drained.len(), PUBLISHERS * PER_PUBLISHER);
    for p in 0..PUBLISHERS {
        let device = format!("dev{p}");
        assert_eq!(
            drained.iter().filter(|id| **id == device).count(),
            PER_PUBLISHER
        );
    }
}
