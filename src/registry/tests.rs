use super::*;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::{sleep, timeout};

const SLOW_MS: i64 = 3_600_000;

fn registry(capacity: usize) -> (SensorRegistry, mpsc::Receiver<Reading>) {
    let (tx, rx) = mpsc::channel(capacity);
    (SensorRegistry::new(ReadingRange::default(), tx), rx)
}

fn drain(rx: &mut mpsc::Receiver<Reading>) -> Vec<Reading> {
    let mut readings = Vec::new();
    while let Ok(r) = rx.try_recv() {
        readings.push(r);
    }
    readings
}

#[tokio::test]
async fn test_add_registers_and_reports() {
    let (registry, mut rx) = registry(16);
    let location = Location::new(45.0, 3.0).unwrap();

    let id = registry.add(location, SLOW_MS).await.unwrap();

    assert_eq!(registry.list(), vec![id.clone()]);
    assert_eq!(registry.state(&id), SensorState::Active);
    let info = registry.lookup(&id).unwrap();
    assert_eq!(info.location, location);
    assert_eq!(info.interval_ms, SLOW_MS as u64);
    assert!(info.rescheduled_at.is_none());

    let reading = timeout(Duration::from_secs(1), rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reading.sensor_id, id);
    assert!((20..=30).contains(&reading.temperature));
    assert!((40..=60).contains(&reading.humidity));

    registry.shutdown().await;
}

#[tokio::test]
async fn test_add_rejects_non_positive_interval() {
    let (registry, _rx) = registry(16);

    assert_eq!(
        registry.add(Location::random(), 0).await,
        Err(HubError::InvalidInterval(0))
    );
    assert!(registry.is_empty());
}

#[tokio::test]
async fn test_list_counts_after_adds_and_removes() {
    let (registry, _rx) = registry(64);
    let mut ids = Vec::new();
    for _ in 0..6 {
        ids.push(registry.add(Location::random(), SLOW_MS).await.unwrap());
    }
    for id in &ids[..2] {
        registry.remove(id).await.unwrap();
    }

    let listed = registry.list();
    assert_eq!(listed.len(), 4);
    assert_eq!(registry.len(), 4);

    let mut sorted = listed.clone();
    sorted.sort();
    assert_eq!(listed, sorted);

    let unique: HashSet<&SensorId> = listed.iter().collect();
    assert_eq!(unique.len(), listed.len());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_remove_twice_fails_with_not_found() {
    let (registry, _rx) = registry(16);
    let id = registry.add(Location::random(), SLOW_MS).await.unwrap();

    registry.remove(&id).await.unwrap();
    assert_eq!(
        registry.remove(&id).await,
        Err(HubError::NotFound(id.clone()))
    );
    assert_eq!(registry.state(&id), SensorState::Stopped);
    assert!(registry.lookup(&id).is_err());
}

#[tokio::test]
async fn test_remove_stops_reporting() {
    let (registry, mut rx) = registry(256);
    let id = registry.add(Location::random(), 10).await.unwrap();

    sleep(Duration::from_millis(60)).await;
    registry.remove(&id).await.unwrap();
    drain(&mut rx);

    sleep(Duration::from_millis(60)).await;
    assert!(drain(&mut rx).is_empty());
}

#[tokio::test]
async fn test_unknown_sensor_state() {
    let (registry, _rx) = registry(1);
    assert_eq!(
        registry.state(&SensorId::from("nobody")),
        SensorState::Unregistered
    );
    assert_eq!(
        registry.reschedule(&SensorId::from("nobody"), 100).await,
        Err(HubError::NotFound(SensorId::from("nobody")))
    );
}

#[tokio::test]
async fn test_reschedule_invalid_interval_keeps_schedule() {
    let (registry, mut rx) = registry(256);
    let id = registry.add(Location::random(), 20).await.unwrap();

    for bad in [0, -1, -1000] {
        assert_eq!(
            registry.reschedule(&id, bad).await,
            Err(HubError::InvalidInterval(bad))
        );
    }

    let info = registry.lookup(&id).unwrap();
    assert_eq!(info.interval_ms, 20);
    assert!(info.rescheduled_at.is_none());

    // The original task is still reporting
    drain(&mut rx);
    sleep(Duration::from_millis(100)).await;
    assert!(!drain(&mut rx).is_empty());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_reschedule_fires_immediately_at_new_interval() {
    let (registry, mut rx) = registry(256);
    let id = registry.add(Location::random(), SLOW_MS).await.unwrap();

    // Consume the immediate first reading of the slow task
    timeout(Duration::from_secs(1), rx.recv()).await.unwrap();

    registry.reschedule(&id, SLOW_MS / 2).await.unwrap();
    let reading = timeout(Duration::from_secs(1), rx.recv())
        .await
        .expect("new task should report without waiting a full interval")
        .unwrap();
    assert_eq!(reading.sensor_id, id);

    let info = registry.lookup(&id).unwrap();
    assert_eq!(info.interval_ms, (SLOW_MS / 2) as u64);
    assert!(info.rescheduled_at.is_some());

    registry.shutdown().await;
}

#[tokio::test]
async fn test_reschedule_all_applies_to_snapshot() {
    let (registry, _rx) = registry(64);
    let a = registry.add(Location::random(), SLOW_MS).await.unwrap();
    let b = registry.add(Location::random(), SLOW_MS).await.unwrap();

    assert_eq!(registry.reschedule_all(500).await.unwrap(), 2);
    assert_eq!(registry.lookup(&a).unwrap().interval_ms, 500);
    assert_eq!(registry.lookup(&b).unwrap().interval_ms, 500);

    assert_eq!(
        registry.reschedule_all(-5).await,
        Err(HubError::InvalidInterval(-5))
    );
    assert_eq!(registry.lookup(&a).unwrap().interval_ms, 500);

    registry.shutdown().await;
}

#[tokio::test]
async fn test_reschedule_all_on_empty_registry() {
    let (registry, _rx) = registry(1);
    assert_eq!(registry.reschedule_all(100).await.unwrap(), 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_reschedule_all_tolerates_concurrent_removal() {
    let (registry, _rx) = registry(1024);
    let registry = Arc::new(registry);
    let mut ids = Vec::new();
    for _ in 0..50 {
        ids.push(registry.add(Location::random(), SLOW_MS).await.unwrap());
    }

    let remover = {
        let registry = Arc::clone(&registry);
        let victims: Vec<SensorId> = ids.iter().step_by(2).cloned().collect();
        tokio::spawn(async move {
            for id in victims {
                registry.remove(&id).await.unwrap();
            }
        })
    };

    let rescheduled = registry.reschedule_all(1_000).await.unwrap();
    remover.await.unwrap();

    assert!(rescheduled <= 50);
    assert_eq!(registry.len(), 25);
    for id in registry.list() {
        let interval = registry.lookup(&id).unwrap().interval_ms;
        assert!(interval == 1_000 || interval == SLOW_MS as u64);
    }

    registry.shutdown().await;
}

#[tokio::test]
async fn test_fresh_id_retries_on_collision() {
    let (registry, _rx) = registry(16);
    let taken = registry.add(Location::random(), SLOW_MS).await.unwrap();
    let retired = registry.add(Location::random(), SLOW_MS).await.unwrap();
    registry.remove(&retired).await.unwrap();

    let mut candidates = vec![
        SensorId::from("fresh"),
        retired.clone(),
        taken.clone(),
    ];
    let tasks = registry.tasks.lock().await;
    let id = registry.fresh_id(&tasks, || candidates.pop().unwrap());
    drop(tasks);

    assert_eq!(id, SensorId::from("fresh"));
    registry.shutdown().await;
}

#[tokio::test]
async fn test_shutdown_stops_everything() {
    let (registry, _rx) = registry(64);
    let a = registry.add(Location::random(), SLOW_MS).await.unwrap();
    registry.add(Location::random(), SLOW_MS).await.unwrap();

    assert_eq!(registry.shutdown().await, 2);
    assert!(registry.is_empty());
    assert_eq!(registry.state(&a), SensorState::Stopped);
    assert_eq!(registry.shutdown().await, 0);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_adds_produce_distinct_identities() {
    let (registry, _rx) = registry(16);
    let registry = Arc::new(registry);
    let mut handles = Vec::with_capacity(10_000);

    for _ in 0..10_000 {
        let registry = Arc::clone(&registry);
        handles.push(tokio::spawn(async move {
            registry.add(Location::random(), SLOW_MS).await.unwrap()
        }));
    }

    let mut ids = HashSet::with_capacity(10_000);
    for handle in handles {
        ids.insert(handle.await.unwrap());
    }

    assert_eq!(ids.len(), 10_000);
    assert_eq!(registry.list().len(), 10_000);

    registry.shutdown().await;
}

/// A concurrent reader sees a removed identity as Active or Stopped, never Unregistered.
#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_removal_never_reads_as_unregistered() {
    use std::sync::atomic::{AtomicBool, Ordering};

    let (registry, _rx) = registry(1024);
    let registry = Arc::new(registry);
    let mut ids = Vec::new();
    for _ in 0..200 {
        ids.push(registry.add(Location::random(), SLOW_MS).await.unwrap());
    }

    let done = Arc::new(AtomicBool::new(false));
    let watcher = {
        let registry = Arc::clone(&registry);
        let done = Arc::clone(&done);
        let ids = ids.clone();
        tokio::task::spawn_blocking(move || {
            let mut unregistered = 0;
            while !done.load(Ordering::Acquire) {
                for id in &ids {
                    if registry.state(id) == SensorState::Unregistered {
                        unregistered += 1;
                    }
                }
            }
            unregistered
        })
    };

    for id in &ids[..100] {
        registry.remove(id).await.unwrap();
    }
    registry.shutdown().await;
    done.store(true, Ordering::Release);

    assert_eq!(watcher.await.unwrap(), 0);
    for id in &ids {
        assert_eq!(registry.state(id), SensorState::Stopped);
    }
}
