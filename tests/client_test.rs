// End-to-end tests for HubClient against a served hub

use agrihub::api::{create_app, HubClient};
use agrihub::config::{HubConfig, StorageConfig};
use agrihub::measurement::Window;
use agrihub::sensor::{Location, SensorId, SensorState};
use agrihub::{HubCoordinator, HubError, NoDataReason};
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::task::JoinHandle;

struct TestServer {
    hub: Arc<HubCoordinator>,
    client: HubClient,
    server: JoinHandle<()>,
    ingestion: JoinHandle<()>,
}

impl TestServer {
    async fn shutdown(self) {
        self.server.abort();
        self.hub.shutdown().await;
        self.ingestion.abort();
    }
}

async fn start_server(dir: &TempDir) -> TestServer {
    let config = HubConfig {
        storage: StorageConfig {
            directory: dir.path().to_path_buf(),
            file_suffix: "_measurements.txt".to_string(),
        },
        ..HubConfig::default()
    };
    let (hub, ingestion) = HubCoordinator::spawn(&config).unwrap();

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let router = create_app(Arc::clone(&hub));
    let server = tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });

    let client = HubClient::new(format!("http://{}", addr)).unwrap();
    TestServer {
        hub,
        client,
        server,
        ingestion,
    }
}

#[tokio::test]
async fn test_client_lifecycle_round_trip() {
    let dir = TempDir::new().unwrap();
    let srv = start_server(&dir).await;
    let client = &srv.client;

    let location = Location::new(-33.9, 18.4).unwrap();
    let id = client.add_sensor(Some(location), Some(60_000)).await.unwrap();
    assert_eq!(client.list_sensors().await.unwrap(), vec![id.clone()]);

    let status = client.sensor_status(&id).await.unwrap();
    assert_eq!(status.state, SensorState::Active);
    assert_eq!(status.info.location, location);
    assert_eq!(status.info.interval_ms, 60_000);

    client.reschedule_sensor(&id, 30_000).await.unwrap();
    assert_eq!(client.sensor_status(&id).await.unwrap().info.interval_ms, 30_000);
    assert_eq!(client.reschedule_all_sensors(15_000).await.unwrap(), 1);

    client.remove_sensor(&id).await.unwrap();
    assert!(client.list_sensors().await.unwrap().is_empty());

    srv.shutdown().await;
}

#[tokio::test]
async fn test_client_measurements_and_trends() {
    let dir = TempDir::new().unwrap();
    let srv = start_server(&dir).await;
    let client = &srv.client;
    let id = SensorId::from("probe-3");

    let report = client.last_measurement(&id).await.unwrap();
    assert_eq!(report.reason(), Some(&NoDataReason::UnknownSensor));

    client.record_measurement(&id, 25, 55).await.unwrap();
    let recorded = client.record_measurement(&id, 21, 58).await.unwrap();

    let report = client.last_measurement(&id).await.unwrap();
    assert!(report.is_found());
    assert_eq!(report.sensor_id(), &id);
    assert_eq!(report.value(), Some(&recorded));

    let summary = client
        .trends_and_averages(&id, Window::Day)
        .await
        .unwrap()
        .into_value()
        .unwrap();
    assert_eq!(summary.window, Window::Day);
    assert_eq!(summary.sample_count, 2);
    assert_eq!(summary.avg_temperature, 23.0);
    assert_eq!(summary.avg_humidity, 56.5);

    srv.shutdown().await;
}

#[tokio::test]
async fn test_client_periodic_reports_arrive() {
    let dir = TempDir::new().unwrap();
    let srv = start_server(&dir).await;
    let client = &srv.client;

    let id = client.add_sensor(None, Some(100)).await.unwrap();
    tokio::time::sleep(Duration::from_millis(350)).await;

    let report = client.last_measurement(&id).await.unwrap();
    let measurement = report.value().unwrap();
    assert!((20..=30).contains(&measurement.temperature));
    assert!((40..=60).contains(&measurement.humidity));

    srv.shutdown().await;
}

/// Hard errors come back typed.
#[tokio::test]
async fn test_client_rebuilds_hub_errors() {
    let dir = TempDir::new().unwrap();
    let srv = start_server(&dir).await;
    let client = &srv.client;
    let missing = SensorId::from("missing");

    match client.remove_sensor(&missing).await {
        Err(HubError::NotFound(id)) => assert_eq!(id, missing),
        other => panic!("expected NotFound, got {:?}", other),
    }

    match client.add_sensor(None, Some(0)).await {
        Err(HubError::InvalidInterval(0)) => {}
        other => panic!("expected InvalidInterval, got {:?}", other),
    }

    match client.reschedule_sensor(&missing, -1).await {
        Err(HubError::InvalidInterval(-1)) => {}
        other => panic!("expected InvalidInterval, got {:?}", other),
    }

    match client.record_measurement(&SensorId::from("a.b"), 1, 1).await {
        Err(HubError::InvalidIdentity(_)) => {}
        other => panic!("expected InvalidIdentity, got {:?}", other),
    }

    srv.shutdown().await;
}

#[tokio::test]
async fn test_client_unreachable_hub_is_transport_failure() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let client = HubClient::new(format!("http://{}", addr)).unwrap();
    match client.list_sensors().await {
        Err(HubError::TransportFailure(_)) => {}
        other => panic!("expected TransportFailure, got {:?}", other),
    }
}
