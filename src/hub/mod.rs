// Hub coordinator: the façade agents, operators and clients talk to

mod report;

pub use report::{render_sensor_list, NoDataReason, Report};

use crate::aggregation::{AggregationEngine, WindowSummary};
use crate::config::{HubConfig, SensorDefaults};
use crate::error::HubResult;
use crate::measurement::{Measurement, MeasurementLog, Window};
use crate::registry::SensorRegistry;
use crate::sensor::{Location, Reading, ReadingRange, SensorId, SensorInfo, SensorState};
use anyhow::Result;
use chrono::Utc;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};


/// Coordinates the sensor registry, the measurement log and aggregation.
///
/// Lifecycle calls are hard-error operations; reads return [`Report`] and
/// never fail for missing data.
pub struct HubCoordinator {
    registry: SensorRegistry,
    log: Arc<MeasurementLog>,
    aggregation: AggregationEngine,
    defaults: SensorDefaults,
    /// Backlog bound of each per-sensor ingestion worker
    worker_capacity: usize,
}

impl HubCoordinator {
    /// Build a hub from configuration. The returned receiver carries agent
    /// readings and must be driven by [`HubCoordinator::run_ingestion`].
    pub fn open(config: &HubConfig) -> Result<(Arc<Self>, mpsc::Receiver<Reading>)> {
        let log = Arc::new(MeasurementLog::open(&config.storage)?);
        let capacity = config.ingestion.channel_capacity.max(1);
        let (tx, rx) = mpsc::channel(capacity);

        let hub = Arc::new(Self {
            registry: SensorRegistry::new(ReadingRange::from(&config.sensors), tx),
            aggregation: AggregationEngine::new(Arc::clone(&log)),
            log,
            defaults: config.sensors.clone(),
            worker_capacity: capacity,
        });

        info!(
            directory = %hub.log.directory().display(),
            "Hub coordinator opened"
        );

        Ok((hub, rx))
    }

    /// Open the hub and spawn its ingestion loop.
    pub fn spawn(config: &HubConfig) -> Result<(Arc<Self>, JoinHandle<()>)> {
        let (hub, rx) = Self::open(config)?;
        let ingestion = tokio::spawn(Arc::clone(&hub).run_ingestion(rx));
        Ok((hub, ingestion))
    }

    /// Consume agent readings until every sender is gone.
    ///
    /// Readings fan out to one worker per sensor, so a sensor's appends keep
    /// arrival order while a slow log never holds up another sensor.
    pub async fn run_ingestion(self: Arc<Self>, mut readings: mpsc::Receiver<Reading>) {
        info!("Starting measurement ingestion");

        let mut workers: HashMap<SensorId, mpsc::Sender<Reading>> = HashMap::new();

        while let Some(reading) = readings.recv().await {
            let sensor_id = reading.sensor_id.clone();
            let worker = workers
                .entry(sensor_id.clone())
                .or_insert_with(|| Arc::clone(&self).spawn_sensor_worker(&sensor_id));

            match worker.try_send(reading) {
                Ok(()) => {}
                // The agent's next tick replaces a dropped reading
                Err(TrySendError::Full(_)) => {
                    warn!(sensor_id = %sensor_id, "Sensor ingestion backlog full, dropping reading");
                }
                Err(TrySendError::Closed(_)) => {
                    error!(sensor_id = %sensor_id, "Sensor ingestion worker exited");
                    workers.remove(&sensor_id);
                }
            }
        }

        warn!(
            worker_count = workers.len(),
            "Measurement ingestion channel closed"
        );
    }

    /// Ordered writer for one sensor. Exits once its sender is dropped.
    fn spawn_sensor_worker(self: Arc<Self>, sensor_id: &SensorId) -> mpsc::Sender<Reading> {
        let (tx, mut rx) = mpsc::channel::<Reading>(self.worker_capacity);
        debug!(sensor_id = %sensor_id, "Starting sensor ingestion worker");

        tokio::spawn(async move {
            while let Some(reading) = rx.recv().await {
                let hub = Arc::clone(&self);
                let sensor_id = reading.sensor_id.clone();

                let result = tokio::task::spawn_blocking(move || {
                    hub.record_measurement(
                        &reading.sensor_id,
                        reading.temperature,
                        reading.humidity,
                    )
                })
                .await;

                match result {
                    Ok(Ok(_)) => {}
                    Ok(Err(e)) => error!(
                        sensor_id = %sensor_id,
                        error = %e,
                        "Failed to record measurement"
                    ),
                    Err(e) => error!(
                        sensor_id = %sensor_id,
                        error = %e,
                        "Measurement write task failed"
                    ),
                }
            }
        });

        tx
    }

    // ── Lifecycle ─────────────────────────────────────────────────────────────

    /// Register a sensor. Location defaults to a random placement and the
    /// interval to the configured default.
    pub async fn add_sensor(
        &self,
        location: Option<Location>,
        interval_ms: Option<i64>,
    ) -> HubResult<SensorId> {
        let location = location.unwrap_or_else(Location::random);
        let interval_ms = interval_ms.unwrap_or(self.defaults.default_interval_ms as i64);
        self.registry.add(location, interval_ms).await
    }

    pub async fn remove_sensor(&self, id: &SensorId) -> HubResult<()> {
        self.registry.remove(id).await
    }

    pub async fn reschedule_sensor(&self, id: &SensorId, interval_ms: i64) -> HubResult<()> {
        self.registry.reschedule(id, interval_ms).await
    }

    pub async fn reschedule_all_sensors(&self, interval_ms: i64) -> HubResult<usize> {
        self.registry.reschedule_all(interval_ms).await
    }

    /// Stop all reporting tasks
    pub async fn shutdown(&self) {
        let stopped = self.registry.shutdown().await;
        info!(sensor_count = stopped, "Hub coordinator shut down");
    }

    // ── Ingestion ─────────────────────────────────────────────────────────────

    /// Persist one reading, timestamped now.
    ///
    /// Identities need not be registered: a tick racing a removal is still
    /// recorded.
    pub fn record_measurement(
        &self,
        id: &SensorId,
        temperature: i32,
        humidity: i32,
    ) -> HubResult<Measurement> {
        if self.registry.state(id) != SensorState::Active {
            debug!(sensor_id = %id, "Recording measurement for unregistered sensor");
        }

        let measurement = self.log.append(id, temperature, humidity, Utc::now())?;

        debug!(
            sensor_id = %id,
            temperature = temperature,
            humidity = humidity,
            "Measurement recorded"
        );
        Ok(measurement)
    }

    // ── Queries ───────────────────────────────────────────────────────────────

    pub fn list_sensors(&self) -> Vec<SensorId> {
        self.registry.list()
    }

    pub fn sensor_info(&self, id: &SensorId) -> HubResult<SensorInfo> {
        self.registry.lookup(id)
    }

    pub fn sensor_state(&self, id: &SensorId) -> SensorState {
        self.registry.state(id)
    }

    pub fn last_measurement(&self, id: &SensorId) -> Report<Measurement> {
        match self.log.latest(id) {
            Ok(Some(measurement)) => Report::found(id, measurement),
            Ok(None) => Report::no_data(id, self.absence(id, NoDataReason::EmptyLog)),
            Err(e) => Report::no_data(id, NoDataReason::StorageUnavailable(e.to_string())),
        }
    }

    pub fn trends_and_averages(&self, id: &SensorId, window: Window) -> Report<WindowSummary> {
        match self.aggregation.averages_and_trend(id, window) {
            Ok(Some(summary)) => Report::found(id, summary),
            Ok(None) => Report::no_data(id, self.absence(id, NoDataReason::EmptyWindow(window))),
            Err(e) => Report::no_data(id, NoDataReason::StorageUnavailable(e.to_string())),
        }
    }

    /// Explain an empty result, distinguishing never-registered identities
    fn absence(&self, id: &SensorId, otherwise: NoDataReason) -> NoDataReason {
        match self.registry.state(id) {
            SensorState::Unregistered => NoDataReason::UnknownSensor,
            _ => otherwise,
        }
    }
}
