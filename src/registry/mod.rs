//! Sensor registry - owns every registered sensor and its reporting task.
//!
//! Lifecycle operations (add, remove, reschedule) serialize on a single async
//! mutex guarding the task table. Sensor descriptions are published to a
//! concurrent map only once fully constructed, so `list`/`lookup` never wait
//! on lifecycle work and never observe a half-built entry.

use crate::error::{HubError, HubResult};
use crate::sensor::{
    validate_interval, Location, Reading, ReadingRange, ReportingTask, SensorId, SensorInfo,
    SensorState,
};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::collections::HashMap;
use tokio::sync::{mpsc, Mutex};
use tracing::{debug, info};

#[cfg(test)]
mod tests;

pub struct SensorRegistry {
    /// Live reporting tasks (lifecycle exclusion domain)
    tasks: Mutex<HashMap<SensorId, ReportingTask>>,
    /// Published sensor descriptions for concurrent reads
    sensors: DashMap<SensorId, SensorInfo>,
    /// Removed identities, never reissued
    retired: DashMap<SensorId, DateTime<Utc>>,
    /// Value ranges handed to new reporting tasks
    range: ReadingRange,
    /// Agent -> hub ingestion channel
    sink: mpsc::Sender<Reading>,
}

impl SensorRegistry {
    pub fn new(range: ReadingRange, sink: mpsc::Sender<Reading>) -> Self {
        Self {
            tasks: Mutex::new(HashMap::new()),
            sensors: DashMap::new(),
            retired: DashMap::new(),
            range,
            sink,
        }
    }

    /// Register a new sensor and start its reporting task.
    pub async fn add(&self, location: Location, interval_ms: i64) -> HubResult<SensorId> {
        let interval_ms = validate_interval(interval_ms)?;

        let mut tasks = self.tasks.lock().await;
        let id = self.fresh_id(&tasks, SensorId::generate);

        let task = ReportingTask::spawn(
            id.clone(),
            interval_ms,
            self.range.clone(),
            self.sink.clone(),
        );
        tasks.insert(id.clone(), task);

        self.sensors.insert(
            id.clone(),
            SensorInfo {
                id: id.clone(),
                location,
                interval_ms,
                registered_at: Utc::now(),
                rescheduled_at: None,
            },
        );

        info!(
            sensor_id = %id,
            location = %location,
            interval_ms = interval_ms,
            "Sensor added"
        );

        Ok(id)
    }

    /// Draw identities until one is neither live nor retired
    fn fresh_id(
        &self,
        tasks: &HashMap<SensorId, ReportingTask>,
        mut generate: impl FnMut() -> SensorId,
    ) -> SensorId {
        loop {
            let id = generate();
            if !tasks.contains_key(&id) && !self.retired.contains_key(&id) {
                return id;
            }
            debug!(sensor_id = %id, "Identity collision, regenerating");
        }
    }

    /// Stop the sensor's reporting task, then drop its entry.
    pub async fn remove(&self, id: &SensorId) -> HubResult<()> {
        let mut tasks = self.tasks.lock().await;
        let task = tasks
            .remove(id)
            .ok_or_else(|| HubError::NotFound(id.clone()))?;

        task.stop().await;
        // Retired before unpublished: readers must never see it as unregistered
        self.retired.insert(id.clone(), Utc::now());
        self.sensors.remove(id);

        info!(sensor_id = %id, "Sensor removed");
        Ok(())
    }

    /// Replace the sensor's reporting task with one at `interval_ms`.
    ///
    /// The old task is fully stopped before the new one starts; the new task
    /// reports immediately.
    pub async fn reschedule(&self, id: &SensorId, interval_ms: i64) -> HubResult<()> {
        let interval_ms = validate_interval(interval_ms)?;

        let mut tasks = self.tasks.lock().await;
        let old = tasks
            .remove(id)
            .ok_or_else(|| HubError::NotFound(id.clone()))?;
        let previous_ms = old.interval_ms();
        old.stop().await;

        let task = ReportingTask::spawn(
            id.clone(),
            interval_ms,
            self.range.clone(),
            self.sink.clone(),
        );
        tasks.insert(id.clone(), task);

        if let Some(mut sensor) = self.sensors.get_mut(id) {
            sensor.interval_ms = interval_ms;
            sensor.rescheduled_at = Some(Utc::now());
        }

        info!(
            sensor_id = %id,
            previous_ms = previous_ms,
            interval_ms = interval_ms,
            "Sensor rescheduled"
        );
        Ok(())
    }

    /// Reschedule every sensor registered at call time.
    ///
    /// Sensors added after the snapshot keep their interval; sensors removed
    /// during the sweep are skipped. Returns how many were rescheduled.
    pub async fn reschedule_all(&self, interval_ms: i64) -> HubResult<usize> {
        validate_interval(interval_ms)?;

        let mut ids: Vec<SensorId> = self.tasks.lock().await.keys().cloned().collect();
        ids.sort();

        let mut rescheduled = 0;
        for id in &ids {
            match self.reschedule(id, interval_ms).await {
                Ok(()) => rescheduled += 1,
                Err(HubError::NotFound(_)) => {
                    debug!(sensor_id = %id, "Sensor removed during sweep, skipping");
                }
                Err(e) => return Err(e),
            }
        }

        info!(
            interval_ms = interval_ms,
            snapshot = ids.len(),
            rescheduled = rescheduled,
            "All sensors rescheduled"
        );
        Ok(rescheduled)
    }

    /// Registered identities in ascending lexical order
    pub fn list(&self) -> Vec<SensorId> {
        let mut ids: Vec<SensorId> = self.sensors.iter().map(|e| e.key().clone()).collect();
        ids.sort();
        ids
    }

    pub fn lookup(&self, id: &SensorId) -> HubResult<SensorInfo> {
        self.sensors
            .get(id)
            .map(|s| s.clone())
            .ok_or_else(|| HubError::NotFound(id.clone()))
    }

    pub fn state(&self, id: &SensorId) -> SensorState {
        if self.sensors.contains_key(id) {
            SensorState::Active
        } else if self.retired.contains_key(id) {
            SensorState::Stopped
        } else {
            SensorState::Unregistered
        }
    }

    pub fn len(&self) -> usize {
        self.sensors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sensors.is_empty()
    }

    /// Stop every reporting task and retire all identities.
    pub async fn shutdown(&self) -> usize {
        let mut tasks = self.tasks.lock().await;
        let drained: Vec<(SensorId, ReportingTask)> = tasks.drain().collect();
        let count = drained.len();

        let (ids, stopping): (Vec<SensorId>, Vec<ReportingTask>) = drained.into_iter().unzip();
        futures::future::join_all(stopping.into_iter().map(ReportingTask::stop)).await;

        let now = Utc::now();
        for id in ids {
            self.retired.insert(id.clone(), now);
            self.sensors.remove(&id);
        }

        if count > 0 {
            info!(sensor_count = count, "Stopped all reporting tasks");
        }
        count
    }
}
