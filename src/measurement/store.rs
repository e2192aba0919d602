//! Append-only per-sensor measurement log.
//!
//! One text file per sensor identity, one line per measurement. Appends are
//! synced to disk before returning. Each sensor has its own lock, so writers
//! for different sensors never contend and readers never see a torn line.

use super::{Measurement, Window};
use crate::config::StorageConfig;
use crate::error::{HubError, HubResult};
use crate::sensor::SensorId;
use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashmap::DashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufRead, BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};
use tracing::{error, warn};

pub struct MeasurementLog {
    directory: PathBuf,
    file_suffix: String,
    /// Per-sensor read/write locks, created lazily
    locks: DashMap<SensorId, Arc<RwLock<()>>>,
}

impl MeasurementLog {
    /// Open (creating if needed) the log directory
    pub fn open(config: &StorageConfig) -> Result<Self> {
        fs::create_dir_all(&config.directory).with_context(|| {
            format!(
                "Failed to create measurement directory {}",
                config.directory.display()
            )
        })?;

        Ok(Self {
            directory: config.directory.clone(),
            file_suffix: config.file_suffix.clone(),
            locks: DashMap::new(),
        })
    }

    pub fn directory(&self) -> &Path {
        &self.directory
    }

    /// File backing `sensor_id`'s log
    pub fn path_for(&self, sensor_id: &SensorId) -> HubResult<PathBuf> {
        let id = sensor_id.as_str();
        let valid = !id.is_empty()
            && id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if !valid {
            return Err(HubError::InvalidIdentity(id.to_string()));
        }
        Ok(self
            .directory
            .join(format!("{}{}", id, self.file_suffix)))
    }

    pub(crate) fn lock_for(&self, sensor_id: &SensorId) -> Arc<RwLock<()>> {
        self.locks
            .entry(sensor_id.clone())
            .or_insert_with(|| Arc::new(RwLock::new(())))
            .clone()
    }

    /// Append one measurement and sync it to storage.
    ///
    /// Accepts any well-formed identity, registered or not.
    pub fn append(
        &self,
        sensor_id: &SensorId,
        temperature: i32,
        humidity: i32,
        timestamp: DateTime<Utc>,
    ) -> HubResult<Measurement> {
        let path = self.path_for(sensor_id)?;
        let measurement = Measurement::new(timestamp, temperature, humidity);
        let line = format!("{}\n", measurement.to_line());

        let lock = self.lock_for(sensor_id);
        let _guard = lock.write().unwrap_or_else(|e| e.into_inner());

        write_synced(&path, line.as_bytes()).map_err(|e| {
            error!(
                sensor_id = %sensor_id,
                path = %path.display(),
                error = %e,
                "Failed to append measurement"
            );
            HubError::StorageUnavailable(format!("{:#}", e))
        })?;

        Ok(measurement)
    }

    /// All measurements for `sensor_id` in append order. Absent log reads as empty.
    pub fn read_all(&self, sensor_id: &SensorId) -> HubResult<Vec<Measurement>> {
        let path = match self.path_for(sensor_id) {
            Ok(p) => p,
            // No file can exist under an unusable name
            Err(_) => return Ok(Vec::new()),
        };

        let lock = self.lock_for(sensor_id);
        let _guard = lock.read().unwrap_or_else(|e| e.into_inner());

        read_lines(&path).map_err(|e| {
            error!(
                sensor_id = %sensor_id,
                path = %path.display(),
                error = %e,
                "Failed to read measurement log"
            );
            HubError::StorageUnavailable(format!("{:#}", e))
        })
    }

    /// Most recently appended measurement, or None when nothing was recorded
    pub fn latest(&self, sensor_id: &SensorId) -> HubResult<Option<Measurement>> {
        Ok(self.read_all(sensor_id)?.pop())
    }

    /// Measurements inside `window` relative to the current wall clock
    pub fn window(&self, sensor_id: &SensorId, window: Window) -> HubResult<Vec<Measurement>> {
        self.window_at(sensor_id, window, Utc::now())
    }

    /// Measurements inside `window` relative to `now`, in append order
    pub fn window_at(
        &self,
        sensor_id: &SensorId,
        window: Window,
        now: DateTime<Utc>,
    ) -> HubResult<Vec<Measurement>> {
        Ok(self
            .read_all(sensor_id)?
            .into_iter()
            .filter(|m| window.contains(m.timestamp, now))
            .collect())
    }
}

fn write_synced(path: &Path, bytes: &[u8]) -> Result<()> {
    let mut file = OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
        .with_context(|| format!("Failed to open {}", path.display()))?;
    file.write_all(bytes).context("Failed to write measurement")?;
    file.sync_data().context("Failed to sync measurement log")?;
    Ok(())
}

fn read_lines(path: &Path) -> Result<Vec<Measurement>> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => {
            return Err(e).with_context(|| format!("Failed to open {}", path.display()));
        }
    };

    let mut measurements = Vec::new();
    for (index, line) in BufReader::new(file).lines().enumerate() {
        let line = line.context("Failed to read line")?;
        if line.trim().is_empty() {
            continue;
        }
        match Measurement::parse_line(&line) {
            Some(m) => measurements.push(m),
            None => warn!(
                path = %path.display(),
                line = index + 1,
                "Skipping malformed measurement line"
            ),
        }
    }

    Ok(measurements)
}
