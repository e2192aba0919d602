// Sensor identity, placement and reporting agents

mod agent;

pub use agent::{ReadingRange, ReportingTask};

use crate::error::{HubError, HubResult};
use chrono::{DateTime, Utc};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;


/// Opaque unique token naming one registered sensor
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    /// Fresh time-ordered identity (UUIDv7). Uniqueness against the registry is
    /// enforced by the caller.
    pub fn generate() -> Self {
        SensorId(Uuid::now_v7().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(s: &str) -> Self {
        SensorId(s.to_string())
    }
}

impl From<String> for SensorId {
    fn from(s: String) -> Self {
        SensorId(s)
    }
}

/// Geographic placement of a sensor
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Location {
    pub latitude: f64,
    pub longitude: f64,
}

impl Location {
    pub fn new(latitude: f64, longitude: f64) -> HubResult<Self> {
        if !(-90.0..=90.0).contains(&latitude) || !(-180.0..=180.0).contains(&longitude) {
            return Err(HubError::InvalidLocation {
                latitude,
                longitude,
            });
        }
        Ok(Self {
            latitude,
            longitude,
        })
    }

    /// Uniformly random placement within the valid coordinate ranges
    pub fn random() -> Self {
        let mut rng = rand::thread_rng();
        Self {
            latitude: rng.gen_range(-90.0..=90.0),
            longitude: rng.gen_range(-180.0..=180.0),
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// One reading pushed by an agent to the hub
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    pub sensor_id: SensorId,
    pub temperature: i32,
    pub humidity: i32,
}

/// Registry-visible description of a registered sensor
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SensorInfo {
    pub id: SensorId,
    pub location: Location,
    pub interval_ms: u64,
    pub registered_at: DateTime<Utc>,
    /// Last time the reporting task was replaced
    pub rescheduled_at: Option<DateTime<Utc>>,
}

/// Lifecycle of a sensor identity: Unregistered -> Active -> Stopped
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SensorState {
    Unregistered,
    Active,
    Stopped,
}

/// Validate a reporting interval and convert it to the unsigned form tasks use
pub fn validate_interval(interval_ms: i64) -> HubResult<u64> {
    if interval_ms <= 0 {
        return Err(HubError::InvalidInterval(interval_ms));
    }
    Ok(interval_ms as u64)
}
