use crate::aggregation::WindowSummary;
use crate::measurement::{Measurement, Window};
use crate::sensor::SensorId;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Why a read produced nothing
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", content = "detail", rename_all = "snake_case")]
pub enum NoDataReason {
    /// Identity never registered and nothing logged under it
    UnknownSensor,
    /// Sensor exists but has not recorded anything
    EmptyLog,
    /// Nothing recorded inside the window
    EmptyWindow(Window),
    /// Log could not be read
    StorageUnavailable(String),
}

/// Soft result of a read: data, or an explanation of its absence
#[derive(Clone, Debug, PartialEq)]
pub enum Report<T> {
    Found { sensor_id: SensorId, value: T },
    NoData { sensor_id: SensorId, reason: NoDataReason },
}

impl<T> Report<T> {
    pub fn found(sensor_id: &SensorId, value: T) -> Self {
        Report::Found {
            sensor_id: sensor_id.clone(),
            value,
        }
    }

    pub fn no_data(sensor_id: &SensorId, reason: NoDataReason) -> Self {
        Report::NoData {
            sensor_id: sensor_id.clone(),
            reason,
        }
    }

    pub fn sensor_id(&self) -> &SensorId {
        match self {
            Report::Found { sensor_id, .. } | Report::NoData { sensor_id, .. } => sensor_id,
        }
    }

    pub fn value(&self) -> Option<&T> {
        match self {
            Report::Found { value, .. } => Some(value),
            Report::NoData { .. } => None,
        }
    }

    pub fn into_value(self) -> Option<T> {
        match self {
            Report::Found { value, .. } => Some(value),
            Report::NoData { .. } => None,
        }
    }

    pub fn reason(&self) -> Option<&NoDataReason> {
        match self {
            Report::Found { .. } => None,
            Report::NoData { reason, .. } => Some(reason),
        }
    }

    pub fn is_found(&self) -> bool {
        matches!(self, Report::Found { .. })
    }
}

fn write_no_data(f: &mut fmt::Formatter<'_>, id: &SensorId, reason: &NoDataReason) -> fmt::Result {
    match reason {
        NoDataReason::UnknownSensor => {
            write!(f, "Sensor {} is not registered and has no recorded measurements.", id)
        }
        NoDataReason::EmptyLog => write!(f, "No measurements recorded for sensor {}.", id),
        NoDataReason::EmptyWindow(window) => write!(
            f,
            "No measurements available for sensor {} in the last {}.",
            id, window
        ),
        NoDataReason::StorageUnavailable(detail) => write!(
            f,
            "Measurements for sensor {} are unavailable: {}",
            id, detail
        ),
    }
}

impl fmt::Display for Report<Measurement> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Found { sensor_id, value } => {
                write!(f, "Last measurement for sensor {}:\n{}", sensor_id, value)
            }
            Report::NoData { sensor_id, reason } => write_no_data(f, sensor_id, reason),
        }
    }
}

impl fmt::Display for Report<WindowSummary> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Report::Found { sensor_id, value } => {
                write!(f, "Sensor {}\n{}", sensor_id, value)
            }
            Report::NoData { sensor_id, reason } => write_no_data(f, sensor_id, reason),
        }
    }
}

/// Human-readable sensor listing
pub fn render_sensor_list(ids: &[SensorId]) -> String {
    if ids.is_empty() {
        return "No sensors registered.".to_string();
    }
    let mut text = String::from("Registered sensors:");
    for id in ids {
        text.push_str("\n- Sensor ");
        text.push_str(id.as_str());
    }
    text
}
