use crate::sensor::SensorId;
use std::fmt;

/// Hard failures of hub operations.
///
/// Read paths never return these for missing data; see [`crate::hub::Report`].
#[derive(Debug, Clone, PartialEq)]
pub enum HubError {
    /// Lifecycle operation referenced a sensor that is not registered
    NotFound(SensorId),
    /// Reporting interval must be strictly positive (milliseconds)
    InvalidInterval(i64),
    /// Explicit coordinates outside latitude [-90, 90] / longitude [-180, 180]
    InvalidLocation { latitude: f64, longitude: f64 },
    /// Identity cannot name a log file ([A-Za-z0-9_-] only)
    InvalidIdentity(String),
    /// Measurement log could not be written or read
    StorageUnavailable(String),
    /// Remote call to the hub failed before a response was decoded
    TransportFailure(String),
}

impl fmt::Display for HubError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HubError::NotFound(id) => write!(f, "sensor {} not found", id),
            HubError::InvalidInterval(ms) => {
                write!(f, "interval must be positive, got {} ms", ms)
            }
            HubError::InvalidLocation {
                latitude,
                longitude,
            } => write!(
                f,
                "invalid location ({}, {}): latitude must be in [-90, 90] and longitude in [-180, 180]",
                latitude, longitude
            ),
            HubError::InvalidIdentity(id) => write!(f, "invalid sensor identity '{}'", id),
            HubError::StorageUnavailable(msg) => write!(f, "storage unavailable: {}", msg),
            HubError::TransportFailure(msg) => write!(f, "transport failure: {}", msg),
        }
    }
}

impl std::error::Error for HubError {}

pub type HubResult<T> = std::result::Result<T, HubError>;
