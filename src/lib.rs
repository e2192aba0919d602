// Sensor identities, placement and reporting agents
pub mod sensor;

// Append-only per-sensor measurement log
pub mod measurement;

// Windowed averages and trends
pub mod aggregation;

// Live sensor set and reporting task lifecycle
pub mod registry;

// Coordinator façade over registry, log and aggregation
pub mod hub;

// HTTP transport and remote client
pub mod api;

pub mod config;
pub mod error;

pub use error::{HubError, HubResult};
pub use hub::{HubCoordinator, NoDataReason, Report};
