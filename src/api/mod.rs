// HTTP transport: hub operations as an RPC-like JSON interface

pub mod client;
mod sensors;

pub use client::HubClient;
pub use sensors::{
    create_sensor_router, error_kind, AddSensorRequest, AddSensorResponse, ApiError,
    ErrorResponse, HubAppState, IntervalRequest, RecordMeasurementRequest, ReportResponse,
    ReportStatus, RescheduleAllResponse, SensorListResponse, SensorStatusResponse,
};

use crate::hub::HubCoordinator;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;

/// Full application router served by the hub binary
pub fn create_app(hub: Arc<HubCoordinator>) -> Router {
    let state = Arc::new(HubAppState { hub });
    create_sensor_router(state).layer(CorsLayer::permissive())
}
