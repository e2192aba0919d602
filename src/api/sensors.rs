use crate::aggregation::WindowSummary;
use crate::error::HubError;
use crate::hub::{render_sensor_list, HubCoordinator, NoDataReason, Report};
use crate::measurement::{Measurement, Window};
use crate::sensor::{Location, SensorId, SensorInfo, SensorState};
use axum::{
    extract::{
        rejection::{JsonRejection, QueryRejection},
        Path, Query, State,
    },
    http::StatusCode,
    response::{IntoResponse, Json, Response},
    routing::{get, post, put},
    Router,
};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;
use tracing::warn;

/// Shared state for the sensor API
pub struct HubAppState {
    pub hub: Arc<HubCoordinator>,
}

/// Request body for `POST /api/sensors`
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct AddSensorRequest {
    /// Reporting interval; configured default when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub interval_ms: Option<i64>,
    /// Latitude and longitude must be given together; random placement otherwise
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub latitude: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub longitude: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct AddSensorResponse {
    pub sensor_id: SensorId,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorListResponse {
    pub sensors: Vec<SensorId>,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SensorStatusResponse {
    pub state: SensorState,
    #[serde(flatten)]
    pub info: SensorInfo,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RecordMeasurementRequest {
    pub temperature: i32,
    pub humidity: i32,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IntervalRequest {
    pub interval_ms: i64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct RescheduleAllResponse {
    pub rescheduled: usize,
}

#[derive(Deserialize)]
pub struct TrendParams {
    /// `hour` or `day` (default: hour)
    pub window: Option<String>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    Ok,
    NoData,
}

/// Wire form of a soft read result
#[derive(Debug, Serialize, Deserialize)]
pub struct ReportResponse<T> {
    pub status: ReportStatus,
    pub sensor_id: SensorId,
    /// Human-readable rendering of the result
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<NoDataReason>,
}

impl<T> From<Report<T>> for ReportResponse<T>
where
    Report<T>: fmt::Display,
{
    fn from(report: Report<T>) -> Self {
        let message = report.to_string();
        match report {
            Report::Found { sensor_id, value } => Self {
                status: ReportStatus::Ok,
                sensor_id,
                message,
                data: Some(value),
                reason: None,
            },
            Report::NoData { sensor_id, reason } => Self {
                status: ReportStatus::NoData,
                sensor_id,
                message,
                data: None,
                reason: Some(reason),
            },
        }
    }
}

impl<T> ReportResponse<T> {
    pub fn into_report(self) -> Report<T> {
        match (self.status, self.data) {
            (ReportStatus::Ok, Some(value)) => Report::found(&self.sensor_id, value),
            _ => Report::no_data(
                &self.sensor_id,
                self.reason.unwrap_or(NoDataReason::UnknownSensor),
            ),
        }
    }
}

/// Error body for hard failures
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub kind: String,
}

/// Create sensor API router
pub fn create_sensor_router(state: Arc<HubAppState>) -> Router {
    Router::new()
        .route("/api/sensors", get(list_sensors).post(add_sensor))
        .route("/api/sensors/:id", get(get_sensor).delete(remove_sensor))
        .route("/api/sensors/:id/interval", put(reschedule_sensor))
        .route("/api/sensors/:id/measurements", post(record_measurement))
        .route("/api/sensors/:id/measurements/latest", get(last_measurement))
        .route("/api/sensors/:id/trends", get(trends_and_averages))
        .route("/api/schedule", put(reschedule_all))
        .with_state(state)
}

/// POST /api/sensors - Register a sensor
async fn add_sensor(
    State(state): State<Arc<HubAppState>>,
    payload: Result<Json<AddSensorRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<AddSensorResponse>), ApiError> {
    let Json(req) = payload?;
    let location = match (req.latitude, req.longitude) {
        (Some(latitude), Some(longitude)) => Some(Location::new(latitude, longitude)?),
        (None, None) => None,
        _ => {
            return Err(ApiError::BadRequest(
                "latitude and longitude must be given together".to_string(),
            ))
        }
    };

    let sensor_id = state.hub.add_sensor(location, req.interval_ms).await?;
    Ok((StatusCode::CREATED, Json(AddSensorResponse { sensor_id })))
}

/// DELETE /api/sensors/:id - Stop and remove a sensor
async fn remove_sensor(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
) -> Result<StatusCode, ApiError> {
    state.hub.remove_sensor(&SensorId::from(id)).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/sensors - Registered identities, sorted
async fn list_sensors(State(state): State<Arc<HubAppState>>) -> Json<SensorListResponse> {
    let sensors = state.hub.list_sensors();
    let message = render_sensor_list(&sensors);
    Json(SensorListResponse { sensors, message })
}

/// GET /api/sensors/:id - Registry entry of an active sensor
async fn get_sensor(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
) -> Result<Json<SensorStatusResponse>, ApiError> {
    let id = SensorId::from(id);
    let info = state.hub.sensor_info(&id)?;
    Ok(Json(SensorStatusResponse {
        state: state.hub.sensor_state(&id),
        info,
    }))
}

/// POST /api/sensors/:id/measurements - Agent push
async fn record_measurement(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
    payload: Result<Json<RecordMeasurementRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<Measurement>), ApiError> {
    let Json(req) = payload?;
    let measurement =
        state
            .hub
            .record_measurement(&SensorId::from(id), req.temperature, req.humidity)?;
    Ok((StatusCode::ACCEPTED, Json(measurement)))
}

/// GET /api/sensors/:id/measurements/latest
async fn last_measurement(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
) -> Json<ReportResponse<Measurement>> {
    Json(state.hub.last_measurement(&SensorId::from(id)).into())
}

/// GET /api/sensors/:id/trends?window=hour|day
async fn trends_and_averages(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
    params: Result<Query<TrendParams>, QueryRejection>,
) -> Result<Json<ReportResponse<WindowSummary>>, ApiError> {
    let Query(params) = params?;
    let window = match params.window {
        Some(w) => w
            .parse::<Window>()
            .map_err(|e| ApiError::BadRequest(e.to_string()))?,
        None => Window::Hour,
    };

    Ok(Json(
        state
            .hub
            .trends_and_averages(&SensorId::from(id), window)
            .into(),
    ))
}

/// PUT /api/sensors/:id/interval
async fn reschedule_sensor(
    State(state): State<Arc<HubAppState>>,
    Path(id): Path<String>,
    payload: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<StatusCode, ApiError> {
    let Json(req) = payload?;
    state
        .hub
        .reschedule_sensor(&SensorId::from(id), req.interval_ms)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// PUT /api/schedule - Reschedule every registered sensor
async fn reschedule_all(
    State(state): State<Arc<HubAppState>>,
    payload: Result<Json<IntervalRequest>, JsonRejection>,
) -> Result<Json<RescheduleAllResponse>, ApiError> {
    let Json(req) = payload?;
    let rescheduled = state.hub.reschedule_all_sensors(req.interval_ms).await?;
    Ok(Json(RescheduleAllResponse { rescheduled }))
}

/// API error types
#[derive(Debug)]
pub enum ApiError {
    Hub(HubError),
    BadRequest(String),
}

impl From<HubError> for ApiError {
    fn from(e: HubError) -> Self {
        ApiError::Hub(e)
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        ApiError::BadRequest(rejection.body_text())
    }
}

/// Stable `kind` tag for a hard error on the wire
pub fn error_kind(e: &HubError) -> &'static str {
    match e {
        HubError::NotFound(_) => "not_found",
        HubError::InvalidInterval(_) => "invalid_interval",
        HubError::InvalidLocation { .. } => "invalid_location",
        HubError::InvalidIdentity(_) => "invalid_identity",
        HubError::StorageUnavailable(_) => "storage_unavailable",
        HubError::TransportFailure(_) => "transport_failure",
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, kind, error) = match self {
            ApiError::Hub(e) => {
                let status = match &e {
                    HubError::NotFound(_) => StatusCode::NOT_FOUND,
                    HubError::InvalidInterval(_)
                    | HubError::InvalidLocation { .. }
                    | HubError::InvalidIdentity(_) => StatusCode::BAD_REQUEST,
                    HubError::StorageUnavailable(_) => {
                        warn!(error = %e, "Storage failure surfaced to caller");
                        StatusCode::SERVICE_UNAVAILABLE
                    }
                    HubError::TransportFailure(_) => StatusCode::BAD_GATEWAY,
                };
                (status, error_kind(&e), e.to_string())
            }
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "bad_request", msg),
        };

        let body = Json(ErrorResponse {
            error,
            kind: kind.to_string(),
        });

        (status, body).into_response()
    }
}
