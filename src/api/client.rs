//! Remote client for the hub's HTTP transport.
//!
//! Mirrors the hub operation set. Failures to reach the hub or decode its
//! answer surface as [`HubError::TransportFailure`]; hard errors reported by
//! the hub are reconstructed from the `kind` tag of the error body.

use super::sensors::{
    AddSensorRequest, AddSensorResponse, ErrorResponse, IntervalRequest, RecordMeasurementRequest,
    ReportResponse, RescheduleAllResponse, SensorListResponse, SensorStatusResponse,
};
use crate::aggregation::WindowSummary;
use crate::error::{HubError, HubResult};
use crate::hub::Report;
use crate::measurement::{Measurement, Window};
use crate::sensor::{Location, SensorId};
use serde::de::DeserializeOwned;
use std::time::Duration;

/// What the caller asked for, used to rebuild typed hub errors
#[derive(Default)]
struct CallContext<'a> {
    sensor_id: Option<&'a SensorId>,
    interval_ms: Option<i64>,
    location: Option<Location>,
}

#[derive(Clone)]
pub struct HubClient {
    base_url: String,
    http: reqwest::Client,
}

impl HubClient {
    /// `base_url` e.g. "http://localhost:1099"
    pub fn new(base_url: impl Into<String>) -> HubResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| HubError::TransportFailure(e.to_string()))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            http,
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn add_sensor(
        &self,
        location: Option<Location>,
        interval_ms: Option<i64>,
    ) -> HubResult<SensorId> {
        let body = AddSensorRequest {
            interval_ms,
            latitude: location.map(|l| l.latitude),
            longitude: location.map(|l| l.longitude),
        };
        let request = self.http.post(self.url("/api/sensors")).json(&body);
        let ctx = CallContext {
            interval_ms,
            location,
            ..Default::default()
        };
        let resp: AddSensorResponse = self.send_json(request, ctx).await?;
        Ok(resp.sensor_id)
    }

    pub async fn remove_sensor(&self, id: &SensorId) -> HubResult<()> {
        let request = self.http.delete(self.url(&format!("/api/sensors/{}", id)));
        let ctx = CallContext {
            sensor_id: Some(id),
            ..Default::default()
        };
        self.send(request, ctx).await.map(|_| ())
    }

    pub async fn list_sensors(&self) -> HubResult<Vec<SensorId>> {
        let request = self.http.get(self.url("/api/sensors"));
        let resp: SensorListResponse = self.send_json(request, CallContext::default()).await?;
        Ok(resp.sensors)
    }

    pub async fn sensor_status(&self, id: &SensorId) -> HubResult<SensorStatusResponse> {
        let request = self.http.get(self.url(&format!("/api/sensors/{}", id)));
        let ctx = CallContext {
            sensor_id: Some(id),
            ..Default::default()
        };
        self.send_json(request, ctx).await
    }

    pub async fn record_measurement(
        &self,
        id: &SensorId,
        temperature: i32,
        humidity: i32,
    ) -> HubResult<Measurement> {
        let request = self
            .http
            .post(self.url(&format!("/api/sensors/{}/measurements", id)))
            .json(&RecordMeasurementRequest {
                temperature,
                humidity,
            });
        let ctx = CallContext {
            sensor_id: Some(id),
            ..Default::default()
        };
        self.send_json(request, ctx).await
    }

    pub async fn last_measurement(&self, id: &SensorId) -> HubResult<Report<Measurement>> {
        let request = self
            .http
            .get(self.url(&format!("/api/sensors/{}/measurements/latest", id)));
        let ctx = CallContext {
            sensor_id: Some(id),
            ..Default::default()
        };
        let resp: ReportResponse<Measurement> = self.send_json(request, ctx).await?;
        Ok(resp.into_report())
    }

    pub async fn trends_and_averages(
        &self,
        id: &SensorId,
        window: Window,
    ) -> HubResult<Report<WindowSummary>> {
        let request = self
            .http
            .get(self.url(&format!("/api/sensors/{}/trends", id)))
            .query(&[("window", window.label())]);
        let ctx = CallContext {
            sensor_id: Some(id),
            ..Default::default()
        };
        let resp: ReportResponse<WindowSummary> = self.send_json(request, ctx).await?;
        Ok(resp.into_report())
    }

    pub async fn reschedule_sensor(&self, id: &SensorId, interval_ms: i64) -> HubResult<()> {
        let request = self
            .http
            .put(self.url(&format!("/api/sensors/{}/interval", id)))
            .json(&IntervalRequest { interval_ms });
        let ctx = CallContext {
            sensor_id: Some(id),
            interval_ms: Some(interval_ms),
            ..Default::default()
        };
        self.send(request, ctx).await.map(|_| ())
    }

    pub async fn reschedule_all_sensors(&self, interval_ms: i64) -> HubResult<usize> {
        let request = self
            .http
            .put(self.url("/api/schedule"))
            .json(&IntervalRequest { interval_ms });
        let ctx = CallContext {
            interval_ms: Some(interval_ms),
            ..Default::default()
        };
        let resp: RescheduleAllResponse = self.send_json(request, ctx).await?;
        Ok(resp.rescheduled)
    }

    async fn send_json<T: DeserializeOwned>(
        &self,
        request: reqwest::RequestBuilder,
        ctx: CallContext<'_>,
    ) -> HubResult<T> {
        self.send(request, ctx)
            .await?
            .json::<T>()
            .await
            .map_err(|e| HubError::TransportFailure(format!("Failed to decode response: {}", e)))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
        ctx: CallContext<'_>,
    ) -> HubResult<reqwest::Response> {
        let response = request
            .send()
            .await
            .map_err(|e| HubError::TransportFailure(e.to_string()))?;

        if response.status().is_success() {
            return Ok(response);
        }

        let status = response.status();
        let body: ErrorResponse = response.json().await.map_err(|e| {
            HubError::TransportFailure(format!("Unexpected {} response: {}", status, e))
        })?;

        Err(rebuild_error(body, status, &ctx))
    }
}

fn rebuild_error(body: ErrorResponse, status: reqwest::StatusCode, ctx: &CallContext<'_>) -> HubError {
    match (body.kind.as_str(), ctx) {
        ("not_found", CallContext { sensor_id: Some(id), .. }) => HubError::NotFound((*id).clone()),
        ("invalid_interval", CallContext { interval_ms: Some(ms), .. }) => {
            HubError::InvalidInterval(*ms)
        }
        ("invalid_location", CallContext { location: Some(l), .. }) => HubError::InvalidLocation {
            latitude: l.latitude,
            longitude: l.longitude,
        },
        ("invalid_identity", CallContext { sensor_id: Some(id), .. }) => {
            HubError::InvalidIdentity(id.to_string())
        }
        ("storage_unavailable", _) => HubError::StorageUnavailable(body.error),
        _ => HubError::TransportFailure(format!("{}: {}", status, body.error)),
    }
}
