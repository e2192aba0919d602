// Windowed averages and two-point trend classification

use crate::error::HubResult;
use crate::measurement::{Measurement, MeasurementLog, Window};
use crate::sensor::SensorId;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Arc;


/// Direction of the last step of a series
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
    Stable,
    Insufficient,
}

impl fmt::Display for Trend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Trend::Up => "rising",
            Trend::Down => "falling",
            Trend::Stable => "stable",
            Trend::Insufficient => "not enough data to determine a trend",
        };
        f.write_str(label)
    }
}

/// Classify a series by comparing only its last two elements.
pub fn trend(series: &[i32]) -> Trend {
    match series {
        [.., previous, last] if last > previous => Trend::Up,
        [.., previous, last] if last < previous => Trend::Down,
        [.., _, _] => Trend::Stable,
        _ => Trend::Insufficient,
    }
}

fn mean(series: &[i32]) -> f64 {
    series.iter().map(|&v| v as f64).sum::<f64>() / series.len() as f64
}

/// Averages and trends over one window of a sensor's log
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct WindowSummary {
    pub window: Window,
    pub sample_count: usize,
    pub avg_temperature: f64,
    pub avg_humidity: f64,
    pub trend_temperature: Trend,
    pub trend_humidity: Trend,
}

impl WindowSummary {
    /// Summarize `measurements` (append order). None when empty.
    pub fn from_measurements(window: Window, measurements: &[Measurement]) -> Option<Self> {
        if measurements.is_empty() {
            return None;
        }

        let temperatures: Vec<i32> = measurements.iter().map(|m| m.temperature).collect();
        let humidities: Vec<i32> = measurements.iter().map(|m| m.humidity).collect();

        Some(Self {
            window,
            sample_count: measurements.len(),
            avg_temperature: mean(&temperatures),
            avg_humidity: mean(&humidities),
            trend_temperature: trend(&temperatures),
            trend_humidity: trend(&humidities),
        })
    }
}

impl fmt::Display for WindowSummary {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "Averages over the last {window} ({count} samples):\n\
             - Temperature: {t:.2}\n\
             - Humidity: {h:.2}\n\
             Trends over the last {window}:\n\
             - Temperature: {tt}\n\
             - Humidity: {ht}",
            window = self.window,
            count = self.sample_count,
            t = self.avg_temperature,
            h = self.avg_humidity,
            tt = self.trend_temperature,
            ht = self.trend_humidity,
        )
    }
}

/// Read-only aggregation over the measurement log
pub struct AggregationEngine {
    log: Arc<MeasurementLog>,
}

impl AggregationEngine {
    pub fn new(log: Arc<MeasurementLog>) -> Self {
        Self { log }
    }

    /// Averages and trends for `window` ending now. `Ok(None)` means no data.
    pub fn averages_and_trend(
        &self,
        sensor_id: &SensorId,
        window: Window,
    ) -> HubResult<Option<WindowSummary>> {
        self.averages_and_trend_at(sensor_id, window, Utc::now())
    }

    pub fn averages_and_trend_at(
        &self,
        sensor_id: &SensorId,
        window: Window,
        now: DateTime<Utc>,
    ) -> HubResult<Option<WindowSummary>> {
        let measurements = self.log.window_at(sensor_id, window, now)?;
        Ok(WindowSummary::from_measurements(window, &measurements))
    }
}
