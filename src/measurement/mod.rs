// Timestamped readings and their persisted line format

mod store;

pub use store::MeasurementLog;

use chrono::{DateTime, Duration, NaiveDateTime, SubsecRound, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;


/// Persisted timestamp layout: `2024-03-15 14:02:11`
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One immutable reading as stored in a sensor's log
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Measurement {
    pub timestamp: DateTime<Utc>,
    pub temperature: i32,
    pub humidity: i32,
}

impl Measurement {
    /// Build a measurement at the log's one-second resolution
    pub fn new(timestamp: DateTime<Utc>, temperature: i32, humidity: i32) -> Self {
        Self {
            timestamp: timestamp.trunc_subsecs(0),
            temperature,
            humidity,
        }
    }

    /// Encode as `<date> <time> <temperature> <humidity>` (no newline)
    pub fn to_line(&self) -> String {
        format!(
            "{} {} {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.temperature,
            self.humidity
        )
    }

    /// Decode one persisted line. Returns None for malformed input.
    pub fn parse_line(line: &str) -> Option<Self> {
        let mut fields = line.split_whitespace();
        let date = fields.next()?;
        let time = fields.next()?;
        let temperature = fields.next()?.parse::<i32>().ok()?;
        let humidity = fields.next()?.parse::<i32>().ok()?;
        if fields.next().is_some() {
            return None;
        }

        let naive =
            NaiveDateTime::parse_from_str(&format!("{} {}", date, time), TIMESTAMP_FORMAT).ok()?;

        Some(Self {
            timestamp: naive.and_utc(),
            temperature,
            humidity,
        })
    }
}

impl fmt::Display for Measurement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}: temperature = {}, humidity = {}",
            self.timestamp.format(TIMESTAMP_FORMAT),
            self.temperature,
            self.humidity
        )
    }
}

/// Trailing interval bounding an aggregation query
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Window {
    Hour,
    Day,
}

impl Window {
    pub fn duration(&self) -> Duration {
        match self {
            Window::Hour => Duration::hours(1),
            Window::Day => Duration::days(1),
        }
    }

    /// True if `timestamp` falls in `[now - duration, now]`
    pub fn contains(&self, timestamp: DateTime<Utc>, now: DateTime<Utc>) -> bool {
        timestamp >= now - self.duration() && timestamp <= now
    }

    pub fn label(&self) -> &'static str {
        match self {
            Window::Hour => "hour",
            Window::Day => "day",
        }
    }
}

impl fmt::Display for Window {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct UnknownWindow(pub String);

impl fmt::Display for UnknownWindow {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown window '{}' (expected 'hour' or 'day')", self.0)
    }
}

impl std::error::Error for UnknownWindow {}

impl FromStr for Window {
    type Err = UnknownWindow;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "hour" | "last-hour" => Ok(Window::Hour),
            "day" | "last-day" => Ok(Window::Day),
            _ => Err(UnknownWindow(s.to_string())),
        }
    }
}
