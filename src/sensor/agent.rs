//! Per-sensor reporting task.
//!
//! Each registered sensor owns one task that samples a reading on a fixed
//! interval and pushes it to the hub's ingestion channel. A task is never
//! reconfigured in place: rescheduling stops it and spawns a replacement.

use super::{Reading, SensorId};
use crate::config::SensorDefaults;
use rand::Rng;
use std::ops::RangeInclusive;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info, warn};

/// Value ranges sampled by simulated agents
#[derive(Clone, Debug)]
pub struct ReadingRange {
    pub temperature: RangeInclusive<i32>,
    pub humidity: RangeInclusive<i32>,
}

impl ReadingRange {
    /// Draw one (temperature, humidity) pair
    pub fn sample(&self) -> (i32, i32) {
        let mut rng = rand::thread_rng();
        (
            rng.gen_range(self.temperature.clone()),
            rng.gen_range(self.humidity.clone()),
        )
    }
}

impl Default for ReadingRange {
    fn default() -> Self {
        Self::from(&SensorDefaults::default())
    }
}

impl From<&SensorDefaults> for ReadingRange {
    fn from(defaults: &SensorDefaults) -> Self {
        let [t_lo, t_hi] = defaults.temperature_range;
        let [h_lo, h_hi] = defaults.humidity_range;
        Self {
            temperature: t_lo.min(t_hi)..=t_lo.max(t_hi),
            humidity: h_lo.min(h_hi)..=h_lo.max(h_hi),
        }
    }
}

/// Handle to a running periodic reporting task
pub struct ReportingTask {
    interval_ms: u64,
    handle: JoinHandle<()>,
}

impl ReportingTask {
    /// Spawn the reporting loop. The first reading is sent immediately, then one
    /// every `interval_ms`.
    pub fn spawn(
        sensor_id: SensorId,
        interval_ms: u64,
        range: ReadingRange,
        sink: mpsc::Sender<Reading>,
    ) -> Self {
        let period = Duration::from_millis(interval_ms.max(1));

        let handle = tokio::spawn(async move {
            info!(
                sensor_id = %sensor_id,
                interval_ms = interval_ms,
                "Starting reporting task"
            );

            let mut ticker = interval(period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;

                let (temperature, humidity) = range.sample();
                let reading = Reading {
                    sensor_id: sensor_id.clone(),
                    temperature,
                    humidity,
                };

                if sink.send(reading).await.is_err() {
                    debug!(sensor_id = %sensor_id, "Ingestion channel closed, stopping reporting task");
                    break;
                }
            }
        });

        Self {
            interval_ms,
            handle,
        }
    }

    pub fn interval_ms(&self) -> u64 {
        self.interval_ms
    }

    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }

    /// Cancel the task and wait until it can no longer fire.
    pub async fn stop(self) {
        self.handle.abort();
        match self.handle.await {
            Ok(()) => {}
            Err(e) if e.is_cancelled() => {}
            Err(e) => warn!(error = %e, "Reporting task terminated abnormally"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::{sleep, timeout};

    fn fixed_range() -> ReadingRange {
        ReadingRange {
            temperature: 25..=25,
            humidity: 50..=50,
        }
    }

    #[test]
    fn test_sample_stays_within_range() {
        let range = ReadingRange::default();
        for _ in 0..200 {
            let (t, h) = range.sample();
            assert!((20..=30).contains(&t));
            assert!((40..=60).contains(&h));
        }
    }

    #[test]
    fn test_range_from_reversed_bounds() {
        let defaults = SensorDefaults {
            default_interval_ms: 1000,
            temperature_range: [30, 20],
            humidity_range: [60, 40],
        };
        let range = ReadingRange::from(&defaults);
        assert_eq!(range.temperature, 20..=30);
        assert_eq!(range.humidity, 40..=60);
    }

    #[tokio::test]
    async fn test_first_reading_is_immediate() {
        let (tx, mut rx) = mpsc::channel(8);
        let task = ReportingTask::spawn(SensorId::from("s1"), 60_000, fixed_range(), tx);

        let reading = timeout(Duration::from_millis(500), rx.recv())
            .await
            .expect("first tick should fire immediately")
            .unwrap();
        assert_eq!(reading.sensor_id, SensorId::from("s1"));
        assert_eq!(reading.temperature, 25);
        assert_eq!(reading.humidity, 50);

        task.stop().await;
    }

    #[tokio::test]
    async fn test_stop_prevents_further_readings() {
        let (tx, mut rx) = mpsc::channel(64);
        let task = ReportingTask::spawn(SensorId::from("s2"), 10, fixed_range(), tx);

        sleep(Duration::from_millis(50)).await;
        task.stop().await;

        // Drain whatever was sent before cancellation
        while rx.try_recv().is_ok() {}

        sleep(Duration::from_millis(50)).await;
        // Sender was dropped with the task, so the channel is closed and empty
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_task_exits_when_channel_closes() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let task = ReportingTask::spawn(SensorId::from("s3"), 10, fixed_range(), tx);

        sleep(Duration::from_millis(50)).await;
        assert!(task.is_finished());
        assert_eq!(task.interval_ms(), 10);
        task.stop().await;
    }
}
