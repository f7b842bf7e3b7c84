use crate::errors::SpeedTestError;
use crate::stats::{average, jitter, max, median, min};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Convert a payload size and the time spent transferring it into
/// megabits per second.
pub fn measure_speed(bytes: u64, elapsed_ms: f64) -> f64 {
    (bytes as f64 * 8.0) / (elapsed_ms / 1000.0) / 1_000_000.0
}

/// Like [`measure_speed`], but yields `None` when the elapsed time cannot
/// produce a finite rate.
pub fn speed_from_duration(bytes: u64, elapsed: Duration) -> Option<f64> {
    let elapsed_ms = elapsed.as_secs_f64() * 1000.0;
    if elapsed_ms <= 0.0 {
        return None;
    }

    let mbps = measure_speed(bytes, elapsed_ms);
    mbps.is_finite().then_some(mbps)
}

/// Extract the processing duration in milliseconds from a `Server-Timing`
/// header value such as `cfRequestDuration;dur=12.345`.
///
/// Negative or unparsable durations are treated as absent.
pub fn parse_server_timing(header: &str) -> Option<f64> {
    header
        .split([',', ';'])
        .filter_map(|param| param.trim().split_once('='))
        .find(|(key, _)| key.trim().eq_ignore_ascii_case("dur"))
        .and_then(|(_, value)| value.trim().trim_matches('"').parse::<f64>().ok())
        .filter(|ms| ms.is_finite() && *ms >= 0.0)
}

/// Format a rate with two decimals, the way results are reported.
pub fn format_mbps(mbps: f64) -> String {
    format!("{:.2}", mbps)
}

/// Aggregate of one latency phase, all values in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LatencyResult {
    pub min_ms: f64,
    pub max_ms: f64,
    pub average_ms: f64,
    pub median_ms: f64,
    pub jitter_ms: f64,
    /// Number of probes that contributed a sample
    pub samples: usize,
}

impl LatencyResult {
    /// Reduce round-trip samples, in the order they were measured.
    pub fn from_samples(samples: &[f64]) -> Result<Self, SpeedTestError> {
        let jitter_ms = jitter(samples)?;
        let mut sorted = samples.to_vec();

        Ok(Self {
            min_ms: min(samples)?,
            max_ms: max(samples)?,
            average_ms: average(samples)?,
            median_ms: median(&mut sorted)?,
            jitter_ms,
            samples: samples.len(),
        })
    }

    /// Median latency rounded to whole milliseconds.
    pub fn ping(&self) -> i64 {
        self.median_ms.round() as i64
    }
}
