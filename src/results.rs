//! Result data structures for speed test output.
//!
//! [`TestResult`] is the contract handed to consumers: either the three
//! headline numbers or an error message, never both. [`SpeedTestReport`]
//! keeps everything that went into those numbers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::errors::SpeedTestError;
use crate::measurements::{format_mbps, LatencyResult};

/// Endpoint and client information from the trace lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointMetadata {
    /// Client IP address as seen by the endpoint
    pub ip: String,
    /// Client location code (e.g., "US", "ID")
    pub location: String,
    /// IATA code of the serving facility (e.g., "SFO", "CGK")
    pub colo: String,
}

/// Results for a single tier (one payload size).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TierMeasurement {
    /// Payload size in bytes
    pub bytes: u64,
    /// Iterations attempted
    pub iterations: usize,
    /// Iterations that produced a rate
    pub successful: usize,
    /// Median rate of the tier in Mbps, if any iteration succeeded
    #[serde(skip_serializing_if = "Option::is_none")]
    pub speed_mbps: Option<f64>,
}

/// Results for one direction (download or upload).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct BandwidthResults {
    /// Reported speed in Mbps (percentile over all tiers)
    pub speed_mbps: f64,
    /// Number of samples the speed was computed from
    pub samples: usize,
    /// Per-tier breakdown
    pub tiers: Vec<TierMeasurement>,
}

/// Complete results from a successful speed test run.
#[derive(Debug, Clone, Serialize)]
pub struct SpeedTestReport {
    /// Timestamp when the test was completed
    pub timestamp: DateTime<Utc>,
    /// Interface name the run was bound to
    pub interface: String,
    /// Endpoint metadata
    pub endpoint: EndpointMetadata,
    /// Latency aggregate
    pub latency: LatencyResult,
    /// Download bandwidth results
    pub download: BandwidthResults,
    /// Upload bandwidth results
    pub upload: BandwidthResults,
}

impl SpeedTestReport {
    pub fn new(
        interface: String,
        endpoint: EndpointMetadata,
        latency: LatencyResult,
        download: BandwidthResults,
        upload: BandwidthResults,
    ) -> Self {
        Self {
            timestamp: Utc::now(),
            interface,
            endpoint,
            latency,
            download,
            upload,
        }
    }

    /// Reduce the report to the consumer-facing result.
    pub fn to_result(&self) -> TestResult {
        TestResult::Finished {
            ping: self.latency.ping(),
            download: format_mbps(self.download.speed_mbps),
            upload: format_mbps(self.upload.speed_mbps),
        }
    }
}

/// Terminal outcome of one run.
///
/// Serializes to `{"ping": 14, "download": "93.41", "upload": "41.07"}`
/// or `{"error": "Invalid interface"}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TestResult {
    Finished { ping: i64, download: String, upload: String },
    Failed { error: String },
}

impl TestResult {
    pub fn failed(error: &SpeedTestError) -> Self {
        TestResult::Failed { error: error.message.clone() }
    }

    pub fn from_outcome(
        outcome: &Result<SpeedTestReport, SpeedTestError>,
    ) -> Self {
        match outcome {
            Ok(report) => report.to_result(),
            Err(error) => Self::failed(error),
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, TestResult::Finished { .. })
    }

    /// The error message of a failed run.
    pub fn error(&self) -> Option<&str> {
        match self {
            TestResult::Finished { .. } => None,
            TestResult::Failed { error } => Some(error),
        }
    }
}
