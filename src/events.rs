//! Progress event types and callback interface.
//!
//! The engine reports every state transition, every measurement and
//! every discarded probe through a [`ProgressCallback`]. The terminal
//! `Finished`/`Failed` event is how a finished run is handed to whatever
//! delivers results onwards (console, webhooks, chat integrations).

use crate::measurements::LatencyResult;
use crate::results::{EndpointMetadata, TestResult};
use std::fmt;
use std::net::IpAddr;

/// States of a single speed test run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TestPhase {
    /// Nothing has happened yet
    Idle,
    /// Looking up the local address of the configured interface
    ResolvingInterface,
    /// Fetching endpoint metadata (runs alongside latency probing)
    ResolvingEndpoint,
    /// Running latency probes
    ProbingLatency,
    /// Running download tiers
    ProbingDownload,
    /// Running upload tiers
    ProbingUpload,
    /// Building the final result
    Reporting,
    /// The run produced a result
    Success,
    /// The run failed
    Failed,
}

impl fmt::Display for TestPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            TestPhase::Idle => "idle",
            TestPhase::ResolvingInterface => "resolving interface",
            TestPhase::ResolvingEndpoint => "resolving endpoint",
            TestPhase::ProbingLatency => "latency",
            TestPhase::ProbingDownload => "download",
            TestPhase::ProbingUpload => "upload",
            TestPhase::Reporting => "reporting",
            TestPhase::Success => "success",
            TestPhase::Failed => "failed",
        };

        f.write_str(name)
    }
}

/// Direction of bandwidth measurement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BandwidthDirection {
    /// Download test
    Download,
    /// Upload test
    Upload,
}

impl BandwidthDirection {
    pub fn phase(&self) -> TestPhase {
        match self {
            BandwidthDirection::Download => TestPhase::ProbingDownload,
            BandwidthDirection::Upload => TestPhase::ProbingUpload,
        }
    }
}

impl fmt::Display for BandwidthDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BandwidthDirection::Download => f.write_str("download"),
            BandwidthDirection::Upload => f.write_str("upload"),
        }
    }
}

/// Progress events emitted during test execution.
#[derive(Debug, Clone)]
pub enum ProgressEvent {
    /// Test phase has changed
    PhaseChange(TestPhase),
    /// The interface name resolved to a local binding
    InterfaceResolved {
        name: String,
        /// `None` when the operating system picks the route
        address: Option<IpAddr>,
    },
    /// Endpoint metadata is available
    EndpointResolved(EndpointMetadata),
    /// Latency measurement completed
    LatencyMeasurement {
        /// Measured round trip in milliseconds
        value_ms: f64,
        /// Current probe number (1-indexed)
        current: usize,
        /// Total number of probes
        total: usize,
    },
    /// All latency probes finished and were aggregated
    LatencyComplete(LatencyResult),
    /// Bandwidth measurement completed
    BandwidthMeasurement {
        /// Direction of the measurement
        direction: BandwidthDirection,
        /// Measured speed in Mbps
        speed_mbps: f64,
        /// Number of bytes transferred
        bytes: u64,
        /// Current iteration within the tier (1-indexed)
        current: usize,
        /// Iterations in the tier
        total: usize,
    },
    /// All tiers of one direction finished and were aggregated
    BandwidthComplete {
        direction: BandwidthDirection,
        speed_mbps: f64,
    },
    /// A probe failed and its sample was discarded
    ProbeFailed { phase: TestPhase, message: String },
    /// The run finished with a result
    Finished(TestResult),
    /// The run failed with the given message
    Failed(String),
}

/// Callback interface for progress updates.
///
/// Implementations must be non-blocking to avoid affecting
/// measurement accuracy.
pub trait ProgressCallback: Send + Sync {
    /// Called when a progress event occurs.
    fn on_progress(&self, event: ProgressEvent);
}

/// Callback that drops every event.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoProgress;

impl ProgressCallback for NoProgress {
    fn on_progress(&self, _event: ProgressEvent) {}
}
