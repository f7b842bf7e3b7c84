use crate::errors::SpeedTestError;
use crate::events::{BandwidthDirection, ProgressCallback, ProgressEvent};
use crate::measurements::speed_from_duration;
use crate::results::EndpointMetadata;
use http::Method;
use log::{debug, warn};
use std::borrow::Cow;
use std::io::{Read, Write};
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;


pub(crate) const HTTPS_PORT: u16 = 443;

pub trait IoReadAndWrite: Read + Write + Send {}

impl<T: Read + Write + Send> IoReadAndWrite for T {}

/// One instrumented request: where to send it and what to send.
#[derive(Debug, Clone)]
pub struct ProbeRequest {
    pub host: String,
    pub port: u16,
    pub method: Method,
    /// Path including the query string
    pub path: String,
    pub body: Option<Arc<[u8]>>,
    /// Local address the socket binds to, if any
    pub local_address: Option<IpAddr>,
}

impl ProbeRequest {
    pub fn get(host: impl Into<String>, path: impl Into<String>) -> Self {
        Self {
            host: host.into(),
            port: HTTPS_PORT,
            method: Method::GET,
            path: path.into(),
            body: None,
            local_address: None,
        }
    }

    pub fn post(
        host: impl Into<String>,
        path: impl Into<String>,
        body: Arc<[u8]>,
    ) -> Self {
        Self {
            method: Method::POST,
            body: Some(body),
            ..Self::get(host, path)
        }
    }

    pub fn bound_to(mut self, local_address: Option<IpAddr>) -> Self {
        self.local_address = local_address;
        self
    }

    pub fn body_len(&self) -> usize {
        self.body.as_ref().map_or(0, |body| body.len())
    }
}

/// Lifecycle timestamps of one request, as offsets from the moment it
/// started.
///
/// Connection phases are `None` when the phase did not happen on this
/// request, e.g. on a reused connection.
#[derive(Debug, Clone, PartialEq)]
pub struct ProbeSample {
    pub dns_resolved: Option<Duration>,
    pub tcp_connected: Option<Duration>,
    pub tls_handshaked: Option<Duration>,
    pub first_byte: Duration,
    pub ended: Duration,
    /// Processing time reported by the server in `Server-Timing`
    pub server_timing_ms: Option<f64>,
}

impl ProbeSample {
    /// A sample without connection phases.
    pub const fn new(
        first_byte: Duration,
        ended: Duration,
        server_timing_ms: Option<f64>,
    ) -> Self {
        Self {
            dns_resolved: None,
            tcp_connected: None,
            tls_handshaked: None,
            first_byte,
            ended,
            server_timing_ms,
        }
    }

    /// Time between the first and the last response byte.
    pub fn transfer_duration(&self) -> Duration {
        self.ended.saturating_sub(self.first_byte)
    }

    /// Time to first byte minus the server's own processing time.
    pub fn round_trip_ms(&self) -> f64 {
        self.first_byte.as_secs_f64() * 1000.0
            - self.server_timing_ms.unwrap_or(0.0)
    }

    pub fn server_timing(&self) -> Option<Duration> {
        self.server_timing_ms
            .filter(|ms| *ms > 0.0)
            .map(|ms| Duration::from_secs_f64(ms / 1000.0))
    }
}

/// Accumulates the timestamps of a single request.
///
/// Owned by the request that creates it and consumed by [`finish`], so
/// concurrent requests can never observe each other's timings.
///
/// [`finish`]: TimingRecorder::finish
#[derive(Debug)]
pub(crate) struct TimingRecorder {
    started: Instant,
    dns_resolved: Option<Duration>,
    tcp_connected: Option<Duration>,
    tls_handshaked: Option<Duration>,
    first_byte: Option<Duration>,
}

impl TimingRecorder {
    pub(crate) fn start() -> Self {
        Self {
            started: Instant::now(),
            dns_resolved: None,
            tcp_connected: None,
            tls_handshaked: None,
            first_byte: None,
        }
    }

    pub(crate) fn dns_resolved(&mut self) {
        self.dns_resolved = Some(self.started.elapsed());
    }

    pub(crate) fn tcp_connected(&mut self) {
        self.tcp_connected = Some(self.started.elapsed());
    }

    pub(crate) fn tls_handshaked(&mut self) {
        self.tls_handshaked = Some(self.started.elapsed());
    }

    pub(crate) fn first_byte(&mut self) {
        self.first_byte = Some(self.started.elapsed());
    }

    /// Stamp the end of the response and freeze the sample.
    pub(crate) fn finish(
        self,
        server_timing_ms: Option<f64>,
    ) -> Result<ProbeSample, SpeedTestError> {
        let ended = self.started.elapsed();
        let first_byte = self.first_byte.ok_or_else(|| {
            SpeedTestError::protocol("response ended before its first byte")
        })?;

        Ok(ProbeSample {
            dns_resolved: self.dns_resolved,
            tcp_connected: self.tcp_connected,
            tls_handshaked: self.tls_handshaked,
            first_byte,
            ended,
            server_timing_ms,
        })
    }
}

/// Issues one instrumented request.
#[allow(async_fn_in_trait)]
pub trait Transport {
    async fn send(
        &self,
        request: &ProbeRequest,
    ) -> Result<ProbeSample, SpeedTestError>;
}

impl<T: Transport> Transport for &T {
    async fn send(
        &self,
        request: &ProbeRequest,
    ) -> Result<ProbeSample, SpeedTestError> {
        (**self).send(request).await
    }
}

/// Looks up client and server information for a run.
#[allow(async_fn_in_trait)]
pub trait MetadataSource {
    async fn endpoint_metadata(
        &self,
        host: &str,
        local_address: Option<IpAddr>,
    ) -> Result<EndpointMetadata, SpeedTestError>;
}

/// A throughput test: which request to issue and how long its payload
/// took to move.
pub(crate) trait Test {
    const METHOD: Method;

    fn endpoint(&'_ self) -> Cow<'_, str>;

    /// Payload size in bytes.
    fn bytes(&self) -> u64;

    fn body(&self) -> Option<Arc<[u8]>> {
        None
    }

    /// Time attributable to moving the payload, if the sample has one.
    fn transfer_duration(&self, sample: &ProbeSample) -> Option<Duration>;

    fn request(&self, host: &str, local_address: Option<IpAddr>) -> ProbeRequest {
        ProbeRequest {
            method: Self::METHOD,
            body: self.body(),
            ..ProbeRequest::get(host, self.endpoint())
        }
        .bound_to(local_address)
    }
}

/// Run `iterations` sequential requests of one test and return the rate of
/// every iteration that produced one, in the order they were measured.
pub(crate) async fn measure_block<X: Transport, T: Test>(
    transport: &X,
    test: &T,
    host: &str,
    iterations: usize,
    local_address: Option<IpAddr>,
    direction: BandwidthDirection,
    progress: &dyn ProgressCallback,
) -> Vec<f64> {
    let request = test.request(host, local_address);
    let bytes = test.bytes();
    let mut rates = Vec::with_capacity(iterations);

    for i in 0..iterations {
        debug!("{} {}B iteration {}/{}", direction, bytes, i + 1, iterations);

        let discarded = match transport.send(&request).await {
            Ok(sample) => match test
                .transfer_duration(&sample)
                .and_then(|elapsed| speed_from_duration(bytes, elapsed))
            {
                Some(speed_mbps) => {
                    debug!("{} {}B: {:.2} Mbps", direction, bytes, speed_mbps);
                    rates.push(speed_mbps);
                    progress.on_progress(ProgressEvent::BandwidthMeasurement {
                        direction,
                        speed_mbps,
                        bytes,
                        current: i + 1,
                        total: iterations,
                    });
                    None
                }
                None => Some(format!(
                    "{} {}B iteration {}/{} has no usable transfer time",
                    direction,
                    bytes,
                    i + 1,
                    iterations
                )),
            },
            Err(e) => Some(format!(
                "{} {}B iteration {}/{} failed: {}",
                direction,
                bytes,
                i + 1,
                iterations,
                e
            )),
        };

        if let Some(message) = discarded {
            warn!("{}", message);
            progress.on_progress(ProgressEvent::ProbeFailed {
                phase: direction.phase(),
                message,
            });
        }
    }

    rates
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-memory doubles for the engine's seams.

    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;

    type Responder =
        dyn Fn(&ProbeRequest, usize) -> Result<ProbeSample, SpeedTestError>;

    /// Transport that answers from a closure and records every request.
    pub(crate) struct ScriptedTransport {
        responder: Box<Responder>,
        requests: Mutex<Vec<ProbeRequest>>,
    }

    impl ScriptedTransport {
        pub(crate) fn new<F>(responder: F) -> Self
        where
            F: Fn(&ProbeRequest, usize) -> Result<ProbeSample, SpeedTestError>
                + 'static,
        {
            Self { responder: Box::new(responder), requests: Mutex::new(vec![]) }
        }

        pub(crate) fn requests(&self) -> Vec<ProbeRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl Transport for ScriptedTransport {
        async fn send(
            &self,
            request: &ProbeRequest,
        ) -> Result<ProbeSample, SpeedTestError> {
            let index = {
                let mut requests = self.requests.lock().unwrap();
                requests.push(request.clone());
                requests.len() - 1
            };
            tokio::task::yield_now().await;
            (self.responder)(request, index)
        }
    }

    /// Metadata source with a canned answer.
    pub(crate) struct StaticMetadata {
        answers: Mutex<VecDeque<Result<EndpointMetadata, SpeedTestError>>>,
        pub(crate) calls: Mutex<Vec<Option<IpAddr>>>,
    }

    impl StaticMetadata {
        pub(crate) fn ok() -> Self {
            Self::answering(Ok(EndpointMetadata {
                ip: "203.0.113.7".to_string(),
                location: "ID".to_string(),
                colo: "CGK".to_string(),
            }))
        }

        pub(crate) fn answering(
            answer: Result<EndpointMetadata, SpeedTestError>,
        ) -> Self {
            Self {
                answers: Mutex::new(VecDeque::from([answer])),
                calls: Mutex::new(vec![]),
            }
        }
    }

    impl MetadataSource for StaticMetadata {
        async fn endpoint_metadata(
            &self,
            _host: &str,
            local_address: Option<IpAddr>,
        ) -> Result<EndpointMetadata, SpeedTestError> {
            self.calls.lock().unwrap().push(local_address);
            tokio::task::yield_now().await;
            self.answers.lock().unwrap().pop_front().unwrap_or_else(|| {
                Err(SpeedTestError::endpoint("no scripted answer left"))
            })
        }
    }

    /// Progress callback that keeps every event.
    #[derive(Default)]
    pub(crate) struct RecordingProgress {
        pub(crate) events: Mutex<Vec<ProgressEvent>>,
    }

    impl ProgressCallback for RecordingProgress {
        fn on_progress(&self, event: ProgressEvent) {
            self.events.lock().unwrap().push(event);
        }
    }

    /// Sample whose first byte arrives after `first_byte_ms` and whose
    /// body takes `transfer_ms` more.
    pub(crate) fn sample(
        first_byte_ms: f64,
        transfer_ms: f64,
        server_timing_ms: Option<f64>,
    ) -> ProbeSample {
        let first_byte = Duration::from_secs_f64(first_byte_ms / 1000.0);
        let transfer = Duration::from_secs_f64(transfer_ms / 1000.0);
        ProbeSample::new(first_byte, first_byte + transfer, server_timing_ms)
    }
}

#[cfg(test)]
mod tests {
    use super::testing::*;
    use super::*;
    use crate::events::NoProgress;

    struct FixedDownload;

    impl Test for FixedDownload {
        const METHOD: Method = Method::GET;

        fn endpoint(&'_ self) -> Cow<'_, str> {
            "/__down?bytes=1000000".into()
        }

        fn bytes(&self) -> u64 {
            1_000_000
        }

        fn transfer_duration(&self, sample: &ProbeSample) -> Option<Duration> {
            Some(sample.transfer_duration())
        }
    }

    #[test]
    fn test_round_trip_subtracts_server_timing() {
        let sample = sample(25.0, 5.0, Some(5.0));
        assert!((sample.round_trip_ms() - 20.0).abs() < 1e-6);

        let without = super::testing::sample(25.0, 5.0, None);
        assert!((without.round_trip_ms() - 25.0).abs() < 1e-6);
    }

    #[test]
    fn test_transfer_duration() {
        let sample = ProbeSample::new(
            Duration::from_millis(30),
            Duration::from_millis(110),
            None,
        );
        assert_eq!(sample.transfer_duration(), Duration::from_millis(80));
        assert!(sample.server_timing().is_none());
    }

    #[test]
    fn test_recorder_marks_in_order() {
        let mut recorder = TimingRecorder::start();
        recorder.dns_resolved();
        recorder.tcp_connected();
        recorder.tls_handshaked();
        recorder.first_byte();
        let sample = recorder.finish(Some(1.5)).unwrap();

        let dns = sample.dns_resolved.unwrap();
        let tcp = sample.tcp_connected.unwrap();
        let tls = sample.tls_handshaked.unwrap();
        assert!(dns <= tcp && tcp <= tls && tls <= sample.first_byte);
        assert!(sample.first_byte <= sample.ended);
        assert_eq!(sample.server_timing_ms, Some(1.5));
    }

    #[test]
    fn test_recorder_requires_first_byte() {
        let err = TimingRecorder::start().finish(None).unwrap_err();
        assert_eq!(err.kind, crate::errors::ErrorKind::Protocol);
    }

    #[test]
    fn test_test_request_is_bound() {
        let address: IpAddr = "10.1.2.3".parse().unwrap();
        let request = FixedDownload.request("speed.example", Some(address));
        assert_eq!(request.method, Method::GET);
        assert_eq!(request.path, "/__down?bytes=1000000");
        assert_eq!(request.port, HTTPS_PORT);
        assert_eq!(request.local_address, Some(address));
        assert_eq!(request.body_len(), 0);
    }

    #[tokio::test]
    async fn test_measure_block_discards_failures() {
        let transport = ScriptedTransport::new(|_, index| {
            if index == 1 {
                Err(SpeedTestError::network("connection reset"))
            } else {
                Ok(sample(10.0, 80.0, None))
            }
        });
        let progress = RecordingProgress::default();

        let rates = measure_block(
            &transport,
            &FixedDownload,
            "speed.example",
            3,
            None,
            BandwidthDirection::Download,
            &progress,
        )
        .await;

        assert_eq!(rates.len(), 2);
        for rate in rates {
            assert!((rate - 100.0).abs() < 1e-6);
        }
        assert_eq!(transport.requests().len(), 3);

        let events = progress.events.lock().unwrap();
        let failures = events
            .iter()
            .filter(|e| matches!(e, ProgressEvent::ProbeFailed { .. }))
            .count();
        assert_eq!(failures, 1);
    }

    #[tokio::test]
    async fn test_measure_block_all_failed_is_empty() {
        let transport = ScriptedTransport::new(|_, _| {
            Err(SpeedTestError::timeout("deadline elapsed"))
        });

        let rates = measure_block(
            &transport,
            &FixedDownload,
            "speed.example",
            4,
            None,
            BandwidthDirection::Download,
            &NoProgress,
        )
        .await;

        assert!(rates.is_empty());
        assert_eq!(transport.requests().len(), 4);
    }
}
