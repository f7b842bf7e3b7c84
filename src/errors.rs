//! Error types for the speed test engine.
//!
//! Transport failures (`Network`, `Dns`, `Timeout`, `Tls`, `Protocol`) are
//! recovered per probe by discarding the sample. Every other kind fails
//! the whole run and is turned into an error-shaped result by the engine.

use std::error::Error;
use std::fmt;
use std::io;

/// Process exit codes of the CLI.
pub mod exit_codes {
    pub const SUCCESS: i32 = 0;
    /// A request failed at the transport level.
    pub const NETWORK_ERROR: i32 = 1;
    /// The speed test endpoint could not be queried for metadata.
    pub const ENDPOINT_ERROR: i32 = 2;
    /// Invalid arguments or an unknown interface.
    pub const CONFIG_ERROR: i32 = 3;
    /// A measurement phase produced no usable samples.
    pub const MEASUREMENT_ERROR: i32 = 4;
    /// The run was abandoned with Ctrl-C.
    pub const INTERRUPTED: i32 = 130;
    pub const UNKNOWN_ERROR: i32 = 99;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Connection refused, reset, or otherwise broken
    Network,
    Dns,
    /// Connect timeout, stalled socket, or request deadline
    Timeout,
    Tls,
    /// Malformed or unsuccessful HTTP response
    Protocol,
    /// A statistics function received an empty or invalid sample set
    InvalidInput,
    /// Invalid configuration or unknown network interface
    Config,
    /// The endpoint metadata lookup failed
    Endpoint,
    Unknown,
}

impl ErrorKind {
    pub fn exit_code(&self) -> i32 {
        match self {
            kind if kind.is_transport() => exit_codes::NETWORK_ERROR,
            ErrorKind::Endpoint => exit_codes::ENDPOINT_ERROR,
            ErrorKind::Config => exit_codes::CONFIG_ERROR,
            ErrorKind::InvalidInput => exit_codes::MEASUREMENT_ERROR,
            _ => exit_codes::UNKNOWN_ERROR,
        }
    }

    /// Short human label, used as the `Display` prefix.
    pub fn description(&self) -> &'static str {
        match self {
            ErrorKind::Network => "Network error",
            ErrorKind::Dns => "DNS resolution error",
            ErrorKind::Timeout => "Connection timeout",
            ErrorKind::Tls => "TLS/SSL error",
            ErrorKind::Protocol => "Protocol error",
            ErrorKind::InvalidInput => "Measurement error",
            ErrorKind::Config => "Configuration error",
            ErrorKind::Endpoint => "Endpoint error",
            ErrorKind::Unknown => "Unknown error",
        }
    }

    /// Hint attached by the kind constructors of [`SpeedTestError`].
    pub fn suggestion(&self) -> Option<&'static str> {
        match self {
            ErrorKind::Network => {
                Some("Check your internet connection and try again.")
            }
            ErrorKind::Dns => Some(
                "Check your DNS settings or try using a different DNS server.",
            ),
            ErrorKind::Timeout => {
                Some("The server may be slow or unreachable. Try again later.")
            }
            ErrorKind::Tls => {
                Some("There may be a certificate issue. Check your system time.")
            }
            ErrorKind::Endpoint => Some(
                "The speed test endpoint may be unreachable. Try again later.",
            ),
            _ => None,
        }
    }

    /// Whether this kind describes a single failed request.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            ErrorKind::Network
                | ErrorKind::Dns
                | ErrorKind::Timeout
                | ErrorKind::Tls
                | ErrorKind::Protocol
        )
    }
}

#[derive(Debug)]
pub struct SpeedTestError {
    pub kind: ErrorKind,
    /// Message shown to the user and carried in failed results
    pub message: String,
    pub suggestion: Option<String>,
    pub source: Option<Box<dyn Error + Send + Sync>>,
}

impl SpeedTestError {
    /// An error without a suggestion.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self { kind, message: message.into(), suggestion: None, source: None }
    }

    /// An error carrying the kind's default suggestion, if it has one.
    fn suggested(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            suggestion: kind.suggestion().map(str::to_string),
            ..Self::new(kind, message)
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestion = Some(suggestion.into());
        self
    }

    pub fn with_source(
        mut self,
        source: impl Error + Send + Sync + 'static,
    ) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.kind.exit_code()
    }

    pub fn network(message: impl Into<String>) -> Self {
        Self::suggested(ErrorKind::Network, message)
    }

    pub fn dns(message: impl Into<String>) -> Self {
        Self::suggested(ErrorKind::Dns, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::suggested(ErrorKind::Timeout, message)
    }

    pub fn tls(message: impl Into<String>) -> Self {
        Self::suggested(ErrorKind::Tls, message)
    }

    pub fn protocol(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Protocol, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::InvalidInput, message)
    }

    /// A configuration error. The message is reported verbatim, so it
    /// carries no suggestion.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    pub fn endpoint(message: impl Into<String>) -> Self {
        Self::suggested(ErrorKind::Endpoint, message)
    }
}

impl fmt::Display for SpeedTestError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.kind.description(), self.message)?;

        if let Some(ref suggestion) = self.suggestion {
            write!(f, "\n  Suggestion: {}", suggestion)?;
        }

        Ok(())
    }
}

impl Error for SpeedTestError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        self.source.as_ref().map(|e| e.as_ref() as &(dyn Error + 'static))
    }
}

/// Message fragments that identify an error kind, checked in order.
const KEYWORDS: &[(ErrorKind, &[&str])] = &[
    (ErrorKind::Dns, &["dns", "resolve", "no such host", "no record"]),
    (ErrorKind::Timeout, &["timeout", "timed out", "deadline", "would block"]),
    (ErrorKind::Tls, &["tls", "ssl", "certificate", "handshake"]),
    (
        ErrorKind::Network,
        &[
            "connection refused",
            "connection reset",
            "connection aborted",
            "network unreachable",
            "host unreachable",
            "no route",
            "broken pipe",
            "address not available",
            "unexpected end of file",
            "early eof",
        ],
    ),
    (ErrorKind::Protocol, &["http status", "malformed"]),
];

fn classify_io(error: &io::Error) -> Option<ErrorKind> {
    match error.kind() {
        io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => {
            Some(ErrorKind::Timeout)
        }
        io::ErrorKind::ConnectionRefused
        | io::ErrorKind::ConnectionReset
        | io::ErrorKind::ConnectionAborted
        | io::ErrorKind::NotConnected
        | io::ErrorKind::AddrNotAvailable
        | io::ErrorKind::BrokenPipe
        | io::ErrorKind::UnexpectedEof => Some(ErrorKind::Network),
        _ => None,
    }
}

/// Classify an error, first by any `io::Error` in its source chain, then
/// by its message.
pub fn classify_error(error: &(dyn Error + 'static)) -> ErrorKind {
    let mut current = Some(error);
    while let Some(e) = current {
        if let Some(kind) = e.downcast_ref::<io::Error>().and_then(classify_io)
        {
            return kind;
        }
        current = e.source();
    }

    let message = error.to_string().to_lowercase();
    KEYWORDS
        .iter()
        .find(|(_, words)| words.iter().any(|w| message.contains(w)))
        .map_or(ErrorKind::Unknown, |(kind, _)| *kind)
}

/// Wrap a foreign error, classifying it and prefixing `context`.
pub fn to_speed_test_error(
    error: Box<dyn Error + Send + Sync>,
    context: &str,
) -> SpeedTestError {
    let kind = classify_error(error.as_ref());
    let message = format!("{}: {}", context, error);

    SpeedTestError {
        source: Some(error),
        ..SpeedTestError::suggested(kind, message)
    }
}

/// The error as printed by the CLI: message, then the suggestion if any.
pub fn format_error_for_display(error: &SpeedTestError) -> String {
    match error.suggestion {
        Some(ref suggestion) => {
            format!("Error: {}\n\nSuggestion: {}", error.message, suggestion)
        }
        None => format!("Error: {}", error.message),
    }
}
