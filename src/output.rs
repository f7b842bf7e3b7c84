//! Console rendering of a run.
//!
//! Picks how results are shown from the CLI flags and the terminal, and
//! prints the headline numbers as the engine reports them.

use crate::events::{
    BandwidthDirection, ProgressCallback, ProgressEvent, TestPhase,
};
use crate::results::TestResult;
use colored::Colorize;
use log::error;

/// How a run is presented.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    /// Incremental, colored lines on an interactive terminal
    Console,
    /// Plain lines, for pipes and redirects
    Plain,
    /// Only the final result as JSON
    Json,
}

impl OutputMode {
    /// `--json` wins; otherwise colors only on a terminal.
    pub fn detect(json_flag: bool, is_tty: bool) -> Self {
        if json_flag {
            OutputMode::Json
        } else if is_tty {
            OutputMode::Console
        } else {
            OutputMode::Plain
        }
    }
}

/// Progress callback printing what a person running the CLI wants to see.
#[derive(Debug, Clone, Copy)]
pub struct ConsoleProgress {
    mode: OutputMode,
}

impl ConsoleProgress {
    pub fn new(mode: OutputMode) -> Self {
        if mode == OutputMode::Plain {
            colored::control::set_override(false);
        }

        Self { mode }
    }

    /// The line printed for `event`, if any.
    pub fn render(&self, event: &ProgressEvent) -> Option<String> {
        if self.mode == OutputMode::Json {
            return None;
        }

        let line = match event {
            ProgressEvent::PhaseChange(
                phase @ (TestPhase::ProbingLatency
                | TestPhase::ProbingDownload
                | TestPhase::ProbingUpload),
            ) => format!("Measuring {}...", phase).dimmed().to_string(),
            ProgressEvent::EndpointResolved(endpoint) => format!(
                "{} {}\n{} {} {}",
                "Server location:".bold().white(),
                endpoint.colo.bright_blue(),
                "Your IP:".bold().white(),
                endpoint.ip.bright_blue(),
                format!("({})", endpoint.location).bright_blue()
            ),
            ProgressEvent::LatencyComplete(latency) => format!(
                "{} {:.2} ms\n{} {:.2} ms",
                "Latency:".bold().white(),
                latency.median_ms,
                "Jitter:".bold().white(),
                latency.jitter_ms
            ),
            ProgressEvent::BandwidthComplete { direction, speed_mbps } => {
                let label = match direction {
                    BandwidthDirection::Download => "Download speed:",
                    BandwidthDirection::Upload => "Upload speed:",
                };
                format!(
                    "{} {}",
                    label.bold().white(),
                    format!("{:.2} Mbps", speed_mbps).bright_cyan()
                )
            }
            _ => return None,
        };

        Some(line)
    }
}

impl ProgressCallback for ConsoleProgress {
    fn on_progress(&self, event: ProgressEvent) {
        if let Some(line) = self.render(&event) {
            println!("{}", line);
        }
    }
}

/// Print the final result the way `mode` asks for.
pub fn print_result(mode: OutputMode, result: &TestResult) {
    match mode {
        OutputMode::Json => match serde_json::to_string(result) {
            Ok(json) => println!("{}", json),
            Err(e) => error!("Failed to serialize result: {}", e),
        },
        OutputMode::Console | OutputMode::Plain => match result {
            TestResult::Finished { ping, download, upload } => println!(
                "{} ping {} ms, download {} Mbps, upload {} Mbps",
                "Done:".bold().green(),
                ping,
                download,
                upload
            ),
            TestResult::Failed { error } => {
                eprintln!("{} {}", "Error:".bold().red(), error)
            }
        },
    }
}
