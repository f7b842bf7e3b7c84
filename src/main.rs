extern crate clap;

use clap::Parser;
use clap_verbosity_flag::{Verbosity, WarnLevel};
use colored::Colorize;
use edge_speed::cloudflare::client::TraceLookup;
use edge_speed::cloudflare::tests::engine::{TestConfig, TestEngine};
use edge_speed::cloudflare::tests::transport::{
    SocketTransport, TransportConfig,
};
use edge_speed::cloudflare::DEFAULT_HOST;
use edge_speed::errors::{exit_codes, format_error_for_display};
use edge_speed::interfaces::{
    InterfaceBinding, InterfaceTable, DEFAULT_INTERFACE,
};
use edge_speed::output::{print_result, ConsoleProgress, OutputMode};
use edge_speed::results::TestResult;
use log::{debug, warn};
use std::io::IsTerminal;
use std::sync::{Arc, LazyLock};
use std::time::Duration;

static LONG_VERSION: LazyLock<String> = LazyLock::new(|| {
    match option_env!("EDGE_SPEED_BUILD_GIT_HASH") {
        Some(hash) => format!("{} (rev {})", env!("CARGO_PKG_VERSION"), hash),
        None => env!("CARGO_PKG_VERSION").to_string(),
    }
});

#[derive(Parser)]
#[command(author, version, long_version = LONG_VERSION.as_str(), about, long_about = None)]
struct Cli {
    /// Interface every request of the run is bound to
    #[arg(short, long, default_value = DEFAULT_INTERFACE)]
    interface: String,

    /// Make an interface available as NAME=ADDRESS (repeatable)
    #[arg(short, long = "bind", value_name = "NAME=ADDRESS")]
    bindings: Vec<InterfaceBinding>,

    /// Speed test endpoint host
    #[arg(long, default_value = DEFAULT_HOST)]
    host: String,

    /// Number of idle latency probes
    #[arg(long, default_value_t = 20)]
    latency_probes: usize,

    /// Deadline for a single request, in seconds
    #[arg(long, default_value_t = 120)]
    timeout: u64,

    /// Print only the final result as JSON
    #[arg(long)]
    json: bool,

    #[command(flatten)]
    verbose: Verbosity<WarnLevel>,
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    env_logger::Builder::new()
        .filter_level(cli.verbose.log_level_filter())
        .init();

    if rustls::crypto::ring::default_provider().install_default().is_err() {
        debug!("A rustls crypto provider is already installed");
    }

    std::process::exit(run(cli).await);
}

async fn run(cli: Cli) -> i32 {
    let mode = OutputMode::detect(cli.json, std::io::stdout().is_terminal());

    let config = TestConfig {
        host: cli.host,
        latency_probes: cli.latency_probes,
        transport: TransportConfig {
            request_deadline: Duration::from_secs(cli.timeout),
            ..TransportConfig::default()
        },
        ..TestConfig::default()
    };

    let interfaces = InterfaceTable::from_bindings(cli.bindings);
    debug!("Known interfaces: {}", interfaces.names().join(", "));

    let engine = TestEngine::new(
        config.clone(),
        SocketTransport::new(config.transport.clone()),
        TraceLookup::new(config.transport.request_deadline),
        interfaces,
    )
    .with_progress(Arc::new(ConsoleProgress::new(mode)));

    tokio::select! {
        outcome = engine.run_report(&cli.interface) => match outcome {
            Ok(report) => {
                print_result(mode, &report.to_result());
                exit_codes::SUCCESS
            }
            Err(e) => {
                match mode {
                    OutputMode::Json => {
                        print_result(mode, &TestResult::failed(&e))
                    }
                    _ => eprintln!("{}", format_error_for_display(&e).red()),
                }
                e.exit_code()
            }
        },
        _ = tokio::signal::ctrl_c() => {
            warn!("Interrupted during {}, abandoning the run", engine.phase());
            exit_codes::INTERRUPTED
        }
    }
}
