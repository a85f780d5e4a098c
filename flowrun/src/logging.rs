//! Diagnostic tracing for the flowrun binaries.
//!
//! Tracing is for people debugging the monitor and goes to stderr. The
//! monitor's real output (views, reports, captures under `io/capture`) never
//! depends on `RUST_LOG` or the verbosity flag.

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Default filter for a `-v` count.
pub fn verbosity_directive(verbose: u8) -> &'static str {
    match verbose {
        0 => "warn",
        1 => "flowrun=info,warn",
        2 => "flowrun=debug,info",
        _ => "flowrun=trace,debug",
    }
}

/// Install a compact stderr subscriber.
///
/// `RUST_LOG` wins over `default_directives` when set, e.g.
/// `RUST_LOG=flowrun::core::reducer=trace flowrun replay capture.jsonl`.
pub fn init(default_directives: &str) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(std::io::stderr).compact())
        .init();
}
