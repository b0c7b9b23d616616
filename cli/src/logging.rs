//! Tracing setup for the command-line front end.
//!
//! Logs go to stderr so stdout only carries results. `RUST_LOG` overrides
//! the verbosity given on the command line.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Map `-v` occurrences to a level name.
pub fn level_for(verbosity: u8) -> &'static str {
    match verbosity {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    }
}

/// Initialize the global subscriber.
///
/// Verbosity: 0=warn, 1=info, 2=debug, 3+=trace.
pub fn init_logging(verbosity: u8) -> Result<(), String> {
    let level = level_for(verbosity);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!("hashgen={},hashgen_engine={}", level, level))
    });

    tracing_subscriber::registry()
        .with(filter)
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(verbosity >= 2)
                .with_thread_names(verbosity >= 2)
                .with_file(verbosity >= 3)
                .with_line_number(verbosity >= 3),
        )
        .try_init()
        .map_err(|e| format!("Failed to initialize logging: {}", e))
}
