use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const LOG_DIR: &str = "logs";
const LOG_FILE: &str = "stepwise.log";

/// Installs the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `log_level` when it is set. Console output
/// goes to stderr so it does not interleave with the chat on stdout.
///
/// # Arguments
///
/// * `log_level` - Filter directive, e.g. "warn" or "stepwise=debug"
/// * `with_file` - Also write uncolored logs to `logs/stepwise.log`, rotated daily
///
/// # Returns
///
/// The file writer guard; buffered lines are flushed when it is dropped.
pub fn init_logging(log_level: &str, with_file: bool) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level))
        .unwrap_or_else(|e| {
            eprintln!("Invalid log level '{}' ({}), using 'info'", log_level, e);
            EnvFilter::new("info")
        });

    let console_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    let (file_layer, guard) = if with_file {
        let appender = tracing_appender::rolling::daily(LOG_DIR, LOG_FILE);
        let (writer, guard) = tracing_appender::non_blocking(appender);
        let layer = fmt::layer()
            .with_ansi(false)
            .with_line_number(true)
            .with_writer(writer);
        (Some(layer), Some(guard))
    } else {
        (None, None)
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .init();
    guard
}
