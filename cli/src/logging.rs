//! Logging configuration with file-based output and size-based rotation.
//!
//! Writes logs to `~/.config/duetimer/duetimer.log` (or platform equivalent)
//! with size-based rotation. Set `DEBUG_LOGGING=1` (or `logging.debug` in the
//! config file) to enable debug output for the duetimer crates.

use duetimer_core::LoggingConfig;
use rolling_file::{BasicRollingFileAppender, RollingConditionBasic};
use tracing_subscriber::{
    EnvFilter,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

const DEBUG_DIRECTIVE: &str = "info,duetimer_core=debug,duetimer_cli=debug";

/// Initialize logging with dual output (file + stderr).
///
/// Returns a `WorkerGuard` that must be held for the program lifetime so
/// buffered log lines are flushed on shutdown. Falls back to stderr-only
/// logging (and returns `None`) when the log file cannot be created.
pub fn init(config: &LoggingConfig) -> Option<tracing_appender::non_blocking::WorkerGuard> {
    let debug_logging = config.debug || std::env::var("DEBUG_LOGGING").is_ok();

    if !config.file_enabled {
        init_stderr_only(debug_logging);
        return None;
    }

    let Some(log_dir) = dirs::config_dir().map(|config| config.join("duetimer")) else {
        init_stderr_only(debug_logging);
        return None;
    };

    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        // subscriber not installed yet
        eprintln!(
            "Failed to create log directory {:?}: {}, using stderr only",
            log_dir, e
        );
        init_stderr_only(debug_logging);
        return None;
    }

    // keeps duetimer.log and duetimer.log.1
    let log_path = log_dir.join("duetimer.log");
    let file_appender = match BasicRollingFileAppender::new(
        &log_path,
        RollingConditionBasic::new().max_size(max_size_bytes(config.max_size_mb)),
        1,
    ) {
        Ok(appender) => appender,
        Err(e) => {
            eprintln!("Failed to create log file at {:?}: {}", log_path, e);
            init_stderr_only(debug_logging);
            return None;
        }
    };

    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(non_blocking)
        .with_ansi(false)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    // stderr so log lines do not interleave with REPL output on stdout
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .with(filter(debug_logging))
        .init();

    tracing::info!(
        log_file = ?log_path,
        debug_logging,
        "duetimer logging initialized"
    );

    Some(guard)
}

fn init_stderr_only(debug_logging: bool) {
    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_span_events(FmtSpan::NONE);

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(filter(debug_logging))
        .init();

    tracing::info!(debug_logging, "duetimer logging initialized (stderr only)");
}

fn filter(debug_logging: bool) -> EnvFilter {
    if debug_logging {
        EnvFilter::new(DEBUG_DIRECTIVE)
    } else {
        EnvFilter::new("info")
    }
}

fn max_size_bytes(max_size_mb: u64) -> u64 {
    max_size_mb.saturating_mul(1024 * 1024)
}
