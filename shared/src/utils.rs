//! Logging for the Lambda binaries.

use tracing_subscriber::EnvFilter;

/// Default directive when `RUST_LOG` is unset or unparsable.
const DEFAULT_LOG_FILTER: &str = "info";

/// Installs the process-wide subscriber that the `log` macros feed into.
///
/// Output is plain text without ANSI colours or timestamps, since CloudWatch
/// stamps each line on ingestion. Calling it twice keeps the first subscriber.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_ansi(false)
        .without_time()
        .with_target(false)
        .try_init();
}

/// Emits the single JSON summary line each invocation ends with.
pub fn log_service_summary(summary: serde_json::Value) {
    log::info!("{}", serde_json::to_string(&summary).unwrap_or_default());
}
