use tracing_subscriber::EnvFilter;

pub const DEFAULT_LOG_FILTER: &str = "warn";

/// Installs a stderr subscriber filtered by `RUST_LOG`, defaulting to warnings.
///
/// Keeps stdout free for the conversation transcript.
pub fn init_logging() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}
