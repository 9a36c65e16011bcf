use tracing_subscriber::EnvFilter;

/// Log filter precedence: `RUST_LOG`, then `--log-level`, then `info`.
fn env_filter(log_level: Option<&str>) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(log_level.unwrap_or("info")))
        .unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Logs always go to stderr so JSON output on stdout stays machine-readable.
pub(crate) fn init(log_level: Option<&str>) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(env_filter(log_level))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}
