use tracing_subscriber::EnvFilter;

/// Used when `RUST_LOG` is unset or unparsable; sqlx logs every statement at info.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn";

/// Install the global subscriber once. Log records go to stderr.
pub fn init_tracing_from_env() {
    let _ = tracing_log::LogTracer::init();
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let subscriber = tracing_subscriber::fmt()
        .with_env_filter(env_filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_level(true)
        .finish();
    let _ = tracing::subscriber::set_global_default(subscriber);
}
