use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;

pub const LOG_ENV: &str = "PA_SYNTH_LOG";

const DEFAULT_DIRECTIVE: &str = "info";

/// Builds the filter from `PA_SYNTH_LOG`, then `RUST_LOG`, then `info`.
pub fn env_filter() -> EnvFilter {
    match std::env::var(LOG_ENV) {
        Ok(directive) => EnvFilter::try_new(&directive).unwrap_or_else(|err| {
            eprintln!("invalid {LOG_ENV} directive ({err}); defaulting to {DEFAULT_DIRECTIVE}");
            EnvFilter::new(DEFAULT_DIRECTIVE)
        }),
        Err(_) => EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE)),
    }
}

/// Installs a stderr subscriber. Stdout stays free for the output paths.
/// A second call is a no-op.
pub fn init_tracing() {
    let fmt_layer = fmt::layer()
        .with_target(false)
        .with_writer(std::io::stderr);

    tracing_subscriber::registry()
        .with(env_filter())
        .with(fmt_layer)
        .try_init()
        .ok();
}
