use std::env;
use tracing_subscriber::EnvFilter;

const CI_VAR: &str = "CI";
const DEFAULT_LOG_FILTER: &str = "info";

/// Json logs when running in CI, human readable ones filtered by `RUST_LOG` otherwise.
/// Safe to call several times, only the first call installs the subscriber.
pub fn init() {
    let _ = match env::var_os(CI_VAR) {
        Some(_) => tracing_subscriber::fmt()
            .json()
            .with_max_level(tracing::Level::INFO)
            .with_current_span(true)
            .try_init(),
        None => tracing_subscriber::fmt()
            .with_env_filter(env_filter(env::var("RUST_LOG").ok().as_deref()))
            .try_init(),
    };
}

fn env_filter(directives: Option<&str>) -> EnvFilter {
    directives
        .and_then(|d| EnvFilter::try_new(d).ok())
        .unwrap_or_else(|| EnvFilter::new(DEFAULT_LOG_FILTER))
}
