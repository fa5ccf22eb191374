// ABOUTME: Tracing subscriber set-up shared by the binaries
// ABOUTME: Debug mode forces TRACE to stderr; otherwise RUST_LOG decides, defaulting to info

use tracing::Level;
use tracing::subscriber::SetGlobalDefaultError;
use tracing_subscriber::{EnvFilter, FmtSubscriber};

/// Installs the global subscriber writing to stderr.
pub fn init_tracing(debug: bool) -> Result<(), SetGlobalDefaultError> {
    let builder = FmtSubscriber::builder().with_writer(std::io::stderr);

    if debug {
        let subscriber = builder.with_max_level(Level::TRACE).finish();
        tracing::subscriber::set_global_default(subscriber)
    } else {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        let subscriber = builder.with_env_filter(filter).finish();
        tracing::subscriber::set_global_default(subscriber)
    }
}
