use crate::util::env::env_flag;
use tracing_subscriber::{fmt::SubscriberBuilder, EnvFilter};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "info,sqlx=warn,actix_server=warn";

/// Installs the global fmt subscriber shared by every binary.
///
/// `RUST_LOG` wins over `default_filter`. File/line annotations are on unless
/// `LOG_SOURCE_LOCATION=0`.
pub fn init_tracing(default_filter: &str) -> Result<(), anyhow::Error> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_filter));
    let source_location = env_flag("LOG_SOURCE_LOCATION", true);

    SubscriberBuilder::default()
        .with_env_filter(filter)
        .with_target(true)
        .with_line_number(source_location)
        .with_file(source_location)
        .try_init()
        .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
