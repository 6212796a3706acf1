//! Log output configuration.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use perch_core::{config::TelemetryConfig, Error, Result};

/// Install the global subscriber: `RUST_LOG` filter, plain or JSON lines.
pub fn configure_tracing(config: &TelemetryConfig) -> Result<()> {
    let env_filter = tracing_subscriber::EnvFilter::new(
        std::env::var("RUST_LOG").unwrap_or_else(|_| "info,perch=debug".into()),
    );

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json_logs {
        registry.with(tracing_subscriber::fmt::layer().json()).try_init()
    } else {
        registry.with(tracing_subscriber::fmt::layer()).try_init()
    };

    result.map_err(|e| Error::internal(format!("Failed to install tracing subscriber: {}", e)))
}
