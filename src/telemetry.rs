//! Structured logging setup.
//!
//! Console-only tracing subscriber with RUST_LOG support and a JSON/pretty
//! format switch. The scan's progress and summary lines all go through
//! this subscriber.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    /// Log level: "trace", "debug", "info", "warn", "error"
    pub log_level: String,
    /// Log format: "json" or "pretty"
    pub log_format: String,
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            log_level: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            log_format: std::env::var("UTXO_DUMP_LOG_FORMAT").unwrap_or_else(|_| "pretty".to_string()),
        }
    }
}

/// Initialize the tracing subscriber. RUST_LOG wins over the configured
/// level when set.
pub fn init_tracing(config: TelemetryConfig) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.log_level));

    if config.log_format == "json" {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(fmt::layer().json().with_current_span(true).with_span_list(true))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(env_filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false),
            )
            .init();
    }
}

/// Truncate hex string for logging.
///
/// Example: "0a1b2c3d4e5f67890a1b2c3d4e5f6789" → "0a1b2c3d4e5f6789..."
pub fn truncate_hex(hex: &str, len: usize) -> String {
    if hex.len() <= len {
        hex.to_string()
    } else {
        format!("{}...", &hex[..len])
    }
}
