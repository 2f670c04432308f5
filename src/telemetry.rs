//! Logging setup - `tracing` subscriber with env-filter.
//!
//! `TigerStyle`: Optional, with graceful fallback. Initialization never
//! panics if a subscriber is already installed (common under test
//! harnesses); the runtime keeps emitting through whatever is active.
//!
//! ## Usage
//!
//! ```rust
//! use vigil::telemetry::{init_logging, LogConfig};
//!
//! // Respect RUST_LOG, default to info-level for this crate.
//! init_logging(&LogConfig::default());
//! ```

use tracing_subscriber::EnvFilter;

/// Logging configuration.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Filter directive used when `RUST_LOG` is unset
    pub default_filter: String,
}

impl LogConfig {
    /// Create a config with an explicit fallback filter directive.
    #[must_use]
    pub fn with_filter(filter: impl Into<String>) -> Self {
        Self {
            default_filter: filter.into(),
        }
    }
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: "vigil=info".to_string(),
        }
    }
}

/// Install the global `tracing` subscriber. Returns false if one was
/// already installed (the existing subscriber stays in effect).
pub fn init_logging(config: &LogConfig) -> bool {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_filter.clone()));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init()
        .is_ok()
}
