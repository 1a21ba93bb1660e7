//! Logging setup built on `tracing-subscriber`.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is not set.
pub const DEFAULT_FILTER: &str = "info,ambry_assets=debug,notify=warn";

/// Settings for the global subscriber.
#[derive(Debug, Clone)]
pub struct LogConfig {
    /// Directives used when `RUST_LOG` is unset or invalid.
    pub default_filter: String,
    /// Include the emitting thread's name in each line.
    ///
    /// Useful to tell the loader thread apart from the thread driving finalization.
    pub thread_names: bool,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            default_filter: DEFAULT_FILTER.to_string(),
            thread_names: true,
        }
    }
}

impl LogConfig {
    fn filter(&self) -> EnvFilter {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.default_filter))
    }
}

/// Install the global subscriber with default settings.
///
/// # Panics
///
/// Panics if a global subscriber was already installed. Use [`try_init`] where that
/// can happen (tests, embedding hosts).
pub fn init() {
    tracing_subscriber::fmt()
        .with_env_filter(LogConfig::default().filter())
        .with_thread_names(true)
        .init();
}

/// Install the global subscriber, returning `false` if one was already set.
pub fn try_init(config: &LogConfig) -> bool {
    tracing_subscriber::fmt()
        .with_env_filter(config.filter())
        .with_thread_names(config.thread_names)
        .try_init()
        .is_ok()
}
