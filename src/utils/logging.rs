use std::env;

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Set to any value to turn on verbose log lines (targets, files, thread ids).
pub const DEBUG_ENV: &str = "TASKFLOW_DEBUG";

/// Logging bootstrap for applications embedding taskflow.
///
/// Both entry points return whether this call installed the global
/// subscriber; a process that already has one keeps it.
pub struct LoggingConfig;

impl LoggingConfig {
    /// Installs a subscriber filtered by `RUST_LOG`, falling back to
    /// `taskflow=info` (`taskflow=debug` when `TASKFLOW_DEBUG` is set).
    ///
    /// ```no_run
    /// use taskflow::utils::LoggingConfig;
    ///
    /// LoggingConfig::init();
    /// ```
    pub fn init() -> bool {
        let fallback = if Self::is_debug() {
            "taskflow=debug,info"
        } else {
            "taskflow=info,warn"
        };
        let filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(fallback));
        let installed = Self::install(filter);
        if installed && Self::is_debug() {
            tracing::debug!("debug logging enabled");
        }
        installed
    }

    /// Installs a subscriber with an explicit filter, e.g. `taskflow=trace`.
    pub fn init_with_filter(filter: &str) -> bool {
        Self::install(EnvFilter::new(filter))
    }

    pub fn is_debug() -> bool {
        env::var(DEBUG_ENV).is_ok()
    }

    // Workers and the flow watchdog run on named threads, so names are always on.
    fn install(filter: EnvFilter) -> bool {
        let verbose = Self::is_debug();
        let layer = fmt::layer()
            .with_thread_names(true)
            .with_target(verbose)
            .with_file(verbose)
            .with_line_number(verbose)
            .with_thread_ids(verbose);

        tracing_subscriber::registry()
            .with(filter)
            .with(layer)
            .try_init()
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_is_debug() {
        env::remove_var(DEBUG_ENV);
        assert!(!LoggingConfig::is_debug());

        env::set_var(DEBUG_ENV, "1");
        assert!(LoggingConfig::is_debug());

        env::remove_var(DEBUG_ENV);
    }

    #[test]
    fn test_second_install_is_reported() {
        LoggingConfig::init_with_filter("taskflow=debug");
        // Whichever call won above, the global subscriber is now taken.
        assert!(!LoggingConfig::init());
        assert!(!LoggingConfig::init_with_filter("taskflow=trace"));
        tracing::info!("still logging");
    }
}
