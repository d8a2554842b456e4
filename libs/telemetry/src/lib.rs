//! Structured logging setup for the bridge's three processes.
//!
//! ```no_run
//! use bridge_telemetry::{init_logging, LoggingConfig};
//!
//! let cfg = LoggingConfig::from_env("ingress");
//! init_logging(&cfg);
//! tracing::info!("logging configured");
//! ```

mod config;
mod context;
mod init;
mod metrics;

pub use config::LoggingConfig;
pub use context::{MessageContext, TelemetryLabels};
pub use init::init_logging;
pub use metrics::{record_counter, record_gauge, record_histogram};

#[cfg(test)]
pub(crate) mod test_support {
    use std::sync::{Mutex, MutexGuard, OnceLock};

    pub fn env_lock() -> &'static Mutex<()> {
        static LOCK: OnceLock<Mutex<()>> = OnceLock::new();
        LOCK.get_or_init(|| Mutex::new(()))
    }

    pub fn env_guard() -> MutexGuard<'static, ()> {
        env_lock().lock().unwrap_or_else(|err| err.into_inner())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::env_guard;

    #[test]
    fn config_defaults_to_json_and_info() {
        let _guard = env_guard();
        // SAFETY: serialized by env_guard.
        unsafe {
            std::env::remove_var("BRIDGE_LOG_FORMAT");
            std::env::remove_var("RUST_LOG");
        }
        let cfg = LoggingConfig::from_env("test-service");
        assert!(cfg.json);
        assert_eq!(cfg.filter, "info");
    }

    #[test]
    fn config_honors_text_format_and_filter() {
        let _guard = env_guard();
        unsafe {
            std::env::set_var("BRIDGE_LOG_FORMAT", "text");
            std::env::set_var("RUST_LOG", "debug");
        }
        let cfg = LoggingConfig::from_env("svc");
        assert!(!cfg.json);
        assert_eq!(cfg.filter, "debug");
        unsafe {
            std::env::remove_var("BRIDGE_LOG_FORMAT");
            std::env::remove_var("RUST_LOG");
        }
    }
}
