//! Logging configuration.
//!
//! # Environment Variables
//!
//! - `LOG_DIR`: Directory holding one rotated file set per channel (default: `storage/logs`)
//! - `LOG_LEVEL`: Fallback filter when `RUST_LOG` is unset (default: `info`)
//! - `SLOW_REQUEST_THRESHOLD_MS`: Requests slower than this log a `slow request` warning (default: 1000)
//! - `AUDIT_BODY_LIMIT_BYTES`: Largest request body the audit logger buffers (default: 1 MiB)
//! - `OBSERVABILITY_ENABLED`: Enables OTLP export and the `/metrics` recorder (default: false)

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::env_parse;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoggingConfig {
    pub log_dir: PathBuf,
    pub level: String,
    pub slow_request_threshold_ms: u64,
    pub audit_body_limit_bytes: usize,
    pub observability_enabled: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            log_dir: PathBuf::from("storage/logs"),
            level: "info".to_string(),
            slow_request_threshold_ms: 1000,
            audit_body_limit_bytes: 1024 * 1024,
            observability_enabled: false,
        }
    }
}

impl LoggingConfig {
    #[must_use]
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            log_dir: env::var("LOG_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.log_dir),
            level: env::var("LOG_LEVEL").unwrap_or(defaults.level),
            slow_request_threshold_ms: env_parse(
                "SLOW_REQUEST_THRESHOLD_MS",
                defaults.slow_request_threshold_ms,
            ),
            audit_body_limit_bytes: env_parse(
                "AUDIT_BODY_LIMIT_BYTES",
                defaults.audit_body_limit_bytes,
            ),
            observability_enabled: env::var("OBSERVABILITY_ENABLED")
                .map(|v| v == "true" || v == "1")
                .unwrap_or(false),
        }
    }

    pub fn slow_request_threshold(&self) -> Duration {
        Duration::from_millis(self.slow_request_threshold_ms)
    }
}
