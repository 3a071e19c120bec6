//! # OpsDesk Config
//!
//! Configuration types for the OpsDesk API.
//!
//! This crate provides configuration structures loaded from environment variables:
//!
//! - [`jwt`]: Session token signing configuration
//! - [`session`]: Session cookie configuration
//! - [`cors`]: CORS (Cross-Origin Resource Sharing) configuration
//! - [`logging`]: Log channel, audit and slow-request configuration
//!
//! # Example
//!
//! ```ignore
//! use opsdesk_config::{JwtConfig, SessionConfig, CorsConfig, LoggingConfig};
//!
//! // Load all configs from environment
//! let jwt_config = JwtConfig::from_env();
//! let session_config = SessionConfig::from_env();
//! let cors_config = CorsConfig::from_env();
//! let logging_config = LoggingConfig::from_env();
//! ```

pub mod cors;
pub mod jwt;
pub mod logging;
pub mod session;

// Re-export commonly used types at crate root
pub use cors::CorsConfig;
pub use jwt::JwtConfig;
pub use logging::LoggingConfig;
pub use session::SessionConfig;

pub(crate) fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}
