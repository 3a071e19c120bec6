//! # OpsDesk Auth
//!
//! Session token types and JWT utilities for the OpsDesk API.
//!
//! - [`claims`]: The [`SessionClaims`] carried by every session token
//! - [`jwt`]: Token creation and verification
//!
//! # Example
//!
//! ```ignore
//! use opsdesk_auth::{create_session_token, verify_session_token};
//! use opsdesk_config::JwtConfig;
//!
//! let config = JwtConfig::from_env();
//! let token = create_session_token(principal_id, session_id, "user@example.com", "manager", &config)?;
//! let claims = verify_session_token(&token, &config)?;
//! ```

pub mod claims;
pub mod jwt;

// Re-export commonly used types at crate root
pub use claims::SessionClaims;
pub use jwt::{create_session_token, verify_session_token};
