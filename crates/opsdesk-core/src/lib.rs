//! # OpsDesk Core
//!
//! Core types, errors, and utilities for the OpsDesk API.
//!
//! This crate provides foundational types used throughout the OpsDesk application:
//!
//! - [`channels`]: Named log channels and their retention
//! - [`errors`]: Application error types with HTTP response conversion
//! - [`field_errors`]: Field-keyed, accumulative validation errors
//! - [`pagination`]: Pagination utilities for API responses
//! - [`password`]: Secure password hashing and verification
//! - [`serde`]: Custom serde serialization/deserialization helpers
//!
//! # Example
//!
//! ```ignore
//! use opsdesk_core::errors::AppError;
//! use opsdesk_core::field_errors::FieldErrors;
//!
//! let mut errors = FieldErrors::new();
//! errors.add("phone", "The phone format is invalid.");
//! let error = AppError::validation(errors);
//! ```

pub mod channels;
pub mod errors;
pub mod field_errors;
pub mod pagination;
pub mod password;
pub mod serde;

// Re-export commonly used types at crate root
pub use channels::LogChannel;
pub use errors::{AppError, ErrorKind, ErrorReport};
pub use field_errors::FieldErrors;
pub use pagination::{PaginationMeta, PaginationParams};
pub use password::{hash_password, verify_dummy_password, verify_password};
